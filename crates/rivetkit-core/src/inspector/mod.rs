//! Bearer-gated read-only inspector routes (spec §4.H), modeled on
//! `engine/packages/api-public`'s axum route style: thin handlers that
//! delegate to the [`Manager`] and turn `BoxedError` into a JSON error
//! body via [`BoxedError::to_http_response_error`].
//!
//! Disabled entirely (the router has no routes mounted) when
//! [`Config::inspector_enabled`] is false.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::Stream;
use rivetkit_inspector_protocol::{InspectActorSummary, InspectEventTail, InspectListResponse, InspectStateResponse};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{BoxedError, UserError};
use crate::id::ActorId;
use crate::manager::Manager;

struct ApiError(BoxedError);

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.0.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.0.to_http_response_error())).into_response()
	}
}

impl From<BoxedError> for ApiError {
	fn from(err: BoxedError) -> Self {
		Self(err)
	}
}

#[derive(Clone)]
struct InspectorState {
	manager: Arc<Manager>,
	token: Option<String>,
}

/// Builds the inspector router, or an empty one when disabled. Mount under
/// `/inspect` (`Registry::build` does this for the bundled `serve()` path).
pub fn router(manager: Arc<Manager>, config: &Config) -> Router {
	if !config.inspector_enabled() {
		return Router::new();
	}

	let state = InspectorState { manager, token: config.inspector_token.clone() };

	Router::new()
		.route("/", get(root))
		.route("/actors", get(list_actors))
		.route("/actors/{actor_id}", get(actor_state))
		.route("/actors/{actor_id}/events", get(tail_events))
		.route_layer(axum::middleware::from_fn_with_state(state.clone(), require_bearer))
		.with_state(state)
}

async fn require_bearer(
	State(state): State<InspectorState>,
	headers: HeaderMap,
	request: axum::extract::Request,
	next: axum::middleware::Next,
) -> Response {
	let Some(expected) = &state.token else {
		// No token configured: the operator opted into an open inspector.
		return next.run(request).await;
	};

	let presented = headers
		.get(axum::http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "));

	match presented {
		Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => next.run(request).await,
		_ => ApiError(UserError::Unauthorized.into()).into_response(),
	}
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	use subtle::ConstantTimeEq;
	a.len() == b.len() && a.ct_eq(b).into()
}

async fn root() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "service": "rivetkit", "inspector": true }))
}

#[derive(Deserialize)]
struct ListParams {
	cursor: Option<String>,
}

async fn list_actors(State(state): State<InspectorState>, Query(params): Query<ListParams>) -> Json<InspectListResponse> {
	let mut instances = state.manager.list_instances().await;
	instances.sort_by_key(|i| i.actor_id().0);

	if let Some(cursor) = &params.cursor {
		if let Ok(after) = cursor.parse::<u128>() {
			instances.retain(|i| i.actor_id().0 > after);
		}
	}

	let cursor = instances.last().map(|i| i.actor_id().0.to_string());
	let actors = instances
		.into_iter()
		.map(|instance| InspectActorSummary {
			actor_id: instance.actor_id().to_string(),
			name: instance.name().to_string(),
			key: instance.key().clone(),
			status: "running".to_string(),
			connection_count: instance.connection_count(),
			last_activity_ms: instance.last_activity_ms(),
		})
		.collect();

	Json(InspectListResponse { actors, cursor })
}

async fn actor_state(
	State(state): State<InspectorState>,
	Path(actor_id): Path<String>,
) -> Result<Json<InspectStateResponse>, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let instance = state.manager.get_for_id(actor_id).await?;
	Ok(Json(InspectStateResponse {
		actor_id: instance.actor_id().to_string(),
		state: instance.state_snapshot(),
		vars_present: instance.vars_present(),
	}))
}

async fn tail_events(
	State(state): State<InspectorState>,
	Path(actor_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let instance = state.manager.get_for_id(actor_id).await?;
	let mut rx = instance.subscribe_events();

	let stream = async_stream::stream! {
		loop {
			match rx.recv().await {
				Ok((name, args)) => {
					let tail = InspectEventTail {
						actor_id: actor_id.to_string(),
						name,
						args,
						ts_ms: crate::instance::context::now_ms(),
					};
					if let Ok(json) = serde_json::to_string(&tail) {
						yield Ok(Event::default().data(json));
					}
				}
				Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
				Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
			}
		}
	};

	Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn parse_actor_id(raw: &str) -> Result<ActorId, ApiError> {
	ActorId::from_hex(raw)
		.ok_or_else(|| ApiError(UserError::ValidationFailed { message: format!("invalid actor id: {raw}") }.into()))
}
