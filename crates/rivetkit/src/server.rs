//! HTTP/WS route table (spec §6), modeled on the teacher's
//! `engine/packages/api-public` axum wiring: thin handlers that delegate
//! to [`Manager`] and turn a [`BoxedError`] into a JSON error body.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use rivetkit_client_protocol::{
	HttpActionRequest, HttpActionResponse, HttpCreateRequest, HttpCreateResponse, HttpListQuery, HttpListResponse,
	HttpQueueSendRequest, HttpQueueSendResponse, HttpResolveRequest, HttpResolveResponse,
};
use rivetkit_core::config::Config;
use rivetkit_core::error::{BoxedError, UserError};
use rivetkit_core::id::ActorId;
use rivetkit_core::manager::Manager;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::registry::Registry;
use crate::ws;

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
struct AppState {
	manager: Arc<Manager>,
}

/// Builds the full route table and mounts the inspector under `/inspect`.
/// `Registry::router`/`serve` both go through here.
pub fn router(manager: Arc<Manager>, config: &Config) -> Router {
	let state = AppState { manager: manager.clone() };

	Router::new()
		.route("/actors/{name}/resolve", post(resolve))
		.route("/actors/{name}/create", post(create))
		.route("/actors/{name}/get-or-create", post(get_or_create))
		.route("/actors/{actor_id}/actions/{name}", post(call_action))
		.route("/actors/{actor_id}/queue/{name}", post(queue_send))
		.route("/actors/{id}", get(list_or_by_name).delete(destroy))
		.route("/actors/{actor_id}/ws", get(ws_upgrade))
		.route("/actors/{actor_id}/raw-ws", get(raw_ws_upgrade))
		.route("/actors/{actor_id}/raw/{*path}", any(raw_request))
		.with_state(state)
		.nest("/inspect", rivetkit_core::inspector::router(manager, config))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

pub(crate) async fn serve(registry: Registry) -> Result<(), BoxedError> {
	let config = registry.config().clone();
	let app = router(registry.manager(), &config);
	let addr = format!("{}:{}", config.hostname(), config.port());

	tracing::info!(%addr, "rivetkit listening");
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.map_err(|e| rivetkit_core::error::InternalError::DriverError { detail: e.to_string() })?;

	axum::serve(listener, app)
		.await
		.map_err(|e| rivetkit_core::error::InternalError::DriverError { detail: e.to_string() }.into())
}

async fn resolve(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(body): Json<HttpResolveRequest>,
) -> Result<Json<HttpResolveResponse>, ApiError> {
	let actor_id = state.manager.resolve(&name, &body.key);
	Ok(Json(HttpResolveResponse { actor_id: actor_id.to_string() }))
}

async fn create(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(body): Json<HttpCreateRequest>,
) -> Result<Json<HttpCreateResponse>, ApiError> {
	let instance = state.manager.create(&name, body.key, body.input).await?;
	Ok(Json(HttpCreateResponse { actor_id: instance.actor_id().to_string() }))
}

async fn get_or_create(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(body): Json<HttpCreateRequest>,
) -> Result<Json<HttpCreateResponse>, ApiError> {
	let instance = state.manager.get_or_create(&name, body.key, body.input).await?;
	Ok(Json(HttpCreateResponse { actor_id: instance.actor_id().to_string() }))
}

async fn call_action(
	State(state): State<AppState>,
	Path((actor_id, name)): Path<(String, String)>,
	Json(body): Json<HttpActionRequest>,
) -> Result<Json<HttpActionResponse>, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let instance = state.manager.get_for_id(actor_id).await?;
	let output = instance.call_action(&name, body.args).await?;
	Ok(Json(HttpActionResponse { output }))
}

async fn queue_send(
	State(state): State<AppState>,
	Path((actor_id, name)): Path<(String, String)>,
	Json(body): Json<HttpQueueSendRequest>,
) -> Result<Json<HttpQueueSendResponse>, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let instance = state.manager.get_for_id(actor_id).await?;
	let timeout = body.timeout.map(Duration::from_millis);
	let response = instance.queue().send(Some(name), body.body, body.wait, timeout).await;
	Ok(Json(match response {
		Some(response) => HttpQueueSendResponse::Completed { response },
		None => HttpQueueSendResponse::TimedOut,
	}))
}

async fn destroy(State(state): State<AppState>, Path(actor_id): Path<String>) -> Result<StatusCode, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	state.manager.destroy(actor_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// `GET /actors/{id}` does double duty per the route table: with a valid
/// hex `ActorId` and no `prefix`/`cursor` query it would still parse as a
/// list-by-name call, so this always treats the path segment as an actor
/// *name* and defers to [`Manager::list_instances`], matching the
/// `GET /actors/:name?prefix=...&cursor=...` row.
async fn list_or_by_name(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Query(query): Query<HttpListQuery>,
) -> Json<HttpListResponse> {
	let mut instances = state.manager.list_instances().await;
	instances.retain(|i| i.name() == name);
	if let Some(prefix) = &query.prefix {
		instances.retain(|i| i.key().iter().any(|part| part.starts_with(prefix.as_str())));
	}
	instances.sort_by_key(|i| i.actor_id().0);
	if let Some(cursor) = &query.cursor {
		if let Some(after) = ActorId::from_hex(cursor) {
			instances.retain(|i| i.actor_id().0 > after.0);
		}
	}

	let cursor = instances.last().map(|i| i.actor_id().to_string());
	let actor_ids = instances.into_iter().map(|i| i.actor_id().to_string()).collect();
	Json(HttpListResponse { actor_ids, cursor })
}

async fn ws_upgrade(
	State(state): State<AppState>,
	Path(actor_id): Path<String>,
	headers: axum::http::HeaderMap,
	upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let params = ws::parse_ws_params(&headers);
	let manager = state.manager.clone();

	Ok(upgrade
		.protocols(["rivet"])
		.on_upgrade(move |socket| ws::handle_socket(socket, manager, actor_id, params)))
}

async fn raw_request(
	State(state): State<AppState>,
	Path((actor_id, path)): Path<(String, String)>,
	method: Method,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let instance = state.manager.get_for_id(actor_id).await?;
	let request = rivetkit_core::instance::raw::RawRequest {
		method: method.to_string(),
		path,
		headers: headers
			.iter()
			.filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
			.collect(),
		body: body.to_vec(),
	};
	let response = instance.raw_request(request).await?;
	let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
	let mut builder = Response::builder().status(status);
	for (name, value) in response.headers {
		builder = builder.header(name, value);
	}
	Ok(builder.body(axum::body::Body::from(response.body)).unwrap())
}

async fn raw_ws_upgrade(
	State(state): State<AppState>,
	Path(actor_id): Path<String>,
	upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
	let actor_id = parse_actor_id(&actor_id)?;
	let manager = state.manager.clone();
	Ok(upgrade.on_upgrade(move |socket| ws::handle_raw_socket(socket, manager, actor_id)))
}

fn parse_actor_id(raw: &str) -> Result<ActorId, ApiError> {
	ActorId::from_hex(raw)
		.ok_or_else(|| ApiError(UserError::ValidationFailed { message: format!("invalid actor id: {raw}") }.into()))
}
