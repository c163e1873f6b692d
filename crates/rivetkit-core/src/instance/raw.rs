//! Raw HTTP / raw WebSocket pass-through (spec §4.D): lets a handler see a
//! request that isn't an RPC envelope. Transport-neutral, same reasoning as
//! [`super::connection::UniversalWebSocket`] -- `rivetkit-core` shouldn't
//! depend on axum to describe the shape of a request.

use async_trait::async_trait;

use crate::error::BoxedError;

/// A raw WebSocket for `onWebSocket` handlers (spec §4.D). Unlike
/// [`super::connection::UniversalWebSocket`] -- which only ever carries
/// `ToClient` RPC envelopes -- this moves opaque bytes in both directions,
/// since a raw socket isn't talking the action/subscription protocol at all.
#[async_trait]
pub trait RawWebSocket: Send + Sync {
	async fn send(&self, bytes: Vec<u8>) -> Result<(), BoxedError>;
	async fn close(&self, code: u16, reason: &str);
	/// Returns the next inbound message, or `None` once the socket is closed.
	async fn recv(&self) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct RawRequest {
	pub method: String,
	pub path: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl RawResponse {
	pub fn json(status: u16, value: &serde_json::Value) -> Self {
		Self {
			status,
			headers: vec![("content-type".to_string(), "application/json".to_string())],
			body: serde_json::to_vec(value).unwrap_or_default(),
		}
	}

	pub fn text(status: u16, body: impl Into<String>) -> Self {
		Self {
			status,
			headers: vec![("content-type".to_string(), "text/plain".to_string())],
			body: body.into().into_bytes(),
		}
	}
}
