//! Live client connections (spec §3, §4.D "hibernatable WebSockets").
//! `UniversalWebSocket` abstracts the transport so the runtime's
//! broadcast/send path never touches `tokio-tungstenite` directly —
//! a polling HTTP transport could implement the same trait.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rivetkit_client_protocol::ToClient;
use serde_json::Value;

use crate::error::BoxedError;

#[async_trait]
pub trait UniversalWebSocket: Send + Sync {
	async fn send(&self, envelope: &ToClient) -> Result<(), BoxedError>;
	async fn close(&self, code: u16, reason: &str);
}

pub struct Conn {
	pub connection_id: String,
	pub params: Value,
	pub hibernatable_request_id: Option<String>,
	state: Mutex<Option<Value>>,
	subscriptions: Mutex<HashSet<String>>,
	socket: Arc<dyn UniversalWebSocket>,
}

impl Conn {
	/// Every connection is resumable by its own id (spec §4.D "hibernatable
	/// WebSockets"): a reconnect naming this id as its `reconnect_id` picks
	/// the persisted record back up instead of reconnecting fresh.
	pub fn new(connection_id: String, params: Value, socket: Arc<dyn UniversalWebSocket>) -> Self {
		Self {
			hibernatable_request_id: Some(connection_id.clone()),
			connection_id,
			params,
			state: Mutex::new(None),
			subscriptions: Mutex::new(HashSet::new()),
			socket,
		}
	}

	/// Rebuilds a connection from its persisted [`crate::persist::conn::ConnPersist`]
	/// record, restoring subscriptions and conn-local state instead of
	/// starting over.
	pub(crate) fn from_persisted(record: crate::persist::conn::ConnPersist, socket: Arc<dyn UniversalWebSocket>) -> Self {
		Self {
			connection_id: record.connection_id,
			params: record.params,
			hibernatable_request_id: record.hibernatable_request_id,
			state: Mutex::new(record.state),
			subscriptions: Mutex::new(record.subscriptions.into_iter().collect()),
			socket,
		}
	}

	pub fn state(&self) -> Option<Value> {
		self.state.lock().clone()
	}

	pub fn set_state(&self, value: Value) {
		*self.state.lock() = Some(value);
	}

	pub fn subscribe(&self, event: &str) {
		self.subscriptions.lock().insert(event.to_string());
	}

	pub fn unsubscribe(&self, event: &str) {
		self.subscriptions.lock().remove(event);
	}

	pub fn is_subscribed(&self, event: &str) -> bool {
		self.subscriptions.lock().contains(event)
	}

	pub fn subscriptions(&self) -> Vec<String> {
		self.subscriptions.lock().iter().cloned().collect()
	}

	pub async fn send_event(&self, name: &str, args: Value) -> Result<(), BoxedError> {
		self.socket.send(&ToClient::Event { name: name.to_string(), args }).await
	}

	pub async fn close(&self, code: u16, reason: &str) {
		self.socket.close(code, reason).await;
	}
}

/// `onConnect`/`onDisconnect` hooks receive the same context shape as
/// actions, with [`super::context::ActionCtx::conn`] populated.
pub type ConnCtx = super::context::ActionCtx;

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use parking_lot::Mutex as StdMutex;

	#[derive(Default)]
	pub struct RecordingSocket {
		pub sent: StdMutex<Vec<ToClient>>,
	}

	#[async_trait]
	impl UniversalWebSocket for RecordingSocket {
		async fn send(&self, envelope: &ToClient) -> Result<(), BoxedError> {
			self.sent.lock().push(envelope.clone());
			Ok(())
		}

		async fn close(&self, _code: u16, _reason: &str) {}
	}
}
