//! Thin client toward an external engine cluster. Deliberately minimal:
//! spec.md excludes the cluster's internals from scope, so this driver
//! only proves the [`super::Driver`] contract is implementable over HTTP
//! rather than reimplementing a placement/gossip protocol.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{AlarmDriver, PlacementDriver};
use crate::error::{BoxedError, InternalError};
use crate::id::ActorId;
use crate::kv::{KvDriver, KvWrite, ListQuery};

pub struct EngineDriver {
	client: reqwest::Client,
	endpoint: String,
	token: Option<String>,
	fired: broadcast::Sender<ActorId>,
}

impl EngineDriver {
	pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
		let (fired, _) = broadcast::channel(256);
		Self { client: reqwest::Client::new(), endpoint: endpoint.into(), token, fired }
	}

	fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
		let url = format!("{}{}", self.endpoint.trim_end_matches('/'), path);
		let req = self.client.request(method, url);
		match &self.token {
			Some(token) => req.bearer_auth(token),
			None => req,
		}
	}

	fn unimplemented(op: &str) -> BoxedError {
		InternalError::DriverError { detail: format!("engine driver does not implement {op} yet") }.into()
	}
}

#[async_trait]
impl KvDriver for EngineDriver {
	async fn get(&self, _actor_id: ActorId, _key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError> {
		Err(Self::unimplemented("kv.get"))
	}

	async fn put(&self, _actor_id: ActorId, _key: Vec<u8>, _value: Vec<u8>) -> Result<(), BoxedError> {
		Err(Self::unimplemented("kv.put"))
	}

	async fn delete(&self, _actor_id: ActorId, _key: &[u8]) -> Result<(), BoxedError> {
		Err(Self::unimplemented("kv.delete"))
	}

	async fn list(&self, _actor_id: ActorId, _query: ListQuery) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError> {
		Err(Self::unimplemented("kv.list"))
	}

	async fn batch(&self, _actor_id: ActorId, _writes: Vec<KvWrite>) -> Result<(), BoxedError> {
		Err(Self::unimplemented("kv.batch"))
	}

	async fn delete_prefix(&self, _actor_id: ActorId, _prefix: &[u8]) -> Result<(), BoxedError> {
		Err(Self::unimplemented("kv.delete_prefix"))
	}

	async fn delete_actor(&self, _actor_id: ActorId) -> Result<(), BoxedError> {
		Err(Self::unimplemented("kv.delete_actor"))
	}
}

#[async_trait]
impl PlacementDriver for EngineDriver {
	/// Asks the cluster's placement service whether this runner owns
	/// `actor_id`. A non-2xx response is treated as "not claimed" rather
	/// than an error so callers can retry against another runner.
	async fn claim(&self, actor_id: ActorId) -> Result<bool, BoxedError> {
		let response = self
			.request(reqwest::Method::POST, &format!("/actors/{actor_id}/claim"))
			.send()
			.await
			.map_err(|e| InternalError::DriverError { detail: e.to_string() })?;
		Ok(response.status().is_success())
	}

	async fn release(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		self.request(reqwest::Method::POST, &format!("/actors/{actor_id}/release"))
			.send()
			.await
			.map_err(|e| InternalError::DriverError { detail: e.to_string() })?;
		Ok(())
	}
}

#[async_trait]
impl AlarmDriver for EngineDriver {
	async fn set_alarm(&self, _actor_id: ActorId, _at_ms: i64) -> Result<(), BoxedError> {
		Err(Self::unimplemented("alarm.set_alarm"))
	}

	async fn clear_alarm(&self, _actor_id: ActorId) -> Result<(), BoxedError> {
		Err(Self::unimplemented("alarm.clear_alarm"))
	}

	fn subscribe(&self) -> broadcast::Receiver<ActorId> {
		self.fired.subscribe()
	}
}
