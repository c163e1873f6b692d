//! Single-process driver: nothing is durable across a restart. Used by
//! tests and by `rivetkit-standalone` when no storage path is configured.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::alarm::AlarmScheduler;
use super::{AlarmDriver, PlacementDriver};
use crate::error::BoxedError;
use crate::id::ActorId;
use crate::kv::memory::MemoryKvDriver;
use crate::kv::{KvDriver, KvWrite, ListQuery};

pub struct MemoryDriver {
	kv: MemoryKvDriver,
	alarms: AlarmScheduler,
}

impl MemoryDriver {
	pub fn new() -> Self {
		Self { kv: MemoryKvDriver::new(), alarms: AlarmScheduler::new() }
	}
}

impl Default for MemoryDriver {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl KvDriver for MemoryDriver {
	async fn get(&self, actor_id: ActorId, key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError> {
		self.kv.get(actor_id, key).await
	}

	async fn put(&self, actor_id: ActorId, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxedError> {
		self.kv.put(actor_id, key, value).await
	}

	async fn delete(&self, actor_id: ActorId, key: &[u8]) -> Result<(), BoxedError> {
		self.kv.delete(actor_id, key).await
	}

	async fn list(&self, actor_id: ActorId, query: ListQuery) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError> {
		self.kv.list(actor_id, query).await
	}

	async fn batch(&self, actor_id: ActorId, writes: Vec<KvWrite>) -> Result<(), BoxedError> {
		self.kv.batch(actor_id, writes).await
	}

	async fn delete_prefix(&self, actor_id: ActorId, prefix: &[u8]) -> Result<(), BoxedError> {
		self.kv.delete_prefix(actor_id, prefix).await
	}

	async fn delete_actor(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		self.kv.delete_actor(actor_id).await
	}
}

#[async_trait]
impl PlacementDriver for MemoryDriver {
	async fn claim(&self, _actor_id: ActorId) -> Result<bool, BoxedError> {
		Ok(true)
	}

	async fn release(&self, _actor_id: ActorId) -> Result<(), BoxedError> {
		Ok(())
	}
}

#[async_trait]
impl AlarmDriver for MemoryDriver {
	async fn set_alarm(&self, actor_id: ActorId, at_ms: i64) -> Result<(), BoxedError> {
		self.alarms.set(actor_id, at_ms);
		Ok(())
	}

	async fn clear_alarm(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		self.alarms.clear(actor_id);
		Ok(())
	}

	fn subscribe(&self) -> broadcast::Receiver<ActorId> {
		self.alarms.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn claim_is_always_granted_in_process() {
		let driver = MemoryDriver::new();
		let actor = ActorId::derive("t", &vec!["a".into()]);
		assert!(driver.claim(actor).await.unwrap());
	}

	#[tokio::test]
	async fn set_alarm_wakes_subscriber() {
		let driver = MemoryDriver::new();
		let mut rx = driver.subscribe();
		let actor = ActorId::derive("t", &vec!["b".into()]);
		let at = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap()
			.as_millis() as i64
			+ 30;
		driver.set_alarm(actor, at).await.unwrap();

		let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
		assert_eq!(fired, actor);
	}
}
