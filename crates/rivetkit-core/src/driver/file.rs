//! Durable single-node driver: KV persists under `RIVETKIT_STORAGE_PATH`
//! via sled. Placement is still trivially local — a single `FileDriver`
//! is meant to run as the only owner of its storage directory — but
//! surviving a process restart is the point of this driver over
//! [`super::memory::MemoryDriver`].

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::alarm::AlarmScheduler;
use super::{AlarmDriver, PlacementDriver};
use crate::error::BoxedError;
use crate::id::ActorId;
use crate::kv::file::FileKvDriver;
use crate::kv::{KvDriver, KvWrite, ListQuery};

pub struct FileDriver {
	kv: FileKvDriver,
	alarms: AlarmScheduler,
}

impl FileDriver {
	pub fn open(path: impl AsRef<Path>) -> Result<Self, BoxedError> {
		Ok(Self { kv: FileKvDriver::open(path)?, alarms: AlarmScheduler::new() })
	}
}

#[async_trait]
impl KvDriver for FileDriver {
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
impl PlacementDriver for FileDriver {
	async fn claim(&self, _actor_id: ActorId) -> Result<bool, BoxedError> {
		Ok(true)
	}

	async fn release(&self, _actor_id: ActorId) -> Result<(), BoxedError> {
		Ok(())
	}
}

#[async_trait]
impl AlarmDriver for FileDriver {
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

	#[tokio::test]
	async fn kv_writes_survive_driver_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let actor = ActorId::derive("t", &vec!["a".into()]);

		{
			let driver = FileDriver::open(dir.path()).unwrap();
			driver.put(actor, b"k".to_vec(), b"v".to_vec()).await.unwrap();
		}

		let driver = FileDriver::open(dir.path()).unwrap();
		assert_eq!(driver.get(actor, b"k").await.unwrap(), Some(b"v".to_vec()));
	}
}
