//! In-memory KV driver: single process, used by the memory placement
//! driver and by tests. Ordering comes for free from `BTreeMap`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{KvDriver, KvWrite, ListOrder, ListQuery};
use crate::error::BoxedError;
use crate::id::ActorId;

#[derive(Default)]
pub struct MemoryKvDriver {
	actors: Mutex<std::collections::HashMap<ActorId, Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>>>,
}

impl MemoryKvDriver {
	pub fn new() -> Self {
		Self::default()
	}

	fn tree(&self, actor_id: ActorId) -> Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>> {
		self.actors
			.lock()
			.entry(actor_id)
			.or_insert_with(|| Arc::new(Mutex::new(BTreeMap::new())))
			.clone()
	}
}

#[async_trait]
impl KvDriver for MemoryKvDriver {
	async fn get(&self, actor_id: ActorId, key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError> {
		Ok(self.tree(actor_id).lock().get(key).cloned())
	}

	async fn put(&self, actor_id: ActorId, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxedError> {
		self.tree(actor_id).lock().insert(key, value);
		Ok(())
	}

	async fn delete(&self, actor_id: ActorId, key: &[u8]) -> Result<(), BoxedError> {
		self.tree(actor_id).lock().remove(key);
		Ok(())
	}

	async fn list(&self, actor_id: ActorId, query: ListQuery) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError> {
		let tree = self.tree(actor_id);
		let guard = tree.lock();
		let mut items: Vec<_> = guard
			.range(query.start.clone()..query.end.clone())
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		if query.order == ListOrder::Reverse {
			items.reverse();
		}
		if let Some(limit) = query.limit {
			items.truncate(limit);
		}
		Ok(items)
	}

	async fn batch(&self, actor_id: ActorId, writes: Vec<KvWrite>) -> Result<(), BoxedError> {
		let tree = self.tree(actor_id);
		let mut guard = tree.lock();
		for write in writes {
			match write {
				KvWrite::Put(k, v) => {
					guard.insert(k, v);
				}
				KvWrite::Delete(k) => {
					guard.remove(&k);
				}
			}
		}
		Ok(())
	}

	async fn delete_prefix(&self, actor_id: ActorId, prefix: &[u8]) -> Result<(), BoxedError> {
		let tree = self.tree(actor_id);
		let mut guard = tree.lock();
		let keys: Vec<_> = guard
			.range(prefix.to_vec()..)
			.take_while(|(k, _)| k.starts_with(prefix))
			.map(|(k, _)| k.clone())
			.collect();
		for key in keys {
			guard.remove(&key);
		}
		Ok(())
	}

	async fn delete_actor(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		self.actors.lock().remove(&actor_id);
		Ok(())
	}
}
