//! Local-file KV driver backed by `sled`. One `sled::Tree` per actor,
//! namespaced by `ActorId` hex so many actors can share a single
//! `sled::Db` under `RIVETKIT_STORAGE_PATH`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{serialization_error, KvDriver, KvWrite, ListOrder, ListQuery};
use crate::error::BoxedError;
use crate::id::ActorId;

pub struct FileKvDriver {
	db: Arc<sled::Db>,
}

impl FileKvDriver {
	pub fn open(path: impl AsRef<Path>) -> Result<Self, BoxedError> {
		let db = sled::open(path).map_err(|e| serialization_error(e.to_string()))?;
		Ok(Self { db: Arc::new(db) })
	}

	fn tree(&self, actor_id: ActorId) -> Result<sled::Tree, BoxedError> {
		self.db
			.open_tree(actor_id.to_hex())
			.map_err(|e| serialization_error(e.to_string()))
	}
}

#[async_trait]
impl KvDriver for FileKvDriver {
	async fn get(&self, actor_id: ActorId, key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError> {
		let tree = self.tree(actor_id)?;
		Ok(tree
			.get(key)
			.map_err(|e| serialization_error(e.to_string()))?
			.map(|v| v.to_vec()))
	}

	async fn put(&self, actor_id: ActorId, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxedError> {
		let tree = self.tree(actor_id)?;
		tree.insert(key, value).map_err(|e| serialization_error(e.to_string()))?;
		Ok(())
	}

	async fn delete(&self, actor_id: ActorId, key: &[u8]) -> Result<(), BoxedError> {
		let tree = self.tree(actor_id)?;
		tree.remove(key).map_err(|e| serialization_error(e.to_string()))?;
		Ok(())
	}

	async fn list(&self, actor_id: ActorId, query: ListQuery) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError> {
		let tree = self.tree(actor_id)?;
		let mut items: Vec<(Vec<u8>, Vec<u8>)> = tree
			.range(query.start.clone()..query.end.clone())
			.filter_map(|r| r.ok())
			.map(|(k, v)| (k.to_vec(), v.to_vec()))
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
		let tree = self.tree(actor_id)?;
		let mut batch = sled::Batch::default();
		for write in writes {
			match write {
				KvWrite::Put(k, v) => batch.insert(k, v),
				KvWrite::Delete(k) => batch.remove(k),
			}
		}
		tree.apply_batch(batch).map_err(|e| serialization_error(e.to_string()))?;
		Ok(())
	}

	async fn delete_prefix(&self, actor_id: ActorId, prefix: &[u8]) -> Result<(), BoxedError> {
		let tree = self.tree(actor_id)?;
		let keys: Vec<_> = tree
			.scan_prefix(prefix)
			.filter_map(|r| r.ok())
			.map(|(k, _)| k.to_vec())
			.collect();
		for key in keys {
			tree.remove(key).map_err(|e| serialization_error(e.to_string()))?;
		}
		Ok(())
	}

	async fn delete_actor(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		self.db
			.drop_tree(actor_id.to_hex())
			.map_err(|e| serialization_error(e.to_string()))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn put_and_get_survive_tree_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let actor = ActorId::derive("t", &vec!["a".into()]);

		{
			let driver = FileKvDriver::open(dir.path()).unwrap();
			driver.put(actor, b"k".to_vec(), b"v".to_vec()).await.unwrap();
		}

		let driver = FileKvDriver::open(dir.path()).unwrap();
		assert_eq!(driver.get(actor, b"k").await.unwrap(), Some(b"v".to_vec()));
	}
}
