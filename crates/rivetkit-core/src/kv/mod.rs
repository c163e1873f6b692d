//! Per-actor ordered byte-key KV (spec §4.C), behind a [`KvDriver`] trait
//! so the memory and file (sled) backends share one contract — the same
//! split the teacher uses between `pegboard-actor-kv`'s operations and
//! whatever transaction layer backs them.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::{BoxedError, InternalError};
use crate::id::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
	Forward,
	Reverse,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
	pub start: Vec<u8>,
	pub end: Vec<u8>,
	pub limit: Option<usize>,
	pub order: ListOrder,
}

impl ListQuery {
	/// All keys sharing `prefix`.
	pub fn prefix(prefix: &[u8]) -> Self {
		let mut end = prefix.to_vec();
		increment_prefix(&mut end);
		ListQuery {
			start: prefix.to_vec(),
			end,
			limit: None,
			order: ListOrder::Forward,
		}
	}

	pub fn range(start: Vec<u8>, end: Vec<u8>) -> Self {
		ListQuery { start, end, limit: None, order: ListOrder::Forward }
	}

	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn reversed(mut self) -> Self {
		self.order = ListOrder::Reverse;
		self
	}
}

/// Smallest byte string strictly greater than every string starting with
/// `prefix`, used to turn a prefix query into a half-open `[start, end)` range.
fn increment_prefix(bytes: &mut Vec<u8>) {
	while let Some(last) = bytes.last_mut() {
		if *last == 0xff {
			bytes.pop();
		} else {
			*last += 1;
			return;
		}
	}
	// All bytes were 0xff (or prefix was empty); no finite upper bound exists,
	// callers get an effectively-unbounded scan.
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
	Put(Vec<u8>, Vec<u8>),
	Delete(Vec<u8>),
}

#[async_trait]
pub trait KvDriver: Send + Sync {
	async fn get(&self, actor_id: ActorId, key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError>;
	async fn put(&self, actor_id: ActorId, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxedError>;
	async fn delete(&self, actor_id: ActorId, key: &[u8]) -> Result<(), BoxedError>;
	async fn list(&self, actor_id: ActorId, query: ListQuery) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError>;
	/// Applies every write atomically; either all succeed or none are visible.
	async fn batch(&self, actor_id: ActorId, writes: Vec<KvWrite>) -> Result<(), BoxedError>;
	async fn delete_prefix(&self, actor_id: ActorId, prefix: &[u8]) -> Result<(), BoxedError>;
	/// Drops every key for `actor_id` (used by `destroy()`).
	async fn delete_actor(&self, actor_id: ActorId) -> Result<(), BoxedError>;
}

pub(crate) fn serialization_error(detail: impl Into<String>) -> BoxedError {
	InternalError::DriverError { detail: detail.into() }.into()
}

#[cfg(test)]
mod contract_tests {
	use super::*;
	use crate::kv::memory::MemoryKvDriver;

	async fn exercise(driver: &dyn KvDriver) {
		let actor = ActorId::derive("t", &vec!["a".into()]);

		driver.put(actor, b"user/x".to_vec(), b"1".to_vec()).await.unwrap();
		driver.put(actor, b"user/y".to_vec(), b"2".to_vec()).await.unwrap();
		driver.put(actor, b"other".to_vec(), b"3".to_vec()).await.unwrap();

		assert_eq!(driver.get(actor, b"user/x").await.unwrap(), Some(b"1".to_vec()));

		let listed = driver.list(actor, ListQuery::prefix(b"user/")).await.unwrap();
		assert_eq!(listed.len(), 2);

		driver.delete(actor, b"user/x").await.unwrap();
		assert_eq!(driver.get(actor, b"user/x").await.unwrap(), None);

		driver
			.batch(
				actor,
				vec![
					KvWrite::Put(b"user/z".to_vec(), b"4".to_vec()),
					KvWrite::Delete(b"user/y".to_vec()),
				],
			)
			.await
			.unwrap();
		assert_eq!(driver.get(actor, b"user/y").await.unwrap(), None);
		assert_eq!(driver.get(actor, b"user/z").await.unwrap(), Some(b"4".to_vec()));

		driver.delete_prefix(actor, b"user/").await.unwrap();
		assert!(driver.list(actor, ListQuery::prefix(b"user/")).await.unwrap().is_empty());
		assert_eq!(driver.get(actor, b"other").await.unwrap(), Some(b"3".to_vec()));
	}

	#[tokio::test]
	async fn memory_driver_satisfies_contract() {
		exercise(&MemoryKvDriver::new()).await;
	}
}
