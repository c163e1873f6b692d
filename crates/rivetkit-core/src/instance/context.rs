//! `ActionCtx` (spec §3 "action context"): everything a handler body can
//! reach — state/vars, the calling connection (if any), broadcast, KV,
//! SQL, scheduling, the completable queue, and lifecycle controls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rivetkit_sqlite_vfs_core::{reserved_key, user_key, ACTOR_PERSIST_PREFIX};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::driver::Driver;
use crate::error::BoxedError;
use crate::id::{ActorId, ActorKey};
use crate::instance::connection::Conn;
use crate::instance::queue::QueueHandle;
use crate::instance::schedule::ScheduledEvents;
use crate::kv::{KvWrite, ListQuery};
use crate::persist::actor::ActorPersist;

/// State shared by every [`ActionCtx`] handed out for one actor instance.
/// Owned by [`super::ActorInstance`]; contexts just hold an `Arc` to it.
pub struct ActorShared {
	pub actor_id: ActorId,
	pub name: String,
	pub key: ActorKey,
	pub driver: Arc<dyn Driver>,
	pub sql: Mutex<Option<rivetkit_sqlite::SqlDb>>,
	pub state: Mutex<Value>,
	pub vars: Mutex<Value>,
	pub created_at_ms: i64,
	pub last_activity_ms: std::sync::atomic::AtomicI64,
	pub scheduled: Mutex<ScheduledEvents>,
	pub queue: QueueHandle,
	pub conns: Mutex<HashMap<String, Arc<Conn>>>,
	pub cancellation: CancellationToken,
	pub dirty: AtomicBool,
	/// Set while the definition's `run` handler (spec §4.F) is resident in
	/// its own background task; sleep is ineligible until it yields or
	/// finishes, same as a running action.
	pub run_in_flight: AtomicBool,
	pub keep_awake_until_ms: Mutex<Option<i64>>,
	/// Milliseconds of inactivity (spec §4.D "hibernation") before this
	/// instance becomes eligible for eviction; resolved once at spawn time
	/// from the definition's `sleepTimeout` or [`crate::config::Config::default_sleep_timeout_ms`].
	pub sleep_timeout_ms: i64,
	/// Best-effort tap of every broadcast event, for the inspector's SSE
	/// tail route. Dropped silently when nothing is subscribed.
	pub events_tap: tokio::sync::broadcast::Sender<(String, Value)>,
}

impl ActorShared {
	pub(crate) fn persist_key() -> Vec<u8> {
		reserved_key(ACTOR_PERSIST_PREFIX, b"")
	}

	pub(crate) fn snapshot(&self) -> ActorPersist {
		ActorPersist {
			input: None,
			state: self.state.lock().clone(),
			scheduled_events: self.scheduled.lock().records(),
			created_at_ms: self.created_at_ms,
		}
	}
}

#[derive(Clone)]
pub struct ActionCtx {
	pub(crate) shared: Arc<ActorShared>,
	pub conn: Option<Arc<Conn>>,
}

pub(crate) fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

impl ActionCtx {
	pub(crate) fn new(shared: Arc<ActorShared>, conn: Option<Arc<Conn>>) -> Self {
		Self { shared, conn }
	}

	pub fn actor_id(&self) -> ActorId {
		self.shared.actor_id
	}

	pub fn key(&self) -> &ActorKey {
		&self.shared.key
	}

	pub fn state(&self) -> Value {
		self.shared.state.lock().clone()
	}

	pub fn set_state(&self, value: Value) {
		*self.shared.state.lock() = value;
		self.shared.dirty.store(true, Ordering::Relaxed);
	}

	pub fn mutate_state(&self, f: impl FnOnce(&mut Value)) {
		let mut guard = self.shared.state.lock();
		f(&mut guard);
		self.shared.dirty.store(true, Ordering::Relaxed);
	}

	/// Vars are in-memory scratch data; they never reach the KV substrate
	/// and are dropped on sleep (unlike `state`).
	pub fn vars(&self) -> Value {
		self.shared.vars.lock().clone()
	}

	pub fn set_vars(&self, value: Value) {
		*self.shared.vars.lock() = value;
	}

	pub fn log(&self) -> tracing::Span {
		tracing::info_span!("actor", actor_id = %self.shared.actor_id)
	}

	pub fn abort_signal(&self) -> CancellationToken {
		self.shared.cancellation.clone()
	}

	pub fn queue(&self) -> &QueueHandle {
		&self.shared.queue
	}

	pub fn keep_awake(&self, duration: Duration) {
		*self.shared.keep_awake_until_ms.lock() = Some(now_ms() + duration.as_millis() as i64);
	}

	pub fn destroy(&self) {
		self.shared.cancellation.cancel();
	}

	pub async fn kv_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BoxedError> {
		self.shared.driver.get(self.shared.actor_id, &user_key(key)).await
	}

	pub async fn kv_put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxedError> {
		self.shared.driver.put(self.shared.actor_id, user_key(&key), value).await
	}

	pub async fn kv_delete(&self, key: &[u8]) -> Result<(), BoxedError> {
		self.shared.driver.delete(self.shared.actor_id, &user_key(key)).await
	}

	pub async fn kv_list(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BoxedError> {
		let wrapped_prefix = user_key(prefix);
		let items = self
			.shared
			.driver
			.list(self.shared.actor_id, ListQuery::prefix(&wrapped_prefix))
			.await?;
		Ok(items
			.into_iter()
			.map(|(k, v)| (k[1..].to_vec(), v))
			.collect())
	}

	pub async fn kv_batch(&self, writes: Vec<KvWrite>) -> Result<(), BoxedError> {
		let wrapped = writes
			.into_iter()
			.map(|w| match w {
				KvWrite::Put(k, v) => KvWrite::Put(user_key(&k), v),
				KvWrite::Delete(k) => KvWrite::Delete(user_key(&k)),
			})
			.collect();
		self.shared.driver.batch(self.shared.actor_id, wrapped).await
	}

	pub fn db(&self) -> Option<rivetkit_sqlite::SqlDb> {
		self.shared.sql.lock().clone()
	}

	/// The actor's own KV driver, for handlers that drive a
	/// [`crate::workflow::WorkflowCtx`] (workflow actors load one per
	/// action call rather than keeping it resident on `ActorShared`).
	pub fn driver(&self) -> Arc<dyn Driver> {
		self.shared.driver.clone()
	}

	/// Broadcasts `name`/`args` to every connection subscribed to `name`.
	pub async fn broadcast(&self, name: &str, args: Value) -> Result<(), BoxedError> {
		let conns: Vec<Arc<Conn>> = self.shared.conns.lock().values().cloned().collect();
		for conn in conns {
			if conn.is_subscribed(name) {
				conn.send_event(name, args.clone()).await?;
			}
		}
		let _ = self.shared.events_tap.send((name.to_string(), args));
		Ok(())
	}

	/// Schedules `action_name(args)` to run after `delay`, persisted so it
	/// survives sleep; returns an id usable with [`Self::schedule_cancel`].
	pub async fn schedule_after(&self, delay: Duration, action_name: &str, args: Vec<Value>) -> Result<String, BoxedError> {
		let at_ms = now_ms() + delay.as_millis() as i64;
		let event_id = self.shared.scheduled.lock().add(at_ms, action_name, args);
		self.shared.driver.set_alarm(self.shared.actor_id, at_ms).await?;
		self.save_state().await?;
		Ok(event_id)
	}

	pub async fn schedule_cancel(&self, event_id: &str) -> Result<(), BoxedError> {
		self.shared.scheduled.lock().cancel(event_id);
		self.save_state().await
	}

	/// Writes the current `state` and scheduled events to the KV substrate.
	/// Called automatically around actions that mutate state, and
	/// explicitly available for handlers that want to force an early flush.
	pub async fn save_state(&self) -> Result<(), BoxedError> {
		let snapshot = self.shared.snapshot();
		let handler = crate::persist::actor::handler();
		let bytes = handler.encode(&snapshot)?;
		self.shared.driver.put(self.shared.actor_id, ActorShared::persist_key(), bytes).await?;
		self.shared.dirty.store(false, Ordering::Relaxed);
		Ok(())
	}
}
