//! Manager/router (spec §4.E): resolves `(name, key)` to an `ActorId`,
//! owns the in-process instance table, and collapses concurrent
//! `get_or_create` calls for the same id into a single `spawn`. Modeled
//! on the teacher's `scc::HashMap`-backed concurrent tables (e.g.
//! `pegboard`'s runner registry) plus a per-id acquisition lock so two
//! racing callers never double-spawn the same actor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use scc::HashMap as ConcurrentHashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::def::ActorDef;
use crate::driver::Driver;
use crate::error::{ActorError, BoxedError};
use crate::id::{ActorId, ActorKey};
use crate::instance::context::{now_ms, ActorShared};
use crate::instance::ActorInstance;

/// One registered actor kind plus its driver and (optionally) its SQL
/// migrations — everything [`Manager::get_or_create`] needs to spawn an
/// instance on demand.
pub struct ActorKind {
	pub def: Arc<ActorDef>,
	pub driver: Arc<dyn Driver>,
	pub sql_migrations: Vec<Box<dyn rivetkit_sqlite::Migration>>,
	pub sql_storage_path: Option<std::path::PathBuf>,
	/// Resolved once at registration time from the definition's
	/// `sleepTimeout` or the registry's configured default (spec §4.D).
	pub sleep_timeout_ms: i64,
}

pub struct Manager {
	kinds: HashMap<String, Arc<ActorKind>>,
	instances: ConcurrentHashMap<ActorId, ActorInstance>,
	/// Per-id spawn lock: held only while creating/loading an instance, so
	/// concurrent `get_or_create(same id)` calls collapse onto one spawn
	/// instead of racing to create two.
	spawn_locks: AsyncMutex<HashMap<ActorId, Arc<AsyncMutex<()>>>>,
}

impl Manager {
	pub fn new() -> Self {
		Self {
			kinds: HashMap::new(),
			instances: ConcurrentHashMap::new(),
			spawn_locks: AsyncMutex::new(HashMap::new()),
		}
	}

	pub fn register(&mut self, name: impl Into<String>, kind: ActorKind) {
		self.kinds.insert(name.into(), Arc::new(kind));
	}

	pub fn resolve(&self, name: &str, key: &ActorKey) -> ActorId {
		ActorId::derive(name, key)
	}

	pub async fn get(&self, actor_id: ActorId) -> Option<ActorInstance> {
		self.instances.read_async(&actor_id, |_, v| v.clone()).await
	}

	pub async fn get_for_id(&self, actor_id: ActorId) -> Result<ActorInstance, BoxedError> {
		self.get(actor_id).await.ok_or_else(|| ActorError::NotFound.into())
	}

	pub async fn list(&self) -> Vec<ActorId> {
		let mut ids = Vec::new();
		self.instances
			.scan_async(|id, _| ids.push(*id))
			.await;
		ids
	}

	/// Snapshots every live instance, for the inspector's `list actors` route.
	pub async fn list_instances(&self) -> Vec<ActorInstance> {
		let mut out = Vec::new();
		self.instances
			.scan_async(|_, instance| out.push(instance.clone()))
			.await;
		out
	}

	/// Returns the live instance for `(name, key)`, spawning one (running
	/// `onCreate`/`onStart`) if none exists yet. Concurrent callers racing
	/// on the same id block on each other rather than double-spawning.
	pub async fn get_or_create(
		&self,
		name: &str,
		key: ActorKey,
		input: Option<Value>,
	) -> Result<ActorInstance, BoxedError> {
		self.spawn_locked(name, key, input, false).await
	}

	/// Creates `(name, key)`, failing with [`ActorError::AlreadyExists`] if
	/// it's already live or already materialized on disk. Checks both under
	/// the same per-id spawn lock `get_or_create` uses, so two concurrent
	/// `create` calls for the same id never both succeed.
	pub async fn create(&self, name: &str, key: ActorKey, input: Option<Value>) -> Result<ActorInstance, BoxedError> {
		self.spawn_locked(name, key, input, true).await
	}

	async fn spawn_locked(
		&self,
		name: &str,
		key: ActorKey,
		input: Option<Value>,
		error_if_exists: bool,
	) -> Result<ActorInstance, BoxedError> {
		let actor_id = self.resolve(name, &key);
		if let Some(existing) = self.get(actor_id).await {
			if error_if_exists {
				return Err(ActorError::AlreadyExists.into());
			}
			return Ok(existing);
		}

		let lock = {
			let mut locks = self.spawn_locks.lock().await;
			locks.entry(actor_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
		};
		let _guard = lock.lock().await;

		if let Some(existing) = self.get(actor_id).await {
			if error_if_exists {
				self.spawn_locks.lock().await.remove(&actor_id);
				return Err(ActorError::AlreadyExists.into());
			}
			return Ok(existing);
		}

		let kind = self.kinds.get(name).cloned().ok_or(ActorError::NotFound)?;

		if error_if_exists {
			let materialized = kind.driver.get(actor_id, &ActorShared::persist_key()).await?;
			if materialized.is_some() {
				self.spawn_locks.lock().await.remove(&actor_id);
				return Err(ActorError::AlreadyExists.into());
			}
		}

		let sql = match &kind.sql_storage_path {
			Some(path) if !kind.sql_migrations.is_empty() => {
				let sql_path = rivetkit_sqlite::SqlPath::File(path.join(format!("{actor_id}.sqlite3")));
				Some(rivetkit_sqlite::SqlDb::open(sql_path, &kind.sql_migrations).map_err(|e| {
					crate::error::InternalError::DriverError { detail: e.to_string() }
				})?)
			}
			_ => None,
		};

		let instance = match ActorInstance::spawn(
			kind.def.clone(),
			actor_id,
			key,
			kind.driver.clone(),
			sql,
			input,
			kind.sleep_timeout_ms,
		)
		.await
		{
			Ok(instance) => instance,
			Err(err) => {
				self.spawn_locks.lock().await.remove(&actor_id);
				return Err(err);
			}
		};

		let _ = self.instances.insert_async(actor_id, instance.clone()).await;
		self.spawn_locks.lock().await.remove(&actor_id);

		Ok(instance)
	}

	pub async fn destroy(&self, actor_id: ActorId) -> Result<(), BoxedError> {
		let instance = self.get_for_id(actor_id).await?;
		instance.destroy().await?;
		self.instances.remove_async(&actor_id).await;
		Ok(())
	}

	/// One hibernation pass (spec §4.D): evicts every live instance that's
	/// idle past its `sleepTimeout` with no connections or queued messages.
	/// Checking eligibility before sending `Command::Sleep` keeps this sweep
	/// from waking up every instance's executor task just to ask it.
	pub async fn sweep_idle_instances(&self) {
		let now = now_ms();
		let mut candidates = Vec::new();
		self.instances
			.scan_async(|id, instance| {
				if instance.is_eligible_to_sleep(now) {
					candidates.push(*id);
				}
			})
			.await;

		for actor_id in candidates {
			let Some(instance) = self.get(actor_id).await else { continue };
			match instance.sleep().await {
				Ok(true) => {
					self.instances.remove_async(&actor_id).await;
				}
				Ok(false) => {}
				Err(err) => tracing::warn!(%actor_id, %err, "onSleep failed, leaving instance awake"),
			}
		}
	}

	/// Spawns a background task that calls [`Self::sweep_idle_instances`] on
	/// `interval` until every `Arc<Manager>` handle is dropped.
	pub fn spawn_hibernation_sweep(self: Arc<Self>, interval: Duration) {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				self.sweep_idle_instances().await;
			}
		});
	}
}

impl Default for Manager {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::def::ActorDef;
	use crate::driver::memory::MemoryDriver;

	fn counter_kind(driver: Arc<dyn Driver>) -> ActorKind {
		let def = ActorDef::builder("counter")
			.on_create(|_ctx, _input| Box::pin(async { Ok(Value::from(0)) }))
			.action("increment", |ctx, _args| {
				Box::pin(async move {
					let next = ctx.state().as_i64().unwrap_or(0) + 1;
					ctx.set_state(Value::from(next));
					Ok(Value::from(next))
				})
			})
			.build();
		ActorKind {
			def: Arc::new(def),
			driver,
			sql_migrations: Vec::new(),
			sql_storage_path: None,
			sleep_timeout_ms: 30_000,
		}
	}

	#[tokio::test]
	async fn get_or_create_spawns_once_and_reuses_the_instance() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let mut manager = Manager::new();
		manager.register("counter", counter_kind(driver));

		let key: ActorKey = vec!["c1".into()];
		let a = manager.get_or_create("counter", key.clone(), None).await.unwrap();
		let b = manager.get_or_create("counter", key.clone(), None).await.unwrap();
		assert_eq!(a.actor_id(), b.actor_id());

		let output = a.call_action("increment", vec![]).await.unwrap();
		assert_eq!(output, Value::from(1));
		let output = b.call_action("increment", vec![]).await.unwrap();
		assert_eq!(output, Value::from(2), "both handles should observe the same running instance");
	}

	#[tokio::test]
	async fn create_fails_with_already_exists_on_the_second_call() {
		use crate::error::RivetError;

		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let mut manager = Manager::new();
		manager.register("counter", counter_kind(driver));

		let key: ActorKey = vec!["c3".into()];
		manager.create("counter", key.clone(), None).await.unwrap();
		let err = manager.create("counter", key, None).await.unwrap_err();
		assert_eq!(err.0.code(), "already_exists");
	}

	#[tokio::test]
	async fn sweep_idle_instances_evicts_actors_past_their_sleep_timeout() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let mut manager = Manager::new();
		let mut kind = counter_kind(driver);
		kind.sleep_timeout_ms = 0;
		manager.register("counter", kind);

		let key: ActorKey = vec!["c4".into()];
		let instance = manager.get_or_create("counter", key, None).await.unwrap();
		let actor_id = instance.actor_id();

		manager.sweep_idle_instances().await;
		assert!(manager.get(actor_id).await.is_none(), "an idle actor past its sleep timeout should be evicted");
	}

	#[tokio::test]
	async fn destroy_removes_the_instance_from_the_table() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let mut manager = Manager::new();
		manager.register("counter", counter_kind(driver));

		let key: ActorKey = vec!["c2".into()];
		let instance = manager.get_or_create("counter", key, None).await.unwrap();
		let actor_id = instance.actor_id();

		manager.destroy(actor_id).await.unwrap();
		assert!(manager.get(actor_id).await.is_none());
	}
}
