//! Actor instance runtime (spec §4.D): one mailbox + single consumer task
//! per live actor, matching the teacher's `gasoline` per-workflow
//! single-task model — every action, connect, disconnect, and wake for a
//! given actor serializes through this one task, so handler bodies never
//! need their own locking around `state`.

pub mod connection;
pub mod context;
pub mod hibernate;
pub mod queue;
pub mod raw;
pub mod schedule;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use rivetkit_sqlite_vfs_core::{reserved_key, CONN_PREFIX};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::def::ActorDef;
use crate::driver::Driver;
use crate::error::{ActorError, BoxedError, UserError};
use crate::id::{ActorId, ActorKey};
use crate::instance::connection::{Conn, UniversalWebSocket};
use crate::instance::context::{now_ms, ActionCtx, ActorShared};
use crate::instance::queue::QueueHandle;
use crate::instance::schedule::ScheduledEvents;
use crate::persist::conn::ConnPersist;

enum Command {
	Action {
		name: String,
		args: Vec<Value>,
		conn: Option<Arc<Conn>>,
		reply: oneshot::Sender<Result<Value, BoxedError>>,
	},
	Connect {
		params: Value,
		socket: Arc<dyn UniversalWebSocket>,
		reconnect_id: Option<String>,
		reply: oneshot::Sender<Result<Arc<Conn>, BoxedError>>,
	},
	Disconnect {
		connection_id: String,
	},
	Wake,
	Sleep {
		reply: oneshot::Sender<Result<bool, BoxedError>>,
	},
	Destroy {
		reply: oneshot::Sender<Result<(), BoxedError>>,
	},
	RawRequest {
		request: crate::instance::raw::RawRequest,
		reply: oneshot::Sender<Result<crate::instance::raw::RawResponse, BoxedError>>,
	},
	RawWebSocket {
		socket: Arc<dyn crate::instance::raw::RawWebSocket>,
		reply: oneshot::Sender<Result<(), BoxedError>>,
	},
}

/// A live, running actor. Cloning shares the same mailbox/state.
#[derive(Clone)]
pub struct ActorInstance {
	shared: Arc<ActorShared>,
	mailbox: mpsc::Sender<Command>,
}

impl ActorInstance {
	pub fn actor_id(&self) -> ActorId {
		self.shared.actor_id
	}

	pub fn abort_signal(&self) -> CancellationToken {
		self.shared.cancellation.clone()
	}

	/// Loads persisted state (or runs `onCreate` for a brand-new actor),
	/// runs `onStart`/`onWake`, and spawns the single-task executor.
	pub async fn spawn(
		def: Arc<ActorDef>,
		actor_id: ActorId,
		key: ActorKey,
		driver: Arc<dyn Driver>,
		sql: Option<rivetkit_sqlite::SqlDb>,
		input: Option<Value>,
		sleep_timeout_ms: i64,
	) -> Result<Self, BoxedError> {
		let persist_key = ActorShared::persist_key();
		let existing = driver.get(actor_id, &persist_key).await?;
		let waking = existing.is_some();

		let (state, scheduled_events, created_at_ms) = match existing {
			Some(bytes) => {
				let record = crate::persist::actor::handler().decode(&bytes)?;
				(record.state, record.scheduled_events, record.created_at_ms)
			}
			None => (Value::Null, Vec::new(), now_ms()),
		};

		let (events_tap, _) = broadcast::channel(128);
		let shared = Arc::new(ActorShared {
			actor_id,
			name: def.name.clone(),
			key,
			driver: driver.clone(),
			sql: Mutex::new(sql),
			state: Mutex::new(state),
			vars: Mutex::new(Value::Null),
			created_at_ms,
			last_activity_ms: std::sync::atomic::AtomicI64::new(now_ms()),
			scheduled: Mutex::new(ScheduledEvents::from_records(scheduled_events)),
			queue: QueueHandle::new(),
			conns: Mutex::new(HashMap::new()),
			cancellation: CancellationToken::new(),
			dirty: std::sync::atomic::AtomicBool::new(false),
			run_in_flight: std::sync::atomic::AtomicBool::new(false),
			keep_awake_until_ms: Mutex::new(None),
			sleep_timeout_ms,
			events_tap,
		});

		let ctx = ActionCtx::new(shared.clone(), None);

		if let Some(create_vars) = &def.on_create_vars {
			let vars = create_vars(ctx.clone()).await?;
			ctx.set_vars(vars);
		}

		if !waking {
			if let Some(on_create) = &def.on_create {
				let initial = on_create(ctx.clone(), input).await?;
				ctx.set_state(initial);
			}
		}
		if let Some(on_start) = &def.on_start {
			on_start(ctx.clone()).await?;
		}
		if waking {
			// Open Question (a): onWake must finish before any timer that
			// was already due when the actor went to sleep is allowed to run.
			if let Some(on_wake) = &def.on_wake {
				on_wake(ctx.clone()).await?;
			}
		}
		ctx.save_state().await?;

		let (tx, rx) = mpsc::channel(64);
		let instance = Self { shared: shared.clone(), mailbox: tx.clone() };

		spawn_alarm_bridge(actor_id, driver.clone(), tx.clone());
		spawn_run_handler(def.clone(), shared.clone());
		spawn_executor(def, shared, rx);

		if waking {
			// Let the executor run any timers that fired while sleeping.
			let _ = tx.send(Command::Wake).await;
		}

		Ok(instance)
	}

	pub async fn call_action(&self, name: &str, args: Vec<Value>) -> Result<Value, BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::Action { name: name.to_string(), args, conn: None, reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	pub async fn call_action_on_conn(
		&self,
		conn: Arc<Conn>,
		name: &str,
		args: Vec<Value>,
	) -> Result<Value, BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::Action { name: name.to_string(), args, conn: Some(conn), reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	/// Connects a socket, optionally resuming a prior hibernatable connection
	/// identified by `reconnect_id` (spec §4.D) instead of running
	/// `onBeforeConnect`/`onConnect` fresh.
	pub async fn connect(
		&self,
		params: Value,
		socket: Arc<dyn UniversalWebSocket>,
		reconnect_id: Option<String>,
	) -> Result<Arc<Conn>, BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::Connect { params, socket, reconnect_id, reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	pub async fn disconnect(&self, connection_id: String) {
		let _ = self.mailbox.send(Command::Disconnect { connection_id }).await;
	}

	/// Synchronous eligibility check (spec §4.D), safe to call from a
	/// periodic sweep without going through the mailbox. [`Self::sleep`]
	/// rechecks this itself before actually evicting, so a stale `true` here
	/// just means the sweep wastes one round-trip, never a wrongful sleep.
	pub fn is_eligible_to_sleep(&self, now_ms: i64) -> bool {
		eligible_to_sleep(&self.shared, now_ms)
	}

	/// Evicts the instance if it's still eligible, running `onSleep` and
	/// flushing `state` first. Returns `Ok(true)` if it went to sleep --
	/// the caller (the [`crate::manager::Manager`] sweep) must then drop its
	/// table entry, since the executor task exits.
	pub async fn sleep(&self) -> Result<bool, BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox.send(Command::Sleep { reply }).await.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	/// Dispatches a non-RPC HTTP request to `onRequest` (spec §4.D "raw
	/// HTTP"). Fails with [`ActorError::NotFound`] if the definition has no
	/// `onRequest` hook registered.
	pub async fn raw_request(
		&self,
		request: crate::instance::raw::RawRequest,
	) -> Result<crate::instance::raw::RawResponse, BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::RawRequest { request, reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	/// Dispatches a non-RPC WebSocket to `onWebSocket` (spec §4.D "raw
	/// WebSocket") and waits for the hook to return (the hook owns the
	/// socket's whole lifetime -- it drives `send`/`close` itself via
	/// [`UniversalWebSocket`]).
	pub async fn raw_web_socket(&self, socket: Arc<dyn crate::instance::raw::RawWebSocket>) -> Result<(), BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::RawWebSocket { socket, reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	pub async fn destroy(&self) -> Result<(), BoxedError> {
		let (reply, rx) = oneshot::channel();
		self.mailbox
			.send(Command::Destroy { reply })
			.await
			.map_err(|_| ActorError::Destroyed)?;
		rx.await.map_err(|_| ActorError::Destroyed)?
	}

	pub fn queue(&self) -> &QueueHandle {
		&self.shared.queue
	}

	pub fn name(&self) -> &str {
		&self.shared.name
	}

	pub fn key(&self) -> &ActorKey {
		&self.shared.key
	}

	pub fn created_at_ms(&self) -> i64 {
		self.shared.created_at_ms
	}

	pub fn last_activity_ms(&self) -> i64 {
		self.shared.last_activity_ms.load(Ordering::Relaxed)
	}

	pub fn connection_count(&self) -> usize {
		self.shared.conns.lock().len()
	}

	pub fn state_snapshot(&self) -> Value {
		self.shared.state.lock().clone()
	}

	pub fn vars_present(&self) -> bool {
		!self.shared.vars.lock().is_null()
	}

	/// Subscribes to every broadcast event this actor emits, for the
	/// inspector's SSE tail route. Late subscribers miss earlier events.
	pub fn subscribe_events(&self) -> broadcast::Receiver<(String, Value)> {
		self.shared.events_tap.subscribe()
	}
}

fn spawn_alarm_bridge(actor_id: ActorId, driver: Arc<dyn Driver>, mailbox: mpsc::Sender<Command>) {
	let mut fired: broadcast::Receiver<ActorId> = driver.subscribe();
	tokio::spawn(async move {
		loop {
			match fired.recv().await {
				Ok(id) if id == actor_id => {
					if mailbox.send(Command::Wake).await.is_err() {
						return;
					}
				}
				Ok(_) => continue,
				Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => return,
			}
		}
	});
}

fn spawn_executor(def: Arc<ActorDef>, shared: Arc<ActorShared>, mut rx: mpsc::Receiver<Command>) {
	tokio::spawn(async move {
		while let Some(command) = rx.recv().await {
			shared.last_activity_ms.store(now_ms(), Ordering::Relaxed);
			match command {
				Command::Action { name, args, conn, reply } => {
					let ctx = ActionCtx::new(shared.clone(), conn);
					let result = run_action(&def, ctx.clone(), &name, args).await;
					if shared.dirty.swap(false, Ordering::Relaxed) {
						let _ = ctx.save_state().await;
					}
					let _ = reply.send(result);
				}
				Command::Connect { params, socket, reconnect_id, reply } => {
					let result = handle_connect(&def, &shared, params, socket, reconnect_id).await;
					let _ = reply.send(result);
				}
				Command::Disconnect { connection_id } => {
					handle_disconnect(&def, &shared, connection_id).await;
				}
				Command::Wake => {
					handle_wake(&def, &shared).await;
					spawn_run_handler(def.clone(), shared.clone());
				}
				Command::Sleep { reply } => {
					if eligible_to_sleep(&shared, now_ms()) {
						let result = handle_sleep(&def, &shared).await;
						let went_to_sleep = result.is_ok();
						let _ = reply.send(result.map(|_| true));
						if went_to_sleep {
							return;
						}
					} else {
						let _ = reply.send(Ok(false));
					}
				}
				Command::Destroy { reply } => {
					let result = handle_destroy(&def, &shared).await;
					let done = result.is_ok();
					let _ = reply.send(result);
					if done {
						return;
					}
				}
				Command::RawRequest { request, reply } => {
					let result = handle_raw_request(&def, &shared, request).await;
					let _ = reply.send(result);
				}
				Command::RawWebSocket { socket, reply } => {
					let result = handle_raw_web_socket(&def, &shared, socket).await;
					let _ = reply.send(result);
				}
			}
		}
	});
}

async fn run_action(def: &ActorDef, ctx: ActionCtx, name: &str, args: Vec<Value>) -> Result<Value, BoxedError> {
	match def.actions.get(name) {
		Some(action) => action(ctx, args).await,
		None => Err(UserError::ValidationFailed { message: format!("unknown action: {name}") }.into()),
	}
}

async fn handle_connect(
	def: &ActorDef,
	shared: &Arc<ActorShared>,
	params: Value,
	socket: Arc<dyn UniversalWebSocket>,
	reconnect_id: Option<String>,
) -> Result<Arc<Conn>, BoxedError> {
	if let Some(request_id) = &reconnect_id {
		if let Some(conn) = resume_conn(shared, request_id, socket.clone()).await? {
			return Ok(conn);
		}
	}

	let ctx = ActionCtx::new(shared.clone(), None);
	let accepted_params = match &def.on_before_connect {
		Some(hook) => hook(ctx.clone(), params).await?,
		None => Value::Null,
	};

	let connection_id = Uuid::new_v4().to_string();
	let conn = Arc::new(Conn::new(connection_id.clone(), accepted_params, socket));
	shared.conns.lock().insert(connection_id.clone(), conn.clone());

	persist_conn(shared, &conn).await?;

	if let Some(hook) = &def.on_connect {
		let conn_ctx = ActionCtx::new(shared.clone(), Some(conn.clone()));
		hook(conn_ctx).await?;
	}

	Ok(conn)
}

/// Rebuilds a connection from its persisted record (spec §4.D
/// "hibernatable WebSockets") rather than running `onBeforeConnect`/
/// `onConnect` again, so a client that reconnects with the same request id
/// picks its subscriptions and conn-local state back up where it left off.
async fn resume_conn(
	shared: &Arc<ActorShared>,
	request_id: &str,
	socket: Arc<dyn UniversalWebSocket>,
) -> Result<Option<Arc<Conn>>, BoxedError> {
	let Some(bytes) = shared.driver.get(shared.actor_id, &conn_key(request_id)).await? else {
		return Ok(None);
	};
	let record = crate::persist::conn::handler().decode(&bytes)?;
	if record.hibernatable_request_id.as_deref() != Some(request_id) {
		return Ok(None);
	}
	let conn = Arc::new(Conn::from_persisted(record, socket));
	shared.conns.lock().insert(conn.connection_id.clone(), conn.clone());
	Ok(Some(conn))
}

/// Runs `onRequest` (spec §4.D "raw HTTP"). Bypasses action/queue dispatch
/// entirely -- callers route here only when the caller has decided the
/// inbound request isn't an RPC envelope.
async fn handle_raw_request(
	def: &ActorDef,
	shared: &Arc<ActorShared>,
	request: crate::instance::raw::RawRequest,
) -> Result<crate::instance::raw::RawResponse, BoxedError> {
	let Some(hook) = &def.on_request else {
		return Err(ActorError::NotFound.into());
	};
	let ctx = ActionCtx::new(shared.clone(), None);
	let result = hook(ctx.clone(), request).await;
	if shared.dirty.swap(false, Ordering::Relaxed) {
		let _ = ctx.save_state().await;
	}
	result
}

/// Runs `onWebSocket` (spec §4.D "raw WebSocket") for the hook's whole
/// lifetime -- the hook drives `send`/`close` on `socket` itself and this
/// just waits for it to return.
async fn handle_raw_web_socket(
	def: &ActorDef,
	shared: &Arc<ActorShared>,
	socket: Arc<dyn crate::instance::raw::RawWebSocket>,
) -> Result<(), BoxedError> {
	let Some(hook) = &def.on_web_socket else {
		return Err(ActorError::NotFound.into());
	};
	let ctx = ActionCtx::new(shared.clone(), None);
	let result = hook(ctx.clone(), socket).await;
	if shared.dirty.swap(false, Ordering::Relaxed) {
		let _ = ctx.save_state().await;
	}
	result
}

async fn handle_disconnect(def: &ActorDef, shared: &Arc<ActorShared>, connection_id: String) {
	// The persisted conn record outlives the live socket on purpose (spec
	// §4.D "hibernatable WebSockets"): it's how `resume_conn` restores
	// subscriptions/state on reconnect. It's only ever deleted as part of
	// `handle_destroy`'s whole-actor cleanup.
	let conn = shared.conns.lock().remove(&connection_id);
	if let Some(conn) = conn {
		if let Some(hook) = &def.on_disconnect {
			let conn_ctx = ActionCtx::new(shared.clone(), Some(conn));
			let _ = hook(conn_ctx).await;
		}
	}
}

async fn handle_wake(def: &ActorDef, shared: &Arc<ActorShared>) {
	let due = shared.scheduled.lock().take_due(now_ms());
	if due.is_empty() {
		return;
	}
	for event in due {
		let ctx = ActionCtx::new(shared.clone(), None);
		let _ = run_action(def, ctx, &event.action_name, event.args).await;
	}
	let ctx = ActionCtx::new(shared.clone(), None);
	let _ = ctx.save_state().await;
	if let Some(next_at) = shared.scheduled.lock().next_due_at() {
		let _ = shared.driver.set_alarm(shared.actor_id, next_at).await;
	}
}

async fn handle_destroy(def: &ActorDef, shared: &Arc<ActorShared>) -> Result<(), BoxedError> {
	if let Some(hook) = &def.on_before_destroy {
		let ctx = ActionCtx::new(shared.clone(), None);
		hook(ctx).await?;
	}
	shared.driver.delete_actor(shared.actor_id).await?;
	shared.cancellation.cancel();
	Ok(())
}

/// The eligibility check shared by [`ActorInstance::is_eligible_to_sleep`]
/// and the executor's own recheck right before it actually evicts.
fn eligible_to_sleep(shared: &ActorShared, now_ms: i64) -> bool {
	let has_conns = !shared.conns.lock().is_empty();
	let has_queued = !shared.queue.is_empty();
	let run_in_flight = shared.run_in_flight.load(Ordering::Relaxed);
	let idle_for_ms = now_ms - shared.last_activity_ms.load(Ordering::Relaxed);
	let keep_awake_until_ms = *shared.keep_awake_until_ms.lock();
	crate::instance::hibernate::is_eligible_to_sleep(
		has_conns,
		has_queued,
		run_in_flight,
		idle_for_ms,
		shared.sleep_timeout_ms,
		keep_awake_until_ms,
		now_ms,
	)
}

/// Spawns the definition's `run` handler (spec §4.F), if any, as a
/// background task. Resumed from persisted history via `WorkflowCtx::load`
/// rather than starting over, on both the fresh-create and wake path --
/// `ActorInstance::spawn` calls this once per cold start, the same point
/// `onCreate`/`onWake` already run. `run_in_flight` keeps it mutually
/// exclusive with sleep: [`eligible_to_sleep`] refuses while this task is
/// still resident, and it clears the flag whether the run suspended
/// (ordinary yield -- the next wake resumes it) or failed outright.
fn spawn_run_handler(def: Arc<ActorDef>, shared: Arc<ActorShared>) {
	if def.run.is_none() || shared.run_in_flight.swap(true, Ordering::Relaxed) {
		return;
	}
	tokio::spawn(async move {
		let workflow_ctx = match crate::workflow::WorkflowCtx::load(shared.actor_id, shared.driver.clone()).await {
			Ok(workflow_ctx) => Arc::new(workflow_ctx),
			Err(err) => {
				tracing::warn!(actor_id = %shared.actor_id, %err, "failed to load workflow history for run handler");
				shared.run_in_flight.store(false, Ordering::Relaxed);
				return;
			}
		};
		if let Some(run_fn) = &def.run {
			let ctx = ActionCtx::new(shared.clone(), None);
			if let Err(crate::workflow::WorkflowControl::Failed(err)) = run_fn(ctx, workflow_ctx).await {
				tracing::warn!(actor_id = %shared.actor_id, %err, "run handler failed");
			}
		}
		shared.run_in_flight.store(false, Ordering::Relaxed);
	});
}

/// Runs `onSleep` and flushes `state` one last time; the instance is left
/// persisted (unlike [`handle_destroy`], nothing is deleted) so the next
/// `onWake` finds it as it was.
async fn handle_sleep(def: &ActorDef, shared: &Arc<ActorShared>) -> Result<(), BoxedError> {
	if let Some(hook) = &def.on_sleep {
		let ctx = ActionCtx::new(shared.clone(), None);
		hook(ctx).await?;
	}
	let ctx = ActionCtx::new(shared.clone(), None);
	ctx.save_state().await
}

async fn persist_conn(shared: &Arc<ActorShared>, conn: &Conn) -> Result<(), BoxedError> {
	let record = ConnPersist {
		connection_id: conn.connection_id.clone(),
		params: conn.params.clone(),
		state: conn.state(),
		subscriptions: conn.subscriptions(),
		hibernatable_request_id: conn.hibernatable_request_id.clone(),
	};
	let bytes = crate::persist::conn::handler().encode(&record)?;
	shared
		.driver
		.put(shared.actor_id, conn_key(&conn.connection_id), bytes)
		.await
}

fn conn_key(connection_id: &str) -> Vec<u8> {
	reserved_key(CONN_PREFIX, connection_id.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::memory::MemoryDriver;
	use crate::instance::connection::test_support::RecordingSocket;
	use serde_json::json;

	fn counter_def() -> Arc<ActorDef> {
		Arc::new(
			ActorDef::builder("counter")
				.on_create(|_ctx, _input| Box::pin(async { Ok(json!({"sleeps": 0})) }))
				.on_sleep(|ctx| {
					Box::pin(async move {
						ctx.mutate_state(|state| state["sleeps"] = Value::from(state["sleeps"].as_i64().unwrap_or(0) + 1));
						Ok(())
					})
				})
				.action("sleeps", |ctx, _args| Box::pin(async move { Ok(ctx.state()["sleeps"].clone()) }))
				.build(),
		)
	}

	#[tokio::test]
	async fn sleep_runs_on_sleep_and_persists_state_without_deleting_it() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("counter", &vec!["c1".to_string()]);
		let instance =
			ActorInstance::spawn(counter_def(), actor_id, vec!["c1".to_string()], driver.clone(), None, None, 0)
				.await
				.unwrap();

		assert!(instance.is_eligible_to_sleep(now_ms()), "idle with a zero sleepTimeout should be eligible immediately");
		assert!(instance.sleep().await.unwrap(), "sleep should succeed");

		// Reload: the same persisted record must still be there, with
		// onSleep's mutation reflected in it.
		let reloaded =
			ActorInstance::spawn(counter_def(), actor_id, vec!["c1".to_string()], driver, None, None, 30_000)
				.await
				.unwrap();
		assert_eq!(reloaded.call_action("sleeps", vec![]).await.unwrap(), Value::from(1));
	}

	#[tokio::test]
	async fn sleep_is_rejected_while_a_connection_is_live() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("counter", &vec!["c2".to_string()]);
		let instance =
			ActorInstance::spawn(counter_def(), actor_id, vec!["c2".to_string()], driver, None, None, 0)
				.await
				.unwrap();

		let socket = Arc::new(RecordingSocket::default());
		instance.connect(Value::Null, socket, None).await.unwrap();

		assert!(!instance.is_eligible_to_sleep(now_ms()));
		assert!(!instance.sleep().await.unwrap(), "a live connection must block sleep");
	}

	#[tokio::test]
	async fn reconnecting_with_the_same_id_resumes_subscriptions_without_rerunning_hooks() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("counter", &vec!["c3".to_string()]);
		let instance =
			ActorInstance::spawn(counter_def(), actor_id, vec!["c3".to_string()], driver, None, None, 30_000)
				.await
				.unwrap();

		let socket = Arc::new(RecordingSocket::default());
		let conn = instance.connect(Value::Null, socket.clone(), None).await.unwrap();
		conn.subscribe("tick");
		instance.disconnect(conn.connection_id.clone()).await;

		let resumed = instance
			.connect(Value::Null, socket, Some(conn.connection_id.clone()))
			.await
			.unwrap();
		assert_eq!(resumed.connection_id, conn.connection_id);
		assert!(resumed.is_subscribed("tick"), "resuming should restore the prior subscription set");
	}

	#[tokio::test]
	async fn create_vars_runs_on_every_cold_start() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("vars", &vec!["v1".to_string()]);
		let def = Arc::new(
			ActorDef::builder("vars")
				.create_vars(|_ctx| Box::pin(async { Ok(json!({"booted": true})) }))
				.action("vars", |ctx, _args| Box::pin(async move { Ok(ctx.vars()) }))
				.build(),
		);

		let instance =
			ActorInstance::spawn(def.clone(), actor_id, vec!["v1".to_string()], driver.clone(), None, None, 30_000)
				.await
				.unwrap();
		assert_eq!(instance.call_action("vars", vec![]).await.unwrap(), json!({"booted": true}));

		// A fresh spawn (standing in for a wake after a restart) rebuilds vars.
		let woken = ActorInstance::spawn(def, actor_id, vec!["v1".to_string()], driver, None, None, 30_000)
			.await
			.unwrap();
		assert_eq!(woken.call_action("vars", vec![]).await.unwrap(), json!({"booted": true}));
	}

	#[tokio::test]
	async fn raw_request_dispatches_to_on_request_hook() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("raw", &vec!["r1".to_string()]);
		let def = Arc::new(
			ActorDef::builder("raw")
				.on_request(|_ctx, request| {
					Box::pin(async move {
						Ok(crate::instance::raw::RawResponse::text(200, format!("{} {}", request.method, request.path)))
					})
				})
				.build(),
		);
		let instance = ActorInstance::spawn(def, actor_id, vec!["r1".to_string()], driver, None, None, 30_000)
			.await
			.unwrap();

		let response = instance
			.raw_request(crate::instance::raw::RawRequest {
				method: "GET".to_string(),
				path: "/hello".to_string(),
				headers: Vec::new(),
				body: Vec::new(),
			})
			.await
			.unwrap();
		assert_eq!(response.status, 200);
		assert_eq!(response.body, b"GET /hello");
	}

	#[tokio::test]
	async fn raw_request_without_a_handler_is_not_found() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("counter", &vec!["r2".to_string()]);
		let instance =
			ActorInstance::spawn(counter_def(), actor_id, vec!["r2".to_string()], driver, None, None, 30_000)
				.await
				.unwrap();

		use crate::error::RivetError;
		let err = instance
			.raw_request(crate::instance::raw::RawRequest {
				method: "GET".to_string(),
				path: "/".to_string(),
				headers: Vec::new(),
				body: Vec::new(),
			})
			.await
			.unwrap_err();
		assert_eq!(err.0.code(), "not_found");
	}

	struct RecordingRawSocket {
		sent: parking_lot::Mutex<Vec<Vec<u8>>>,
	}

	#[async_trait::async_trait]
	impl crate::instance::raw::RawWebSocket for RecordingRawSocket {
		async fn send(&self, bytes: Vec<u8>) -> Result<(), BoxedError> {
			self.sent.lock().push(bytes);
			Ok(())
		}
		async fn close(&self, _code: u16, _reason: &str) {}
		async fn recv(&self) -> Option<Vec<u8>> {
			None
		}
	}

	#[tokio::test]
	async fn raw_web_socket_dispatches_to_on_web_socket_hook() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("raw-ws", &vec!["rw1".to_string()]);
		let def = Arc::new(
			ActorDef::builder("raw-ws")
				.on_web_socket(|_ctx, socket| {
					Box::pin(async move {
						socket.send(b"hello".to_vec()).await?;
						Ok(())
					})
				})
				.build(),
		);
		let instance = ActorInstance::spawn(def, actor_id, vec!["rw1".to_string()], driver, None, None, 30_000)
			.await
			.unwrap();

		let socket = Arc::new(RecordingRawSocket { sent: parking_lot::Mutex::new(Vec::new()) });
		instance.raw_web_socket(socket.clone()).await.unwrap();
		assert_eq!(socket.sent.lock().as_slice(), [b"hello".to_vec()]);
	}

	#[tokio::test]
	async fn run_handler_completes_a_step_and_clears_run_in_flight() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("workflow", &vec!["w1".to_string()]);
		let def = Arc::new(
			ActorDef::builder("workflow")
				.run(|_ctx, workflow_ctx| {
					Box::pin(async move {
						let total = workflow_ctx
							.step("charge", json!(21), |input| async move { Ok(Value::from(input.as_i64().unwrap() * 2)) })
							.await?;
						assert_eq!(total, json!(42));
						Ok(())
					})
				})
				.build(),
		);
		let instance = ActorInstance::spawn(def, actor_id, vec!["w1".to_string()], driver, None, None, 30_000)
			.await
			.unwrap();

		for _ in 0..100 {
			if !instance.shared.run_in_flight.load(Ordering::Relaxed) {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert!(!instance.shared.run_in_flight.load(Ordering::Relaxed));
	}

	#[tokio::test]
	async fn a_resident_run_handler_blocks_sleep_eligibility() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let actor_id = ActorId::derive("workflow", &vec!["w2".to_string()]);
		let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();
		let gate_rx = parking_lot::Mutex::new(Some(gate_rx));
		let def = Arc::new(
			ActorDef::builder("workflow")
				.run(move |_ctx, _workflow_ctx| {
					let gate_rx = gate_rx.lock().take();
					Box::pin(async move {
						if let Some(gate_rx) = gate_rx {
							let _ = gate_rx.await;
						}
						Ok(())
					})
				})
				.build(),
		);
		let instance = ActorInstance::spawn(def, actor_id, vec!["w2".to_string()], driver, None, None, 0)
			.await
			.unwrap();

		assert!(instance.shared.run_in_flight.load(Ordering::Relaxed));
		assert!(!instance.is_eligible_to_sleep(now_ms() + 60_000));

		let _ = gate_tx.send(());
		for _ in 0..100 {
			if !instance.shared.run_in_flight.load(Ordering::Relaxed) {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert!(instance.is_eligible_to_sleep(now_ms() + 60_000));
	}
}
