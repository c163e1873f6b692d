//! Durable workflow engine (spec §4.F): `WorkflowCtx` re-runs a workflow
//! body from the top on every wake, replaying completed primitives from
//! [`history::History`] instead of re-executing their side effects —
//! the same durable-execution shape as `gasoline::ctx::workflow::WorkflowCtx`,
//! reduced to the primitive set spec.md names.

pub mod history;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use rivetkit_sqlite_vfs_core::{reserved_key, WORKFLOW_ENTRY_PREFIX, WORKFLOW_META_PREFIX};
use serde_json::Value;

use crate::driver::Driver;
use crate::error::{BoxedError, WorkflowError};
use crate::id::ActorId;
use crate::persist::workflow::{
	entry_handler, meta_handler, EntryKind, EntryStatus, WorkflowMetaPersist, WorkflowState,
};
use history::{fingerprint_of, History, ReplayState};

/// What a workflow body yields control with. Every primitive returns
/// `Result<T, WorkflowControl>` so `?` propagates suspension and failure
/// the same way; only [`run`] ever inspects the variant.
pub enum WorkflowControl {
	/// Waiting on a timer or an externally delivered event; the body will
	/// be re-invoked (replaying up to this point) once that happens.
	Suspended,
	Failed(BoxedError),
}

impl<E: Into<BoxedError>> From<E> for WorkflowControl {
	fn from(err: E) -> Self {
		WorkflowControl::Failed(err.into())
	}
}

pub enum LoopControl {
	Continue,
	Break(Value),
}

/// A step body, re-invokable across retries. Takes `Fn` (not `FnOnce`) so
/// [`WorkflowCtx::execute_step`] can call it again on a failed attempt.
pub type StepFn = Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, BoxedError>> + Send>> + Send + Sync>;

/// A compensating action for a step, run at most once, in reverse order,
/// when [`WorkflowCtx::rollback_to`] unwinds past it.
pub type RollbackFn = Box<dyn FnOnce(Value) -> Pin<Box<dyn Future<Output = Result<(), BoxedError>> + Send>> + Send>;

/// Full form of `ctx.step(...)`: a name, an input, a retryable body, and
/// optionally a rollback callback plus a retry budget. [`WorkflowCtx::step`]
/// is a convenience wrapper over this for the common case of neither.
pub struct StepCall {
	pub name: String,
	pub input: Value,
	pub run: StepFn,
	pub rollback: Option<RollbackFn>,
	pub max_attempts: u32,
}

impl StepCall {
	pub fn new<F, Fut>(name: impl Into<String>, input: Value, run: F) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value, BoxedError>> + Send + 'static,
	{
		Self {
			name: name.into(),
			input,
			run: Arc::new(move |v| Box::pin(run(v))),
			rollback: None,
			max_attempts: 1,
		}
	}

	pub fn rollback<F, Fut>(mut self, rollback: F) -> Self
	where
		F: FnOnce(Value) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), BoxedError>> + Send + 'static,
	{
		self.rollback = Some(Box::new(move |v| Box::pin(rollback(v))));
		self
	}

	pub fn max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}
}

pub struct WorkflowCtx {
	workflow_id: ActorId,
	driver: Arc<dyn Driver>,
	history: Mutex<History>,
	/// Rollback closures registered by [`Self::step_with`] calls made *this
	/// run*, keyed by the step's history index. The workflow body re-runs
	/// top-to-bottom on every invocation, so by the time a later
	/// `rollback_to` call is reached every earlier step's closure (whether
	/// replayed or freshly executed) has already been registered here.
	rollbacks: Mutex<HashMap<u64, RollbackFn>>,
}

impl WorkflowCtx {
	pub async fn load(workflow_id: ActorId, driver: Arc<dyn Driver>) -> Result<Self, BoxedError> {
		let entries = load_entries(&driver, workflow_id).await?;
		Ok(Self {
			workflow_id,
			driver,
			history: Mutex::new(History::from_entries(entries)),
			rollbacks: Mutex::new(HashMap::new()),
		})
	}

	pub fn workflow_id(&self) -> ActorId {
		self.workflow_id
	}

	async fn persist_entry(&self, index: u64) -> Result<(), BoxedError> {
		let entry = {
			let history = self.history.lock();
			history.entry(index).cloned()
		};
		let Some(entry) = entry else { return Ok(()) };
		let bytes = entry_handler().encode(&entry)?;
		self.driver.put(self.workflow_id, entry_key(index), bytes).await
	}

	async fn write_meta(&self, meta: &WorkflowMetaPersist) -> Result<(), BoxedError> {
		let bytes = meta_handler().encode(meta)?;
		self.driver.put(self.workflow_id, meta_key(), bytes).await
	}

	/// Runs `name` exactly once across the workflow's whole lifetime (no
	/// rollback, a single attempt); replayed calls return the recorded
	/// output without re-invoking `f`. See [`Self::step_with`] for retries
	/// and compensating rollback.
	pub async fn step<F, Fut>(&self, name: &str, input: Value, f: F) -> Result<Value, WorkflowControl>
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value, BoxedError>> + Send + 'static,
	{
		self.step_with(StepCall::new(name, input, f)).await
	}

	/// Full step form: retries `call.max_attempts` times with exponential
	/// backoff before failing as [`WorkflowError::StepExhausted`], and -- if
	/// `call.rollback` is set -- registers the compensating action so a
	/// later `rollback_to` can invoke it with this step's persisted output.
	pub async fn step_with(&self, call: StepCall) -> Result<Value, WorkflowControl> {
		let StepCall { name, input, run, rollback, max_attempts } = call;
		let fingerprint = fingerprint_of(&input);
		let state = self.history.lock().next(EntryKind::Step, &name, &fingerprint)?;
		let index = match &state {
			ReplayState::Replayed(entry) | ReplayState::Fresh(entry) => entry.index,
		};

		if let Some(rollback) = rollback {
			self.rollbacks.lock().insert(index, rollback);
		}

		match state {
			ReplayState::Replayed(entry) if entry.status == EntryStatus::Completed => {
				Ok(entry.output.unwrap_or(Value::Null))
			}
			ReplayState::Replayed(_) | ReplayState::Fresh(_) => {
				self.execute_step(index, &name, run, input, max_attempts.max(1)).await
			}
		}
	}

	async fn execute_step(
		&self,
		index: u64,
		name: &str,
		run: StepFn,
		input: Value,
		max_attempts: u32,
	) -> Result<Value, WorkflowControl> {
		let mut attempt = 1u32;
		loop {
			match run(input.clone()).await {
				Ok(output) => {
					self.history.lock().complete(index, Some(output.clone()));
					self.persist_entry(index).await?;
					return Ok(output);
				}
				Err(err) => {
					self.history.lock().fail(index, err.to_string());
					self.persist_entry(index).await?;
					if attempt >= max_attempts {
						return Err(WorkflowError::StepExhausted {
							step: name.to_string(),
							last_error: err.to_string(),
						}
						.into());
					}
					let backoff_ms = 50u64.saturating_mul(1u64 << attempt.min(10));
					tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
					attempt += 1;
				}
			}
		}
	}

	/// Suspends until `at_ms`. On the wake after that timer fires, replay
	/// finds this entry already `Completed` and returns immediately.
	pub async fn sleep_until(&self, name: &str, at_ms: i64) -> Result<(), WorkflowControl> {
		let fingerprint = fingerprint_of(&Value::from(at_ms));
		let state = self.history.lock().next(EntryKind::Sleep, name, &fingerprint)?;
		let entry = match state {
			ReplayState::Replayed(entry) if entry.status == EntryStatus::Completed => return Ok(()),
			ReplayState::Replayed(entry) => entry,
			ReplayState::Fresh(entry) => entry,
		};

		if now_ms() >= at_ms {
			self.history.lock().complete(entry.index, None);
			self.persist_entry(entry.index).await?;
			return Ok(());
		}

		self.persist_entry(entry.index).await?;
		self.driver.set_alarm(self.workflow_id, at_ms).await?;
		self.write_meta(&WorkflowMetaPersist {
			state: WorkflowState::Sleeping,
			sleep_until_ms: Some(at_ms),
			output: None,
			error: None,
			rollback_checkpoint_index: None,
		})
		.await?;
		Err(WorkflowControl::Suspended)
	}

	pub async fn sleep(&self, name: &str, duration: std::time::Duration) -> Result<(), WorkflowControl> {
		self.sleep_until(name, now_ms() + duration.as_millis() as i64).await
	}

	/// Suspends until [`Self::deliver`] records a value for `event_name`.
	pub async fn listen(&self, name: &str, event_name: &str) -> Result<Value, WorkflowControl> {
		let fingerprint = fingerprint_of(&Value::from(event_name));
		let state = self.history.lock().next(EntryKind::Listen, name, &fingerprint)?;
		match state {
			ReplayState::Replayed(entry) if entry.status == EntryStatus::Completed => {
				Ok(entry.output.unwrap_or(Value::Null))
			}
			ReplayState::Replayed(entry) => {
				self.persist_entry(entry.index).await?;
				Err(WorkflowControl::Suspended)
			}
			ReplayState::Fresh(entry) => {
				self.persist_entry(entry.index).await?;
				Err(WorkflowControl::Suspended)
			}
		}
	}

	/// Delivers `payload` to a previously recorded `listen(name, ...)` call,
	/// marking it `Completed` so the next `run` replays past it.
	pub async fn deliver(&self, name: &str, payload: Value) -> Result<bool, BoxedError> {
		let index = {
			let history = self.history.lock();
			history
				.entries()
				.iter()
				.find(|e| e.kind == EntryKind::Listen && e.name == name && e.status != EntryStatus::Completed)
				.map(|e| e.index)
		};
		let Some(index) = index else { return Ok(false) };
		self.history.lock().complete(index, Some(payload));
		self.persist_entry(index).await?;
		Ok(true)
	}

	/// Runs `body` repeatedly, each iteration recorded under its own
	/// sub-index, until it returns [`LoopControl::Break`].
	pub async fn loop_until<F, Fut>(&self, name: &str, mut body: F) -> Result<Value, WorkflowControl>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<LoopControl, BoxedError>>,
	{
		for iteration in 0u32.. {
			let iteration_name = format!("{name}[{iteration}]");
			let fingerprint = fingerprint_of(&Value::from(iteration));
			let state = self.history.lock().next(EntryKind::Loop, &iteration_name, &fingerprint)?;
			let entry_index = match &state {
				ReplayState::Replayed(entry) => entry.index,
				ReplayState::Fresh(entry) => entry.index,
			};

			if let ReplayState::Replayed(entry) = &state {
				if entry.status == EntryStatus::Completed {
					if let Some(output) = entry.output.clone() {
						return Ok(output);
					}
					continue;
				}
			}

			match body(iteration).await {
				Ok(LoopControl::Continue) => {
					self.history.lock().complete(entry_index, None);
					self.persist_entry(entry_index).await?;
				}
				Ok(LoopControl::Break(value)) => {
					self.history.lock().complete(entry_index, Some(value.clone()));
					self.persist_entry(entry_index).await?;
					return Ok(value);
				}
				Err(err) => {
					self.history.lock().fail(entry_index, err.to_string());
					self.persist_entry(entry_index).await?;
					return Err(WorkflowControl::Failed(err));
				}
			}
		}
		unreachable!("u32 iteration space is exhausted before this loop can fall through")
	}

	/// Runs every branch concurrently, each recorded under its own
	/// replayable [`EntryKind::Join`] entry, and waits for all of them
	/// before deciding the outcome: if any branch fails, every branch still
	/// runs to completion and the result is
	/// [`WorkflowError::JoinFailed`] carrying every failed branch's error,
	/// not just the first.
	pub async fn join(&self, branches: Vec<(String, Value, BranchFn)>) -> Result<Vec<Value>, WorkflowControl> {
		use futures::future::join_all;

		type JoinFuture = Pin<Box<dyn Future<Output = (usize, u64, String, Result<Value, BoxedError>)> + Send>>;

		let mut outputs: Vec<Option<Value>> = vec![None; branches.len()];
		let mut pending: Vec<JoinFuture> = Vec::new();

		for (position, (name, input, f)) in branches.into_iter().enumerate() {
			let fingerprint = fingerprint_of(&input);
			let state = self.history.lock().next(EntryKind::Join, &name, &fingerprint)?;
			match state {
				ReplayState::Replayed(entry) if entry.status == EntryStatus::Completed => {
					outputs[position] = Some(entry.output.unwrap_or(Value::Null));
				}
				ReplayState::Replayed(entry) | ReplayState::Fresh(entry) => {
					let index = entry.index;
					pending.push(Box::pin(async move { (position, index, name, f(input).await) }));
				}
			}
		}

		let results = join_all(pending).await;

		let mut errors = std::collections::BTreeMap::new();
		for (position, index, name, result) in results {
			match result {
				Ok(value) => {
					self.history.lock().complete(index, Some(value.clone()));
					self.persist_entry(index).await?;
					outputs[position] = Some(value);
				}
				Err(err) => {
					self.history.lock().fail(index, err.to_string());
					self.persist_entry(index).await?;
					errors.insert(name, err.to_string());
				}
			}
		}

		if !errors.is_empty() {
			return Err(WorkflowError::JoinFailed { errors }.into());
		}

		Ok(outputs.into_iter().map(|o| o.unwrap_or(Value::Null)).collect())
	}

	/// Runs every branch concurrently, returning the first to complete and
	/// marking the rest [`WorkflowError::Cancelled`] so replay doesn't
	/// re-run them.
	pub async fn race(&self, branches: Vec<(String, Value, BranchFn)>) -> Result<Value, WorkflowControl> {
		use futures::future::{self};

		type RaceFuture = std::pin::Pin<
			Box<dyn Future<Output = (u64, String, Result<Value, BoxedError>)> + Send>,
		>;
		let mut futs: Vec<RaceFuture> = Vec::with_capacity(branches.len());
		for (name, input, f) in branches {
			let fingerprint = fingerprint_of(&input);
			let state = self.history.lock().next(EntryKind::Race, &name, &fingerprint)?;
			match state {
				ReplayState::Replayed(entry) if entry.status == EntryStatus::Completed => {
					return Ok(entry.output.unwrap_or(Value::Null));
				}
				ReplayState::Replayed(entry) | ReplayState::Fresh(entry) => {
					let branch_name = name.clone();
					futs.push(Box::pin(async move { (entry.index, branch_name, f(input).await) }));
				}
			}
		}

		let ((winner_index, winner_name, result), _, rest) = future::select_all(futs).await;
		let output = match result {
			Ok(value) => {
				self.history.lock().complete(winner_index, Some(value.clone()));
				self.persist_entry(winner_index).await?;
				value
			}
			Err(err) => {
				self.history.lock().fail(winner_index, err.to_string());
				self.persist_entry(winner_index).await?;
				return Err(WorkflowError::RaceFailed { branch: winner_name, error: err.to_string() }.into());
			}
		};

		for losing in rest {
			let (index, _name, _pending) = losing.await;
			self.history.lock().fail(index, WorkflowError::Cancelled.to_string());
			self.persist_entry(index).await?;
		}

		Ok(output)
	}

	pub async fn rollback_checkpoint(&self, name: &str) -> Result<(), WorkflowControl> {
		let fingerprint = fingerprint_of(&Value::Null);
		let state = self.history.lock().next(EntryKind::RollbackCheckpoint, name, &fingerprint)?;
		let index = match state {
			ReplayState::Replayed(entry) | ReplayState::Fresh(entry) => entry.index,
		};
		self.history.lock().complete(index, None);
		self.persist_entry(index).await?;
		Ok(())
	}

	/// Walks every step recorded after `checkpoint_name`, in reverse order,
	/// invoking each one's registered rollback callback (if any) with its
	/// persisted output and marking the entry `RolledBack`, then suspends.
	/// Entries are marked, never deleted: on the next `run`, replay finds
	/// them not `Completed` and re-executes the workflow body from that
	/// point, overwriting each index back to `Completed`. Like every other
	/// primitive this never returns `Ok` -- the workflow body's own replay
	/// is what continues after the rollback.
	pub async fn rollback_to(&self, checkpoint_name: &str) -> Result<(), WorkflowControl> {
		let checkpoint_index = {
			let history = self.history.lock();
			history.checkpoint_index(checkpoint_name)
		};
		let Some(checkpoint_index) = checkpoint_index else {
			return Err(WorkflowError::RollbackRequired.into());
		};

		let rolled_back: Vec<(u64, Value)> = {
			let mut history = self.history.lock();
			history
				.mark_rolled_back_after(checkpoint_index)
				.into_iter()
				.map(|entry| (entry.index, entry.output.unwrap_or(Value::Null)))
				.collect()
		};

		for (index, _) in &rolled_back {
			self.persist_entry(*index).await?;
		}

		for (index, output) in rolled_back {
			let rollback = self.rollbacks.lock().remove(&index);
			if let Some(rollback) = rollback {
				rollback(output).await?;
			}
		}

		self.write_meta(&WorkflowMetaPersist {
			state: WorkflowState::RollingBack,
			sleep_until_ms: None,
			output: None,
			error: None,
			rollback_checkpoint_index: Some(checkpoint_index),
		})
		.await?;
		Err(WorkflowControl::Suspended)
	}
}

pub type BranchFn = Box<dyn FnOnce(Value) -> std::pin::Pin<Box<dyn Future<Output = Result<Value, BoxedError>> + Send>> + Send>;

fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

fn entry_key(index: u64) -> Vec<u8> {
	reserved_key(WORKFLOW_ENTRY_PREFIX, &index.to_be_bytes())
}

fn meta_key() -> Vec<u8> {
	reserved_key(WORKFLOW_META_PREFIX, b"")
}

async fn load_entries(
	driver: &Arc<dyn Driver>,
	workflow_id: ActorId,
) -> Result<Vec<crate::persist::workflow::WorkflowEntryPersist>, BoxedError> {
	let items = driver
		.list(workflow_id, crate::kv::ListQuery::prefix(&[WORKFLOW_ENTRY_PREFIX]))
		.await?;
	items.into_iter().map(|(_, bytes)| entry_handler().decode(&bytes)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::memory::MemoryDriver;

	fn actor(name: &str) -> ActorId {
		ActorId::derive(name, &vec!["wf".to_string()])
	}

	#[tokio::test]
	async fn step_replays_without_rerunning_body() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("order");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();

		let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
		let calls2 = calls.clone();
		let result = ctx
			.step("charge", Value::from(100), move |input| {
				let calls = calls2.clone();
				async move {
					calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
					Ok(Value::from(input.as_i64().unwrap() * 2))
				}
			})
			.await;
		assert_eq!(result.ok(), Some(Value::from(200)));
		assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);

		// Reload from persisted history, as a wake after a restart would.
		let ctx2 = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();
		let calls3 = calls.clone();
		let replayed = ctx2
			.step("charge", Value::from(100), move |input| {
				let calls = calls3.clone();
				async move {
					calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
					Ok(Value::from(input.as_i64().unwrap() * 2))
				}
			})
			.await;
		assert_eq!(replayed.ok(), Some(Value::from(200)));
		assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1, "replay must not re-run the step body");
	}

	#[tokio::test]
	async fn sleep_suspends_until_due_then_replays_clean() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("reminder");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();

		let at = now_ms() - 1; // already due
		let result = ctx.sleep_until("wait", at).await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn rollback_to_marks_entries_rolled_back_without_deleting_them() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("saga");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();

		ctx.rollback_checkpoint("start").await.unwrap();
		ctx.step("book_flight", Value::Null, |_| async { Ok(Value::from("booked")) }).await.unwrap();

		let outcome = ctx.rollback_to("start").await;
		assert!(matches!(outcome, Err(WorkflowControl::Suspended)));

		let ctx2 = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();
		let entries = ctx2.history.lock().entries().to_vec();
		assert_eq!(entries.len(), 2, "rollback marks entries, it never deletes them");
		assert_eq!(entries[1].status, EntryStatus::RolledBack);
	}

	#[tokio::test]
	async fn rollback_to_invokes_registered_rollbacks_in_reverse_order() {
		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("saga-compensate");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();
		let log = Arc::new(Mutex::new(Vec::<String>::new()));

		ctx.rollback_checkpoint("start").await.unwrap();

		let run_log = log.clone();
		let undo_log = log.clone();
		ctx.step_with(
			StepCall::new("push_first", Value::Null, move |_| {
				let run_log = run_log.clone();
				async move {
					run_log.lock().push("first".to_string());
					Ok(Value::from("first"))
				}
			})
			.rollback(move |output| {
				let undo_log = undo_log.clone();
				async move {
					undo_log.lock().push(output.as_str().unwrap().to_string());
					Ok(())
				}
			}),
		)
		.await
		.unwrap();

		let run_log = log.clone();
		let undo_log = log.clone();
		ctx.step_with(
			StepCall::new("push_second", Value::Null, move |_| {
				let run_log = run_log.clone();
				async move {
					run_log.lock().push("second".to_string());
					Ok(Value::from("second"))
				}
			})
			.rollback(move |output| {
				let undo_log = undo_log.clone();
				async move {
					undo_log.lock().push(output.as_str().unwrap().to_string());
					Ok(())
				}
			}),
		)
		.await
		.unwrap();

		log.lock().clear();

		let outcome = ctx.rollback_to("start").await;
		assert!(matches!(outcome, Err(WorkflowControl::Suspended)));
		assert_eq!(*log.lock(), vec!["second".to_string(), "first".to_string()]);
	}

	#[tokio::test]
	async fn step_retries_up_to_max_attempts_then_raises_step_exhausted() {
		use crate::error::RivetError;

		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("flaky");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();

		let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
		let calls2 = calls.clone();
		let result = ctx
			.step_with(
				StepCall::new("flaky", Value::Null, move |_| {
					let calls2 = calls2.clone();
					async move {
						calls2.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
						Err(crate::error::InternalError::DriverError { detail: "boom".into() }.into())
					}
				})
				.max_attempts(3),
			)
			.await;

		assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 3, "must retry up to max_attempts");
		match result {
			Err(WorkflowControl::Failed(err)) => assert_eq!(err.0.code(), "step_exhausted"),
			_ => panic!("expected a step_exhausted failure"),
		}
	}

	#[tokio::test]
	async fn join_runs_branches_concurrently_and_collects_every_failure() {
		use crate::error::RivetError;

		let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
		let workflow_id = actor("join-failures");
		let ctx = WorkflowCtx::load(workflow_id, driver.clone()).await.unwrap();

		let ok_branch: BranchFn = Box::new(|_| Box::pin(async { Ok(Value::from("ok")) }));
		let fail_branch: BranchFn = Box::new(|_| {
			Box::pin(async { Err(crate::error::InternalError::DriverError { detail: "boom".into() }.into()) })
		});

		let result = ctx
			.join(vec![
				("a".to_string(), Value::Null, ok_branch),
				("b".to_string(), Value::Null, fail_branch),
			])
			.await;

		match result {
			Err(WorkflowControl::Failed(err)) => assert_eq!(err.0.code(), "join_failed"),
			_ => panic!("expected a join_failed failure"),
		}
	}
}
