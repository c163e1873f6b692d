//! Completable message queue (spec §4.D): `POST /actors/:id/queue` enqueues
//! a message and optionally waits (with a timeout) for the actor to
//! complete it; the actor pulls messages with `next`/`iter` and completes
//! them on its own schedule.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};

#[derive(Debug, Clone)]
pub struct QueuedMessage {
	pub id: u64,
	pub name: Option<String>,
	pub body: Value,
}

impl QueuedMessage {
	fn matches(&self, names: &[String]) -> bool {
		names.is_empty() || self.name.as_deref().is_some_and(|name| names.iter().any(|want| want == name))
	}
}

#[derive(Default)]
pub struct QueueHandle {
	next_id: AtomicU64,
	pending: Mutex<VecDeque<QueuedMessage>>,
	completions: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
	notify: Notify,
}

impl QueueHandle {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enqueues `body` and, if `wait` is set, blocks up to `timeout` for the
	/// actor to call [`Self::complete`]. Returns `None` on timeout or when
	/// `wait` is false (fire-and-forget).
	pub async fn send(
		&self,
		name: Option<String>,
		body: Value,
		wait: bool,
		timeout: Option<Duration>,
	) -> Option<Value> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let rx = wait.then(|| {
			let (tx, rx) = oneshot::channel();
			self.completions.lock().insert(id, tx);
			rx
		});
		self.pending.lock().push_back(QueuedMessage { id, name, body });
		self.notify.notify_waiters();

		let rx = rx?;
		match timeout {
			Some(duration) => tokio::time::timeout(duration, rx).await.ok()?.ok(),
			None => rx.await.ok(),
		}
	}

	fn try_take(&self, names: &[String]) -> Option<QueuedMessage> {
		let mut pending = self.pending.lock();
		let position = pending.iter().position(|msg| msg.matches(names))?;
		pending.remove(position)
	}

	/// Pops the oldest undelivered message whose `name` is one of `names`
	/// (every message, regardless of name, if `names` is empty). If none is
	/// queued yet, waits up to `timeout` (forever if `None`) for one to
	/// arrive via [`Self::send`].
	pub async fn next(&self, names: &[String], timeout: Option<Duration>) -> Option<QueuedMessage> {
		if let Some(msg) = self.try_take(names) {
			return Some(msg);
		}

		let wait = async {
			loop {
				let notified = self.notify.notified();
				if let Some(msg) = self.try_take(names) {
					return msg;
				}
				notified.await;
			}
		};

		match timeout {
			Some(duration) => tokio::time::timeout(duration, wait).await.ok(),
			None => Some(wait.await),
		}
	}

	/// Drains every currently queued message matching `names` (every message
	/// if `names` is empty), oldest first, leaving non-matching messages
	/// queued in place.
	pub fn iter(&self, names: &[String]) -> Vec<QueuedMessage> {
		let mut pending = self.pending.lock();
		let (matching, rest): (VecDeque<QueuedMessage>, VecDeque<QueuedMessage>) =
			pending.drain(..).partition(|msg| msg.matches(names));
		*pending = rest;
		matching.into_iter().collect()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.lock().is_empty()
	}

	/// Drains every currently queued message, oldest first.
	pub fn drain(&self) -> Vec<QueuedMessage> {
		self.pending.lock().drain(..).collect()
	}

	/// Resolves a waiting `send` call. Returns `false` if nobody is waiting
	/// on `id` (already completed, timed out, or sent without `wait`).
	pub fn complete(&self, id: u64, response: Value) -> bool {
		match self.completions.lock().remove(&id) {
			Some(tx) => tx.send(response).is_ok(),
			None => false,
		}
	}
}
