//! Shared in-process alarm scheduler used by both the memory and file
//! drivers — alarms themselves are cheap enough that neither driver
//! needs to persist them across a process restart (a restarted process
//! already re-derives pending timers from actor/workflow persisted state).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::id::ActorId;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct AlarmScheduler {
	due: Arc<Mutex<BTreeMap<i64, Vec<ActorId>>>>,
	fired: broadcast::Sender<ActorId>,
}

impl AlarmScheduler {
	pub fn new() -> Self {
		let due = Arc::new(Mutex::new(BTreeMap::new()));
		let (fired, _) = broadcast::channel(1024);
		let scheduler = Self { due, fired };
		scheduler.spawn_poller();
		scheduler
	}

	fn spawn_poller(&self) {
		let due = self.due.clone();
		let fired = self.fired.clone();
		tokio::spawn(async move {
			loop {
				tokio::time::sleep(POLL_INTERVAL).await;
				let now = now_ms();
				let ready: Vec<ActorId> = {
					let mut guard = due.lock();
					let keep = guard.split_off(&(now + 1));
					let expired = std::mem::replace(&mut *guard, keep);
					expired.into_values().flatten().collect()
				};
				for actor_id in ready {
					let _ = fired.send(actor_id);
				}
			}
		});
	}

	pub fn set(&self, actor_id: ActorId, at_ms: i64) {
		let mut guard = self.due.lock();
		guard.retain(|_, ids| {
			ids.retain(|id| *id != actor_id);
			!ids.is_empty()
		});
		guard.entry(at_ms).or_default().push(actor_id);
	}

	pub fn clear(&self, actor_id: ActorId) {
		let mut guard = self.due.lock();
		guard.retain(|_, ids| {
			ids.retain(|id| *id != actor_id);
			!ids.is_empty()
		});
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ActorId> {
		self.fired.subscribe()
	}
}

fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn alarm_fires_after_due_time() {
		let scheduler = AlarmScheduler::new();
		let mut rx = scheduler.subscribe();
		let actor = ActorId::derive("t", &vec!["a".into()]);
		scheduler.set(actor, now_ms() + 50);

		let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
			.await
			.expect("alarm did not fire in time")
			.unwrap();
		assert_eq!(fired, actor);
	}

	#[tokio::test]
	async fn clearing_an_alarm_prevents_it_firing() {
		let scheduler = AlarmScheduler::new();
		let mut rx = scheduler.subscribe();
		let actor = ActorId::derive("t", &vec!["b".into()]);
		scheduler.set(actor, now_ms() + 30);
		scheduler.clear(actor);

		let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
		assert!(result.is_err(), "cleared alarm fired anyway");
	}
}
