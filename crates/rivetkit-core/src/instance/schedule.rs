//! Scheduled-event bookkeeping (spec §3, §4.D): in-memory mirror of
//! `ActorPersist::scheduled_events`, consulted by the wake path to decide
//! which actions are due and by `save_state` to persist the rest.

use serde_json::Value;
use uuid::Uuid;

use crate::persist::actor::ScheduledEventRecord;

#[derive(Debug, Default, Clone)]
pub struct ScheduledEvents(Vec<ScheduledEventRecord>);

impl ScheduledEvents {
	pub fn from_records(records: Vec<ScheduledEventRecord>) -> Self {
		Self(records)
	}

	pub fn add(&mut self, at_ms: i64, action_name: &str, args: Vec<Value>) -> String {
		let event_id = Uuid::new_v4().to_string();
		self.0.push(ScheduledEventRecord {
			event_id: event_id.clone(),
			ts_ms: at_ms,
			action_name: action_name.to_string(),
			args,
		});
		event_id
	}

	pub fn cancel(&mut self, event_id: &str) -> bool {
		let before = self.0.len();
		self.0.retain(|e| e.event_id != event_id);
		self.0.len() != before
	}

	/// Splits off every event due at or before `now_ms`, leaving the rest.
	pub fn take_due(&mut self, now_ms: i64) -> Vec<ScheduledEventRecord> {
		let (due, remaining): (Vec<_>, Vec<_>) = self.0.drain(..).partition(|e| e.ts_ms <= now_ms);
		self.0 = remaining;
		due
	}

	/// The soonest upcoming event, if any — drives the next alarm to arm.
	pub fn next_due_at(&self) -> Option<i64> {
		self.0.iter().map(|e| e.ts_ms).min()
	}

	pub fn records(&self) -> Vec<ScheduledEventRecord> {
		self.0.clone()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn take_due_splits_on_timestamp() {
		let mut events = ScheduledEvents::default();
		events.add(100, "a", vec![]);
		events.add(200, "b", vec![]);

		let due = events.take_due(150);
		assert_eq!(due.len(), 1);
		assert_eq!(due[0].action_name, "a");
		assert_eq!(events.next_due_at(), Some(200));
	}

	#[test]
	fn cancel_removes_by_id() {
		let mut events = ScheduledEvents::default();
		let id = events.add(100, "a", vec![]);
		assert!(events.cancel(&id));
		assert!(events.is_empty());
	}
}
