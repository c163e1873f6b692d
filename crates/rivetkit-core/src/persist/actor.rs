//! The `actor/persist` record (spec §3, §6): everything about an actor
//! that must survive hibernation and process restarts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::VersionedHandler;

pub const CURRENT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledEventRecord {
	pub event_id: String,
	pub ts_ms: i64,
	pub action_name: String,
	pub args: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorPersist {
	pub input: Option<Value>,
	pub state: Value,
	pub scheduled_events: Vec<ScheduledEventRecord>,
	pub created_at_ms: i64,
}

pub fn handler() -> VersionedHandler<ActorPersist> {
	VersionedHandler::new(CURRENT_VERSION)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn actor_persist_round_trips() {
		let record = ActorPersist {
			input: Some(Value::from(1)),
			state: Value::from(serde_json::json!({"count": 0})),
			scheduled_events: vec![ScheduledEventRecord {
				event_id: "e1".into(),
				ts_ms: 1000,
				action_name: "remind".into(),
				args: vec![Value::from("hi")],
			}],
			created_at_ms: 500,
		};
		let h = handler();
		let bytes = h.encode(&record).unwrap();
		assert_eq!(h.decode(&bytes).unwrap(), record);
	}
}
