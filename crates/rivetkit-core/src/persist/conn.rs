//! The `conn/<connId>` record (spec §3, §4.D "hibernatable WebSockets").
//!
//! Only the declared-at-registry connection-state persists across
//! hibernation (spec.md §9 Open Question (b)); params and any in-memory
//! vars-like scratch data are not part of this record and are discarded on
//! sleep.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::VersionedHandler;

pub const CURRENT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnPersist {
	pub connection_id: String,
	pub params: Value,
	pub state: Option<Value>,
	pub subscriptions: Vec<String>,
	/// Present only for hibernatable connections; lets a reconnecting frame
	/// resume the same subscription set without re-running `onBeforeConnect`.
	pub hibernatable_request_id: Option<String>,
}

pub fn handler() -> VersionedHandler<ConnPersist> {
	VersionedHandler::new(CURRENT_VERSION)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conn_persist_round_trips() {
		let record = ConnPersist {
			connection_id: "c1".into(),
			params: Value::Null,
			state: Some(Value::from(true)),
			subscriptions: vec!["newCount".into()],
			hibernatable_request_id: Some("r1".into()),
		};
		let h = handler();
		let bytes = h.encode(&record).unwrap();
		assert_eq!(h.decode(&bytes).unwrap(), record);
	}
}
