//! Response bodies for the read-only inspector endpoints (component H).
//! Kept as a separate crate so a dashboard/tooling consumer can depend on
//! just the wire shapes without pulling in the runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectActorSummary {
	pub actor_id: String,
	pub name: String,
	pub key: Vec<String>,
	pub status: String,
	pub connection_count: usize,
	pub last_activity_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectListResponse {
	pub actors: Vec<InspectActorSummary>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectStateResponse {
	pub actor_id: String,
	pub state: Value,
	pub vars_present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectEventTail {
	pub actor_id: String,
	pub name: String,
	pub args: Value,
	pub ts_ms: i64,
}
