//! `wf/entries/<ix>` and `wf/meta/<key>` records (spec §3, §4.F).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::VersionedHandler;

pub const CURRENT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
	Pending,
	Running,
	Completed,
	Failed,
	RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
	Step,
	Sleep,
	Listen,
	Loop,
	Join,
	Race,
	RollbackCheckpoint,
	RollbackRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEntryPersist {
	pub index: u64,
	pub kind: EntryKind,
	pub name: String,
	pub status: EntryStatus,
	pub attempt: u32,
	/// Hash of the recorded call's input, used for divergence detection on replay.
	pub input_fingerprint: String,
	pub output: Option<Value>,
	pub last_error: Option<String>,
	pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
	Running,
	Sleeping,
	Completed,
	Failed,
	RollingBack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetaPersist {
	pub state: WorkflowState,
	pub sleep_until_ms: Option<i64>,
	pub output: Option<Value>,
	pub error: Option<String>,
	pub rollback_checkpoint_index: Option<u64>,
}

pub fn entry_handler() -> VersionedHandler<WorkflowEntryPersist> {
	VersionedHandler::new(CURRENT_VERSION)
}

pub fn meta_handler() -> VersionedHandler<WorkflowMetaPersist> {
	VersionedHandler::new(CURRENT_VERSION)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn entry_round_trips() {
		let entry = WorkflowEntryPersist {
			index: 0,
			kind: EntryKind::Step,
			name: "stepA".into(),
			status: EntryStatus::Completed,
			attempt: 1,
			input_fingerprint: "abc".into(),
			output: Some(Value::from("one")),
			last_error: None,
			dirty: false,
		};
		let h = entry_handler();
		let bytes = h.encode(&entry).unwrap();
		assert_eq!(h.decode(&bytes).unwrap(), entry);
	}

	#[test]
	fn meta_round_trips() {
		let meta = WorkflowMetaPersist {
			state: WorkflowState::Running,
			sleep_until_ms: None,
			output: None,
			error: None,
			rollback_checkpoint_index: Some(2),
		};
		let h = meta_handler();
		let bytes = h.encode(&meta).unwrap();
		assert_eq!(h.decode(&bytes).unwrap(), meta);
	}
}
