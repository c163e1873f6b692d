//! Append-only, location-addressed event log (spec §3, §4.F), modeled on
//! `gasoline::ctx::workflow::WorkflowCtx`'s cursor-over-a-log replay: each
//! primitive call advances a cursor through previously recorded entries
//! during replay, and appends a fresh entry once the cursor runs off the
//! end of history.

use sha2::{Digest, Sha256};

use crate::error::WorkflowError;
use crate::persist::workflow::{EntryKind, EntryStatus, WorkflowEntryPersist};

#[derive(Debug, Clone)]
pub enum ReplayState {
	/// The cursor matched a previously recorded entry at this index.
	Replayed(WorkflowEntryPersist),
	/// No entry existed yet; one was just appended in `Running` status.
	Fresh(WorkflowEntryPersist),
}

pub struct History {
	entries: Vec<WorkflowEntryPersist>,
	cursor: usize,
}

impl History {
	pub fn new() -> Self {
		Self { entries: Vec::new(), cursor: 0 }
	}

	pub fn from_entries(mut entries: Vec<WorkflowEntryPersist>) -> Self {
		entries.sort_by_key(|e| e.index);
		Self { entries, cursor: 0 }
	}

	pub fn entries(&self) -> &[WorkflowEntryPersist] {
		&self.entries
	}

	pub fn entry(&self, index: u64) -> Option<&WorkflowEntryPersist> {
		self.entries.iter().find(|e| e.index == index)
	}

	pub fn checkpoint_index(&self, name: &str) -> Option<u64> {
		self.entries
			.iter()
			.find(|e| e.kind == EntryKind::RollbackCheckpoint && e.name == name)
			.map(|e| e.index)
	}

	/// Marks every entry recorded after `index` as [`EntryStatus::RolledBack`]
	/// (without deleting it, so its `output` stays available to a rollback
	/// callback) and rewinds the cursor so the next primitive call replays
	/// from the checkpoint onward. Returns the marked entries in descending
	/// index order -- the order a saga's compensating actions should run in.
	pub fn mark_rolled_back_after(&mut self, index: u64) -> Vec<WorkflowEntryPersist> {
		let mut rolled_back: Vec<WorkflowEntryPersist> = self
			.entries
			.iter_mut()
			.filter(|e| e.index > index)
			.map(|e| {
				e.status = EntryStatus::RolledBack;
				e.dirty = true;
				e.clone()
			})
			.collect();
		rolled_back.sort_by(|a, b| b.index.cmp(&a.index));
		self.cursor = self.cursor.min((index + 1) as usize);
		rolled_back
	}

	/// Advances the cursor by one primitive call. Diverges (errors) if the
	/// recorded entry at this position doesn't match `kind`/`name`/`fingerprint`.
	pub fn next(&mut self, kind: EntryKind, name: &str, fingerprint: &str) -> Result<ReplayState, WorkflowError> {
		if self.cursor < self.entries.len() {
			let entry = self.entries[self.cursor].clone();
			if entry.kind != kind || entry.name != name || entry.input_fingerprint != fingerprint {
				return Err(WorkflowError::HistoryDiverged {
					detail: format!(
						"at index {}: recorded {:?}/{} but replay called {:?}/{}",
						entry.index, entry.kind, entry.name, kind, name
					),
				});
			}
			self.cursor += 1;
			Ok(ReplayState::Replayed(entry))
		} else {
			let index = self.entries.len() as u64;
			let entry = WorkflowEntryPersist {
				index,
				kind,
				name: name.to_string(),
				status: EntryStatus::Running,
				attempt: 1,
				input_fingerprint: fingerprint.to_string(),
				output: None,
				last_error: None,
				dirty: true,
			};
			self.entries.push(entry.clone());
			self.cursor += 1;
			Ok(ReplayState::Fresh(entry))
		}
	}

	pub fn complete(&mut self, index: u64, output: Option<serde_json::Value>) {
		if let Some(entry) = self.entries.iter_mut().find(|e| e.index == index) {
			entry.status = EntryStatus::Completed;
			entry.output = output;
			entry.dirty = true;
		}
	}

	pub fn fail(&mut self, index: u64, error: String) {
		if let Some(entry) = self.entries.iter_mut().find(|e| e.index == index) {
			entry.status = EntryStatus::Failed;
			entry.last_error = Some(error);
			entry.attempt += 1;
			entry.dirty = true;
		}
	}
}

/// A stable fingerprint of a primitive's input, used to detect when replay
/// reaches a call whose recorded arguments don't match what code is asking
/// for now (the workflow body changed between deploys).
pub fn fingerprint_of(value: &serde_json::Value) -> String {
	let mut bytes = Vec::new();
	ciborium::into_writer(value, &mut bytes).expect("serde_json::Value always encodes to CBOR");
	let digest = Sha256::digest(&bytes);
	hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RivetError;

	#[test]
	fn replays_match_prior_entries_and_appends_new_ones() {
		let mut history = History::new();
		let fp = fingerprint_of(&serde_json::Value::from(1));

		let first = history.next(EntryKind::Step, "charge", &fp).unwrap();
		assert!(matches!(first, ReplayState::Fresh(_)));

		history.complete(0, Some(serde_json::Value::from("ok")));

		let mut replay = History::from_entries(history.entries().to_vec());
		let second = replay.next(EntryKind::Step, "charge", &fp).unwrap();
		match second {
			ReplayState::Replayed(entry) => assert_eq!(entry.status, EntryStatus::Completed),
			_ => panic!("expected replay to find the prior entry"),
		}
	}

	#[test]
	fn diverging_name_is_rejected() {
		let mut history = History::new();
		let fp = fingerprint_of(&serde_json::Value::Null);
		history.next(EntryKind::Step, "charge", &fp).unwrap();

		let mut replay = History::from_entries(history.entries().to_vec());
		let err = replay.next(EntryKind::Step, "refund", &fp).unwrap_err();
		assert_eq!(err.code(), "history_diverged");
	}

	#[test]
	fn mark_rolled_back_after_keeps_entries_but_flags_them_in_descending_order() {
		let mut history = History::new();
		let fp = fingerprint_of(&serde_json::Value::Null);
		history.next(EntryKind::RollbackCheckpoint, "cp", &fp).unwrap();
		history.next(EntryKind::Step, "a", &fp).unwrap();
		history.complete(1, Some(serde_json::Value::from("a-done")));
		history.next(EntryKind::Step, "b", &fp).unwrap();
		history.complete(2, Some(serde_json::Value::from("b-done")));

		let rolled_back = history.mark_rolled_back_after(0);
		assert_eq!(history.entries().len(), 3, "rollback marks entries, it never deletes them");
		assert_eq!(rolled_back.iter().map(|e| e.index).collect::<Vec<_>>(), vec![2, 1], "must be descending index order");
		assert!(rolled_back.iter().all(|e| e.status == EntryStatus::RolledBack));
		assert_eq!(rolled_back[0].output, Some(serde_json::Value::from("b-done")), "output survives for the rollback callback");
	}
}
