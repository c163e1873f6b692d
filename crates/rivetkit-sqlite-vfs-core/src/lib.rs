//! Reserved byte-prefix layout for the per-actor KV keyspace (spec §6).
//!
//! The runtime reserves a single leading byte per record kind so that user
//! KV operations (namespaced under [`USER_PREFIX`]) can never collide with
//! runtime bookkeeping, and so a KV `list` over a reserved prefix never
//! leaks into user data or vice versa.

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Chunked SQLite pages, used when the embedded SQL substrate is backed by
/// the same KV store as the actor (the `file` driver keeps both in one
/// `sled::Tree`).
pub const SQLITE_PREFIX: u8 = 0;
pub const SQLITE_META_PREFIX: u8 = 0;
pub const SQLITE_CHUNK_PREFIX: u8 = 1;

/// Versioned actor-persist record (`actor/persist`).
pub const ACTOR_PERSIST_PREFIX: u8 = 1;
/// Versioned connection records (`conn/<connId>`).
pub const CONN_PREFIX: u8 = 2;
/// Workflow history entries (`wf/entries/<ix>`).
pub const WORKFLOW_ENTRY_PREFIX: u8 = 3;
/// Workflow metadata (`wf/meta/<key>`).
pub const WORKFLOW_META_PREFIX: u8 = 4;
/// Workflow name registry, used to validate replay (`wf/names/<seq>`).
pub const WORKFLOW_NAME_PREFIX: u8 = 5;
/// User KV, namespaced away from every reserved prefix above.
pub const USER_PREFIX: u8 = 255;

pub fn meta_key(file_name: &str) -> Vec<u8> {
	let file_name_bytes = file_name.as_bytes();
	let mut key = Vec::with_capacity(2 + file_name_bytes.len());
	key.push(SQLITE_PREFIX);
	key.push(SQLITE_META_PREFIX);
	key.extend_from_slice(file_name_bytes);
	key
}

pub fn chunk_key(file_name: &str, chunk_index: u32) -> Vec<u8> {
	let file_name_bytes = file_name.as_bytes();
	let mut key = Vec::with_capacity(2 + file_name_bytes.len() + 1 + 4);
	key.push(SQLITE_PREFIX);
	key.push(SQLITE_CHUNK_PREFIX);
	key.extend_from_slice(file_name_bytes);
	key.push(0);
	key.extend_from_slice(&chunk_index.to_be_bytes());
	key
}

/// Prefixes a user-supplied KV key with [`USER_PREFIX`].
pub fn user_key(key: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(1 + key.len());
	out.push(USER_PREFIX);
	out.extend_from_slice(key);
	out
}

/// Strips [`USER_PREFIX`] back off, returning `None` if `key` isn't a user key.
pub fn strip_user_prefix(key: &[u8]) -> Option<&[u8]> {
	match key.split_first() {
		Some((&USER_PREFIX, rest)) => Some(rest),
		_ => None,
	}
}

pub fn reserved_key(prefix: u8, suffix: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(1 + suffix.len());
	out.push(prefix);
	out.extend_from_slice(suffix);
	out
}
