//! Actor identity (spec §3, §4.E).
//!
//! `ActorId` is a content-addressed, collision-resistant hash of
//! `(name, key_tuple)` so any host can compute the same id for the same
//! logical actor without a lookup round-trip.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub type ActorKey = Vec<String>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u128);

impl ActorId {
	/// `stableHash(name, keyTuple)`: each key component is length-prefixed
	/// before hashing so `(["a", "bc"])` and `(["ab", "c"])` never collide.
	pub fn derive(name: &str, key: &ActorKey) -> Self {
		let mut hasher = Sha256::new();
		hasher.update((name.len() as u32).to_be_bytes());
		hasher.update(name.as_bytes());
		hasher.update((key.len() as u32).to_be_bytes());
		for part in key {
			hasher.update((part.len() as u32).to_be_bytes());
			hasher.update(part.as_bytes());
		}
		let digest = hasher.finalize();
		let mut bytes = [0u8; 16];
		bytes.copy_from_slice(&digest[0..16]);
		ActorId(u128::from_be_bytes(bytes))
	}

	pub fn to_hex(&self) -> String {
		format!("{:032x}", self.0)
	}

	pub fn from_hex(s: &str) -> Option<Self> {
		u128::from_str_radix(s, 16).ok().map(ActorId)
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Debug for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ActorId({})", self.to_hex())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_name_and_key_hash_identically() {
		let a = ActorId::derive("counter", &vec!["c1".to_string()]);
		let b = ActorId::derive("counter", &vec!["c1".to_string()]);
		assert_eq!(a, b);
	}

	#[test]
	fn key_tuple_boundaries_do_not_collide() {
		let a = ActorId::derive("n", &vec!["a".to_string(), "bc".to_string()]);
		let b = ActorId::derive("n", &vec!["ab".to_string(), "c".to_string()]);
		assert_ne!(a, b);
	}

	#[test]
	fn different_names_hash_differently() {
		let a = ActorId::derive("counter", &vec!["c1".to_string()]);
		let b = ActorId::derive("chat_room", &vec!["c1".to_string()]);
		assert_ne!(a, b);
	}

	#[test]
	fn hex_round_trips() {
		let id = ActorId::derive("counter", &vec!["c1".to_string()]);
		assert_eq!(ActorId::from_hex(&id.to_hex()), Some(id));
	}
}
