//! Types shared between the RivetKit server (`rivetkit-core`) and the Rust
//! client (`rivetkit-client`). Kept dependency-light so either side can pull
//! it in without dragging along codec or transport crates.

use serde::{Deserialize, Serialize};

/// Wire encoding negotiated once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
	Json,
	Cbor,
	Bare,
}

impl Encoding {
	pub fn as_str(&self) -> &'static str {
		match self {
			Encoding::Json => "json",
			Encoding::Cbor => "cbor",
			Encoding::Bare => "bare",
		}
	}

	pub fn from_str(s: &str) -> Option<Self> {
		match s {
			"json" => Some(Encoding::Json),
			"cbor" => Some(Encoding::Cbor),
			"bare" => Some(Encoding::Bare),
			_ => None,
		}
	}

	/// Whether frames for this encoding are sent as WS text frames.
	pub fn is_text(&self) -> bool {
		matches!(self, Encoding::Json)
	}
}

impl Default for Encoding {
	fn default() -> Self {
		Encoding::Json
	}
}

/// `x-rivet-target` header / routing discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
	Actor,
	Manager,
}

/// Error taxonomy group, shared so clients can match on it without pulling
/// in the full server-side error crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorGroup {
	User,
	Actor,
	Timeout,
	Conflict,
	Internal,
	Workflow,
}

impl ErrorGroup {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorGroup::User => "user",
			ErrorGroup::Actor => "actor",
			ErrorGroup::Timeout => "timeout",
			ErrorGroup::Conflict => "conflict",
			ErrorGroup::Internal => "internal",
			ErrorGroup::Workflow => "workflow",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoding_round_trips_through_str() {
		for enc in [Encoding::Json, Encoding::Cbor, Encoding::Bare] {
			assert_eq!(Encoding::from_str(enc.as_str()), Some(enc));
		}
	}

	#[test]
	fn unknown_encoding_is_none() {
		assert_eq!(Encoding::from_str("msgpack"), None);
	}
}
