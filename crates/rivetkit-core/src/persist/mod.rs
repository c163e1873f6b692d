//! Versioned persistence (spec §4.B): every record written to the KV
//! substrate is prefixed with a 2-byte LE current-version tag. Reading
//! dispatches on that tag to the matching decoder, then runs every
//! registered `from -> to` migration up to the current version. Writing
//! always emits the current version.

pub mod actor;
pub mod conn;
pub mod workflow;

use crate::error::{BoxedError, InternalError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// A single forward migration from the record shape at `from_version` to
/// the next version's shape, both represented as CBOR values so the
/// migration function doesn't need a concrete type for "old".
pub type Migration = Box<dyn Fn(ciborium::value::Value) -> ciborium::value::Value + Send + Sync>;

/// Owns one record kind's current version, (de)serializer, and migration
/// chain. `T` is always the *current* Rust type; older wire versions are
/// upgraded to it before `T::deserialize` ever sees them.
pub struct VersionedHandler<T> {
	current_version: u16,
	migrations: BTreeMap<u16, Migration>,
	_marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> VersionedHandler<T> {
	pub fn new(current_version: u16) -> Self {
		Self {
			current_version,
			migrations: BTreeMap::new(),
			_marker: std::marker::PhantomData,
		}
	}

	/// Registers the migration that upgrades records written at
	/// `from_version` to `from_version + 1`.
	pub fn with_migration(mut self, from_version: u16, migrate: Migration) -> Self {
		self.migrations.insert(from_version, migrate);
		self
	}

	pub fn encode(&self, value: &T) -> Result<Vec<u8>, BoxedError> {
		let mut body = Vec::new();
		ciborium::into_writer(value, &mut body)
			.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;
		let mut out = Vec::with_capacity(2 + body.len());
		out.extend_from_slice(&self.current_version.to_le_bytes());
		out.extend_from_slice(&body);
		Ok(out)
	}

	pub fn decode(&self, bytes: &[u8]) -> Result<T, BoxedError> {
		if bytes.len() < 2 {
			return Err(InternalError::SerializationError {
				detail: "persisted record shorter than version prefix".into(),
			}
			.into());
		}
		let mut version = u16::from_le_bytes([bytes[0], bytes[1]]);
		let mut value: ciborium::value::Value = ciborium::from_reader(&bytes[2..])
			.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;

		while version < self.current_version {
			let Some(migrate) = self.migrations.get(&version) else {
				return Err(InternalError::SerializationError {
					detail: format!(
						"no migration registered from version {version} to {}",
						version + 1
					),
				}
				.into());
			};
			value = migrate(value);
			version += 1;
		}

		value
			.deserialize()
			.map_err(|e: ciborium::value::Error| {
				InternalError::SerializationError { detail: e.to_string() }.into()
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::{Deserialize, Serialize};

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct V2 {
		count: i64,
		label: String,
	}

	#[test]
	fn migration_upgrades_old_version_on_read() {
		#[derive(Serialize)]
		struct V1 {
			count: i64,
		}

		let v1_handler: VersionedHandler<V1> = VersionedHandler::new(1);
		let old_bytes = v1_handler.encode(&V1 { count: 5 }).unwrap();

		let v2_handler = VersionedHandler::<V2>::new(2).with_migration(
			1,
			Box::new(|mut value| {
				if let ciborium::value::Value::Map(entries) = &mut value {
					entries.push((
						ciborium::value::Value::Text("label".into()),
						ciborium::value::Value::Text("unlabeled".into()),
					));
				}
				value
			}),
		);

		let decoded = v2_handler.decode(&old_bytes).unwrap();
		assert_eq!(
			decoded,
			V2 { count: 5, label: "unlabeled".into() }
		);
	}

	#[test]
	fn round_trips_current_version_without_migration() {
		let handler = VersionedHandler::<V2>::new(2);
		let value = V2 { count: 1, label: "x".into() };
		let bytes = handler.encode(&value).unwrap();
		assert_eq!(handler.decode(&bytes).unwrap(), value);
	}
}
