//! Length-prefixed, schema-versioned binary encoding (spec §4.A/§4.B).
//!
//! BARE (via `serde_bare`) has no native representation for an arbitrary
//! JSON value, so action args/output/event payloads are carried as nested
//! CBOR blobs inside an otherwise-plain BARE union. This keeps the framing
//! schema-stable (the thing migrations version) while payload shapes stay
//! free-form, matching the split in spec §4.B between "current-version +
//! current-format" framing and opaque user data.

use rivetkit_client_protocol::{ActionId, ToClient, ToServer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BoxedError, InternalError};

pub const CURRENT_ENVELOPE_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
enum WireToClient {
	Init {
		actor_id: String,
		connection_id: String,
	},
	Error {
		group: String,
		code: String,
		message: String,
		metadata: Option<Vec<u8>>,
		action_id: Option<ActionId>,
	},
	ActionResponse {
		id: ActionId,
		output: Vec<u8>,
	},
	Event {
		name: String,
		args: Vec<u8>,
	},
}

#[derive(Serialize, Deserialize)]
enum WireToServer {
	ActionRequest {
		id: ActionId,
		name: String,
		args: Vec<Vec<u8>>,
	},
	SubscriptionRequest {
		event_name: String,
		subscribe: bool,
	},
}

fn cbor_encode(value: &Value) -> Result<Vec<u8>, BoxedError> {
	let mut buf = Vec::new();
	ciborium::into_writer(value, &mut buf)
		.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;
	Ok(buf)
}

fn cbor_decode(bytes: &[u8]) -> Result<Value, BoxedError> {
	ciborium::from_reader(bytes)
		.map_err(|e| InternalError::SerializationError { detail: e.to_string() }.into())
}

fn to_wire(env: &ToClient) -> Result<WireToClient, BoxedError> {
	Ok(match env {
		ToClient::Init { actor_id, connection_id } => WireToClient::Init {
			actor_id: actor_id.clone(),
			connection_id: connection_id.clone(),
		},
		ToClient::Error { group, code, message, metadata, action_id } => WireToClient::Error {
			group: group.clone(),
			code: code.clone(),
			message: message.clone(),
			metadata: metadata.as_ref().map(cbor_encode).transpose()?,
			action_id: *action_id,
		},
		ToClient::ActionResponse { id, output } => WireToClient::ActionResponse {
			id: *id,
			output: cbor_encode(output)?,
		},
		ToClient::Event { name, args } => WireToClient::Event {
			name: name.clone(),
			args: cbor_encode(args)?,
		},
	})
}

fn from_wire(wire: WireToClient) -> Result<ToClient, BoxedError> {
	Ok(match wire {
		WireToClient::Init { actor_id, connection_id } => ToClient::Init { actor_id, connection_id },
		WireToClient::Error { group, code, message, metadata, action_id } => ToClient::Error {
			group,
			code,
			message,
			metadata: metadata.as_deref().map(cbor_decode).transpose()?,
			action_id,
		},
		WireToClient::ActionResponse { id, output } => ToClient::ActionResponse {
			id,
			output: cbor_decode(&output)?,
		},
		WireToClient::Event { name, args } => ToClient::Event { name, args: cbor_decode(&args)? },
	})
}

pub fn encode_to_client(env: &ToClient) -> Result<Vec<u8>, BoxedError> {
	let wire = to_wire(env)?;
	let body = serde_bare::to_vec(&wire)
		.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;
	let mut out = Vec::with_capacity(2 + body.len());
	out.extend_from_slice(&CURRENT_ENVELOPE_VERSION.to_le_bytes());
	out.extend_from_slice(&body);
	Ok(out)
}

pub fn decode_from_server(bytes: &[u8]) -> Result<ToServer, BoxedError> {
	if bytes.len() < 2 {
		return Err(InternalError::SerializationError {
			detail: "bare envelope shorter than version prefix".into(),
		}
		.into());
	}
	let version = u16::from_le_bytes([bytes[0], bytes[1]]);
	let body = &bytes[2..];

	// Only one schema version exists today; a future bump would insert a
	// migration step here (old WireToServer -> current WireToServer) before
	// falling through, the same chain shape as the persistence handlers.
	if version != CURRENT_ENVELOPE_VERSION {
		return Err(InternalError::SerializationError {
			detail: format!("unsupported bare envelope version {version}"),
		}
		.into());
	}

	let wire: WireToServer = serde_bare::from_slice(body)
		.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;

	Ok(match wire {
		WireToServer::ActionRequest { id, name, args } => ToServer::ActionRequest {
			id,
			name,
			args: args
				.iter()
				.map(|a| cbor_decode(a))
				.collect::<Result<Vec<_>, _>>()?,
		},
		WireToServer::SubscriptionRequest { event_name, subscribe } => {
			ToServer::SubscriptionRequest { event_name, subscribe }
		}
	})
}
