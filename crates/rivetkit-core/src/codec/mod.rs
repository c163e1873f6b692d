//! Wire codec (spec §4.A): encode/decode client<->actor envelopes in
//! `json`, `cbor`, or the length-prefixed, schema-versioned `bare` format.

mod bare;

use rivetkit_client_protocol::{ToClient, ToServer};
use rivetkit_shared_types::Encoding;

use crate::error::{BoxedError, InternalError};

pub use bare::CURRENT_ENVELOPE_VERSION;

pub fn encode_to_client(encoding: Encoding, env: &ToClient) -> Result<Vec<u8>, BoxedError> {
	match encoding {
		Encoding::Json => serde_json::to_vec(env)
			.map_err(|e| InternalError::SerializationError { detail: e.to_string() }.into()),
		Encoding::Cbor => {
			let mut buf = Vec::new();
			ciborium::into_writer(env, &mut buf)
				.map_err(|e| InternalError::SerializationError { detail: e.to_string() })?;
			Ok(buf)
		}
		Encoding::Bare => bare::encode_to_client(env),
	}
}

pub fn decode_from_server(encoding: Encoding, bytes: &[u8]) -> Result<ToServer, BoxedError> {
	match encoding {
		Encoding::Json => serde_json::from_slice(bytes)
			.map_err(|e| InternalError::SerializationError { detail: e.to_string() }.into()),
		Encoding::Cbor => ciborium::from_reader(bytes)
			.map_err(|e| InternalError::SerializationError { detail: e.to_string() }.into()),
		Encoding::Bare => bare::decode_from_server(bytes),
	}
}

/// Picks the WS subprotocol token (`rivet_encoding.<enc>`) and/or
/// `x-rivet-encoding` header value apart to land on a concrete [`Encoding`].
pub fn negotiate_encoding(requested: Option<&str>) -> Encoding {
	requested
		.and_then(Encoding::from_str)
		.unwrap_or(Encoding::Json)
}
