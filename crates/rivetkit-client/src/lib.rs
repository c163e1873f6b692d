//! Rust client SDK for RivetKit (spec §4.I "added"): a thin HTTP + WebSocket
//! consumer of the route table in `SPEC_FULL.md` §6, kept in the workspace
//! as the reference client the integration tests drive against a running
//! `rivetkit::Registry` — the same role the teacher's own `packages/client`
//! plays against its `engine/packages/api-public` routes.
//!
//! Only the `json` wire encoding is implemented (the default negotiated
//! encoding); `cbor`/`bare` are server-side concerns this client doesn't
//! need to exercise (see DESIGN.md).

mod error;
mod http;
mod ws;

pub use error::ClientError;
pub use http::HttpClient;
pub use ws::ActorConnection;

/// Where to reach a running `rivetkit` host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	pub base_url: String,
	pub token: Option<String>,
}

impl ClientConfig {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into(), token: None }
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}
}
