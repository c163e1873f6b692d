//! WebSocket transport (spec §6): subprotocol/header negotiation and the
//! axum <-> `UniversalWebSocket` bridge that lets `rivetkit_core::instance`
//! stay transport-neutral.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message as AxumMessage, WebSocket};
use axum::http::HeaderMap;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use rivetkit_client_protocol::{ToClient, ToServer};
use rivetkit_core::codec;
use rivetkit_core::error::BoxedError;
use rivetkit_core::id::ActorId;
use rivetkit_core::instance::connection::UniversalWebSocket;
use rivetkit_core::manager::Manager;
use rivetkit_shared_types::Encoding;
use serde_json::Value;
use tokio::sync::mpsc;

/// Parsed `Sec-WebSocket-Protocol` / `x-rivet-*` negotiation inputs. The
/// subprotocol tokens win when both are present, matching how browsers
/// (which can't set arbitrary WS headers) are expected to authenticate.
#[derive(Debug, Default, Clone)]
pub struct WsParams {
	pub token: Option<String>,
	pub encoding: Encoding,
	pub conn_params: Value,
	/// Set when the client is resuming a prior hibernatable connection
	/// (spec §4.D) rather than connecting fresh.
	pub reconnect_id: Option<String>,
}

pub fn parse_ws_params(headers: &HeaderMap) -> WsParams {
	let mut params = WsParams { conn_params: Value::Null, ..Default::default() };

	if let Some(raw) = headers.get("sec-websocket-protocol").and_then(|v| v.to_str().ok()) {
		for token in raw.split(',').map(|t| t.trim()) {
			apply_token(&mut params, token);
		}
	}

	if let Some(v) = header_str(headers, "x-rivet-token") {
		params.token.get_or_insert(v);
	}
	if let Some(enc) = header_str(headers, "x-rivet-encoding").as_deref().and_then(Encoding::from_str) {
		params.encoding = enc;
	}
	if params.conn_params.is_null() {
		if let Some(v) = header_str(headers, "x-rivet-conn-params") {
			params.conn_params = decode_conn_params(&v).unwrap_or(Value::Null);
		}
	}
	if let Some(v) = header_str(headers, "x-rivet-conn-id") {
		params.reconnect_id.get_or_insert(v);
	}

	params
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
	headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn decode_conn_params(encoded: &str) -> Option<Value> {
	let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
	serde_json::from_slice(&decoded).ok()
}

fn apply_token(params: &mut WsParams, token: &str) {
	if let Some(rest) = token.strip_prefix("rivet_token.") {
		params.token = Some(rest.to_string());
	} else if let Some(rest) = token.strip_prefix("rivet_encoding.") {
		if let Some(enc) = Encoding::from_str(rest) {
			params.encoding = enc;
		}
	} else if let Some(rest) = token.strip_prefix("rivet_conn_params.") {
		if let Some(value) = decode_conn_params(rest) {
			params.conn_params = value;
		}
	} else if let Some(rest) = token.strip_prefix("rivet_conn_id.") {
		params.reconnect_id = Some(rest.to_string());
	}
}

fn wrap(encoding: Encoding, bytes: Vec<u8>) -> AxumMessage {
	if encoding.is_text() {
		AxumMessage::Text(String::from_utf8_lossy(&bytes).into_owned().into())
	} else {
		AxumMessage::Binary(bytes.into())
	}
}

/// Bridges one axum [`WebSocket`] to [`UniversalWebSocket`]. Outgoing
/// envelopes are pushed onto an unbounded channel that a dedicated writer
/// task drains into the socket, so `send`/`close` calls from the actor's
/// executor task never contend with the reader loop for the sink half.
struct AxumSocket {
	encoding: Encoding,
	outbound: mpsc::UnboundedSender<AxumMessage>,
}

#[async_trait]
impl UniversalWebSocket for AxumSocket {
	async fn send(&self, envelope: &ToClient) -> Result<(), BoxedError> {
		let bytes = codec::encode_to_client(self.encoding, envelope)?;
		let _ = self.outbound.send(wrap(self.encoding, bytes));
		Ok(())
	}

	async fn close(&self, code: u16, reason: &str) {
		let _ = self.outbound.send(AxumMessage::Close(Some(CloseFrame {
			code,
			reason: reason.to_string().into(),
		})));
	}
}

/// Bridges one axum [`WebSocket`] to [`rivetkit_core::instance::raw::RawWebSocket`]
/// for `onWebSocket` (spec §4.D "raw WebSocket"): raw frames, not `ToClient`
/// envelopes. `recv` drains a channel the reader loop feeds, so `onWebSocket`
/// can poll it from a `Fn(ActionCtx, Arc<dyn RawWebSocket>)` handler body
/// without owning the axum stream directly.
struct AxumRawSocket {
	outbound: mpsc::UnboundedSender<AxumMessage>,
	inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait]
impl rivetkit_core::instance::raw::RawWebSocket for AxumRawSocket {
	async fn send(&self, bytes: Vec<u8>) -> Result<(), BoxedError> {
		let _ = self.outbound.send(AxumMessage::Binary(bytes.into()));
		Ok(())
	}

	async fn close(&self, code: u16, reason: &str) {
		let _ = self.outbound.send(AxumMessage::Close(Some(CloseFrame {
			code,
			reason: reason.to_string().into(),
		})));
	}

	async fn recv(&self) -> Option<Vec<u8>> {
		self.inbound.lock().await.recv().await
	}
}

/// Drives one upgraded WebSocket end to end: negotiates params (done by the
/// caller via [`parse_ws_params`]), runs `onBeforeConnect`/`onConnect`,
/// pumps inbound `ToServer` frames into action dispatch and subscription
/// bookkeeping, and runs `onDisconnect` when the socket closes.
pub async fn handle_socket(socket: WebSocket, manager: Arc<Manager>, actor_id: ActorId, params: WsParams) {
	let (mut sink, mut stream) = socket.split();
	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<AxumMessage>();
	let encoding = params.encoding;

	let writer = tokio::spawn(async move {
		while let Some(message) = outbound_rx.recv().await {
			if sink.send(message).await.is_err() {
				break;
			}
		}
	});

	let instance = match manager.get_for_id(actor_id).await {
		Ok(instance) => instance,
		Err(_) => {
			let _ = outbound_tx.send(AxumMessage::Close(None));
			drop(outbound_tx);
			let _ = writer.await;
			return;
		}
	};

	let socket_handle: Arc<dyn UniversalWebSocket> =
		Arc::new(AxumSocket { encoding, outbound: outbound_tx.clone() });

	let conn = match instance.connect(params.conn_params, socket_handle, params.reconnect_id).await {
		Ok(conn) => conn,
		Err(err) => {
			let wire = err.to_http_response_error();
			let envelope = ToClient::Error {
				group: wire.group,
				code: wire.code,
				message: wire.message,
				metadata: wire.metadata,
				action_id: None,
			};
			if let Ok(bytes) = codec::encode_to_client(encoding, &envelope) {
				let _ = outbound_tx.send(wrap(encoding, bytes));
			}
			drop(outbound_tx);
			let _ = writer.await;
			return;
		}
	};

	let init = ToClient::Init { actor_id: actor_id.to_string(), connection_id: conn.connection_id.clone() };
	if let Ok(bytes) = codec::encode_to_client(encoding, &init) {
		let _ = outbound_tx.send(wrap(encoding, bytes));
	}

	while let Some(Ok(message)) = stream.next().await {
		let bytes = match message {
			AxumMessage::Text(text) => text.as_bytes().to_vec(),
			AxumMessage::Binary(bytes) => bytes.to_vec(),
			AxumMessage::Close(_) => break,
			AxumMessage::Ping(_) | AxumMessage::Pong(_) => continue,
		};

		let envelope = match codec::decode_from_server(encoding, &bytes) {
			Ok(envelope) => envelope,
			Err(_) => continue,
		};

		match envelope {
			ToServer::ActionRequest { id, name, args } => {
				let response = match instance.call_action_on_conn(conn.clone(), &name, args).await {
					Ok(output) => ToClient::ActionResponse { id, output },
					Err(err) => {
						let wire = err.to_http_response_error();
						ToClient::Error {
							group: wire.group,
							code: wire.code,
							message: wire.message,
							metadata: wire.metadata,
							action_id: Some(id),
						}
					}
				};
				if let Ok(bytes) = codec::encode_to_client(encoding, &response) {
					let _ = outbound_tx.send(wrap(encoding, bytes));
				}
			}
			ToServer::SubscriptionRequest { event_name, subscribe } => {
				if subscribe {
					conn.subscribe(&event_name);
				} else {
					conn.unsubscribe(&event_name);
				}
			}
		}
	}

	instance.disconnect(conn.connection_id.clone()).await;
	drop(outbound_tx);
	let _ = writer.await;
}

/// Bridges an upgraded WebSocket straight to `onWebSocket` (spec §4.D "raw
/// WebSocket"), skipping envelope negotiation and action/subscription
/// dispatch entirely -- the hook owns the socket's whole lifetime.
pub async fn handle_raw_socket(socket: WebSocket, manager: Arc<Manager>, actor_id: ActorId) {
	let (mut sink, mut stream) = socket.split();
	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<AxumMessage>();
	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

	let writer = tokio::spawn(async move {
		while let Some(message) = outbound_rx.recv().await {
			if sink.send(message).await.is_err() {
				break;
			}
		}
	});

	let reader = tokio::spawn(async move {
		while let Some(Ok(message)) = stream.next().await {
			let bytes = match message {
				AxumMessage::Text(text) => text.as_bytes().to_vec(),
				AxumMessage::Binary(bytes) => bytes.to_vec(),
				AxumMessage::Close(_) => break,
				AxumMessage::Ping(_) | AxumMessage::Pong(_) => continue,
			};
			if inbound_tx.send(bytes).is_err() {
				break;
			}
		}
	});

	let instance = match manager.get_for_id(actor_id).await {
		Ok(instance) => instance,
		Err(_) => {
			let _ = outbound_tx.send(AxumMessage::Close(None));
			reader.abort();
			drop(outbound_tx);
			let _ = writer.await;
			return;
		}
	};

	let socket_handle: Arc<dyn rivetkit_core::instance::raw::RawWebSocket> =
		Arc::new(AxumRawSocket { outbound: outbound_tx.clone(), inbound: tokio::sync::Mutex::new(inbound_rx) });

	let _ = instance.raw_web_socket(socket_handle).await;

	reader.abort();
	drop(outbound_tx);
	let _ = writer.await;
}
