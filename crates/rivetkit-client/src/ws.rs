//! WebSocket half of the client: subprotocol negotiation + the action/event
//! envelope exchange described in `SPEC_FULL.md` §6.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rivetkit_client_protocol::{ActionId, ToClient, ToServer};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;
use crate::ClientConfig;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// A live WebSocket connection to one actor, speaking the `json` encoding.
///
/// Dispatches `ActionResponse`s back to whichever `call_action` future is
/// waiting on that id and forwards `Event`s to the channel returned by
/// [`ActorConnection::events`].
pub struct ActorConnection {
	sink: AsyncMutex<WsSink>,
	next_id: AtomicU64,
	pending: Arc<Mutex<HashMap<ActionId, oneshot::Sender<Result<Value, ClientError>>>>>,
	events_rx: Mutex<Option<mpsc::UnboundedReceiver<(String, Value)>>>,
	actor_id: String,
	connection_id: String,
}

impl ActorConnection {
	pub async fn connect(config: &ClientConfig, actor_id: &str, conn_params: Option<Value>) -> Result<Self, ClientError> {
		let url = config.base_url.replacen("http", "ws", 1) + &format!("/actors/{actor_id}/ws");
		let mut req = url.into_client_request()?;

		let mut protocols = vec!["rivet".to_string(), "rivet_target.actor".to_string(), format!("rivet_actor.{actor_id}")];
		if let Some(token) = &config.token {
			protocols.push(format!("rivet_token.{token}"));
		}
		protocols.push("rivet_encoding.json".to_string());
		if let Some(params) = conn_params {
			let encoded = base64::engine::general_purpose::STANDARD.encode(params.to_string());
			protocols.push(format!("rivet_conn_params.{encoded}"));
		}
		let header_value = HeaderValue::from_str(&protocols.join(", ")).map_err(|_| ClientError::Closed)?;
		req.headers_mut().insert("Sec-WebSocket-Protocol", header_value);

		let (stream, _response) = tokio_tungstenite::connect_async(req).await?;
		let (sink, mut source) = stream.split();

		let pending: Arc<Mutex<HashMap<ActionId, oneshot::Sender<Result<Value, ClientError>>>>> =
			Arc::new(Mutex::new(HashMap::new()));
		let (events_tx, events_rx) = mpsc::unbounded_channel();

		let init = Self::read_init(&mut source).await?;

		let conn = Self {
			sink: AsyncMutex::new(sink),
			next_id: AtomicU64::new(1),
			pending: pending.clone(),
			events_rx: Mutex::new(Some(events_rx)),
			actor_id: init.0,
			connection_id: init.1,
		};

		tokio::spawn(Self::pump(source, pending, events_tx));

		Ok(conn)
	}

	async fn read_init(source: &mut WsSource) -> Result<(String, String), ClientError> {
		loop {
			match source.next().await {
				Some(Ok(Message::Text(text))) => match serde_json::from_str::<ToClient>(&text)? {
					ToClient::Init { actor_id, connection_id } => return Ok((actor_id, connection_id)),
					ToClient::Error { group, code, message, .. } => return Err(ClientError::Server { group, code, message }),
					_ => continue,
				},
				Some(Ok(_)) => continue,
				Some(Err(err)) => return Err(err.into()),
				None => return Err(ClientError::Closed),
			}
		}
	}

	async fn pump(
		mut source: WsSource,
		pending: Arc<Mutex<HashMap<ActionId, oneshot::Sender<Result<Value, ClientError>>>>>,
		events_tx: mpsc::UnboundedSender<(String, Value)>,
	) {
		while let Some(frame) = source.next().await {
			let text = match frame {
				Ok(Message::Text(text)) => text,
				Ok(Message::Close(_)) | Err(_) => break,
				Ok(_) => continue,
			};
			let Ok(envelope) = serde_json::from_str::<ToClient>(&text) else {
				continue;
			};
			match envelope {
				ToClient::ActionResponse { id, output } => {
					if let Some(tx) = pending.lock().remove(&id) {
						let _ = tx.send(Ok(output));
					}
				}
				ToClient::Error { action_id: Some(id), group, code, message, .. } => {
					if let Some(tx) = pending.lock().remove(&id) {
						let _ = tx.send(Err(ClientError::Server { group, code, message }));
					}
				}
				ToClient::Event { name, args } => {
					let _ = events_tx.send((name, args));
				}
				ToClient::Error { .. } | ToClient::Init { .. } => {}
			}
		}
		for (_, tx) in pending.lock().drain() {
			let _ = tx.send(Err(ClientError::Closed));
		}
	}

	pub fn actor_id(&self) -> &str {
		&self.actor_id
	}

	pub fn connection_id(&self) -> &str {
		&self.connection_id
	}

	/// Takes ownership of the event stream. Can only be called once.
	pub fn events(&self) -> Option<mpsc::UnboundedReceiver<(String, Value)>> {
		self.events_rx.lock().take()
	}

	pub async fn call_action(&self, name: &str, args: Vec<Value>) -> Result<Value, ClientError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let envelope = ToServer::ActionRequest { id, name: name.to_string(), args };
		let text = serde_json::to_string(&envelope)?;
		if self.sink.lock().await.send(Message::Text(text.into())).await.is_err() {
			self.pending.lock().remove(&id);
			return Err(ClientError::Closed);
		}

		rx.await.map_err(|_| ClientError::Closed)?
	}

	pub async fn subscribe(&self, event_name: &str, subscribe: bool) -> Result<(), ClientError> {
		let envelope = ToServer::SubscriptionRequest { event_name: event_name.to_string(), subscribe };
		let text = serde_json::to_string(&envelope)?;
		self.sink.lock().await.send(Message::Text(text.into())).await?;
		Ok(())
	}

	pub async fn close(&self) -> Result<(), ClientError> {
		self.sink.lock().await.send(Message::Close(None)).await?;
		Ok(())
	}
}
