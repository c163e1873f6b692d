use rivetkit_client_protocol::HttpResponseError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),
	#[error("websocket error: {0}")]
	WebSocket(#[from] tungstenite::Error),
	#[error("malformed envelope: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("{group}/{code}: {message}")]
	Server { group: String, code: String, message: String },
	#[error("connection closed")]
	Closed,
}

impl From<HttpResponseError> for ClientError {
	fn from(err: HttpResponseError) -> Self {
		ClientError::Server { group: err.group, code: err.code, message: err.message }
	}
}
