//! HTTP half of the client: one method per route in `SPEC_FULL.md` §6.

use reqwest::{Method, StatusCode};
use rivetkit_client_protocol::{
	HttpActionRequest, HttpActionResponse, HttpCreateRequest, HttpCreateResponse, HttpListQuery, HttpListResponse,
	HttpQueueSendRequest, HttpQueueSendResponse, HttpResolveRequest, HttpResolveResponse, HttpResponseError,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;
use crate::ClientConfig;

#[derive(Clone)]
pub struct HttpClient {
	http: reqwest::Client,
	config: ClientConfig,
}

impl HttpClient {
	pub fn new(config: ClientConfig) -> Self {
		Self { http: reqwest::Client::new(), config }
	}

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

	pub async fn resolve(&self, name: &str, key: Vec<String>) -> Result<String, ClientError> {
		let body = HttpResolveRequest { key };
		let resp: HttpResolveResponse = self
			.request(Method::POST, &format!("/actors/{name}/resolve"), Some(&body))
			.await?;
		Ok(resp.actor_id)
	}

	pub async fn create(&self, name: &str, key: Vec<String>, input: Option<Value>) -> Result<String, ClientError> {
		let body = HttpCreateRequest { key, input };
		let resp: HttpCreateResponse = self.request(Method::POST, &format!("/actors/{name}/create"), Some(&body)).await?;
		Ok(resp.actor_id)
	}

	pub async fn get_or_create(&self, name: &str, key: Vec<String>, input: Option<Value>) -> Result<String, ClientError> {
		let body = HttpCreateRequest { key, input };
		let resp: HttpCreateResponse =
			self.request(Method::POST, &format!("/actors/{name}/get-or-create"), Some(&body)).await?;
		Ok(resp.actor_id)
	}

	pub async fn call_action(&self, actor_id: &str, name: &str, args: Vec<Value>) -> Result<Value, ClientError> {
		let body = HttpActionRequest { args };
		let resp: HttpActionResponse = self
			.request(Method::POST, &format!("/actors/{actor_id}/actions/{name}"), Some(&body))
			.await?;
		Ok(resp.output)
	}

	pub async fn queue_send(
		&self,
		actor_id: &str,
		name: &str,
		body: Value,
		wait: bool,
		timeout: Option<u64>,
	) -> Result<HttpQueueSendResponse, ClientError> {
		let req = HttpQueueSendRequest { body, name: Some(name.to_string()), wait, timeout };
		self.request(Method::POST, &format!("/actors/{actor_id}/queue/{name}"), Some(&req)).await
	}

	pub async fn destroy(&self, actor_id: &str) -> Result<(), ClientError> {
		self.request_no_body(Method::DELETE, &format!("/actors/{actor_id}")).await
	}

	pub async fn list(&self, name: &str, prefix: Option<String>, cursor: Option<String>) -> Result<HttpListResponse, ClientError> {
		let query = HttpListQuery { prefix, cursor };
		let url = format!("{}/actors/{name}", self.config.base_url);
		let mut req = self.http.get(&url).query(&query);
		req = self.authorize(req);
		let resp = req.send().await?;
		self.parse(resp).await
	}

	fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match &self.config.token {
			Some(token) => req.bearer_auth(token),
			None => req,
		}
	}

	async fn request<B: Serialize, T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		body: Option<&B>,
	) -> Result<T, ClientError> {
		let url = format!("{}{path}", self.config.base_url);
		let mut req = self.http.request(method, &url);
		req = self.authorize(req);
		if let Some(body) = body {
			req = req.json(body);
		}
		let resp = req.send().await?;
		self.parse(resp).await
	}

	async fn request_no_body(&self, method: Method, path: &str) -> Result<(), ClientError> {
		let url = format!("{}{path}", self.config.base_url);
		let mut req = self.http.request(method, &url);
		req = self.authorize(req);
		let resp = req.send().await?;
		if resp.status().is_success() {
			Ok(())
		} else {
			Err(self.error_from(resp).await)
		}
	}

	async fn parse<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, ClientError> {
		if resp.status().is_success() {
			Ok(resp.json().await?)
		} else {
			Err(self.error_from(resp).await)
		}
	}

	async fn error_from(&self, resp: reqwest::Response) -> ClientError {
		let status = resp.status();
		match resp.json::<HttpResponseError>().await {
			Ok(err) => err.into(),
			Err(_) => ClientError::Server {
				group: "internal".to_string(),
				code: "unknown".to_string(),
				message: format!("unexpected status {status}", status = status_text(status)),
			},
		}
	}
}

fn status_text(status: StatusCode) -> String {
	status.to_string()
}
