//! Queue send timeout scenario (spec §8): a `wait: true` send with no actor
//! ever completing it resolves to `TimedOut` once its timeout elapses,
//! rather than hanging the HTTP request forever.

mod common;

use rivetkit::{ActorDef, RegistryBuilder};
use rivetkit_client::{ClientConfig, HttpClient};
use rivetkit_client_protocol::HttpQueueSendResponse;
use serde_json::json;

fn mailbox() -> ActorDef {
    ActorDef::builder("mailbox")
        .on_create(|_ctx, _input| Box::pin(async { Ok(json!(null)) }))
        .queue("inbox")
        .build()
}

#[tokio::test]
async fn queue_send_times_out_when_nobody_completes_it() {
    let registry = RegistryBuilder::with_config(Default::default()).actor("mailbox", mailbox()).build();
    let base_url = common::spawn_server(registry).await;
    let http = HttpClient::new(ClientConfig::new(base_url));

    let actor_id = http.get_or_create("mailbox", vec!["m1".to_string()], None).await.unwrap();

    let response = http
        .queue_send(&actor_id, "inbox", json!({"hello": "world"}), true, Some(50))
        .await
        .unwrap();

    assert!(matches!(response, HttpQueueSendResponse::TimedOut));
}

#[tokio::test]
async fn queue_send_without_wait_returns_immediately() {
    let registry = RegistryBuilder::with_config(Default::default()).actor("mailbox", mailbox()).build();
    let base_url = common::spawn_server(registry).await;
    let http = HttpClient::new(ClientConfig::new(base_url));

    let actor_id = http.get_or_create("mailbox", vec!["m2".to_string()], None).await.unwrap();

    let response = http.queue_send(&actor_id, "inbox", json!({"hello": "world"}), false, None).await.unwrap();
    assert!(matches!(response, HttpQueueSendResponse::TimedOut));
}
