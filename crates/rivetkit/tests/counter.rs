//! End-to-end counter scenario (spec §8): `getOrCreate`, WS `subscribe`,
//! `increment` over both HTTP and WS, and broadcast delivery to subscribers.

mod common;

use rivetkit::{ActorDef, RegistryBuilder};
use rivetkit_client::{ActorConnection, ClientConfig, HttpClient};
use serde_json::{json, Value};
use std::time::Duration;

fn counter() -> ActorDef {
    ActorDef::builder("counter")
        .on_create(|_ctx, _input| Box::pin(async { Ok(json!(0)) }))
        .action("increment", |ctx, _args| {
            Box::pin(async move {
                let next = ctx.state().as_i64().unwrap_or(0) + 1;
                ctx.set_state(Value::from(next));
                ctx.broadcast("newCount", Value::from(next)).await?;
                Ok(Value::from(next))
            })
        })
        .event("newCount")
        .build()
}

#[tokio::test]
async fn get_or_create_subscribe_increment_broadcasts() {
    let registry = RegistryBuilder::with_config(Default::default()).actor("counter", counter()).build();
    let base_url = common::spawn_server(registry).await;
    let config = ClientConfig::new(base_url);
    let http = HttpClient::new(config.clone());

    let actor_id = http.get_or_create("counter", vec!["room-1".to_string()], None).await.unwrap();
    let again = http.get_or_create("counter", vec!["room-1".to_string()], None).await.unwrap();
    assert_eq!(actor_id, again, "getOrCreate must be idempotent for the same key");

    let conn = ActorConnection::connect(&config, &actor_id, None).await.unwrap();
    conn.subscribe("newCount", true).await.unwrap();
    let mut events = conn.events().expect("events channel should be available exactly once");

    let output = conn.call_action("increment", vec![]).await.unwrap();
    assert_eq!(output, Value::from(1));

    let (name, payload) = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("broadcast should arrive before the timeout")
        .expect("events channel should still be open");
    assert_eq!(name, "newCount");
    assert_eq!(payload, Value::from(1));

    // A second increment over plain HTTP still lands on the same running
    // instance and still broadcasts to the WS subscriber.
    let http_output = http.call_action(&actor_id, "increment", vec![]).await.unwrap();
    assert_eq!(http_output, Value::from(2));

    let (_, payload) = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("second broadcast should arrive")
        .expect("events channel should still be open");
    assert_eq!(payload, Value::from(2));
}
