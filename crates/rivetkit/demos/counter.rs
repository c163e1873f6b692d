//! Minimal counter actor, served over HTTP/WS on `127.0.0.1:8080`.
//!
//! Run with `cargo run --example counter -p rivetkit`, then:
//!   curl -X POST localhost:8080/actors/counter/get-or-create -d '{"key":["a"]}'
//!   curl -X POST localhost:8080/actors/<id>/actions/increment -d '{"args":[]}'

use rivetkit::{ActorDef, Config, RegistryBuilder};
use serde_json::{json, Value};

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
        .action("getCount", |ctx, _args| Box::pin(async move { Ok(ctx.state()) }))
        .event("newCount")
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    rivetkit::logging::init(&config);

    let registry = RegistryBuilder::with_config(config)
        .actor("counter", counter())
        .build();

    registry.serve().await?;
    Ok(())
}
