//! Workflow join-replay and rollback-order scenarios (spec §8), driven
//! through real actor actions rather than `WorkflowCtx` directly, to prove
//! the durable-execution primitives are actually reachable from action
//! bodies registered via [`rivetkit::ActorDef`].

mod common;

use rivetkit::{workflow, ActorDef, BoxedError, RegistryBuilder};
use rivetkit_client::{ClientConfig, HttpClient};
use rivetkit_core::error::WorkflowError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn workflow_err(ctrl: workflow::WorkflowControl) -> BoxedError {
    match ctrl {
        workflow::WorkflowControl::Suspended => WorkflowError::RollbackRequired.into(),
        workflow::WorkflowControl::Failed(err) => err,
    }
}

fn order_def(charge_calls: Arc<AtomicU32>, ship_calls: Arc<AtomicU32>) -> ActorDef {
    ActorDef::builder("order")
        .on_create(|_ctx, _input| Box::pin(async { Ok(json!(null)) }))
        .action("run", move |ctx, _args| {
            let charge_calls = charge_calls.clone();
            let ship_calls = ship_calls.clone();
            Box::pin(async move {
                let wf = workflow::WorkflowCtx::load(ctx.actor_id(), ctx.driver()).await?;

                let charge_calls = charge_calls.clone();
                let charge_branch: workflow::BranchFn = Box::new(move |_input| {
                    Box::pin(async move {
                        charge_calls.fetch_add(1, Ordering::Relaxed);
                        Ok(Value::from("charged"))
                    })
                });
                let ship_calls = ship_calls.clone();
                let ship_branch: workflow::BranchFn = Box::new(move |_input| {
                    Box::pin(async move {
                        ship_calls.fetch_add(1, Ordering::Relaxed);
                        Ok(Value::from("shipped"))
                    })
                });

                let outputs = wf
                    .join(vec![("charge".to_string(), Value::Null, charge_branch), ("ship".to_string(), Value::Null, ship_branch)])
                    .await
                    .map_err(workflow_err)?;
                Ok(Value::from(outputs))
            })
        })
        .build()
}

#[tokio::test]
async fn workflow_join_replay_does_not_rerun_branch_bodies() {
    let charge_calls = Arc::new(AtomicU32::new(0));
    let ship_calls = Arc::new(AtomicU32::new(0));
    let registry = RegistryBuilder::with_config(Default::default())
        .actor("order", order_def(charge_calls.clone(), ship_calls.clone()))
        .build();
    let base_url = common::spawn_server(registry).await;
    let http = HttpClient::new(ClientConfig::new(base_url));
    let actor_id = http.get_or_create("order", vec!["o1".to_string()], None).await.unwrap();

    let first = http.call_action(&actor_id, "run", vec![]).await.unwrap();
    assert_eq!(first, json!(["charged", "shipped"]));
    assert_eq!(charge_calls.load(Ordering::Relaxed), 1);
    assert_eq!(ship_calls.load(Ordering::Relaxed), 1);

    let second = http.call_action(&actor_id, "run", vec![]).await.unwrap();
    assert_eq!(second, json!(["charged", "shipped"]));
    assert_eq!(charge_calls.load(Ordering::Relaxed), 1, "replay must not re-run join branch bodies");
    assert_eq!(ship_calls.load(Ordering::Relaxed), 1, "replay must not re-run join branch bodies");
}

fn saga_def(reserve_calls: Arc<AtomicU32>, flight_calls: Arc<AtomicU32>, hotel_calls: Arc<AtomicU32>) -> ActorDef {
    ActorDef::builder("saga")
        .on_create(|_ctx, _input| Box::pin(async { Ok(json!(null)) }))
        .action("advance", move |ctx, args| {
            let reserve_calls = reserve_calls.clone();
            let flight_calls = flight_calls.clone();
            let hotel_calls = hotel_calls.clone();
            let force_rollback = args.first().and_then(Value::as_bool).unwrap_or(false);
            Box::pin(async move {
                let wf = workflow::WorkflowCtx::load(ctx.actor_id(), ctx.driver()).await?;

                wf.step("reserve", Value::Null, move |_| {
                    let reserve_calls = reserve_calls.clone();
                    async move {
                        reserve_calls.fetch_add(1, Ordering::Relaxed);
                        Ok(Value::from("reserved"))
                    }
                })
                .await
                .map_err(workflow_err)?;

                wf.rollback_checkpoint("after_reserve").await.map_err(workflow_err)?;

                wf.step("book_flight", Value::Null, move |_| {
                    let flight_calls = flight_calls.clone();
                    async move {
                        flight_calls.fetch_add(1, Ordering::Relaxed);
                        Ok(Value::from("flight-booked"))
                    }
                })
                .await
                .map_err(workflow_err)?;

                if force_rollback {
                    wf.rollback_to("after_reserve").await.map_err(workflow_err)?;
                    unreachable!("rollback_to never returns Ok");
                }

                wf.step("book_hotel", Value::Null, move |_| {
                    let hotel_calls = hotel_calls.clone();
                    async move {
                        hotel_calls.fetch_add(1, Ordering::Relaxed);
                        Ok(Value::from("hotel-booked"))
                    }
                })
                .await
                .map_err(workflow_err)?;

                Ok(Value::from("done"))
            })
        })
        .build()
}

#[tokio::test]
async fn rollback_to_reruns_only_steps_recorded_after_the_checkpoint() {
    let reserve_calls = Arc::new(AtomicU32::new(0));
    let flight_calls = Arc::new(AtomicU32::new(0));
    let hotel_calls = Arc::new(AtomicU32::new(0));
    let registry = RegistryBuilder::with_config(Default::default())
        .actor("saga", saga_def(reserve_calls.clone(), flight_calls.clone(), hotel_calls.clone()))
        .build();
    let base_url = common::spawn_server(registry).await;
    let http = HttpClient::new(ClientConfig::new(base_url));
    let actor_id = http.get_or_create("saga", vec!["s1".to_string()], None).await.unwrap();

    // First call reserves, checkpoints, books a flight, then rolls back to
    // the checkpoint -- truncating the flight booking from history.
    assert!(http.call_action(&actor_id, "advance", vec![Value::Bool(true)]).await.is_err());
    assert_eq!(reserve_calls.load(Ordering::Relaxed), 1);
    assert_eq!(flight_calls.load(Ordering::Relaxed), 1);
    assert_eq!(hotel_calls.load(Ordering::Relaxed), 0);

    // Second call replays: "reserve" (before the checkpoint) must not
    // re-run, "book_flight" (after it, truncated by the rollback) must.
    let outcome = http.call_action(&actor_id, "advance", vec![Value::Bool(false)]).await.unwrap();
    assert_eq!(outcome, Value::from("done"));
    assert_eq!(reserve_calls.load(Ordering::Relaxed), 1, "work recorded before the checkpoint must not re-run");
    assert_eq!(flight_calls.load(Ordering::Relaxed), 2, "work truncated by rollback_to must re-run");
    assert_eq!(hotel_calls.load(Ordering::Relaxed), 1);
}
