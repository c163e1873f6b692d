//! Driver abstraction (spec §4.G): bundles the KV substrate with
//! placement (which process owns an actor) and alarm (wake-at-timestamp)
//! concerns into one object the manager and instance runtime depend on.
//! Three concretions share the same three traits: in-process `memory`,
//! durable single-node `file` (sled), and a stub `engine` client toward
//! an external cluster — deliberately thin, per spec.md's non-goal of
//! specifying that cluster's internals.

pub mod alarm;
pub mod engine;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::BoxedError;
use crate::id::ActorId;
use crate::kv::KvDriver;

/// Decides whether this process is responsible for running `actor_id`.
/// The in-process drivers are trivially authoritative; [`engine::EngineDriver`]
/// would delegate to the cluster's placement service.
#[async_trait]
pub trait PlacementDriver: Send + Sync {
	async fn claim(&self, actor_id: ActorId) -> Result<bool, BoxedError>;
	async fn release(&self, actor_id: ActorId) -> Result<(), BoxedError>;
}

/// Wake-at-timestamp scheduling, backing scheduled events and sleep/hibernate
/// timers (spec §4.D).
#[async_trait]
pub trait AlarmDriver: Send + Sync {
	async fn set_alarm(&self, actor_id: ActorId, at_ms: i64) -> Result<(), BoxedError>;
	async fn clear_alarm(&self, actor_id: ActorId) -> Result<(), BoxedError>;
	/// New subscribers only observe alarms that fire after they subscribe.
	fn subscribe(&self) -> broadcast::Receiver<ActorId>;
}

/// A driver bundles all three concerns; the manager and instance runtime
/// depend on this rather than on the individual traits.
pub trait Driver: KvDriver + PlacementDriver + AlarmDriver {}
impl<T: KvDriver + PlacementDriver + AlarmDriver> Driver for T {}
