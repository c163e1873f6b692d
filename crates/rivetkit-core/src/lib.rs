//! The RivetKit actor runtime: wire codec, versioned persistence, KV/SQL
//! substrates, the per-actor instance runtime, the manager/router, the
//! durable workflow engine, the driver abstraction, and the bearer-gated
//! inspector. See `SPEC_FULL.md` §4 for the module map this crate follows.

pub mod codec;
pub mod config;
pub mod def;
pub mod driver;
pub mod error;
pub mod id;
pub mod inspector;
pub mod instance;
pub mod kv;
pub mod logging;
pub mod manager;
pub mod persist;
pub mod workflow;

pub use config::Config;
pub use def::{ActorDef, ActorDefBuilder};
pub use driver::Driver;
pub use error::{BoxedError, RivetError};
pub use id::{ActorId, ActorKey};
pub use instance::context::ActionCtx;
pub use instance::ActorInstance;
pub use manager::{ActorKind, Manager};
