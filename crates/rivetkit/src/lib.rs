//! Host integration for RivetKit actors (spec §4.I): `Registry::builder()`
//! collects actor definitions, resolves a driver from `Config`, and hands
//! back a `Registry` that either binds its own listener (`serve()`) or
//! hands out an axum `Router` to mount on an arbitrary host (`handler()`).

mod registry;
mod server;
mod ws;

pub use registry::{Registry, RegistryBuilder};
pub use rivetkit_core::config::Config;
pub use rivetkit_core::def::{ActorDef, ActorDefBuilder};
pub use rivetkit_core::error::{BoxedError, RivetError};
pub use rivetkit_core::instance::context::ActionCtx;
pub use rivetkit_core::logging;
pub use rivetkit_core::workflow;
