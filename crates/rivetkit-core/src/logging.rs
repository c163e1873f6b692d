//! Structured logging setup, mirroring how the teacher's `engine` binary
//! wires up `tracing-subscriber` from config rather than a bare
//! `println!`/`env_logger` default.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

/// Installs a global `tracing` subscriber. Safe to call more than once;
/// later calls are no-ops (mirrors `tracing::subscriber::set_global_default`
/// semantics used across the teacher's binaries).
pub fn init(config: &Config) {
	let filter = EnvFilter::try_new(config.log_level()).unwrap_or_else(|_| EnvFilter::new("info"));

	let fmt_layer = fmt::layer()
		.with_target(config.log_target.unwrap_or(false))
		.with_ansi(true);

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(fmt_layer)
		.try_init();
}
