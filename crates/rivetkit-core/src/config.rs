//! Environment-driven configuration (spec §6), modeled on the teacher's
//! `rivet-config`: every field is `Option<T>` so a partially-set config
//! merges cleanly, and every field has an accessor method supplying the
//! default instead of baking defaults into `Default::default()`.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct Config {
	pub endpoint: Option<String>,
	pub token: Option<String>,
	pub namespace: Option<String>,
	pub runner: Option<String>,
	pub total_slots: Option<u32>,
	pub runner_key: Option<String>,
	pub inspector_token: Option<String>,
	pub inspector_disable: Option<bool>,
	pub storage_path: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_target: Option<bool>,
	pub log_timestamp: Option<bool>,
	pub port: Option<u16>,
	pub hostname: Option<String>,
}

impl Config {
	pub fn from_env() -> Self {
		Self {
			endpoint: env_string("RIVET_ENDPOINT"),
			token: env_string("RIVET_TOKEN"),
			namespace: env_string("RIVET_NAMESPACE"),
			runner: env_string("RIVET_RUNNER"),
			total_slots: env_parsed("RIVET_TOTAL_SLOTS"),
			runner_key: env_string("RIVET_RUNNER_KEY"),
			inspector_token: env_string("RIVETKIT_INSPECTOR_TOKEN"),
			inspector_disable: env_bool("RIVETKIT_INSPECTOR_DISABLE"),
			storage_path: env_string("RIVETKIT_STORAGE_PATH").map(PathBuf::from),
			log_level: env_string("RIVET_LOG_LEVEL"),
			log_target: env_bool("RIVET_LOG_TARGET"),
			log_timestamp: env_bool("RIVET_LOG_TIMESTAMP"),
			port: env_parsed("PORT"),
			hostname: env_string("HOSTNAME"),
		}
	}

	pub fn inspector_enabled(&self) -> bool {
		!self.inspector_disable.unwrap_or(false)
	}

	pub fn storage_path(&self) -> PathBuf {
		self.storage_path
			.clone()
			.unwrap_or_else(|| PathBuf::from("./rivetkit-data"))
	}

	pub fn log_level(&self) -> String {
		self.log_level.clone().unwrap_or_else(|| "info".to_string())
	}

	pub fn port(&self) -> u16 {
		self.port.unwrap_or(8080)
	}

	pub fn hostname(&self) -> String {
		self.hostname.clone().unwrap_or_else(|| "127.0.0.1".to_string())
	}

	/// Default action deadline (spec §5 "per-call timeouts").
	pub fn action_timeout_ms(&self) -> u64 {
		5_000
	}

	/// Default `sleepTimeout` used when an actor definition omits one.
	pub fn default_sleep_timeout_ms(&self) -> u64 {
		30_000
	}

	/// How often the manager sweeps for idle instances to hibernate (spec
	/// §4.D). Independent of any one actor's `sleepTimeout` -- a short
	/// timeout just means an idle actor waits up to one interval longer than
	/// its nominal deadline before eviction.
	pub fn hibernation_sweep_interval_ms(&self) -> u64 {
		10_000
	}
}

fn env_string(key: &str) -> Option<String> {
	env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
	env_string(key).map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
	env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_apply_when_unset() {
		let config = Config::default();
		assert_eq!(config.port(), 8080);
		assert!(config.inspector_enabled());
	}

	#[test]
	fn inspector_disable_flips_enabled() {
		let mut config = Config::default();
		config.inspector_disable = Some(true);
		assert!(!config.inspector_enabled());
	}
}
