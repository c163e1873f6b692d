//! Host-facing actor registry (spec §4.I): collects `ActorDef`s at
//! startup, picks a driver from `Config` (engine endpoint > file path >
//! in-memory), and builds the `Manager` that [`crate::server`] routes
//! HTTP/WS traffic into.

use std::sync::Arc;

use rivetkit_core::config::Config;
use rivetkit_core::def::ActorDef;
use rivetkit_core::driver::engine::EngineDriver;
use rivetkit_core::driver::file::FileDriver;
use rivetkit_core::driver::memory::MemoryDriver;
use rivetkit_core::driver::Driver;
use rivetkit_core::error::BoxedError;
use rivetkit_core::manager::{ActorKind, Manager};
use rivetkit_sqlite::Migration;

pub struct RegistryBuilder {
	config: Config,
	driver: Arc<dyn Driver>,
	manager: Manager,
}

impl RegistryBuilder {
	pub fn new() -> Self {
		Self::with_config(Config::from_env())
	}

	pub fn with_config(config: Config) -> Self {
		let driver = build_driver(&config);
		Self { config, driver, manager: Manager::new() }
	}

	/// Registers an actor with no embedded SQL database.
	pub fn actor(mut self, name: impl Into<String>, def: ActorDef) -> Self {
		let name = name.into();
		let sleep_timeout_ms = resolve_sleep_timeout_ms(&def, &self.config);
		self.manager.register(
			name,
			ActorKind {
				def: Arc::new(def),
				driver: self.driver.clone(),
				sql_migrations: Vec::new(),
				sql_storage_path: None,
				sleep_timeout_ms,
			},
		);
		self
	}

	/// Registers an actor with an embedded SQL database (spec §4.I's
	/// "optional embedded-DB descriptor"); each instance gets its own file
	/// under `<storage_path>/sql/<name>/<actorId>.sqlite3`.
	pub fn actor_with_sql(mut self, name: impl Into<String>, def: ActorDef, migrations: Vec<Box<dyn Migration>>) -> Self {
		let name = name.into();
		let sql_storage_path = Some(self.config.storage_path().join("sql").join(&name));
		let sleep_timeout_ms = resolve_sleep_timeout_ms(&def, &self.config);
		self.manager.register(
			name,
			ActorKind {
				def: Arc::new(def),
				driver: self.driver.clone(),
				sql_migrations: migrations,
				sql_storage_path,
				sleep_timeout_ms,
			},
		);
		self
	}

	pub fn build(self) -> Registry {
		let manager = Arc::new(self.manager);
		manager.clone().spawn_hibernation_sweep(std::time::Duration::from_millis(self.config.hibernation_sweep_interval_ms()));
		Registry { config: Arc::new(self.config), manager }
	}
}

fn resolve_sleep_timeout_ms(def: &ActorDef, config: &Config) -> i64 {
	def.sleep_timeout_ms.map(|ms| ms as i64).unwrap_or(config.default_sleep_timeout_ms() as i64)
}

impl Default for RegistryBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone)]
pub struct Registry {
	config: Arc<Config>,
	manager: Arc<Manager>,
}

impl Registry {
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::new()
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn manager(&self) -> Arc<Manager> {
		self.manager.clone()
	}

	/// The full HTTP/WS router (route table + `/inspect`), for mounting
	/// under an arbitrary host instead of calling [`Registry::serve`]
	/// (spec §4.I's `.handler()`).
	pub fn handler(&self) -> axum::Router {
		crate::server::router(self.manager.clone(), &self.config)
	}

	/// Binds `config.hostname():config.port()` and serves until the
	/// listener errors or the process is killed.
	pub async fn serve(self) -> Result<(), BoxedError> {
		crate::server::serve(self).await
	}
}

fn build_driver(config: &Config) -> Arc<dyn Driver> {
	if let Some(endpoint) = &config.endpoint {
		Arc::new(EngineDriver::new(endpoint.clone(), config.token.clone()))
	} else if config.storage_path.is_some() {
		match FileDriver::open(config.storage_path()) {
			Ok(driver) => Arc::new(driver),
			Err(err) => {
				tracing::error!(%err, "failed to open file driver, falling back to the in-memory driver");
				Arc::new(MemoryDriver::new())
			}
		}
	} else {
		Arc::new(MemoryDriver::new())
	}
}
