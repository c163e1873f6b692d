//! Per-actor embedded SQL substrate (spec §4.C).
//!
//! Each actor that declares a `db` descriptor gets exactly one
//! [`SqlDb`], opened lazily on first use and kept for the actor's whole
//! in-memory lifetime (it is closed on sleep along with everything else
//! non-persisted). Concurrency discipline matches the spec: a single writer
//! at a time, enforced here with a `parking_lot::Mutex` around the
//! connection rather than relying on SQLite's own locking, so a contended
//! writer blocks instead of surfacing spurious `SQLITE_BUSY`.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Value};

/// Where a [`SqlDb`]'s backing file lives.
#[derive(Debug, Clone)]
pub enum SqlPath {
	/// Non-persistent, used by the in-memory driver and tests.
	Memory,
	File(PathBuf),
}

/// A single forward migration, run once at the version it declares.
pub trait Migration: Send + Sync {
	fn version(&self) -> i64;
	fn migrate(&self, conn: &Connection) -> rusqlite::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum SqlError {
	#[error("database is locked")]
	Locked,
	#[error("sql error: {0}")]
	Other(String),
}

impl From<rusqlite::Error> for SqlError {
	fn from(err: rusqlite::Error) -> Self {
		if let rusqlite::Error::SqliteFailure(e, _) = &err {
			if e.code == rusqlite::ErrorCode::DatabaseBusy
				|| e.code == rusqlite::ErrorCode::DatabaseLocked
			{
				return SqlError::Locked;
			}
		}
		SqlError::Other(err.to_string())
	}
}

/// A handle to one actor's embedded SQL database.
#[derive(Clone)]
pub struct SqlDb {
	conn: Arc<Mutex<Connection>>,
}

impl SqlDb {
	/// Opens the database (creating it if needed) and runs every migration
	/// whose version is greater than `PRAGMA user_version`.
	pub fn open(path: SqlPath, migrations: &[Box<dyn Migration>]) -> anyhow::Result<Self> {
		let conn = match path {
			SqlPath::Memory => Connection::open_in_memory()?,
			SqlPath::File(p) => {
				if let Some(parent) = p.parent() {
					std::fs::create_dir_all(parent)?;
				}
				Connection::open(p)?
			}
		};

		let mut sorted: Vec<&Box<dyn Migration>> = migrations.iter().collect();
		sorted.sort_by_key(|m| m.version());

		let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
		for migration in sorted {
			if migration.version() > current {
				tracing::debug!(version = migration.version(), "running sql migration");
				migration.migrate(&conn)?;
				conn.pragma_update(None, "user_version", migration.version())?;
			}
		}

		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	/// Executes `sql` with positional JSON `params`, returning every row as
	/// an object keyed by column name. Runs on a blocking thread since
	/// `rusqlite` is synchronous.
	pub async fn execute(&self, sql: String, params: Vec<Value>) -> Result<Vec<Value>, SqlError> {
		let conn = self.conn.clone();
		tokio::task::spawn_blocking(move || Self::execute_blocking(&conn, &sql, &params))
			.await
			.map_err(|e| SqlError::Other(e.to_string()))?
	}

	fn execute_blocking(
		conn: &Mutex<Connection>,
		sql: &str,
		params: &[Value],
	) -> Result<Vec<Value>, SqlError> {
		let conn = conn.lock();
		let mut stmt = conn.prepare(sql)?;
		let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

		let bound: Vec<Box<dyn rusqlite::ToSql>> = params.iter().map(json_to_sql).collect();
		let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

		let mut rows = stmt.query(param_refs.as_slice())?;
		let mut out = Vec::new();
		while let Some(row) = rows.next()? {
			let mut obj = Map::new();
			for (i, name) in column_names.iter().enumerate() {
				obj.insert(name.clone(), sql_to_json(row.get_ref(i)?));
			}
			out.push(Value::Object(obj));
		}
		Ok(out)
	}
}

fn json_to_sql(value: &Value) -> Box<dyn rusqlite::ToSql> {
	match value {
		Value::Null => Box::new(Option::<i64>::None),
		Value::Bool(b) => Box::new(*b),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Box::new(i)
			} else {
				Box::new(n.as_f64().unwrap_or_default())
			}
		}
		Value::String(s) => Box::new(s.clone()),
		other => Box::new(other.to_string()),
	}
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
	match value {
		ValueRef::Null => Value::Null,
		ValueRef::Integer(i) => Value::from(i),
		ValueRef::Real(f) => serde_json::Number::from_f64(f)
			.map(Value::Number)
			.unwrap_or(Value::Null),
		ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
		ValueRef::Blob(b) => Value::String(base64_encode(b)),
	}
}

fn base64_encode(bytes: &[u8]) -> String {
	const TABLE: &[u8; 64] =
		b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
	let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
	for chunk in bytes.chunks(3) {
		let b0 = chunk[0];
		let b1 = *chunk.get(1).unwrap_or(&0);
		let b2 = *chunk.get(2).unwrap_or(&0);
		out.push(TABLE[(b0 >> 2) as usize] as char);
		out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
		out.push(if chunk.len() > 1 {
			TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
		} else {
			'='
		});
		out.push(if chunk.len() > 2 {
			TABLE[(b2 & 0x3f) as usize] as char
		} else {
			'='
		});
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	struct CreateUsers;
	impl Migration for CreateUsers {
		fn version(&self) -> i64 {
			1
		}
		fn migrate(&self, conn: &Connection) -> rusqlite::Result<()> {
			conn.execute_batch(
				"CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
			)
		}
	}

	#[tokio::test]
	async fn migration_runs_once_and_inserts_are_queryable() {
		let db = SqlDb::open(SqlPath::Memory, &[Box::new(CreateUsers)]).unwrap();

		db.execute(
			"INSERT INTO users (name) VALUES (?1)".into(),
			vec![Value::String("alice".into())],
		)
		.await
		.unwrap();

		let rows = db
			.execute("SELECT id, name FROM users".into(), vec![])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["name"], Value::String("alice".into()));
	}

	#[tokio::test]
	async fn reopening_does_not_rerun_migrations() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("actor.db");

		{
			let db = SqlDb::open(SqlPath::File(path.clone()), &[Box::new(CreateUsers)]).unwrap();
			db.execute(
				"INSERT INTO users (name) VALUES (?1)".into(),
				vec![Value::String("bob".into())],
			)
			.await
			.unwrap();
		}

		// Reopening with the same migration must not fail with "table already exists".
		let db = SqlDb::open(SqlPath::File(path), &[Box::new(CreateUsers)]).unwrap();
		let rows = db
			.execute("SELECT name FROM users".into(), vec![])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
	}
}
