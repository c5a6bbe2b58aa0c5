//! Scratch Postgres databases for the ignored integration tests.
//!
//! Point `QUILL_PG_DSN` at a server the tests may create databases on. Every [`TestDatabase`]
//! gets its own `quill_test_*` database, created from the maintenance database named by the
//! DSN's server and dropped again on [`TestDatabase::cleanup`] or drop.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const DSN_VAR: &str = "QUILL_PG_DSN";

const SCRATCH_PREFIX: &str = "quill_test_";
/// Tried in order; `template1` exists even where `postgres` was dropped.
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|source| Error::InvalidDsn { var: DSN_VAR, source })?;
		let (maintenance, mut conn) = open_maintenance(&base).await?;
		let name = scratch_name();

		conn.execute(format!("CREATE DATABASE {}", quote_ident(&name)).as_str())
			.await
			.map_err(|source| Error::Scratch { action: "create", name: name.clone(), source })?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Drops the database now and reports failures, instead of leaving it to `Drop`.
	pub async fn cleanup(mut self) -> Result<()> {
		drop_scratch(&self.name, &self.maintenance).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		// The test runtime may already be shutting down, so drop on a private one.
		let handle = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())
				.and_then(|runtime| {
					runtime.block_on(drop_scratch(&name, &maintenance)).map_err(|err| err.to_string())
				});

			if let Err(err) = result {
				eprintln!("Leaked scratch database {name}: {err}");
			}
		});
		let _ = handle.join();
	}
}

/// The DSN integration tests run against, if any.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok().filter(|dsn| !dsn.trim().is_empty())
}

fn scratch_name() -> String {
	format!("{SCRATCH_PREFIX}{}", Uuid::new_v4().simple())
}

fn quote_ident(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}

async fn open_maintenance(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::NoMaintenanceDatabase {
		source: last_err.unwrap_or(sqlx::Error::PoolTimedOut),
	})
}

async fn drop_scratch(name: &str, maintenance: &PgConnectOptions) -> Result<()> {
	let scratch = |action| move |source| Error::Scratch { action, name: name.to_string(), source };
	let mut conn = PgConnection::connect_with(maintenance).await.map_err(scratch("reach"))?;

	// Pools from the test may still hold sessions open.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.execute(&mut conn)
	.await
	.map_err(scratch("disconnect"))?;
	conn.execute(format!("DROP DATABASE IF EXISTS {}", quote_ident(name)).as_str())
		.await
		.map_err(scratch("drop"))?;

	Ok(())
}
