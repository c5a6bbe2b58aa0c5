pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{var} is not a valid Postgres DSN: {source}.")]
	InvalidDsn { var: &'static str, source: sqlx::Error },

	#[error("No maintenance database accepted a connection: {source}.")]
	NoMaintenanceDatabase { source: sqlx::Error },

	#[error("Failed to {action} scratch database {name}: {source}.")]
	Scratch { action: &'static str, name: String, source: sqlx::Error },
}
