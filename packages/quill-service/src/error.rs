pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported to callers, listed in the order entry points check for them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unauthenticated: a valid session is required.")]
	Unauthenticated,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Scope denied: {message}")]
	ScopeDenied { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn denied(message: impl Into<String>) -> Self {
		Self::ScopeDenied { message: message.into() }
	}

	pub(crate) fn not_found(message: impl Into<String>) -> Self {
		Self::NotFound { message: message.into() }
	}
}

impl From<quill_storage::Error> for Error {
	fn from(err: quill_storage::Error) -> Self {
		match err {
			quill_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			quill_storage::Error::NotFound(message) => Self::NotFound { message },
			quill_storage::Error::Conflict(message) => Self::InvalidRequest { message },
		}
	}
}
