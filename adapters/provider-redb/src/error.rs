//! Error types for the redb provider

use std::fmt;

/// Internal error type of the redb provider
#[derive(Debug)]
pub enum Error {
	RedbError(String),
	JsonError(String),
	IoError(std::io::Error),
	/// The stored text is not a JSON object
	InvalidDocument(String),
	/// A blocking storage task panicked or was cancelled
	TaskError(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::RedbError(msg) => write!(f, "redb error: {}", msg),
			Error::JsonError(msg) => write!(f, "json error: {}", msg),
			Error::IoError(e) => write!(f, "io error: {}", e),
			Error::InvalidDocument(id) => write!(f, "invalid document: {}", id),
			Error::TaskError(msg) => write!(f, "task error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::IoError(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::JsonError(e.to_string())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(e: tokio::task::JoinError) -> Self {
		Error::TaskError(e.to_string())
	}
}

impl From<Error> for confgate_types::error::Error {
	fn from(e: Error) -> Self {
		match e {
			Error::IoError(io_err) => confgate_types::error::Error::Io(io_err),
			err => confgate_types::error::Error::DbError(err.to_string()),
		}
	}
}

/// Helper to convert redb errors
pub fn from_redb_error<E: fmt::Display>(err: E) -> Error {
	Error::RedbError(err.to_string())
}

// vim: ts=4
