//! Error types for the settings gateway and its providers

use std::fmt;

pub type CgResult<T> = std::result::Result<T, Error>;

/// Why a raw input could not be turned into a storable value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
	/// No entity matched the input
	NotFound,
	/// More than one entity matched the input
	Ambiguous,
	/// The input has the wrong shape for the type (e.g. an object where a number is expected)
	InvalidShape,
	/// The type tag has no resolver
	UnknownType,
}

impl fmt::Display for ResolutionFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ResolutionFailure::NotFound => "not found",
			ResolutionFailure::Ambiguous => "ambiguous",
			ResolutionFailure::InvalidShape => "invalid value",
			ResolutionFailure::UnknownType => "unknown type",
		})
	}
}

#[derive(Debug)]
pub enum Error {
	/// No provider is registered under the configured engine name
	ProviderNotRegistered(Box<str>),
	/// The gateway was used before `init` completed
	NotReady,
	UnknownField {
		field: Box<str>,
	},
	NotArrayField {
		field: Box<str>,
	},
	MissingValue {
		field: Box<str>,
	},
	InvalidArrayMode(Box<str>),
	DuplicateValue {
		field: Box<str>,
		value: serde_json::Value,
	},
	NotFound {
		field: Box<str>,
		value: serde_json::Value,
	},
	Resolution {
		type_tag: Box<str>,
		value: serde_json::Value,
		reason: ResolutionFailure,
	},
	/// The tenant reference does not name a known tenant
	InvalidTenant(Box<str>),
	/// A stored array field is not valid serialized-sequence text
	Deserialization {
		tenant: Box<str>,
		field: Box<str>,
		message: String,
	},
	/// The bound provider cannot migrate columns. Never escapes the gateway.
	MigrationUnsupported(Box<str>),
	SchemaError(String),
	ConfigError(String),
	DbError(String),

	// externals
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ProviderNotRegistered(engine) => {
				write!(f, "provider '{}' is not registered", engine)
			}
			Error::NotReady => write!(f, "settings gateway is not initialized"),
			Error::UnknownField { field } => {
				write!(f, "the key '{}' does not exist in the current schema", field)
			}
			Error::NotArrayField { field } => write!(f, "the key '{}' is not an array", field),
			Error::MissingValue { field } => {
				write!(f, "a value is required to add to or remove from '{}'", field)
			}
			Error::InvalidArrayMode(mode) => {
				write!(f, "array mode must be 'add' or 'remove', got '{}'", mode)
			}
			Error::DuplicateValue { field, value } => {
				write!(f, "the value {} for the key '{}' already exists", value, field)
			}
			Error::NotFound { field, value } => {
				write!(f, "the value {} for the key '{}' does not exist", value, field)
			}
			Error::Resolution { type_tag, value, reason } => {
				write!(f, "cannot resolve {} as {}: {}", value, type_tag, reason)
			}
			Error::InvalidTenant(tenant) => write!(f, "unknown tenant '{}'", tenant),
			Error::Deserialization { tenant, field, message } => write!(
				f,
				"stored value of '{}' for tenant '{}' is not a valid array: {}",
				field, tenant, message
			),
			Error::MigrationUnsupported(store) => {
				write!(f, "provider for '{}' does not support column migration", store)
			}
			Error::SchemaError(msg) => write!(f, "schema error: {}", msg),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::DbError(msg) => write!(f, "database error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::DbError(format!("json: {}", err))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_carries_context() {
		let err = Error::DuplicateValue { field: "disabledCommands".into(), value: "ping".into() };
		assert_eq!(err.to_string(), "the value \"ping\" for the key 'disabledCommands' already exists");

		let err = Error::Resolution {
			type_tag: "role".into(),
			value: "mods".into(),
			reason: ResolutionFailure::Ambiguous,
		};
		assert_eq!(err.to_string(), "cannot resolve \"mods\" as role: ambiguous");
	}

	#[test]
	fn test_io_error_is_source() {
		let err = Error::from(std::io::Error::other("disk"));
		assert!(std::error::Error::source(&err).is_some());
	}
}

// vim: ts=4
