//! Common types used throughout confgate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::prelude::*;

/// Key of the implicit tenant id column / member of every record
pub const ID_KEY: &str = "id";

/// Pseudo-tenant whose lookups always yield the schema defaults
pub const DEFAULT_TENANT: &str = "default";

/// A flat settings record: `{ id, field₁: value₁, … }`
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Read the `id` member of a record
pub fn record_id(record: &Record) -> Option<&str> {
	record.get(ID_KEY).and_then(serde_json::Value::as_str)
}

/// `[A-Za-z_][A-Za-z0-9_]*`, usable unquoted as a table or column name
pub fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {
			chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
		}
		_ => false,
	}
}

// Tenant //
//********//
/// A live tenant as known by the external directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
	pub id: Box<str>,
	pub name: Box<str>,
}

impl Tenant {
	pub fn new(id: impl Into<Box<str>>, name: impl Into<Box<str>>) -> Self {
		Self { id: id.into(), name: name.into() }
	}
}

impl std::fmt::Display for Tenant {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.id)
	}
}

// Entity //
//********//
/// An object living in a tenant (role, channel, user, command)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
	pub id: Box<str>,
	pub name: Box<str>,
}

impl Entity {
	pub fn new(id: impl Into<Box<str>>, name: impl Into<Box<str>>) -> Self {
		Self { id: id.into(), name: name.into() }
	}
}

// ArrayMode //
//***********//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayMode {
	Add,
	Remove,
}

impl FromStr for ArrayMode {
	type Err = Error;

	fn from_str(s: &str) -> CgResult<Self> {
		match s {
			"add" => Ok(ArrayMode::Add),
			"remove" => Ok(ArrayMode::Remove),
			other => Err(Error::InvalidArrayMode(other.into())),
		}
	}
}

impl std::fmt::Display for ArrayMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			ArrayMode::Add => "add",
			ArrayMode::Remove => "remove",
		})
	}
}


// vim: ts=4
