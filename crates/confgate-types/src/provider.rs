//! Persistence provider contract.
//!
//! A provider stores flat records (`{ id, field₁, … }`) grouped by store type
//! (a table or collection name). Relational providers declare it through
//! [`ProviderCaps`] so the gateway can bind its relational adapter.

use async_trait::async_trait;
use std::{collections::HashMap, fmt::Debug};

use crate::prelude::*;

/// Type tag (lowercase) -> backend column type literal
pub type ColumnTypes = HashMap<Box<str>, Box<str>>;

/// Optional capabilities of a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCaps {
	/// Records live in typed columns; array fields are stored as serialized text
	pub sql: bool,
	/// `update_columns` is implemented
	pub column_migration: bool,
}

/// One column of a relational table: `name definition`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
	pub name: Box<str>,
	/// Type literal with optional constraints and default clause
	pub definition: Box<str>,
}

impl ColumnDef {
	pub fn new(name: impl Into<Box<str>>, definition: impl Into<Box<str>>) -> Self {
		Self { name: name.into(), definition: definition.into() }
	}

	/// Split a `"name definition"` DDL line at the first space
	pub fn parse(line: &str) -> CgResult<Self> {
		let line = line.trim();
		match line.split_once(' ') {
			Some((name, definition)) if !name.is_empty() && !definition.trim().is_empty() => {
				Ok(Self::new(name, definition.trim()))
			}
			_ => Err(Error::SchemaError(format!("invalid column definition: '{}'", line))),
		}
	}
}

impl std::fmt::Display for ColumnDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.name, self.definition)
	}
}

#[async_trait]
pub trait Provider: Debug + Send + Sync {
	fn caps(&self) -> ProviderCaps {
		ProviderCaps::default()
	}

	/// # Tables
	async fn has_table(&self, store: &str) -> CgResult<bool>;
	/// Creates the table for a store type.
	/// Relational providers receive the full column list (led by the `id` column).
	async fn create_table(&self, store: &str, columns: Option<&[ColumnDef]>) -> CgResult<()>;

	/// # Records
	async fn get_all(&self, store: &str) -> CgResult<Vec<Record>>;
	/// Reads a single record, `None` if there is no record with this id
	async fn get(&self, store: &str, id: &str) -> CgResult<Option<Record>>;
	async fn create(&self, store: &str, id: &str, record: &Record) -> CgResult<()>;
	/// Merges a partial record into the stored one
	async fn update(&self, store: &str, id: &str, patch: &Record) -> CgResult<()>;
	async fn delete(&self, store: &str, id: &str) -> CgResult<()>;

	/// # Relational extras
	/// Rebuilds the table with `columns`, keeping the data of `retained` columns
	async fn update_columns(
		&self,
		store: &str,
		_retained: &[Box<str>],
		_columns: &[ColumnDef],
	) -> CgResult<()> {
		Err(Error::MigrationUnsupported(store.into()))
	}

	/// Column type literals by type tag
	fn constants(&self) -> Option<&ColumnTypes> {
		None
	}

	/// Turns a value into a literal usable in a DEFAULT clause
	fn sanitize(&self, value: &str) -> String {
		format!("'{}'", value.replace('\'', "''"))
	}
}


// vim: ts=4
