//! Guild field set and a typed view of guild records

use serde_json::Value;

use crate::prelude::*;
use crate::schema::{FieldSpec, Schema};
use confgate_types::types::record_id;

pub const GUILD_STORE: &str = "guilds";

pub const PREFIX: &str = "prefix";
pub const MOD_ROLE: &str = "modRole";
pub const ADMIN_ROLE: &str = "adminRole";
pub const DISABLED_COMMANDS: &str = "disabledCommands";

/// Default schema of guild settings
pub fn guild_schema(prefix: &str) -> CgResult<Schema> {
	Schema::from_fields([
		FieldSpec::builder(PREFIX, "String")
			.default(prefix)
			.sql(format!("TEXT NOT NULL DEFAULT '{}'", prefix.replace('\'', "''")))
			.build()?,
		FieldSpec::builder(MOD_ROLE, "Role").sql("TEXT").build()?,
		FieldSpec::builder(ADMIN_ROLE, "Role").sql("TEXT").build()?,
		FieldSpec::builder(DISABLED_COMMANDS, "Command")
			.array(true)
			.sql("TEXT DEFAULT '[]'")
			.build()?,
	])
}

/// Read-only view over a guild settings record
#[derive(Debug, Clone, PartialEq)]
pub struct GuildSettings {
	record: Record,
}

impl GuildSettings {
	pub fn new(record: Record) -> Self {
		Self { record }
	}

	pub fn id(&self) -> Option<&str> {
		record_id(&self.record)
	}

	pub fn prefix(&self) -> Option<&str> {
		self.str_field(PREFIX)
	}

	pub fn mod_role(&self) -> Option<&str> {
		self.str_field(MOD_ROLE)
	}

	pub fn admin_role(&self) -> Option<&str> {
		self.str_field(ADMIN_ROLE)
	}

	pub fn disabled_commands(&self) -> Vec<&str> {
		match self.record.get(DISABLED_COMMANDS) {
			Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
			_ => Vec::new(),
		}
	}

	pub fn is_command_disabled(&self, name: &str) -> bool {
		self.disabled_commands().iter().any(|cmd| cmd.eq_ignore_ascii_case(name))
	}

	pub fn record(&self) -> &Record {
		&self.record
	}

	pub fn into_record(self) -> Record {
		self.record
	}

	fn str_field(&self, key: &str) -> Option<&str> {
		self.record.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
	}
}

impl From<Record> for GuildSettings {
	fn from(record: Record) -> Self {
		Self::new(record)
	}
}


// vim: ts=4
