//! Gateway configuration

use serde::Deserialize;
use std::path::PathBuf;

use crate::prelude::*;

pub const DEFAULT_ENGINE: &str = "redb";
pub const DEFAULT_STORE: &str = "guilds";
pub const DEFAULT_PREFIX: &str = "!";
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Settings of a gateway instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Name of the registered provider to bind
	pub engine: Box<str>,
	/// Table / collection holding the records
	pub store: Box<str>,
	/// Default command prefix of the guild field set
	pub prefix: Box<str>,
	/// Where file based providers keep their data
	pub data_dir: PathBuf,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			engine: DEFAULT_ENGINE.into(),
			store: DEFAULT_STORE.into(),
			prefix: DEFAULT_PREFIX.into(),
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
		}
	}
}

impl GatewayConfig {
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder { config: Self::default() }
	}

	/// Read `CONFGATE_ENGINE`, `CONFGATE_STORE`, `CONFGATE_PREFIX` and `DB_DIR`
	pub fn from_env() -> CgResult<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CgResult<Self> {
		let mut builder = Self::builder();
		if let Some(engine) = lookup("CONFGATE_ENGINE") {
			builder = builder.engine(engine);
		}
		if let Some(store) = lookup("CONFGATE_STORE") {
			builder = builder.store(store);
		}
		if let Some(prefix) = lookup("CONFGATE_PREFIX") {
			builder = builder.prefix(prefix);
		}
		if let Some(dir) = lookup("DB_DIR") {
			builder = builder.data_dir(dir);
		}
		builder.build()
	}
}

pub struct GatewayConfigBuilder {
	config: GatewayConfig,
}

impl GatewayConfigBuilder {
	pub fn engine(mut self, engine: impl Into<Box<str>>) -> Self {
		self.config.engine = engine.into();
		self
	}

	pub fn store(mut self, store: impl Into<Box<str>>) -> Self {
		self.config.store = store.into();
		self
	}

	pub fn prefix(mut self, prefix: impl Into<Box<str>>) -> Self {
		self.config.prefix = prefix.into();
		self
	}

	pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.config.data_dir = dir.into();
		self
	}

	pub fn build(self) -> CgResult<GatewayConfig> {
		let config = self.config;
		if config.engine.trim().is_empty() {
			return Err(Error::ConfigError("engine must not be empty".into()));
		}
		if !confgate_types::types::is_identifier(&config.store) {
			return Err(Error::ConfigError(format!("invalid store name '{}'", config.store)));
		}
		if config.prefix.is_empty() {
			return Err(Error::ConfigError("prefix must not be empty".into()));
		}
		Ok(config)
	}
}


// vim: ts=4
