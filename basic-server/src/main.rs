//! Boots the guild settings gateway
//!
//! Reads `CONFGATE_ENGINE`, `CONFGATE_STORE`, `CONFGATE_PREFIX` and `DB_DIR`.
//! Guilds listed in `CONFGATE_GUILDS` (comma separated) are known to the
//! directory and get a settings record if they have none yet.

use async_trait::async_trait;
use std::sync::Arc;

use confgate_core::prelude::*;
use confgate_core::resolver::{Directory, EntityKind};
use confgate_core::{Gateway, GatewayConfig, GuildSettings, ProviderRegistry, SettingResolver, guild_schema};
use confgate_provider_redb::ProviderRedb;
use confgate_provider_sqlite::ProviderSqlite;
use confgate_types::types::Entity;

const COMMANDS: [&str; 4] = ["help", "ping", "conf", "stats"];

/// Directory of the guilds named in the environment, with the built-in commands
struct EnvDirectory {
	guilds: Vec<Box<str>>,
}

impl EnvDirectory {
	fn from_env() -> Self {
		let guilds = std::env::var("CONFGATE_GUILDS")
			.unwrap_or_default()
			.split(',')
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.map(Box::from)
			.collect();
		Self { guilds }
	}
}

#[async_trait]
impl Directory for EnvDirectory {
	async fn tenant(&self, id: &str) -> CgResult<Option<Tenant>> {
		Ok(self.guilds.iter().find(|g| &***g == id).map(|g| Tenant::new(&**g, &**g)))
	}

	async fn entities(&self, _tenant: &Tenant, kind: EntityKind) -> CgResult<Vec<Entity>> {
		Ok(match kind {
			EntityKind::Command => COMMANDS.iter().map(|cmd| Entity::new(*cmd, *cmd)).collect(),
			_ => Vec::new(),
		})
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> CgResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = GatewayConfig::from_env()?;
	info!("confgate V{}", env!("CARGO_PKG_VERSION"));
	info!("Engine: {}, store: {}, data: {}", config.engine, config.store, config.data_dir.display());

	let mut registry = ProviderRegistry::new();
	registry.register("redb", Arc::new(ProviderRedb::new(&config.data_dir).await?))?;
	registry.register("sqlite", Arc::new(ProviderSqlite::new(config.data_dir.join("settings.db")).await?))?;

	let directory = EnvDirectory::from_env();
	let guilds = directory.guilds.clone();
	let resolver = Arc::new(SettingResolver::new(Arc::new(directory)));
	let gateway = Gateway::new(
		config.store.clone(),
		config.engine.clone(),
		Arc::new(registry),
		resolver,
		guild_schema(&config.prefix)?,
	);
	gateway.init().await?;

	for guild in &guilds {
		if !gateway.cache().contains(guild) {
			gateway.create(guild).await?;
		}
		let settings = GuildSettings::from(gateway.get(guild));
		info!(
			"Guild {}: prefix {:?}, disabled commands {:?}",
			guild,
			settings.prefix(),
			settings.disabled_commands()
		);
	}

	info!("Loaded {} tenants into '{}'", gateway.cache().len(), gateway.store());
	info!("Schema: {}", gateway.schema().to_source());
	Ok(())
}

// vim: ts=4
