//! Multi-tenant settings gateway.
//!
//! # Architecture
//!
//! - **Schema** (`schema.rs`): recognized fields, defaults, record normalization
//! - **Cache** (`cache.rs`): in-memory projection of the persisted records
//! - **Resolver** (`resolver.rs`): per-type validation and normalization of raw input
//! - **Sql** (`sql.rs`): relational adapter (DDL, array text codec, column migration)
//! - **Registry** (`registry.rs`): persistence providers by engine name
//! - **Gateway** (`gateway.rs`): tenant lifecycle, reads, sync and mutations
//! - **Guild** (`guild.rs`): the guild field set and a typed view over its records

pub mod cache;
pub mod config;
pub mod gateway;
pub mod guild;
pub mod prelude;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod sql;

pub use cache::SettingsCache;
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayState, ResolvedRecord};
pub use guild::{GuildSettings, guild_schema};
pub use registry::ProviderRegistry;
pub use resolver::{Directory, EntityKind, Resolved, Resolver, SettingResolver};
pub use schema::{FieldSpec, FieldSpecBuilder, Schema};
pub use sql::SqlAdapter;

// vim: ts=4
