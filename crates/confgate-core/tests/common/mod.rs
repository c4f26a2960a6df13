//! Common test utilities for gateway integration tests
//!
//! `MemoryProvider` keeps records in memory and counts writes, so tests can
//! assert that failed operations never reached the provider.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use confgate_core::prelude::*;
use confgate_core::resolver::{Directory, EntityKind};
use confgate_core::{Gateway, ProviderRegistry, Schema, SettingResolver};
use confgate_types::provider::{ColumnDef, Provider, ProviderCaps};
use confgate_types::types::{Entity, ID_KEY};

pub const STORE: &str = "guilds";

#[derive(Debug, Default)]
pub struct MemoryProvider {
	pub caps: ProviderCaps,
	tables: Mutex<HashMap<Box<str>, BTreeMap<Box<str>, Record>>>,
	pub created_tables: Mutex<Vec<Option<Vec<String>>>>,
	pub migrations: Mutex<Vec<(Vec<Box<str>>, Vec<String>)>>,
	writes: AtomicUsize,
}

impl MemoryProvider {
	pub fn relational(column_migration: bool) -> Self {
		Self { caps: ProviderCaps { sql: true, column_migration }, ..Self::default() }
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	/// Raw stored record, bypassing the gateway
	pub fn stored(&self, id: &str) -> Option<Record> {
		self.tables.lock().get(STORE).and_then(|t| t.get(id).cloned())
	}

	/// Put a record straight into the store, as another process would
	pub fn seed(&self, id: &str, record: Value) {
		let Value::Object(mut record) = record else { return };
		record.insert(ID_KEY.into(), json!(id));
		self.tables.lock().entry(STORE.into()).or_default().insert(id.into(), record);
	}

	fn bump(&self) {
		self.writes.fetch_add(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl Provider for MemoryProvider {
	fn caps(&self) -> ProviderCaps {
		self.caps
	}

	async fn has_table(&self, store: &str) -> CgResult<bool> {
		Ok(self.tables.lock().contains_key(store))
	}

	async fn create_table(&self, store: &str, columns: Option<&[ColumnDef]>) -> CgResult<()> {
		self.tables.lock().entry(store.into()).or_default();
		self.created_tables
			.lock()
			.push(columns.map(|cols| cols.iter().map(ToString::to_string).collect()));
		Ok(())
	}

	async fn get_all(&self, store: &str) -> CgResult<Vec<Record>> {
		Ok(self.tables.lock().get(store).map(|t| t.values().cloned().collect()).unwrap_or_default())
	}

	async fn get(&self, store: &str, id: &str) -> CgResult<Option<Record>> {
		Ok(self.tables.lock().get(store).and_then(|t| t.get(id).cloned()))
	}

	async fn create(&self, store: &str, id: &str, record: &Record) -> CgResult<()> {
		self.bump();
		let mut record = record.clone();
		record.insert(ID_KEY.into(), json!(id));
		self.tables.lock().entry(store.into()).or_default().insert(id.into(), record);
		Ok(())
	}

	async fn update(&self, store: &str, id: &str, patch: &Record) -> CgResult<()> {
		self.bump();
		// give other tasks a chance to interleave
		tokio::task::yield_now().await;
		let mut tables = self.tables.lock();
		let record = tables.entry(store.into()).or_default().entry(id.into()).or_insert_with(|| {
			let mut record = Record::new();
			record.insert(ID_KEY.into(), json!(id));
			record
		});
		for (key, value) in patch {
			record.insert(key.clone(), value.clone());
		}
		Ok(())
	}

	async fn delete(&self, store: &str, id: &str) -> CgResult<()> {
		self.bump();
		if let Some(table) = self.tables.lock().get_mut(store) {
			table.remove(id);
		}
		Ok(())
	}

	async fn update_columns(
		&self,
		store: &str,
		retained: &[Box<str>],
		columns: &[ColumnDef],
	) -> CgResult<()> {
		if !self.caps.column_migration {
			return Err(Error::MigrationUnsupported(store.into()));
		}
		self.migrations
			.lock()
			.push((retained.to_vec(), columns.iter().map(ToString::to_string).collect()));
		Ok(())
	}
}

/// Tenants `g1` and `g2`, each with a few roles and commands
#[derive(Debug, Default)]
pub struct StaticDirectory;

#[async_trait]
impl Directory for StaticDirectory {
	async fn tenant(&self, id: &str) -> CgResult<Option<Tenant>> {
		Ok(match id {
			"g1" => Some(Tenant::new("g1", "Guild One")),
			"g2" => Some(Tenant::new("g2", "Guild Two")),
			_ => None,
		})
	}

	async fn entities(&self, _tenant: &Tenant, kind: EntityKind) -> CgResult<Vec<Entity>> {
		Ok(match kind {
			EntityKind::Role => vec![Entity::new("100", "Moderator"), Entity::new("101", "Admin")],
			EntityKind::Command => ["ping", "help", "stats", "conf"]
				.into_iter()
				.map(|name| Entity::new(name, name))
				.collect(),
			_ => Vec::new(),
		})
	}
}

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn test_schema() -> Schema {
	Schema::from_source(&json!({
		"prefix": { "type": "String", "default": "!" },
		"modRole": { "type": "Role" },
		"disabledCommands": { "type": "Command", "array": true },
	}))
	.expect("valid schema")
}

pub fn gateway_with(provider: Arc<MemoryProvider>, schema: Schema) -> Gateway {
	init_logging();
	let mut registry = ProviderRegistry::new();
	registry.register("memory", provider).expect("register provider");
	let resolver = Arc::new(SettingResolver::new(Arc::new(StaticDirectory)));
	Gateway::new(STORE, "memory", Arc::new(registry), resolver, schema)
}

pub async fn ready_gateway(provider: Arc<MemoryProvider>) -> Gateway {
	let gateway = gateway_with(provider, test_schema());
	gateway.init().await.expect("gateway init");
	gateway
}

// vim: ts=4
