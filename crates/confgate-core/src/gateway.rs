//! Settings gateway: keeps the cache in step with the persistence provider
//!
//! Reads are served from the cache. Every mutation resolves its input,
//! persists it through the provider and reloads the tenant's record
//! (`sync`), so the cache only ever holds what the provider returned.
//! Mutations of the same tenant are serialized by a per-tenant lock.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::SettingsCache;
use crate::prelude::*;
use crate::registry::ProviderRegistry;
use crate::resolver::{Resolved, Resolver};
use crate::schema::{FieldSpec, Schema};
use crate::sql::SqlAdapter;
use confgate_types::provider::Provider;
use confgate_types::types::{ArrayMode, DEFAULT_TENANT};

/// Record with every field mapped through the resolver
pub type ResolvedRecord = BTreeMap<String, Resolved>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
	Uninitialized,
	Initializing,
	Ready,
}

/// Provider bound during `init`
#[derive(Debug, Clone)]
struct Backend {
	provider: Arc<dyn Provider>,
	sql: Option<Arc<SqlAdapter>>,
}

impl Backend {
	fn prepare_write(&self, mut record: Record) -> Record {
		if let Some(sql) = &self.sql {
			sql.serialize(&mut record);
		}
		record
	}

	fn load(&self, schema: &Schema, id: &str, mut record: Record) -> CgResult<Record> {
		if let Some(sql) = &self.sql {
			sql.deserialize(&mut record)?;
		}
		Ok(schema.normalize(id, record))
	}
}

/// Held while a tenant is being mutated. Dropping it releases the lock and
/// forgets the tenant's mutex once nobody else holds or waits for it.
struct TenantGuard<'a> {
	locks: &'a DashMap<Box<str>, Arc<tokio::sync::Mutex<()>>>,
	id: Box<str>,
	guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for TenantGuard<'_> {
	fn drop(&mut self) {
		self.guard.take();
		self.locks.remove_if(&*self.id, |_, lock| Arc::strong_count(lock) == 1);
	}
}

pub struct Gateway {
	store: Box<str>,
	engine: Box<str>,
	registry: Arc<ProviderRegistry>,
	resolver: Arc<dyn Resolver>,
	schema: RwLock<Arc<Schema>>,
	cache: SettingsCache,
	state: RwLock<GatewayState>,
	backend: RwLock<Option<Backend>>,
	locks: DashMap<Box<str>, Arc<tokio::sync::Mutex<()>>>,
}

impl std::fmt::Debug for Gateway {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Gateway")
			.field("store", &self.store)
			.field("engine", &self.engine)
			.field("state", &*self.state.read())
			.field("cached", &self.cache.len())
			.finish_non_exhaustive()
	}
}

impl Gateway {
	pub fn new(
		store: impl Into<Box<str>>,
		engine: impl Into<Box<str>>,
		registry: Arc<ProviderRegistry>,
		resolver: Arc<dyn Resolver>,
		schema: Schema,
	) -> Self {
		Self {
			store: store.into(),
			engine: engine.into(),
			registry,
			resolver,
			schema: RwLock::new(Arc::new(schema)),
			cache: SettingsCache::new(),
			state: RwLock::new(GatewayState::Uninitialized),
			backend: RwLock::new(None),
			locks: DashMap::new(),
		}
	}

	pub fn store(&self) -> &str {
		&self.store
	}

	pub fn state(&self) -> GatewayState {
		*self.state.read()
	}

	pub fn schema(&self) -> Arc<Schema> {
		Arc::clone(&self.schema.read())
	}

	pub fn defaults(&self) -> Record {
		self.schema.read().defaults().clone()
	}

	pub fn cache(&self) -> &SettingsCache {
		&self.cache
	}

	/// Whether a relational adapter is bound
	pub fn is_relational(&self) -> bool {
		self.backend.read().as_ref().is_some_and(|b| b.sql.is_some())
	}

	fn backend(&self) -> CgResult<Backend> {
		if self.state() != GatewayState::Ready {
			return Err(Error::NotReady);
		}
		self.backend.read().clone().ok_or(Error::NotReady)
	}

	async fn lock_tenant(&self, id: &str) -> TenantGuard<'_> {
		let lock = self.locks.entry(id.into()).or_default().value().clone();
		let guard = lock.lock_owned().await;
		TenantGuard { locks: &self.locks, id: id.into(), guard: Some(guard) }
	}

	/// Number of tenants with a mutation in progress or waiting
	pub fn locked_tenants(&self) -> usize {
		self.locks.len()
	}

	/// Value of `key` as last loaded from the provider
	fn stored(&self, id: &str, key: &str) -> Option<Value> {
		self.cache.get(id).and_then(|mut record| record.remove(key))
	}

	fn field(&self, key: &str) -> CgResult<FieldSpec> {
		self.schema.read().get(key).cloned().ok_or_else(|| Error::UnknownField { field: key.into() })
	}

	fn check_type_tags(&self, schema: &Schema) -> CgResult<()> {
		match schema.fields().find(|f| !self.resolver.supports(&f.type_tag)) {
			Some(field) => Err(Error::SchemaError(format!(
				"field '{}' has unsupported type '{}'",
				field.name, field.type_tag
			))),
			None => Ok(()),
		}
	}

	/// Bind the provider, ensure the table exists and load every record.
	/// On failure the gateway stays uninitialized.
	pub async fn init(&self) -> CgResult<()> {
		{
			let mut state = self.state.write();
			if *state != GatewayState::Uninitialized {
				debug!("Gateway '{}' is already {:?}", self.store, *state);
				return Ok(());
			}
			*state = GatewayState::Initializing;
		}

		match self.bind().await {
			Ok(backend) => {
				*self.backend.write() = Some(backend);
				*self.state.write() = GatewayState::Ready;
				info!(
					"Settings gateway '{}' ready on '{}' with {} tenants",
					self.store,
					self.engine,
					self.cache.len()
				);
				Ok(())
			}
			Err(err) => {
				error!("Settings gateway '{}' failed to initialize: {}", self.store, err);
				*self.state.write() = GatewayState::Uninitialized;
				Err(err)
			}
		}
	}

	async fn bind(&self) -> CgResult<Backend> {
		let provider = self.registry.get(&self.engine)?;
		let schema = self.schema();
		self.check_type_tags(&schema)?;

		let sql = provider.caps().sql.then(|| Arc::new(SqlAdapter::new(Arc::clone(&provider), &schema)));
		let backend = Backend { provider, sql };

		if !backend.provider.has_table(&self.store).await? {
			let columns = backend.sql.as_ref().map(|sql| sql.build_schema(&schema));
			backend.provider.create_table(&self.store, columns.as_deref()).await?;
			info!("Created table '{}'", self.store);
		}

		self.load_all(&backend, &schema).await?;
		Ok(backend)
	}

	async fn load_all(&self, backend: &Backend, schema: &Schema) -> CgResult<()> {
		let data = backend.provider.get_all(&self.store).await?;
		let mut records = Vec::with_capacity(data.len());
		for record in data {
			let Some(id) = confgate_types::types::record_id(&record).map(Box::<str>::from) else {
				warn!("Skipping record without id in '{}'", self.store);
				continue;
			};
			let record = backend.load(schema, &id, record)?;
			records.push((id, record));
		}
		debug!("Loaded {} records from '{}'", records.len(), self.store);
		self.cache.replace_all(records);
		Ok(())
	}

	async fn sync_one(&self, backend: &Backend, id: &str) -> CgResult<()> {
		match backend.provider.get(&self.store, id).await? {
			Some(record) => {
				let record = backend.load(&self.schema(), id, record)?;
				self.cache.set(id, record);
			}
			None => {
				debug!("Tenant '{}' has no record in '{}'", id, self.store);
				self.cache.delete(id);
			}
		}
		Ok(())
	}

	async fn resolve_value(
		&self,
		field: &FieldSpec,
		raw: &Value,
		tenant: &Tenant,
	) -> CgResult<Resolved> {
		self.resolver.resolve(&field.type_tag, raw, tenant, field).await
	}

	// Tenant lifecycle
	//******************

	/// Persist a fresh record made of the defaults. Returns the record as stored.
	pub async fn create(&self, tenant_ref: &str) -> CgResult<Record> {
		let backend = self.backend()?;
		let tenant = self.resolver.tenant(tenant_ref).await?;
		let _guard = self.lock_tenant(&tenant.id).await;

		backend.provider.create(&self.store, &tenant.id, &backend.prepare_write(self.defaults())).await?;
		self.sync_one(&backend, &tenant.id).await?;

		let record = self.cache.get(&tenant.id).ok_or_else(|| {
			Error::DbError(format!("record of '{}' missing from '{}' after create", tenant.id, self.store))
		})?;
		info!("Created settings of '{}' in '{}'", tenant.id, self.store);
		Ok(record)
	}

	/// Delete the tenant's record from the provider and the cache
	pub async fn destroy(&self, tenant_id: &str) -> CgResult<()> {
		let backend = self.backend()?;
		let _guard = self.lock_tenant(tenant_id).await;

		backend.provider.delete(&self.store, tenant_id).await?;
		self.cache.delete(tenant_id);
		info!("Deleted settings of '{}' from '{}'", tenant_id, self.store);
		Ok(())
	}

	// Reads
	//*******

	/// Cached record of a tenant, or the defaults if it has none
	pub fn get(&self, tenant_id: &str) -> Record {
		if tenant_id == DEFAULT_TENANT {
			return self.defaults();
		}
		self.cache.get(tenant_id).unwrap_or_else(|| self.defaults())
	}

	/// Cached record with every schema field mapped through the resolver
	pub async fn get_resolved(&self, tenant_ref: &str) -> CgResult<ResolvedRecord> {
		self.backend()?;
		let tenant = self.resolver.tenant(tenant_ref).await?;
		let schema = self.schema();
		let settings = self.get(&tenant.id);

		let mut resolved = ResolvedRecord::new();
		for (key, value) in settings {
			let entry = match (schema.get(&key), value) {
				(Some(field), Value::Array(items)) if field.array => {
					let mut list = Vec::with_capacity(items.len());
					for item in &items {
						list.push(self.resolve_value(field, item, &tenant).await?);
					}
					Resolved::List(list)
				}
				(Some(field), value) if !value.is_null() => {
					self.resolve_value(field, &value, &tenant).await?
				}
				(_, value) => Resolved::Value(value),
			};
			resolved.insert(key, entry);
		}
		Ok(resolved)
	}

	/// Reload one tenant's record, or every record if `tenant_ref` is `None`
	pub async fn sync(&self, tenant_ref: Option<&str>) -> CgResult<()> {
		let backend = self.backend()?;
		match tenant_ref {
			None => self.load_all(&backend, &self.schema()).await,
			Some(tenant_ref) => {
				let tenant = self.resolver.tenant(tenant_ref).await?;
				let _guard = self.lock_tenant(&tenant.id).await;
				self.sync_one(&backend, &tenant.id).await
			}
		}
	}

	// Mutations
	//***********

	/// Put a field back to its default. Returns the stored default.
	pub async fn reset(&self, tenant_ref: &str, key: &str) -> CgResult<Value> {
		let backend = self.backend()?;
		let field = self.field(key)?;
		let tenant = self.resolver.tenant(tenant_ref).await?;
		let _guard = self.lock_tenant(&tenant.id).await;

		let mut patch = Record::new();
		patch.insert(key.into(), field.default.clone());
		backend.provider.update(&self.store, &tenant.id, &backend.prepare_write(patch)).await?;
		self.sync_one(&backend, &tenant.id).await?;

		info!("Reset '{}' of '{}'", key, tenant.id);
		Ok(self.stored(&tenant.id, key).unwrap_or(field.default))
	}

	/// Resolve and store a field value. Returns the stored value.
	///
	/// Array fields take an array and resolve it element-wise.
	pub async fn update(&self, tenant_ref: &str, key: &str, raw: &Value) -> CgResult<Value> {
		let backend = self.backend()?;
		let field = self.field(key)?;
		let tenant = self.resolver.tenant(tenant_ref).await?;

		let resolved = if field.array {
			let Value::Array(items) = raw else {
				return Err(Error::Resolution {
					type_tag: field.type_tag.clone(),
					value: raw.clone(),
					reason: confgate_types::error::ResolutionFailure::InvalidShape,
				});
			};
			let mut list = Vec::with_capacity(items.len());
			for item in items {
				list.push(self.resolve_value(&field, item, &tenant).await?);
			}
			Resolved::List(list)
		} else {
			self.resolve_value(&field, raw, &tenant).await?
		};
		let value = resolved.into_stored();

		let _guard = self.lock_tenant(&tenant.id).await;

		let mut patch = Record::new();
		patch.insert(key.into(), value.clone());
		backend.provider.update(&self.store, &tenant.id, &backend.prepare_write(patch)).await?;
		self.sync_one(&backend, &tenant.id).await?;

		info!("Updated '{}' of '{}'", key, tenant.id);
		Ok(self.stored(&tenant.id, key).unwrap_or(value))
	}

	/// Add a value to, or remove it from, an array field. Returns the resolved value.
	pub async fn update_array(
		&self,
		tenant_ref: &str,
		mode: ArrayMode,
		key: &str,
		raw: Option<&Value>,
	) -> CgResult<Value> {
		let backend = self.backend()?;
		let field = self.field(key)?;
		if !field.array {
			return Err(Error::NotArrayField { field: key.into() });
		}
		let raw = raw.ok_or_else(|| Error::MissingValue { field: key.into() })?;
		let tenant = self.resolver.tenant(tenant_ref).await?;
		let value = self.resolve_value(&field, raw, &tenant).await?.into_stored();

		let _guard = self.lock_tenant(&tenant.id).await;

		let mut items = match self.get(&tenant.id).remove(key) {
			Some(Value::Array(items)) => items,
			_ => Vec::new(),
		};
		match mode {
			ArrayMode::Add => {
				if items.contains(&value) {
					return Err(Error::DuplicateValue { field: key.into(), value });
				}
				items.push(value.clone());
			}
			ArrayMode::Remove => {
				if !items.contains(&value) {
					return Err(Error::NotFound { field: key.into(), value });
				}
				items.retain(|item| item != &value);
			}
		}

		let mut patch = Record::new();
		patch.insert(key.into(), Value::Array(items));
		backend.provider.update(&self.store, &tenant.id, &backend.prepare_write(patch)).await?;
		self.sync_one(&backend, &tenant.id).await?;

		info!("{} {} on '{}' of '{}'", mode, value, key, tenant.id);
		Ok(value)
	}

	// Schema evolution
	//******************

	/// Add a field to the schema. Returns whether the table was migrated.
	///
	/// Cached records pick up the new default on the next `sync`.
	pub async fn add_field(&self, field: FieldSpec) -> CgResult<bool> {
		if !self.resolver.supports(&field.type_tag) {
			return Err(Error::SchemaError(format!(
				"field '{}' has unsupported type '{}'",
				field.name, field.type_tag
			)));
		}
		let name = field.name.clone();
		let schema = {
			let mut current = self.schema.write();
			let mut next = Schema::clone(&current);
			next.add(field)?;
			let next = Arc::new(next);
			*current = Arc::clone(&next);
			next
		};
		info!("Added field '{}' to '{}'", name, self.store);
		self.migrate(&schema, &name).await
	}

	/// Remove a field from the schema. Returns whether the table was migrated.
	pub async fn remove_field(&self, key: &str) -> CgResult<bool> {
		let schema = {
			let mut current = self.schema.write();
			let mut next = Schema::clone(&current);
			next.remove(key)?;
			let next = Arc::new(next);
			*current = Arc::clone(&next);
			next
		};
		info!("Removed field '{}' from '{}'", key, self.store);
		self.migrate(&schema, key).await
	}

	async fn migrate(&self, schema: &Schema, changed: &str) -> CgResult<bool> {
		let sql = self.backend.read().as_ref().and_then(|b| b.sql.clone());
		match sql {
			Some(sql) => sql.update_columns(&self.store, schema, changed).await,
			None => Ok(false),
		}
	}
}

// vim: ts=4
