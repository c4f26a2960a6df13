//! Persistence providers by engine name

use std::collections::HashMap;
use std::sync::Arc;

use crate::prelude::*;
use confgate_types::provider::Provider;

/// Engine name -> provider, filled once at startup
#[derive(Debug, Default)]
pub struct ProviderRegistry {
	providers: HashMap<Box<str>, Arc<dyn Provider>>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a provider under an engine name
	pub fn register(&mut self, engine: impl Into<Box<str>>, provider: Arc<dyn Provider>) -> CgResult<()> {
		let engine = engine.into();
		if self.providers.contains_key(&engine) {
			return Err(Error::ConfigError(format!("provider '{}' is already registered", engine)));
		}

		debug!("Registering provider: {} ({:?})", engine, provider.caps());
		self.providers.insert(engine, provider);
		Ok(())
	}

	pub fn get(&self, engine: &str) -> CgResult<Arc<dyn Provider>> {
		self.providers
			.get(engine)
			.cloned()
			.ok_or_else(|| Error::ProviderNotRegistered(engine.into()))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.providers.keys().map(AsRef::as_ref)
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use confgate_types::provider::ColumnDef;

	#[derive(Debug)]
	struct Nothing;

	#[async_trait]
	impl Provider for Nothing {
		async fn has_table(&self, _store: &str) -> CgResult<bool> {
			Ok(false)
		}
		async fn create_table(&self, _store: &str, _columns: Option<&[ColumnDef]>) -> CgResult<()> {
			Ok(())
		}
		async fn get_all(&self, _store: &str) -> CgResult<Vec<Record>> {
			Ok(Vec::new())
		}
		async fn get(&self, _store: &str, _id: &str) -> CgResult<Option<Record>> {
			Ok(None)
		}
		async fn create(&self, _store: &str, _id: &str, _record: &Record) -> CgResult<()> {
			Ok(())
		}
		async fn update(&self, _store: &str, _id: &str, _patch: &Record) -> CgResult<()> {
			Ok(())
		}
		async fn delete(&self, _store: &str, _id: &str) -> CgResult<()> {
			Ok(())
		}
	}

	#[test]
	fn test_register_and_get() {
		let mut registry = ProviderRegistry::new();
		assert!(registry.register("json", Arc::new(Nothing)).is_ok());
		assert!(registry.get("json").is_ok());
		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["json"]);
		assert!(matches!(registry.get("mongo"), Err(Error::ProviderNotRegistered(e)) if &*e == "mongo"));
	}

	#[test]
	fn test_duplicate_registration() {
		let mut registry = ProviderRegistry::new();
		assert!(registry.register("json", Arc::new(Nothing)).is_ok());
		assert!(matches!(registry.register("json", Arc::new(Nothing)), Err(Error::ConfigError(_))));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn test_default_sanitizer_quotes() {
		assert_eq!(Nothing.sanitize("!"), "'!'");
		assert_eq!(Nothing.sanitize("it's"), "'it''s'");
		assert!(Nothing.constants().is_none());
	}
}

// vim: ts=4
