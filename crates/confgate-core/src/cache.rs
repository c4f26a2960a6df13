//! In-memory cache of tenant records

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::prelude::*;

/// Tenant id -> current settings record.
///
/// A plain mapping without validation. Every record the gateway reads goes
/// through here, so entries are never evicted.
#[derive(Debug, Default)]
pub struct SettingsCache {
	entries: Arc<RwLock<HashMap<Box<str>, Record>>>,
}

impl SettingsCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, id: &str) -> Option<Record> {
		let entries = self.entries.read();
		entries.get(id).cloned()
	}

	pub fn set(&self, id: &str, record: Record) {
		let mut entries = self.entries.write();
		entries.insert(id.into(), record);
	}

	pub fn delete(&self, id: &str) -> bool {
		let mut entries = self.entries.write();
		entries.remove(id).is_some()
	}

	/// Replace the whole content with `records`
	pub fn replace_all(&self, records: impl IntoIterator<Item = (Box<str>, Record)>) {
		let fresh: HashMap<Box<str>, Record> = records.into_iter().collect();
		let mut entries = self.entries.write();
		*entries = fresh;
	}

	pub fn contains(&self, id: &str) -> bool {
		self.entries.read().contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}


// vim: ts=4
