//! redb document provider
//!
//! Every store type is a redb table keyed by tenant id. Each value is the
//! tenant's record as a JSON document, with array fields kept as native
//! arrays. The provider declares no relational capabilities.
//!
//! # Storage Layout
//!
//! One file (`{storage_dir}/settings.redb`) holds every store type:
//! - `<store>` - tenant id -> JSON document `{ id, field₁, … }`

use async_trait::async_trait;
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use confgate_types::error::CgResult;
use confgate_types::provider::{ColumnDef, Provider};
use confgate_types::types::{ID_KEY, Record};

mod error;
pub use error::Error;
use error::from_redb_error;

/// File name of the database inside the storage directory
pub const DB_FILE: &str = "settings.redb";

fn table(store: &str) -> TableDefinition<'_, &'static str, &'static str> {
	TableDefinition::new(store)
}

fn parse_document(id: &str, text: &str) -> Result<Record, Error> {
	match serde_json::from_str(text)? {
		Value::Object(mut record) => {
			record.insert(ID_KEY.into(), Value::String(id.into()));
			Ok(record)
		}
		_ => Err(Error::InvalidDocument(id.into())),
	}
}

fn read_document(db: &redb::Database, store: &str, id: &str) -> Result<Option<Record>, Error> {
	let tx = db.begin_read().map_err(from_redb_error)?;
	let documents = match tx.open_table(table(store)) {
		Ok(documents) => documents,
		Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
		Err(err) => return Err(from_redb_error(err)),
	};
	let text = documents.get(id).map_err(from_redb_error)?.map(|doc| doc.value().to_string());
	text.map(|text| parse_document(id, &text)).transpose()
}

fn read_all(db: &redb::Database, store: &str) -> Result<Vec<Record>, Error> {
	let tx = db.begin_read().map_err(from_redb_error)?;
	let documents = match tx.open_table(table(store)) {
		Ok(documents) => documents,
		Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
		Err(err) => return Err(from_redb_error(err)),
	};

	let mut records = Vec::new();
	for item in documents.iter().map_err(from_redb_error)? {
		let (id, doc) = item.map_err(from_redb_error)?;
		records.push(parse_document(id.value(), doc.value())?);
	}
	Ok(records)
}

/// Read-modify-write of one document inside a single write transaction
fn write_document(
	db: &redb::Database,
	store: &str,
	id: &str,
	f: impl FnOnce(Option<Record>) -> Record,
) -> Result<(), Error> {
	let tx = db.begin_write().map_err(from_redb_error)?;
	{
		let mut documents = tx.open_table(table(store)).map_err(from_redb_error)?;
		let current = documents.get(id).map_err(from_redb_error)?.map(|doc| doc.value().to_string());
		let current = current.map(|text| parse_document(id, &text)).transpose()?;

		let mut record = f(current);
		record.insert(ID_KEY.into(), Value::String(id.into()));
		let text = serde_json::to_string(&record)?;
		documents.insert(id, text.as_str()).map_err(from_redb_error)?;
	}
	tx.commit().map_err(from_redb_error)?;
	Ok(())
}

fn delete_document(db: &redb::Database, store: &str, id: &str) -> Result<(), Error> {
	let tx = db.begin_write().map_err(from_redb_error)?;
	{
		let mut documents = tx.open_table(table(store)).map_err(from_redb_error)?;
		documents.remove(id).map_err(from_redb_error)?;
	}
	tx.commit().map_err(from_redb_error)?;
	Ok(())
}

#[derive(Debug)]
pub struct ProviderRedb {
	db: Arc<redb::Database>,
	path: PathBuf,
}

impl ProviderRedb {
	/// Open or create the settings database in `storage_dir`
	pub async fn new(storage_dir: impl AsRef<Path>) -> CgResult<Self> {
		let storage_dir = storage_dir.as_ref();
		tokio::fs::create_dir_all(storage_dir).await?;

		let path = storage_dir.join(DB_FILE);
		let db_path = path.clone();
		let db = tokio::task::spawn_blocking(move || {
			redb::Database::create(&db_path).map_err(from_redb_error)
		})
		.await
		.map_err(Error::from)??;
		info!("Opened redb settings database at {}", path.display());
		Ok(Self { db: Arc::new(db), path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Run a storage closure on the blocking pool
	async fn blocking<T, F>(&self, f: F) -> CgResult<T>
	where
		T: Send + 'static,
		F: FnOnce(&redb::Database) -> Result<T, Error> + Send + 'static,
	{
		let db = Arc::clone(&self.db);
		let res = tokio::task::spawn_blocking(move || f(&db)).await.map_err(Error::from)?;
		Ok(res?)
	}
}

#[async_trait]
impl Provider for ProviderRedb {
	async fn has_table(&self, store: &str) -> CgResult<bool> {
		let store = store.to_string();
		self.blocking(move |db| {
			let tx = db.begin_read().map_err(from_redb_error)?;
			match tx.open_table(table(&store)) {
				Ok(_) => Ok(true),
				Err(redb::TableError::TableDoesNotExist(_)) => Ok(false),
				Err(err) => Err(from_redb_error(err)),
			}
		})
		.await
	}

	async fn create_table(&self, store: &str, columns: Option<&[ColumnDef]>) -> CgResult<()> {
		if columns.is_some() {
			debug!("Ignoring column definitions for document table '{}'", store);
		}
		let store = store.to_string();
		self.blocking(move |db| {
			let tx = db.begin_write().map_err(from_redb_error)?;
			tx.open_table(table(&store)).map_err(from_redb_error)?;
			tx.commit().map_err(from_redb_error)
		})
		.await
	}

	async fn get_all(&self, store: &str) -> CgResult<Vec<Record>> {
		let store = store.to_string();
		self.blocking(move |db| read_all(db, &store)).await
	}

	async fn get(&self, store: &str, id: &str) -> CgResult<Option<Record>> {
		let (store, id) = (store.to_string(), id.to_string());
		self.blocking(move |db| read_document(db, &store, &id)).await
	}

	async fn create(&self, store: &str, id: &str, record: &Record) -> CgResult<()> {
		let (store_owned, id_owned, record) = (store.to_string(), id.to_string(), record.clone());
		self.blocking(move |db| write_document(db, &store_owned, &id_owned, |_| record)).await?;
		debug!("Created document '{}' in '{}'", id, store);
		Ok(())
	}

	/// Merges the patch into the stored document, creating it if missing
	async fn update(&self, store: &str, id: &str, patch: &Record) -> CgResult<()> {
		let (store, id, patch) = (store.to_string(), id.to_string(), patch.clone());
		self.blocking(move |db| {
			write_document(db, &store, &id, |current| {
				let mut record = current.unwrap_or_default();
				record.extend(patch);
				record
			})
		})
		.await
	}

	async fn delete(&self, store: &str, id: &str) -> CgResult<()> {
		let (store, id) = (store.to_string(), id.to_string());
		self.blocking(move |db| delete_document(db, &store, &id)).await
	}
}


// vim: ts=4
