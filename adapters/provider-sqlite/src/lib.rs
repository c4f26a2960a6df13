//! SQLite persistence provider
//!
//! Every store type is a table with one row per tenant. Column definitions come
//! from the gateway's relational adapter; array fields arrive already encoded
//! as JSON text.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
	Column, QueryBuilder, Row, Sqlite, TypeInfo, ValueRef,
	sqlite::{self, SqlitePool, SqliteRow},
};
use std::path::Path;

use confgate_types::prelude::*;
use confgate_types::provider::{ColumnDef, ColumnTypes, Provider, ProviderCaps};
use confgate_types::types::{ID_KEY, is_identifier};

/// Column type literals by lowercase type tag
const CONSTANTS: [(&str, &str); 5] = [
	("string", "TEXT"),
	("integer", "INTEGER"),
	("float", "REAL"),
	("boolean", "INTEGER"),
	("timestamp", "DATETIME"),
];

// Helper functions
//******************
fn db_error(err: sqlx::Error) -> Error {
	warn!("DB: {:#?}", err);
	Error::DbError(err.to_string())
}

fn ident(name: &str) -> CgResult<&str> {
	if is_identifier(name) {
		Ok(name)
	} else {
		Err(Error::SchemaError(format!("invalid SQL identifier '{}'", name)))
	}
}

/// Bind a JSON value as the closest SQLite storage class
fn push_value(query: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
	match value {
		Value::Null => {
			query.push("NULL");
		}
		Value::Bool(b) => {
			query.push_bind(i64::from(*b));
		}
		Value::Number(n) => match n.as_i64() {
			Some(i) => {
				query.push_bind(i);
			}
			None => {
				query.push_bind(n.as_f64().unwrap_or_default());
			}
		},
		Value::String(s) => {
			query.push_bind(s.clone());
		}
		Value::Array(_) | Value::Object(_) => {
			query.push_bind(value.to_string());
		}
	}
}

fn row_to_record(row: &SqliteRow) -> Result<Record, sqlx::Error> {
	let mut record = Record::new();
	for (idx, column) in row.columns().iter().enumerate() {
		let raw = row.try_get_raw(idx)?;
		let value = if raw.is_null() {
			Value::Null
		} else {
			match raw.type_info().name() {
				"INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
				"REAL" => Value::from(row.try_get::<f64, _>(idx)?),
				"BLOB" => {
					let bytes: Vec<u8> = row.try_get(idx)?;
					Value::from(String::from_utf8_lossy(&bytes).into_owned())
				}
				_ => Value::from(row.try_get::<String, _>(idx)?),
			}
		};
		record.insert(column.name().to_string(), value);
	}
	Ok(record)
}

/// Data fields of a record: the id member is written separately
fn fields(record: &Record) -> CgResult<Vec<(&str, &Value)>> {
	let mut fields = Vec::with_capacity(record.len());
	for (key, value) in record {
		if key != ID_KEY {
			fields.push((ident(key)?, value));
		}
	}
	Ok(fields)
}

fn column_defs(columns: &[ColumnDef]) -> CgResult<Vec<String>> {
	let mut defs = Vec::with_capacity(columns.len());
	for col in columns {
		defs.push(format!("{} {}", ident(&col.name)?, col.definition));
	}
	Ok(defs)
}

#[derive(Debug)]
pub struct ProviderSqlite {
	db: SqlitePool,
	constants: ColumnTypes,
}

impl ProviderSqlite {
	pub async fn new(path: impl AsRef<Path>) -> CgResult<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.map_err(db_error)?;

		info!("Opened SQLite settings database at {}", path.display());
		let constants = CONSTANTS.iter().map(|(tag, literal)| ((*tag).into(), (*literal).into())).collect();
		Ok(Self { db, constants })
	}

	async fn column_names(&self, store: &str) -> CgResult<Vec<Box<str>>> {
		let rows = sqlx::query(&format!("PRAGMA table_info({})", ident(store)?))
			.fetch_all(&self.db)
			.await
			.map_err(db_error)?;
		rows.iter()
			.map(|row| row.try_get::<String, _>("name").map(Box::from))
			.collect::<Result<_, _>>()
			.map_err(db_error)
	}
}

#[async_trait]
impl Provider for ProviderSqlite {
	fn caps(&self) -> ProviderCaps {
		ProviderCaps { sql: true, column_migration: true }
	}

	async fn has_table(&self, store: &str) -> CgResult<bool> {
		let res = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
			.bind(store)
			.fetch_optional(&self.db)
			.await
			.map_err(db_error)?;
		Ok(res.is_some())
	}

	async fn create_table(&self, store: &str, columns: Option<&[ColumnDef]>) -> CgResult<()> {
		let defs = match columns {
			Some(columns) if !columns.is_empty() => column_defs(columns)?,
			_ => vec![format!("{} TEXT NOT NULL UNIQUE", ID_KEY)],
		};
		let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", ident(store)?, defs.join(", "));
		debug!("SQL: {}", sql);
		sqlx::query(&sql).execute(&self.db).await.map_err(db_error)?;
		Ok(())
	}

	async fn get_all(&self, store: &str) -> CgResult<Vec<Record>> {
		let rows = sqlx::query(&format!("SELECT * FROM {}", ident(store)?))
			.fetch_all(&self.db)
			.await
			.map_err(db_error)?;
		rows.iter().map(row_to_record).collect::<Result<_, _>>().map_err(db_error)
	}

	async fn get(&self, store: &str, id: &str) -> CgResult<Option<Record>> {
		let row = sqlx::query(&format!("SELECT * FROM {} WHERE id=?", ident(store)?))
			.bind(id)
			.fetch_optional(&self.db)
			.await
			.map_err(db_error)?;
		row.as_ref().map(row_to_record).transpose().map_err(db_error)
	}

	async fn create(&self, store: &str, id: &str, record: &Record) -> CgResult<()> {
		let fields = fields(record)?;
		let mut query = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (id", ident(store)?));
		for (key, _) in &fields {
			query.push(", ").push(*key);
		}
		query.push(") VALUES (").push_bind(id.to_string());
		for (_, value) in &fields {
			query.push(", ");
			push_value(&mut query, value);
		}
		query.push(")");

		query.build().execute(&self.db).await.map_err(db_error)?;
		Ok(())
	}

	/// Upserts: a tenant without a row gets one with the column defaults
	async fn update(&self, store: &str, id: &str, patch: &Record) -> CgResult<()> {
		let fields = fields(patch)?;
		if fields.is_empty() {
			return Ok(());
		}

		let mut query = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (id", ident(store)?));
		for (key, _) in &fields {
			query.push(", ").push(*key);
		}
		query.push(") VALUES (").push_bind(id.to_string());
		for (_, value) in &fields {
			query.push(", ");
			push_value(&mut query, value);
		}
		query.push(") ON CONFLICT(id) DO UPDATE SET ");
		for (i, (key, _)) in fields.iter().enumerate() {
			if i > 0 {
				query.push(", ");
			}
			query.push(format!("{key}=excluded.{key}"));
		}

		query.build().execute(&self.db).await.map_err(db_error)?;
		Ok(())
	}

	async fn delete(&self, store: &str, id: &str) -> CgResult<()> {
		sqlx::query(&format!("DELETE FROM {} WHERE id=?", ident(store)?))
			.bind(id)
			.execute(&self.db)
			.await
			.map_err(db_error)?;
		Ok(())
	}

	/// Rebuilds the table in one transaction, copying the retained columns
	/// that exist in both the old and the new table
	async fn update_columns(
		&self,
		store: &str,
		retained: &[Box<str>],
		columns: &[ColumnDef],
	) -> CgResult<()> {
		let store = ident(store)?;
		let existing = self.column_names(store).await?;
		let mut copy = Vec::with_capacity(retained.len());
		for name in retained {
			if existing.contains(name) && columns.iter().any(|col| col.name == *name) {
				copy.push(ident(name)?);
			}
		}
		let defs = column_defs(columns)?;
		let tmp = format!("{}_migrate", store);

		let mut tx = self.db.begin().await.map_err(db_error)?;
		sqlx::query(&format!("DROP TABLE IF EXISTS {}", tmp))
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		sqlx::query(&format!("CREATE TABLE {} ({})", tmp, defs.join(", ")))
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		if !copy.is_empty() {
			let list = copy.join(", ");
			sqlx::query(&format!("INSERT INTO {} ({}) SELECT {} FROM {}", tmp, list, list, store))
				.execute(&mut *tx)
				.await
				.map_err(db_error)?;
		}
		sqlx::query(&format!("DROP TABLE {}", store))
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		sqlx::query(&format!("ALTER TABLE {} RENAME TO {}", tmp, store))
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		tx.commit().await.map_err(db_error)?;

		info!("Rebuilt table '{}' with {} columns ({} copied)", store, columns.len(), copy.len());
		Ok(())
	}

	fn constants(&self) -> Option<&ColumnTypes> {
		Some(&self.constants)
	}

	fn sanitize(&self, value: &str) -> String {
		format!("'{}'", value.replace('\'', "''"))
	}
}


// vim: ts=4
