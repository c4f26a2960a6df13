//! Relational adapter for SQL providers.
//!
//! Turns the schema into column definitions, stores array fields as JSON text
//! and drives column migration when the schema changes.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::prelude::*;
use crate::schema::{FieldSpec, Schema};
use confgate_types::provider::{ColumnDef, Provider};
use confgate_types::types::{ID_KEY, record_id};

/// Definition of the implicit id column
pub const ID_COLUMN: &str = "TEXT NOT NULL UNIQUE";

/// Column type used when a type tag has no mapping
pub const FALLBACK_COLUMN_TYPE: &str = "TEXT";

/// Used when the provider has no constants of its own
const DEFAULT_COLUMN_TYPES: [(&str, &str); 5] = [
	("string", "TEXT"),
	("integer", "INTEGER"),
	("float", "REAL"),
	("boolean", "INTEGER"),
	("timestamp", "DATETIME"),
];

/// How a field's value is stored in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
	/// Arrays as JSON text
	Json,
	/// Booleans as 0/1
	Boolean,
	/// Numbers that must read back as floats
	Float,
}

impl Codec {
	fn of(field: &FieldSpec) -> Option<Self> {
		if field.array {
			return Some(Codec::Json);
		}
		match field.type_key().as_str() {
			"boolean" => Some(Codec::Boolean),
			"float" => Some(Codec::Float),
			_ => None,
		}
	}
}

fn decode_bool(value: &Value) -> Option<bool> {
	match value {
		Value::Bool(b) => Some(*b),
		Value::Number(n) => match n.as_i64() {
			Some(0) => Some(false),
			Some(1) => Some(true),
			_ => None,
		},
		Value::String(s) => match s.trim() {
			"0" | "false" => Some(false),
			"1" | "true" => Some(true),
			_ => None,
		},
		_ => None,
	}
}

fn decode_float(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

pub struct SqlAdapter {
	provider: Arc<dyn Provider>,
	codecs: RwLock<Vec<(Box<str>, Codec)>>,
}

impl std::fmt::Debug for SqlAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqlAdapter")
			.field("provider", &self.provider)
			.field("codecs", &*self.codecs.read())
			.finish()
	}
}

impl SqlAdapter {
	pub fn new(provider: Arc<dyn Provider>, schema: &Schema) -> Self {
		let adapter = Self { provider, codecs: RwLock::new(Vec::new()) };
		adapter.init_deserialize(schema);
		adapter
	}

	/// SQL literal of a default value
	fn literal(&self, default: &Value) -> Option<String> {
		match default {
			Value::Null => None,
			Value::Bool(b) => Some(u8::from(*b).to_string()),
			Value::Number(n) => Some(n.to_string()),
			Value::String(s) => Some(self.provider.sanitize(s)),
			other => Some(self.provider.sanitize(&other.to_string())),
		}
	}

	fn column_type(&self, type_key: &str) -> Box<str> {
		let mapped = match self.provider.constants() {
			Some(constants) => constants.get(type_key).cloned(),
			None => DEFAULT_COLUMN_TYPES
				.iter()
				.find(|(tag, _)| *tag == type_key)
				.map(|(_, literal)| (*literal).into()),
		};
		mapped.unwrap_or_else(|| FALLBACK_COLUMN_TYPE.into())
	}

	/// Column definition of a single field
	pub fn column(&self, field: &FieldSpec) -> ColumnDef {
		if let Some(sql) = &field.sql {
			return ColumnDef::new(field.name.clone(), sql.clone());
		}

		let column_type = self.column_type(&field.type_key());
		match self.literal(&field.default) {
			Some(default) => {
				ColumnDef::new(field.name.clone(), format!("{} DEFAULT {}", column_type, default))
			}
			None => ColumnDef::new(field.name.clone(), column_type),
		}
	}

	/// Full column list for table creation, led by the id column
	pub fn build_schema(&self, schema: &Schema) -> Vec<ColumnDef> {
		std::iter::once(ColumnDef::new(ID_KEY, ID_COLUMN))
			.chain(schema.fields().map(|field| self.column(field)))
			.collect()
	}

	/// Refresh the set of fields whose stored form differs from their JSON form
	pub fn init_deserialize(&self, schema: &Schema) {
		let codecs =
			schema.fields().filter_map(|f| Codec::of(f).map(|codec| (f.name.clone(), codec))).collect();
		*self.codecs.write() = codecs;
	}

	pub fn array_fields(&self) -> Vec<Box<str>> {
		self.codecs
			.read()
			.iter()
			.filter(|(_, codec)| *codec == Codec::Json)
			.map(|(name, _)| name.clone())
			.collect()
	}

	/// Encode a record before handing it to the provider: arrays become JSON
	/// text and booleans become 0/1
	pub fn serialize(&self, record: &mut Record) {
		for (field, codec) in self.codecs.read().iter() {
			let Some(value) = record.get_mut(&**field) else { continue };
			let encoded = match (codec, &*value) {
				(Codec::Json, Value::Array(_)) => Value::String(value.to_string()),
				(Codec::Boolean, Value::Bool(b)) => Value::from(u8::from(*b)),
				_ => continue,
			};
			*value = encoded;
		}
	}

	/// Decode a record read from the provider back into the schema's types
	pub fn deserialize(&self, record: &mut Record) -> CgResult<()> {
		let tenant: Box<str> = record_id(record).unwrap_or_default().into();
		let failure = |field: &str, message: String| Error::Deserialization {
			tenant: tenant.clone(),
			field: field.into(),
			message,
		};

		for (field, codec) in self.codecs.read().iter() {
			let Some(value) = record.get_mut(&**field) else { continue };
			if value.is_null() {
				continue;
			}
			match codec {
				Codec::Json => {
					if let Value::String(text) = &*value {
						let items: Vec<Value> = serde_json::from_str(text)
							.map_err(|err| failure(&**field, err.to_string()))?;
						*value = Value::Array(items);
					}
				}
				Codec::Boolean => {
					let b = decode_bool(value)
						.ok_or_else(|| failure(&**field, format!("{} is not a boolean", value)))?;
					*value = Value::Bool(b);
				}
				Codec::Float => {
					let n = decode_float(value)
						.ok_or_else(|| failure(&**field, format!("{} is not a number", value)))?;
					*value = Value::from(n);
				}
			}
		}
		Ok(())
	}

	/// Rebuild the table for the new `schema`. `changed` is the field that was
	/// just added or removed; its data is not carried over.
	///
	/// Returns `false` if the provider cannot migrate columns.
	pub async fn update_columns(
		&self,
		store: &str,
		schema: &Schema,
		changed: &str,
	) -> CgResult<bool> {
		if !self.provider.caps().column_migration {
			warn!(
				"Provider for '{}' has no column migration, schema change of '{}' is not applied to the table",
				store, changed
			);
			return Ok(false);
		}

		let columns = self.build_schema(schema);
		let retained: Vec<Box<str>> = columns
			.iter()
			.map(|col| col.name.clone())
			.filter(|name| &**name != changed)
			.collect();

		match self.provider.update_columns(store, &retained, &columns).await {
			Ok(()) => {}
			Err(Error::MigrationUnsupported(_)) => {
				warn!("Provider for '{}' refused column migration", store);
				return Ok(false);
			}
			Err(err) => return Err(err),
		}
		self.init_deserialize(schema);
		info!("Migrated columns of '{}' ({} columns)", store, columns.len());
		Ok(true)
	}
}

/// Render column definitions as DDL lines
pub fn ddl(columns: &[ColumnDef]) -> Vec<String> {
	columns.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use confgate_types::provider::{ColumnTypes, ProviderCaps};
	use serde_json::json;

	#[derive(Debug, Default)]
	struct DdlOnly {
		constants: Option<ColumnTypes>,
		migrations: parking_lot::Mutex<Vec<(Vec<Box<str>>, Vec<String>)>>,
		migrate: bool,
	}

	#[async_trait]
	impl Provider for DdlOnly {
		fn caps(&self) -> ProviderCaps {
			ProviderCaps { sql: true, column_migration: self.migrate }
		}
		async fn has_table(&self, _store: &str) -> CgResult<bool> {
			Ok(true)
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
		async fn update_columns(
			&self,
			_store: &str,
			retained: &[Box<str>],
			columns: &[ColumnDef],
		) -> CgResult<()> {
			self.migrations.lock().push((retained.to_vec(), ddl(columns)));
			Ok(())
		}
		fn constants(&self) -> Option<&ColumnTypes> {
			self.constants.as_ref()
		}
	}

	fn schema() -> Schema {
		Schema::from_source(&json!({
			"prefix": { "type": "String", "default": "!" },
			"modRole": { "type": "Role" },
			"volume": { "type": "Integer", "default": 5 },
			"disabledCommands": { "type": "Command", "array": true },
		}))
		.unwrap_or_default()
	}

	fn adapter(provider: DdlOnly) -> SqlAdapter {
		SqlAdapter::new(Arc::new(provider), &schema())
	}

	#[test]
	fn test_build_schema_with_default_types() {
		let adapter = adapter(DdlOnly::default());
		let lines = ddl(&adapter.build_schema(&schema()));
		assert_eq!(lines[0], "id TEXT NOT NULL UNIQUE");
		assert!(lines.contains(&"prefix TEXT DEFAULT '!'".to_string()));
		assert!(lines.contains(&"modRole TEXT".to_string()));
		assert!(lines.contains(&"volume INTEGER DEFAULT 5".to_string()));
		assert!(lines.contains(&"disabledCommands TEXT DEFAULT '[]'".to_string()));
		assert_eq!(lines.len(), 5);
	}

	#[test]
	fn test_provider_constants_and_hint() {
		let mut constants = ColumnTypes::new();
		constants.insert("integer".into(), "BIGINT".into());
		let adapter = adapter(DdlOnly { constants: Some(constants), ..DdlOnly::default() });

		let volume = schema().get("volume").map(|f| adapter.column(f).to_string());
		assert_eq!(volume.as_deref(), Some("volume BIGINT DEFAULT 5"));

		// provider constants replace the built-in table entirely
		let prefix = schema().get("prefix").map(|f| adapter.column(f).to_string());
		assert_eq!(prefix.as_deref(), Some("prefix TEXT DEFAULT '!'"));

		let hinted = FieldSpec::builder("prefix", "String").default("!").sql("TEXT NOT NULL DEFAULT '!'").build();
		assert_eq!(
			hinted.map(|f| adapter.column(&f).to_string()).ok().as_deref(),
			Some("prefix TEXT NOT NULL DEFAULT '!'")
		);
	}

	#[test]
	fn test_array_roundtrip() {
		let adapter = adapter(DdlOnly::default());
		let Value::Object(mut record) = json!({ "id": "1", "prefix": "!", "disabledCommands": ["a", "b"] })
		else {
			return;
		};

		adapter.serialize(&mut record);
		assert_eq!(record.get("disabledCommands"), Some(&json!("[\"a\",\"b\"]")));
		assert_eq!(record.get("prefix"), Some(&json!("!")));

		assert!(adapter.deserialize(&mut record).is_ok());
		assert_eq!(record.get("disabledCommands"), Some(&json!(["a", "b"])));
	}

	#[test]
	fn test_scalar_defaults_are_sql_literals() {
		let adapter = adapter(DdlOnly::default());
		let flag = FieldSpec::builder("flag", "Boolean").default(true).build();
		let ratio = FieldSpec::builder("ratio", "Float").default(1.5).build();
		let quoted = FieldSpec::builder("greeting", "String").default("it's").build();

		assert_eq!(flag.map(|f| adapter.column(&f).to_string()).ok().as_deref(), Some("flag INTEGER DEFAULT 1"));
		assert_eq!(ratio.map(|f| adapter.column(&f).to_string()).ok().as_deref(), Some("ratio REAL DEFAULT 1.5"));
		assert_eq!(
			quoted.map(|f| adapter.column(&f).to_string()).ok().as_deref(),
			Some("greeting TEXT DEFAULT 'it''s'")
		);
	}

	#[test]
	fn test_scalars_decode_to_schema_types() {
		let mut schema = schema();
		let fields = [
			FieldSpec::builder("flag", "Boolean").default(false).build(),
			FieldSpec::builder("ratio", "Float").default(5).build(),
		];
		for field in fields {
			assert!(field.map(|f| schema.add(f)).is_ok());
		}
		let adapter = SqlAdapter::new(Arc::new(DdlOnly::default()), &schema);

		let Value::Object(mut record) = json!({ "id": "1", "flag": true, "ratio": 5, "volume": 5 }) else {
			return;
		};
		adapter.serialize(&mut record);
		assert_eq!(record.get("flag"), Some(&json!(1)));

		// as SQLite hands the row back
		record.insert("ratio".into(), json!(5.0));
		assert!(adapter.deserialize(&mut record).is_ok());
		assert_eq!(record.get("flag"), Some(&json!(true)));
		assert_eq!(record.get("ratio"), Some(&json!(5.0)));
		assert_eq!(record.get("volume"), Some(&json!(5)));

		let Value::Object(mut legacy) = json!({ "id": "2", "flag": "false", "ratio": 2 }) else {
			return;
		};
		assert!(adapter.deserialize(&mut legacy).is_ok());
		assert_eq!(legacy.get("flag"), Some(&json!(false)));
		assert_eq!(legacy.get("ratio"), Some(&json!(2.0)));

		let Value::Object(mut broken) = json!({ "id": "3", "flag": 7 }) else {
			return;
		};
		assert!(matches!(adapter.deserialize(&mut broken), Err(Error::Deserialization { .. })));
	}

	#[test]
	fn test_deserialize_rejects_garbage() {
		let adapter = adapter(DdlOnly::default());
		let Value::Object(mut record) = json!({ "id": "7", "disabledCommands": "[oops" }) else {
			return;
		};
		let res = adapter.deserialize(&mut record);
		assert!(matches!(
			res,
			Err(Error::Deserialization { ref tenant, ref field, .. })
				if &**tenant == "7" && &**field == "disabledCommands"
		));
	}

	#[tokio::test]
	async fn test_update_columns_unsupported() {
		let adapter = adapter(DdlOnly::default());
		assert!(matches!(adapter.update_columns("guilds", &schema(), "volume").await, Ok(false)));
	}

	#[tokio::test]
	async fn test_update_columns_retains_other_fields() {
		let provider = Arc::new(DdlOnly { migrate: true, ..DdlOnly::default() });
		let adapter = SqlAdapter::new(provider.clone(), &schema());

		let mut next = schema();
		let added = FieldSpec::builder("tags", "String").array(true).build();
		assert!(added.map(|f| next.add(f)).is_ok());

		assert!(matches!(adapter.update_columns("guilds", &next, "tags").await, Ok(true)));
		let migrations = provider.migrations.lock();
		let (retained, columns) = &migrations[0];
		assert!(retained.iter().any(|c| &**c == "id"));
		assert!(retained.iter().any(|c| &**c == "prefix"));
		assert!(!retained.iter().any(|c| &**c == "tags"));
		assert!(columns.contains(&"tags TEXT DEFAULT '[]'".to_string()));
		assert!(adapter.array_fields().iter().any(|f| &**f == "tags"));
	}
}

// vim: ts=4
