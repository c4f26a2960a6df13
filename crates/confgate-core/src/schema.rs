//! Schema definition: the recognized fields of a store type and their defaults

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prelude::*;
use confgate_types::types::{ID_KEY, is_identifier};

/// Declaration of one configurable field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
	pub name: Box<str>,
	/// Logical type, matched case-insensitively by the resolver
	pub type_tag: Box<str>,
	pub default: Value,
	pub array: bool,
	/// Backend column definition overriding the generated one
	pub sql: Option<Box<str>>,
}

impl FieldSpec {
	pub fn builder(name: impl Into<Box<str>>, type_tag: impl Into<Box<str>>) -> FieldSpecBuilder {
		FieldSpecBuilder::new(name, type_tag)
	}

	pub fn type_key(&self) -> String {
		self.type_tag.to_lowercase()
	}

	fn validate(&self) -> CgResult<()> {
		if !is_identifier(&self.name) || &*self.name == ID_KEY {
			return Err(Error::SchemaError(format!("invalid field name '{}'", self.name)));
		}
		if self.type_tag.trim().is_empty() {
			return Err(Error::SchemaError(format!("field '{}' has no type", self.name)));
		}
		match (self.array, self.default.is_array()) {
			(true, false) => Err(Error::SchemaError(format!(
				"array field '{}' needs an array default",
				self.name
			))),
			(false, true) => Err(Error::SchemaError(format!(
				"scalar field '{}' cannot have an array default",
				self.name
			))),
			_ => Ok(()),
		}
	}
}

/// Builder for FieldSpec with fluent API
pub struct FieldSpecBuilder {
	name: Box<str>,
	type_tag: Box<str>,
	default: Option<Value>,
	array: bool,
	sql: Option<Box<str>>,
}

impl FieldSpecBuilder {
	pub fn new(name: impl Into<Box<str>>, type_tag: impl Into<Box<str>>) -> Self {
		Self { name: name.into(), type_tag: type_tag.into(), default: None, array: false, sql: None }
	}

	pub fn default(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	pub fn array(mut self, array: bool) -> Self {
		self.array = array;
		self
	}

	pub fn sql(mut self, sql: impl Into<Box<str>>) -> Self {
		self.sql = Some(sql.into());
		self
	}

	/// Build the FieldSpec. Array fields without a default get an empty array.
	pub fn build(self) -> CgResult<FieldSpec> {
		let default = match (self.default, self.array) {
			(None | Some(Value::Null), true) => Value::Array(Vec::new()),
			(None, false) => Value::Null,
			(Some(value), _) => value,
		};
		let spec = FieldSpec {
			name: self.name,
			type_tag: self.type_tag,
			default,
			array: self.array,
			sql: self.sql,
		};
		spec.validate()?;
		Ok(spec)
	}
}

/// Field entry of the schema source format
#[derive(Debug, Serialize, Deserialize)]
struct FieldSource {
	#[serde(rename = "type")]
	type_tag: String,
	#[serde(default)]
	default: Value,
	#[serde(default)]
	array: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	sql: Option<String>,
}

/// Ordered set of fields with their derived defaults record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
	fields: Vec<FieldSpec>,
	defaults: Record,
}

impl Schema {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_fields(fields: impl IntoIterator<Item = FieldSpec>) -> CgResult<Self> {
		let mut schema = Self::new();
		for field in fields {
			schema.add(field)?;
		}
		Ok(schema)
	}

	/// Parse `{ fieldName: { type, default, array, sql? }, … }`
	pub fn from_source(source: &Value) -> CgResult<Self> {
		let Value::Object(map) = source else {
			return Err(Error::SchemaError("schema source must be an object".into()));
		};

		let mut schema = Self::new();
		for (name, entry) in map {
			let src: FieldSource = serde_json::from_value(entry.clone()).map_err(|err| {
				Error::SchemaError(format!("invalid definition of field '{}': {}", name, err))
			})?;
			let mut builder =
				FieldSpec::builder(name.as_str(), src.type_tag).default(src.default).array(src.array);
			if let Some(sql) = src.sql {
				builder = builder.sql(sql);
			}
			schema.add(builder.build()?)?;
		}
		Ok(schema)
	}

	pub fn to_source(&self) -> Value {
		let map = self
			.fields
			.iter()
			.map(|field| {
				let src = FieldSource {
					type_tag: field.type_tag.to_string(),
					default: field.default.clone(),
					array: field.array,
					sql: field.sql.as_deref().map(str::to_string),
				};
				(field.name.to_string(), serde_json::to_value(src).unwrap_or(Value::Null))
			})
			.collect();
		Value::Object(map)
	}

	pub fn add(&mut self, field: FieldSpec) -> CgResult<()> {
		field.validate()?;
		if self.contains(&field.name) {
			return Err(Error::SchemaError(format!("field '{}' is already defined", field.name)));
		}
		debug!("Adding schema field: {} ({})", field.name, field.type_tag);
		self.defaults.insert(field.name.to_string(), field.default.clone());
		self.fields.push(field);
		Ok(())
	}

	pub fn remove(&mut self, key: &str) -> CgResult<FieldSpec> {
		let pos = self
			.fields
			.iter()
			.position(|f| &*f.name == key)
			.ok_or_else(|| Error::UnknownField { field: key.into() })?;
		debug!("Removing schema field: {}", key);
		self.defaults.remove(key);
		Ok(self.fields.remove(pos))
	}

	pub fn get(&self, key: &str) -> Option<&FieldSpec> {
		self.fields.iter().find(|f| &*f.name == key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
		self.fields.iter()
	}

	pub fn array_fields(&self) -> impl Iterator<Item = &FieldSpec> {
		self.fields.iter().filter(|f| f.array)
	}

	/// `{ field: default }` for every field
	pub fn defaults(&self) -> &Record {
		&self.defaults
	}

	/// Conform a stored record to this schema: missing fields get their
	/// default, unknown members are dropped, array fields always hold arrays.
	pub fn normalize(&self, id: &str, mut record: Record) -> Record {
		let mut out = Record::new();
		out.insert(ID_KEY.into(), Value::String(id.into()));
		for field in &self.fields {
			let value = match record.remove(&*field.name) {
				Some(Value::Null) | None if field.array => field.default.clone(),
				Some(value) if field.array && !value.is_array() => {
					warn!("Field '{}' of '{}' is not an array, using default", field.name, id);
					field.default.clone()
				}
				Some(value) => value,
				None => field.default.clone(),
			};
			out.insert(field.name.to_string(), value);
		}
		out
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}


// vim: ts=4
