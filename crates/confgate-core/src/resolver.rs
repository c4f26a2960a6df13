//! Type-tag driven normalization of raw setting input

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

use crate::prelude::*;
use crate::schema::FieldSpec;
use confgate_types::error::ResolutionFailure;
use confgate_types::types::Entity;

const TRUTHY: [&str; 6] = ["true", "t", "yes", "y", "on", "enable"];
const FALSY: [&str; 6] = ["false", "f", "no", "n", "off", "disable"];

/// Kinds of tenant-scoped objects a setting can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
	Role,
	Channel,
	User,
	Command,
}

impl EntityKind {
	/// Strip the platform mention syntax around an id
	fn strip_mention(self, input: &str) -> &str {
		let prefixes: &[&str] = match self {
			EntityKind::Role => &["<@&"],
			EntityKind::Channel => &["<#"],
			EntityKind::User => &["<@!", "<@"],
			EntityKind::Command => &[],
		};
		prefixes
			.iter()
			.find_map(|p| input.strip_prefix(p).and_then(|rest| rest.strip_suffix('>')))
			.unwrap_or(input)
	}
}

/// Lookups against the chat platform client
#[async_trait]
pub trait Directory: Send + Sync {
	async fn tenant(&self, id: &str) -> CgResult<Option<Tenant>>;
	async fn entities(&self, tenant: &Tenant, kind: EntityKind) -> CgResult<Vec<Entity>>;
}

/// A normalized setting value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolved {
	Value(Value),
	Entity(Entity),
	List(Vec<Resolved>),
}

impl Resolved {
	pub fn id(&self) -> Option<&str> {
		match self {
			Resolved::Entity(entity) => Some(&entity.id),
			_ => None,
		}
	}

	/// The value to persist: entities are stored by id
	pub fn into_stored(self) -> Value {
		match self {
			Resolved::Value(value) => value,
			Resolved::Entity(entity) => Value::String(entity.id.into()),
			Resolved::List(items) => Value::Array(items.into_iter().map(Self::into_stored).collect()),
		}
	}
}

#[async_trait]
pub trait Resolver: Send + Sync {
	/// Resolve a tenant reference to a live tenant
	async fn tenant(&self, tenant_ref: &str) -> CgResult<Tenant>;

	fn supports(&self, type_tag: &str) -> bool;

	async fn resolve(
		&self,
		type_tag: &str,
		raw: &Value,
		tenant: &Tenant,
		field: &FieldSpec,
	) -> CgResult<Resolved>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
	String,
	Integer,
	Float,
	Boolean,
	Url,
	Any,
	Reference(EntityKind),
}

impl TypeTag {
	fn parse(tag: &str) -> Option<Self> {
		Some(match tag.to_lowercase().as_str() {
			"string" => TypeTag::String,
			"integer" => TypeTag::Integer,
			"float" => TypeTag::Float,
			"boolean" => TypeTag::Boolean,
			"url" => TypeTag::Url,
			"any" => TypeTag::Any,
			"role" => TypeTag::Reference(EntityKind::Role),
			"channel" => TypeTag::Reference(EntityKind::Channel),
			"user" => TypeTag::Reference(EntityKind::User),
			"command" => TypeTag::Reference(EntityKind::Command),
			_ => return None,
		})
	}
}

fn fail(type_tag: &str, raw: &Value, reason: ResolutionFailure) -> Error {
	Error::Resolution { type_tag: type_tag.into(), value: raw.clone(), reason }
}

/// Default resolver for primitive and reference types
pub struct SettingResolver {
	directory: Arc<dyn Directory>,
}

impl SettingResolver {
	pub fn new(directory: Arc<dyn Directory>) -> Self {
		Self { directory }
	}

	#[allow(clippy::cast_possible_truncation)]
	fn resolve_primitive(tag: TypeTag, type_tag: &str, raw: &Value) -> CgResult<Value> {
		let invalid = || fail(type_tag, raw, ResolutionFailure::InvalidShape);
		match (tag, raw) {
			(TypeTag::Any, _) => Ok(raw.clone()),
			(TypeTag::String, Value::String(_)) => Ok(raw.clone()),
			(TypeTag::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
			(TypeTag::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
			(TypeTag::Integer, Value::Number(n)) => n
				.as_i64()
				.or_else(|| {
					n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)
				})
				.map(Value::from)
				.ok_or_else(invalid),
			(TypeTag::Integer, Value::String(s)) => {
				s.trim().parse::<i64>().map(Value::from).map_err(|_| invalid())
			}
			(TypeTag::Float, Value::Number(n)) => n.as_f64().map(Value::from).ok_or_else(invalid),
			(TypeTag::Float, Value::String(s)) => s
				.trim()
				.parse::<f64>()
				.ok()
				.and_then(serde_json::Number::from_f64)
				.map(Value::Number)
				.ok_or_else(invalid),
			(TypeTag::Boolean, Value::Bool(_)) => Ok(raw.clone()),
			(TypeTag::Boolean, Value::Number(n)) => match n.as_i64() {
				Some(1) => Ok(Value::Bool(true)),
				Some(0) => Ok(Value::Bool(false)),
				_ => Err(invalid()),
			},
			(TypeTag::Boolean, Value::String(s)) => {
				let s = s.trim().to_lowercase();
				if TRUTHY.contains(&s.as_str()) {
					Ok(Value::Bool(true))
				} else if FALSY.contains(&s.as_str()) {
					Ok(Value::Bool(false))
				} else {
					Err(invalid())
				}
			}
			(TypeTag::Url, Value::String(s)) => url::Url::parse(s.trim())
				.map(|url| Value::String(url.to_string()))
				.map_err(|_| invalid()),
			_ => Err(invalid()),
		}
	}

	async fn resolve_reference(
		&self,
		kind: EntityKind,
		type_tag: &str,
		raw: &Value,
		tenant: &Tenant,
	) -> CgResult<Entity> {
		let (query, by_id_only): (Cow<'_, str>, bool) = match raw {
			Value::String(s) => (Cow::Borrowed(s.trim()), false),
			Value::Number(n) => (Cow::Owned(n.to_string()), true),
			Value::Object(obj) => match obj.get("id") {
				Some(Value::String(id)) => (Cow::Borrowed(id.as_str()), true),
				Some(Value::Number(id)) => (Cow::Owned(id.to_string()), true),
				_ => return Err(fail(type_tag, raw, ResolutionFailure::InvalidShape)),
			},
			_ => return Err(fail(type_tag, raw, ResolutionFailure::InvalidShape)),
		};
		if query.is_empty() {
			return Err(fail(type_tag, raw, ResolutionFailure::InvalidShape));
		}

		let entities = self.directory.entities(tenant, kind).await?;
		let id = kind.strip_mention(&query);
		if let Some(entity) = entities.iter().find(|e| &*e.id == id) {
			return Ok(entity.clone());
		}
		if by_id_only {
			return Err(fail(type_tag, raw, ResolutionFailure::NotFound));
		}

		let mut matches = entities.iter().filter(|e| e.name.eq_ignore_ascii_case(&query));
		match (matches.next(), matches.next()) {
			(Some(entity), None) => Ok(entity.clone()),
			(Some(_), Some(_)) => Err(fail(type_tag, raw, ResolutionFailure::Ambiguous)),
			(None, _) => Err(fail(type_tag, raw, ResolutionFailure::NotFound)),
		}
	}
}

#[async_trait]
impl Resolver for SettingResolver {
	async fn tenant(&self, tenant_ref: &str) -> CgResult<Tenant> {
		self.directory
			.tenant(tenant_ref.trim())
			.await?
			.ok_or_else(|| Error::InvalidTenant(tenant_ref.into()))
	}

	fn supports(&self, type_tag: &str) -> bool {
		TypeTag::parse(type_tag).is_some()
	}

	async fn resolve(
		&self,
		type_tag: &str,
		raw: &Value,
		tenant: &Tenant,
		_field: &FieldSpec,
	) -> CgResult<Resolved> {
		let tag = TypeTag::parse(type_tag)
			.ok_or_else(|| fail(type_tag, raw, ResolutionFailure::UnknownType))?;
		match tag {
			TypeTag::Reference(kind) => {
				self.resolve_reference(kind, type_tag, raw, tenant).await.map(Resolved::Entity)
			}
			tag => Self::resolve_primitive(tag, type_tag, raw).map(Resolved::Value),
		}
	}
}


// vim: ts=4
