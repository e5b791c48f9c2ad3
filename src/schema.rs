//! Structured schemas and the validator that binds them to config subtrees.
//!
//! A [`SchemaDescriptor`] is a closed field set. Instantiating it produces a
//! [`ConfigNode`] bound to the schema, with every undeclared default left as
//! `Missing`. Undeclared keys are rejected while merging and applying
//! overrides; [`validate_tree`] then fills absent fields and type-checks the
//! rest once composition is complete.

use crate::defaults::DefaultElement;
use crate::error::{CfgError, Result};
use crate::node::{ConfigNode, Value, join_path};
use std::sync::Arc;

/// The declared type of a schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
	Any,
	Bool,
	Int,
	Float,
	Str,
	/// Sequence whose elements all have the given type.
	List(Box<FieldType>),
	/// Open mapping accepting any keys.
	Map,
	/// Nested closed schema.
	Node(Arc<SchemaDescriptor>),
}

impl FieldType {
	fn name(&self) -> String {
		match self {
			FieldType::Any => "any".to_string(),
			FieldType::Bool => "bool".to_string(),
			FieldType::Int => "int".to_string(),
			FieldType::Float => "float".to_string(),
			FieldType::Str => "string".to_string(),
			FieldType::List(elem) => format!("list[{}]", elem.name()),
			FieldType::Map => "mapping".to_string(),
			FieldType::Node(schema) => schema.name().to_string(),
		}
	}
}

/// A single declared field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
	pub name: String,
	pub ty: FieldType,
	/// Value used when the field is absent. `None` means the field starts `Missing`.
	pub default: Option<Value>,
	/// Whether `null` is an acceptable value.
	pub optional: bool,
}

/// A closed set of declared fields, optionally carrying a defaults list.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
	name: String,
	fields: Vec<FieldSpec>,
	defaults: Vec<DefaultElement>,
}

impl SchemaDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fields: Vec::new(),
			defaults: Vec::new(),
		}
	}

	/// Declare a mandatory field with no default.
	pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
		self.push(FieldSpec {
			name: name.into(),
			ty,
			default: None,
			optional: false,
		})
	}

	/// Declare a field with a default value.
	pub fn field_with_default(
		self,
		name: impl Into<String>,
		ty: FieldType,
		default: impl Into<Value>,
	) -> Self {
		self.push(FieldSpec {
			name: name.into(),
			ty,
			default: Some(default.into()),
			optional: false,
		})
	}

	/// Declare a nullable field defaulting to `null`.
	pub fn optional_field(self, name: impl Into<String>, ty: FieldType) -> Self {
		self.push(FieldSpec {
			name: name.into(),
			ty,
			default: Some(Value::Null),
			optional: true,
		})
	}

	/// Attach a defaults list composed whenever this schema is loaded as a config.
	pub fn with_defaults(mut self, defaults: Vec<DefaultElement>) -> Self {
		self.defaults = defaults;
		self
	}

	fn push(mut self, spec: FieldSpec) -> Self {
		self.fields.retain(|f| f.name != spec.name);
		self.fields.push(spec);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn fields(&self) -> &[FieldSpec] {
		&self.fields
	}

	pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn defaults(&self) -> &[DefaultElement] {
		&self.defaults
	}
}

/// Build a node bound to `schema` holding defaults, `Missing` for fields
/// without one, and instantiated nested schemas.
pub fn instantiate(schema: &Arc<SchemaDescriptor>) -> ConfigNode {
	let mut node = ConfigNode::new();
	for spec in schema.fields() {
		node.insert(spec.name.clone(), initial_value(spec));
	}
	node.set_schema(Some(Arc::clone(schema)));
	node
}

fn initial_value(spec: &FieldSpec) -> Value {
	match (&spec.default, &spec.ty) {
		(Some(Value::Map(map)), FieldType::Node(nested)) => {
			let mut node = instantiate(nested);
			for (key, value) in map.iter() {
				node.insert(key, value.clone());
			}
			Value::Map(node)
		}
		(Some(default), _) => default.clone(),
		(None, FieldType::Node(nested)) => Value::Map(instantiate(nested)),
		(None, _) => Value::Missing,
	}
}

/// Bind an unbound mapping to `schema`, rejecting undeclared keys.
pub(crate) fn bind(node: &mut ConfigNode, schema: &Arc<SchemaDescriptor>, path: &str) -> Result<()> {
	if let Some(key) = node.keys().find(|k| schema.field_spec(k).is_none()) {
		return Err(undeclared_key(schema, &join_path(path, key)));
	}
	node.set_schema(Some(Arc::clone(schema)));
	Ok(())
}

pub(crate) fn undeclared_key(schema: &SchemaDescriptor, path: &str) -> CfgError {
	CfgError::Validation {
		path: path.to_string(),
		message: format!("key is not declared in schema '{}'", schema.name()),
	}
}

/// Fill absent declared fields and type-check every schema-bound subtree.
///
/// `Missing` is always a legal terminal value here.
pub fn validate_tree(node: &mut ConfigNode, path: &str) -> Result<()> {
	if let Some(schema) = node.schema().cloned() {
		for spec in schema.fields() {
			let field_path = join_path(path, &spec.name);
			match node.get_mut(&spec.name) {
				Some(value) => check_value(value, &spec.ty, spec.optional, &field_path)?,
				None => {
					node.insert(spec.name.clone(), initial_value(spec));
				}
			}
		}
	}

	for (key, value) in node.iter_mut() {
		let child_path = join_path(path, key);
		validate_value(value, &child_path)?;
	}
	Ok(())
}

fn validate_value(value: &mut Value, path: &str) -> Result<()> {
	match value {
		Value::Map(child) => validate_tree(child, path),
		Value::Seq(items) => {
			for (i, item) in items.iter_mut().enumerate() {
				validate_value(item, &format!("{path}[{i}]"))?;
			}
			Ok(())
		}
		_ => Ok(()),
	}
}

/// Check `value` against `ty`, coercing compatible scalars in place.
fn check_value(value: &mut Value, ty: &FieldType, optional: bool, path: &str) -> Result<()> {
	let mismatch = |found: &Value| CfgError::Validation {
		path: path.to_string(),
		message: format!("expected {}, found {}", ty.name(), found.kind()),
	};

	match (ty, &*value) {
		(_, Value::Missing) | (FieldType::Any, _) => Ok(()),
		(_, Value::Null) if optional => Ok(()),
		(_, Value::Null) => Err(CfgError::Validation {
			path: path.to_string(),
			message: format!("field of type {} is not optional", ty.name()),
		}),
		(FieldType::Bool, Value::Bool(_))
		| (FieldType::Int, Value::Int(_))
		| (FieldType::Float, Value::Float(_))
		| (FieldType::Str, Value::Str(_))
		| (FieldType::Map, Value::Map(_)) => Ok(()),
		(FieldType::Float, Value::Int(i)) => {
			*value = Value::Float(*i as f64);
			Ok(())
		}
		(FieldType::Str, Value::Bool(_) | Value::Int(_) | Value::Float(_)) => {
			*value = Value::Str(value.to_string());
			Ok(())
		}
		(FieldType::Int, Value::Str(s)) => {
			let parsed = s.trim().parse::<i64>().map_err(|_| mismatch(&*value))?;
			*value = Value::Int(parsed);
			Ok(())
		}
		(FieldType::Float, Value::Str(s)) => {
			let parsed = s.trim().parse::<f64>().map_err(|_| mismatch(&*value))?;
			*value = Value::Float(parsed);
			Ok(())
		}
		(FieldType::Bool, Value::Str(s)) => {
			let parsed = match s.trim().to_ascii_lowercase().as_str() {
				"true" | "yes" | "on" | "1" => true,
				"false" | "no" | "off" | "0" => false,
				_ => return Err(mismatch(&*value)),
			};
			*value = Value::Bool(parsed);
			Ok(())
		}
		(FieldType::List(elem), Value::Seq(_)) => {
			if let Value::Seq(items) = value {
				for (i, item) in items.iter_mut().enumerate() {
					check_value(item, elem, false, &format!("{path}[{i}]"))?;
				}
			}
			Ok(())
		}
		(FieldType::Node(schema), Value::Map(_)) => {
			if let Value::Map(child) = value
				&& child.schema().is_none()
			{
				bind(child, schema, path)?;
			}
			Ok(())
		}
		(_, found) => Err(mismatch(found)),
	}
}
