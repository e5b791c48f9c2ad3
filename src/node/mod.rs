//! The hierarchical config tree.
//!
//! A [`ConfigNode`] is an insertion-ordered mapping from keys to [`Value`]s.
//! Nodes produced from a structured schema stay bound to it, which makes them
//! closed: merges and overrides reject keys the schema does not declare.

mod serde_impl;
pub mod value;

pub use value::{MISSING_LITERAL, Value};

use crate::error::{CfgError, Result};
use crate::schema::SchemaDescriptor;
use indexmap::IndexMap;
use std::sync::Arc;

/// A mapping node in the config tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigNode {
	entries: IndexMap<String, Value>,
	schema: Option<Arc<SchemaDescriptor>>,
}

impl PartialEq for ConfigNode {
	fn eq(&self, other: &Self) -> bool {
		self.entries == other.entries
	}
}

impl ConfigNode {
	pub fn new() -> Self {
		Self::default()
	}

	/// The schema this node is bound to, if any.
	pub fn schema(&self) -> Option<&Arc<SchemaDescriptor>> {
		self.schema.as_ref()
	}

	pub(crate) fn set_schema(&mut self, schema: Option<Arc<SchemaDescriptor>>) {
		self.schema = schema;
	}

	/// Whether this node rejects undeclared keys.
	pub fn is_closed(&self) -> bool {
		self.schema.is_some()
	}

	/// Whether `key` may live in this node. Open nodes accept any key.
	pub fn declares(&self, key: &str) -> bool {
		match &self.schema {
			Some(schema) => schema.field_spec(key).is_some(),
			None => true,
		}
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
		self.entries.get_mut(key)
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.entries.insert(key.into(), value.into())
	}

	/// Remove a key, keeping the order of the remaining entries.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.entries.shift_remove(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
		self.entries.iter_mut()
	}

	/// Look up a dotted key path such as `db.host`.
	///
	/// Never fails: absent keys and `Missing` leaves are both visible to the caller.
	pub fn select(&self, path: &str) -> Option<&Value> {
		let mut segments = split_path(path);
		let first = segments.next()?;
		let mut current = self.entries.get(first)?;
		for segment in segments {
			current = current.as_map()?.entries.get(segment)?;
		}
		Some(current)
	}

	/// Look up a dotted key path that must hold a mapping.
	pub fn select_node(&self, path: &str) -> Option<&ConfigNode> {
		if split_path(path).next().is_none() {
			return Some(self);
		}
		self.select(path)?.as_map()
	}

	/// Look up a dotted key path and require a concrete value.
	pub fn require(&self, path: &str) -> Result<&Value> {
		self.select(path)
			.ok_or_else(|| CfgError::Validation {
				path: path.to_string(),
				message: "key not found".to_string(),
			})?
			.concrete(path)
	}

	pub fn get_str(&self, path: &str) -> Result<&str> {
		match self.require(path)? {
			Value::Str(s) => Ok(s),
			other => Err(type_error(path, "string", other)),
		}
	}

	pub fn get_int(&self, path: &str) -> Result<i64> {
		match self.require(path)? {
			Value::Int(i) => Ok(*i),
			other => Err(type_error(path, "int", other)),
		}
	}

	pub fn get_float(&self, path: &str) -> Result<f64> {
		match self.require(path)? {
			Value::Float(x) => Ok(*x),
			Value::Int(i) => Ok(*i as f64),
			other => Err(type_error(path, "float", other)),
		}
	}

	pub fn get_bool(&self, path: &str) -> Result<bool> {
		match self.require(path)? {
			Value::Bool(b) => Ok(*b),
			other => Err(type_error(path, "bool", other)),
		}
	}

	/// Wrap `node` so that it sits at the dotted `package` path.
	///
	/// An empty package (or `_global_`) places the node at the root.
	pub fn nest(package: &str, node: ConfigNode) -> ConfigNode {
		let segments: Vec<&str> = split_path(package).collect();
		if segments.is_empty() || package == GLOBAL_PACKAGE {
			return node;
		}
		segments.iter().rev().fold(node, |inner, segment| {
			let mut outer = ConfigNode::new();
			outer.insert(*segment, Value::Map(inner));
			outer
		})
	}
}

impl FromIterator<(String, Value)> for ConfigNode {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self {
			entries: iter.into_iter().collect(),
			schema: None,
		}
	}
}

/// Package name that places a config at the root of the tree.
pub const GLOBAL_PACKAGE: &str = "_global_";

/// Split a dotted key path into its non-empty segments.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
	path.split('.').filter(|s| !s.is_empty())
}

/// Join a parent path and a key into a dotted path.
pub(crate) fn join_path(parent: &str, key: &str) -> String {
	if parent.is_empty() {
		key.to_string()
	} else {
		format!("{parent}.{key}")
	}
}

fn type_error(path: &str, expected: &str, found: &Value) -> CfgError {
	CfgError::Validation {
		path: path.to_string(),
		message: format!("expected {expected}, found {}", found.kind()),
	}
}
