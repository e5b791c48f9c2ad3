use crate::error::{CfgError, Result};
use crate::node::ConfigNode;
use std::fmt;

/// Literal used in config files and overrides to mark a required-but-unset value.
pub const MISSING_LITERAL: &str = "???";

/// A single value in a config tree.
///
/// Every leaf is either concrete or [`Value::Missing`]. Reading a value never
/// fails by itself; only the explicit coercion accessors on [`ConfigNode`]
/// (and [`Value::concrete`]) reject `Missing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// Placeholder for a mandatory value nobody has provided yet.
	Missing,
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	/// Ordered sequence. Sequences are replaced wholesale during merges.
	Seq(Vec<Value>),
	Map(ConfigNode),
}

impl Value {
	pub fn is_missing(&self) -> bool {
		matches!(self, Value::Missing)
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// True for values that are neither a mapping nor a sequence.
	pub fn is_scalar(&self) -> bool {
		!matches!(self, Value::Seq(_) | Value::Map(_))
	}

	/// Short name of the value's shape, used in error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Missing => "missing",
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Str(_) => "string",
			Value::Seq(_) => "sequence",
			Value::Map(_) => "mapping",
		}
	}

	/// Coerce to a concrete value, failing if this is `Missing`.
	pub fn concrete(&self, path: &str) -> Result<&Value> {
		match self {
			Value::Missing => Err(CfgError::MissingValue {
				path: path.to_string(),
			}),
			other => Ok(other),
		}
	}

	pub fn as_map(&self) -> Option<&ConfigNode> {
		match self {
			Value::Map(node) => Some(node),
			_ => None,
		}
	}

	pub fn as_map_mut(&mut self) -> Option<&mut ConfigNode> {
		match self {
			Value::Map(node) => Some(node),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Missing => f.write_str(MISSING_LITERAL),
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Float(x) => write!(f, "{x}"),
			Value::Str(s) => f.write_str(s),
			Value::Seq(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			Value::Map(node) => {
				f.write_str("{")?;
				for (i, (key, value)) in node.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{key}: {value}")?;
				}
				f.write_str("}")
			}
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i64::from(i))
	}
}

impl From<f64> for Value {
	fn from(x: f64) -> Self {
		Value::Float(x)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Str(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Str(s)
	}
}

impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Value::Seq(items)
	}
}

impl From<ConfigNode> for Value {
	fn from(node: ConfigNode) -> Self {
		Value::Map(node)
	}
}
