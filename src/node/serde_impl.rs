use crate::node::{ConfigNode, MISSING_LITERAL, Value};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// Key the `toml` deserializer uses to smuggle datetimes through serde.
const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Missing => serializer.serialize_str(MISSING_LITERAL),
			Value::Null => serializer.serialize_unit(),
			Value::Bool(b) => serializer.serialize_bool(*b),
			Value::Int(i) => serializer.serialize_i64(*i),
			Value::Float(x) => serializer.serialize_f64(*x),
			Value::Str(s) => serializer.serialize_str(s),
			Value::Seq(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Value::Map(node) => node.serialize(serializer),
		}
	}
}

impl Serialize for ConfigNode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.len()))?;
		for (key, value) in self.iter() {
			map.serialize_entry(key, value)?;
		}
		map.end()
	}
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
	type Value = Value;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a config value")
	}

	fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
		Ok(Value::Bool(v))
	}

	fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
		Ok(Value::Int(v))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
		i64::try_from(v)
			.map(Value::Int)
			.map_err(|_| E::custom(format!("integer {v} does not fit in i64")))
	}

	fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
		Ok(Value::Float(v))
	}

	fn visit_str<E>(self, v: &str) -> Result<Value, E> {
		if v == MISSING_LITERAL {
			Ok(Value::Missing)
		} else {
			Ok(Value::Str(v.to_string()))
		}
	}

	fn visit_string<E>(self, v: String) -> Result<Value, E> {
		if v == MISSING_LITERAL {
			Ok(Value::Missing)
		} else {
			Ok(Value::Str(v))
		}
	}

	fn visit_unit<E>(self) -> Result<Value, E> {
		Ok(Value::Null)
	}

	fn visit_none<E>(self) -> Result<Value, E> {
		Ok(Value::Null)
	}

	fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
		Value::deserialize(deserializer)
	}

	fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
		let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(item) = seq.next_element::<Value>()? {
			items.push(item);
		}
		Ok(Value::Seq(items))
	}

	fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
		let mut node = ConfigNode::new();
		while let Some(key) = map.next_key::<Value>()? {
			let key = match key {
				Value::Str(s) => s,
				Value::Map(_) | Value::Seq(_) => {
					return Err(de::Error::custom("mapping keys must be scalars"));
				}
				scalar => scalar.to_string(),
			};
			let value = map.next_value::<Value>()?;
			if key == TOML_DATETIME_KEY {
				return Ok(value);
			}
			node.insert(key, value);
		}
		Ok(Value::Map(node))
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(ValueVisitor)
	}
}

impl<'de> Deserialize<'de> for ConfigNode {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		match Value::deserialize(deserializer)? {
			Value::Map(node) => Ok(node),
			Value::Null => Ok(ConfigNode::new()),
			other => Err(de::Error::custom(format!(
				"expected a mapping at the top level, found {}",
				other.kind()
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deserialize_toml_missing_literal() {
		let node: ConfigNode = toml::from_str(
			r#"
host = "???"
port = 3306
ratio = 0.5
tags = ["a", "b"]

[pool]
size = 4
"#,
		)
		.unwrap();

		assert_eq!(node.get("host"), Some(&Value::Missing));
		assert_eq!(node.select("pool.size"), Some(&Value::Int(4)));
		assert_eq!(node.get("ratio"), Some(&Value::Float(0.5)));
		assert_eq!(
			node.get("tags"),
			Some(&Value::Seq(vec![Value::from("a"), Value::from("b")]))
		);
	}

	#[test]
	fn test_toml_datetime_reads_as_string() {
		let node: ConfigNode =
			toml::from_str("created = 1979-05-27T07:32:00Z\nday = 1979-05-27\n").unwrap();
		assert_eq!(node.get_str("created").unwrap(), "1979-05-27T07:32:00Z");
		assert_eq!(node.get("day"), Some(&Value::from("1979-05-27")));
	}

	#[test]
	fn test_deserialize_yaml_null_and_numeric_keys() {
		let node: ConfigNode = serde_yaml::from_str("a: ~\n1: one\nb: ???\n").unwrap();
		assert_eq!(node.get("a"), Some(&Value::Null));
		assert_eq!(node.get("1"), Some(&Value::from("one")));
		assert_eq!(node.get("b"), Some(&Value::Missing));
	}

	#[test]
	fn test_serialize_missing_as_literal() {
		let mut node = ConfigNode::new();
		node.insert("user", Value::Missing);
		node.insert("port", 5432);
		let rendered = serde_yaml::to_string(&node).unwrap();
		assert!(rendered.contains("user:"));
		assert!(rendered.contains(MISSING_LITERAL));
		assert!(rendered.contains("port: 5432"));
	}
}
