//! Deep merge of config trees.
//!
//! Mappings are merged key by key, sequences and scalars are replaced
//! entirely. `Missing` never replaces a concrete value, and a mapping never
//! silently turns into a scalar (or back): that is a merge conflict.

use crate::error::{CfgError, Result};
use crate::node::{ConfigNode, Value, join_path};
use crate::schema::{bind, undeclared_key};
use std::sync::Arc;

/// Merge `incoming` over `base`, returning the combined tree.
pub fn merge(mut base: ConfigNode, incoming: ConfigNode) -> Result<ConfigNode> {
	merge_into(&mut base, incoming, "")?;
	Ok(base)
}

/// Merge `incoming` into `base` in place. `path` is the dotted location of
/// `base` in the overall tree, used in error messages.
pub fn merge_into(base: &mut ConfigNode, mut incoming: ConfigNode, path: &str) -> Result<()> {
	match (base.schema().cloned(), incoming.schema().cloned()) {
		(None, Some(schema)) => bind(base, &schema, path)?,
		(Some(schema), None) => {
			if let Some(key) = incoming.keys().find(|k| !base.declares(k)) {
				return Err(undeclared_key(&schema, &join_path(path, key)));
			}
		}
		(Some(schema), Some(other)) if !Arc::ptr_eq(&schema, &other) => {
			if let Some(key) = incoming.keys().find(|k| !base.declares(k)) {
				return Err(undeclared_key(&schema, &join_path(path, key)));
			}
		}
		_ => {}
	}

	let keys: Vec<String> = incoming.keys().map(str::to_string).collect();
	for key in keys {
		let Some(value) = incoming.remove(&key) else {
			continue;
		};
		let child_path = join_path(path, &key);
		match base.get_mut(&key) {
			Some(existing) => merge_value(existing, value, &child_path)?,
			None => {
				base.insert(key, value);
			}
		}
	}
	Ok(())
}

fn merge_value(base: &mut Value, incoming: Value, path: &str) -> Result<()> {
	match (&mut *base, incoming) {
		(Value::Map(base_node), Value::Map(incoming_node)) => {
			merge_into(base_node, incoming_node, path)
		}
		// A concrete value is never clobbered by a placeholder.
		(_, Value::Missing) => Ok(()),
		(Value::Missing | Value::Null, incoming) => {
			*base = incoming;
			Ok(())
		}
		(_, Value::Null) => {
			*base = Value::Null;
			Ok(())
		}
		(Value::Seq(_), incoming @ Value::Seq(_)) => {
			*base = incoming;
			Ok(())
		}
		(existing, incoming) if existing.is_scalar() && incoming.is_scalar() => {
			*base = incoming;
			Ok(())
		}
		(existing, incoming) => Err(CfgError::MergeConflict {
			path: path.to_string(),
			base: existing.kind(),
			incoming: incoming.kind(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{FieldType, SchemaDescriptor, instantiate};

	fn node(pairs: &[(&str, Value)]) -> ConfigNode {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[test]
	fn test_merge_simple_objects() {
		let base = node(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
		let overlay = node(&[("b", Value::Int(3)), ("c", Value::Int(4))]);
		let result = merge(base, overlay).unwrap();
		assert_eq!(
			result,
			node(&[
				("a", Value::Int(1)),
				("b", Value::Int(3)),
				("c", Value::Int(4))
			])
		);
	}

	#[test]
	fn test_merge_nested_objects() {
		let base = node(&[(
			"server",
			Value::Map(node(&[
				("host", Value::from("localhost")),
				("port", Value::Int(8080)),
			])),
		)]);
		let overlay = node(&[("server", Value::Map(node(&[("port", Value::Int(9000))])))]);
		let result = merge(base, overlay).unwrap();
		assert_eq!(result.get_str("server.host").unwrap(), "localhost");
		assert_eq!(result.get_int("server.port").unwrap(), 9000);
	}

	#[test]
	fn test_sequences_replaced_not_concatenated() {
		let base = node(&[("items", Value::Seq(vec![Value::Int(1), Value::Int(2)]))]);
		let overlay = node(&[("items", Value::Seq(vec![Value::Int(3)]))]);
		let result = merge(base, overlay).unwrap();
		assert_eq!(result.get("items"), Some(&Value::Seq(vec![Value::Int(3)])));
	}

	#[test]
	fn test_missing_never_overwrites_concrete() {
		let base = node(&[("host", Value::from("db.local"))]);
		let overlay = node(&[("host", Value::Missing)]);
		let result = merge(base, overlay).unwrap();
		assert_eq!(result.get_str("host").unwrap(), "db.local");
	}

	#[test]
	fn test_concrete_overwrites_missing() {
		let base = node(&[("host", Value::Missing)]);
		let overlay = node(&[("host", Value::from("db.local"))]);
		let result = merge(base, overlay).unwrap();
		assert_eq!(result.get_str("host").unwrap(), "db.local");
	}

	#[test]
	fn test_structural_conflict_names_path() {
		let base = node(&[("db", Value::Map(node(&[("port", Value::Int(1))])))]);
		let overlay = node(&[("db", Value::Map(node(&[("port", Value::Seq(vec![]))])))]);
		let err = merge(base, overlay).unwrap_err();
		match err {
			CfgError::MergeConflict {
				path,
				base,
				incoming,
			} => {
				assert_eq!(path, "db.port");
				assert_eq!(base, "int");
				assert_eq!(incoming, "sequence");
			}
			other => panic!("Expected MergeConflict, got {other:?}"),
		}
	}

	#[test]
	fn test_mapping_vs_scalar_conflict() {
		let base = node(&[("db", Value::Map(ConfigNode::new()))]);
		let overlay = node(&[("db", Value::from("mysql"))]);
		assert!(matches!(
			merge(base, overlay),
			Err(CfgError::MergeConflict { .. })
		));
	}

	#[test]
	fn test_closed_schema_rejects_undeclared_key() {
		let schema = Arc::new(SchemaDescriptor::new("Db").field("host", FieldType::Str));
		let base = instantiate(&schema);
		let overlay = node(&[("socket", Value::from("/tmp/s"))]);
		let err = merge(base, overlay).unwrap_err();
		assert!(matches!(err, CfgError::Validation { path, .. } if path == "socket"));
	}

	#[test]
	fn test_incoming_schema_binds_open_base() {
		let schema = Arc::new(SchemaDescriptor::new("Db").field("host", FieldType::Str));
		let base = node(&[("host", Value::from("a"))]);
		let result = merge(base, instantiate(&schema)).unwrap();
		assert!(result.is_closed());
		assert_eq!(result.get_str("host").unwrap(), "a");
	}
}
