use crate::error::{CfgError, Result};
use crate::merge::merge_into;
use crate::node::{ConfigNode, Value, join_path};
use crate::overrides::parser::{Override, OverrideOp};
use crate::schema::{FieldType, instantiate, undeclared_key};
use tracing::debug;

/// Apply overrides in order; later overrides win on the same key.
pub fn apply_overrides(cfg: &mut ConfigNode, overrides: &[Override]) -> Result<()> {
	for ov in overrides {
		apply_override(cfg, ov)?;
		debug!(override = %ov.input, "applied override");
	}
	Ok(())
}

/// Apply a single override to the tree.
pub fn apply_override(cfg: &mut ConfigNode, ov: &Override) -> Result<()> {
	let segments = ov.key_segments();
	let Some((leaf, parents)) = segments.split_last() else {
		return Err(apply_error(ov, "empty key"));
	};

	let mut node = cfg;
	let mut path = String::new();
	for segment in parents {
		prepare_parent(node, segment, ov, &path)?;
		path = join_path(&path, segment);
		node = match node.get_mut(segment).and_then(Value::as_map_mut) {
			Some(child) => child,
			None => {
				return Err(apply_error(
					ov,
					format!("'{path}' is not a mapping"),
				));
			}
		};
	}

	let leaf_path = join_path(&path, leaf);
	match ov.op {
		OverrideOp::Delete => delete_leaf(node, leaf, &leaf_path, ov),
		OverrideOp::Set | OverrideOp::ForceAdd => {
			let Some(value) = ov.value.clone() else {
				return Err(apply_error(ov, "missing value"));
			};
			set_leaf(node, leaf, value, &leaf_path, ov)
		}
	}
}

/// Make sure `node[segment]` exists and is a mapping we can descend into.
fn prepare_parent(node: &mut ConfigNode, segment: &str, ov: &Override, path: &str) -> Result<()> {
	let child_path = join_path(path, segment);
	if !node.contains_key(segment) {
		if ov.op == OverrideOp::Delete {
			return Err(apply_error(ov, format!("key '{child_path}' not found")));
		}
		if !node.declares(segment) && ov.op != OverrideOp::ForceAdd {
			return Err(closed_error(node, &child_path));
		}
		node.insert(segment, fresh_child(node, segment));
		return Ok(());
	}

	let needs_node = matches!(node.get(segment), Some(Value::Missing | Value::Null));
	if needs_node && ov.op != OverrideOp::Delete {
		let child = fresh_child(node, segment);
		node.insert(segment, child);
	}
	Ok(())
}

/// An empty mapping for `segment`, instantiated from the schema when the
/// field is a nested schema.
fn fresh_child(node: &ConfigNode, segment: &str) -> ConfigNode {
	match nested_schema(node, segment) {
		Some(FieldType::Node(schema)) => instantiate(&schema),
		_ => ConfigNode::new(),
	}
}

fn nested_schema(node: &ConfigNode, key: &str) -> Option<FieldType> {
	node.schema()
		.and_then(|schema| schema.field_spec(key))
		.map(|spec| spec.ty.clone())
}

fn set_leaf(
	node: &mut ConfigNode,
	leaf: &str,
	value: Value,
	path: &str,
	ov: &Override,
) -> Result<()> {
	if !node.declares(leaf) && ov.op != OverrideOp::ForceAdd {
		return Err(closed_error(node, path));
	}

	let value = match value {
		Value::Map(incoming) => {
			let schema = match (node.get(leaf), nested_schema(node, leaf)) {
				(Some(Value::Map(existing)), _) if existing.is_closed() => existing.schema().cloned(),
				(_, Some(FieldType::Node(schema))) => Some(schema),
				_ => None,
			};
			match schema {
				Some(schema) => {
					let mut fresh = instantiate(&schema);
					merge_into(&mut fresh, incoming, path)?;
					Value::Map(fresh)
				}
				None => Value::Map(incoming),
			}
		}
		other => other,
	};

	node.insert(leaf, value);
	Ok(())
}

fn delete_leaf(node: &mut ConfigNode, leaf: &str, path: &str, ov: &Override) -> Result<()> {
	let Some(current) = node.get(leaf) else {
		return Err(apply_error(ov, format!("key '{path}' not found")));
	};
	if node.is_closed() && node.declares(leaf) {
		return Err(CfgError::Validation {
			path: path.to_string(),
			message: "cannot delete a field declared by a schema".to_string(),
		});
	}
	if let Some(expected) = &ov.value
		&& current != expected
	{
		return Err(apply_error(
			ov,
			format!("value of '{path}' is {current}, not {expected}"),
		));
	}
	node.remove(leaf);
	Ok(())
}

fn closed_error(node: &ConfigNode, path: &str) -> CfgError {
	match node.schema() {
		Some(schema) => undeclared_key(schema, path),
		None => CfgError::Validation {
			path: path.to_string(),
			message: "key is not declared".to_string(),
		},
	}
}

fn apply_error(ov: &Override, message: impl Into<String>) -> CfgError {
	CfgError::OverrideApply {
		token: ov.input.clone(),
		message: message.into(),
	}
}
