//! Defaults list elements and their parsing.
//!
//! A config's `defaults` key lists the other configs composed together with
//! it, in order:
//!
//! ```toml
//! defaults = [
//!     { db = "mysql" },
//!     { cache = "redis", optional = true },
//!     "_self_",
//!     "extras/tracing",
//! ]
//! ```

use crate::error::{CfgError, Result};
use crate::node::{ConfigNode, Value};
use std::fmt;

/// Key holding the defaults list in a config.
pub const DEFAULTS_KEY: &str = "defaults";

/// Marker placing the config's own content within its defaults list.
pub const SELF_MARKER: &str = "_self_";

const OPTIONAL_KEY: &str = "optional";

/// The selected option of a config group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupChoice {
	Option(String),
	/// `null`: the group contributes nothing.
	Deselected,
	/// `???`: the caller must pick an option through an override.
	Mandatory,
}

impl fmt::Display for GroupChoice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GroupChoice::Option(name) => f.write_str(name),
			GroupChoice::Deselected => f.write_str("null"),
			GroupChoice::Mandatory => f.write_str(crate::node::MISSING_LITERAL),
		}
	}
}

/// One entry of a defaults list.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultElement {
	/// Position of the declaring config's own content.
	SelfRef,
	/// A config addressed by its full path.
	Config { path: String, optional: bool },
	/// A config group with a chosen option; merged at the group's package.
	Group {
		group: String,
		choice: GroupChoice,
		optional: bool,
	},
}

impl DefaultElement {
	pub fn config(path: impl Into<String>) -> Self {
		DefaultElement::Config {
			path: normalize_path(&path.into()),
			optional: false,
		}
	}

	pub fn group(group: impl Into<String>, option: impl Into<String>) -> Self {
		DefaultElement::Group {
			group: normalize_path(&group.into()),
			choice: GroupChoice::Option(option.into()),
			optional: false,
		}
	}

	/// Mark this element as optional: it is skipped when nothing resolves it.
	pub fn optional(self) -> Self {
		match self {
			DefaultElement::Config { path, .. } => DefaultElement::Config {
				path,
				optional: true,
			},
			DefaultElement::Group { group, choice, .. } => DefaultElement::Group {
				group,
				choice,
				optional: true,
			},
			DefaultElement::SelfRef => DefaultElement::SelfRef,
		}
	}

	/// The group this element selects from, if it is a group element.
	pub fn group_name(&self) -> Option<&str> {
		match self {
			DefaultElement::Group { group, .. } => Some(group),
			_ => None,
		}
	}
}

impl fmt::Display for DefaultElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DefaultElement::SelfRef => f.write_str(SELF_MARKER),
			DefaultElement::Config { path, .. } => f.write_str(path),
			DefaultElement::Group { group, choice, .. } => write!(f, "{group}: {choice}"),
		}
	}
}

/// Remove the defaults list from `node` and parse it.
///
/// `config` names the declaring config for error messages.
pub fn take_defaults(node: &mut ConfigNode, config: &str) -> Result<Vec<DefaultElement>> {
	match node.remove(DEFAULTS_KEY) {
		Some(value) => parse_defaults(&value, config),
		None => Ok(Vec::new()),
	}
}

/// Parse a defaults list value.
pub fn parse_defaults(value: &Value, config: &str) -> Result<Vec<DefaultElement>> {
	let items = match value {
		Value::Seq(items) => items,
		Value::Null => return Ok(Vec::new()),
		other => {
			return Err(invalid(
				config,
				format!("expected a sequence, found {}", other.kind()),
			));
		}
	};
	items.iter().map(|item| parse_element(item, config)).collect()
}

fn parse_element(item: &Value, config: &str) -> Result<DefaultElement> {
	match item {
		Value::Str(s) if s == SELF_MARKER => Ok(DefaultElement::SelfRef),
		Value::Str(s) if s.trim().is_empty() => Err(invalid(config, "empty config path")),
		Value::Str(s) => Ok(DefaultElement::config(s.as_str())),
		Value::Map(table) => parse_table(table, config),
		other => Err(invalid(
			config,
			format!("unsupported element of type {}", other.kind()),
		)),
	}
}

fn parse_table(table: &ConfigNode, config: &str) -> Result<DefaultElement> {
	let optional = match table.get(OPTIONAL_KEY) {
		Some(Value::Bool(b)) => *b,
		Some(other) => {
			return Err(invalid(
				config,
				format!("'optional' must be a bool, found {}", other.kind()),
			));
		}
		None => false,
	};

	let mut entries = table.iter().filter(|(k, _)| *k != OPTIONAL_KEY);
	let (Some((group, choice)), None) = (entries.next(), entries.next()) else {
		return Err(invalid(
			config,
			"a group element must have exactly one 'group = option' entry",
		));
	};

	let choice = match choice {
		Value::Str(option) => GroupChoice::Option(option.clone()),
		Value::Null => GroupChoice::Deselected,
		Value::Missing => GroupChoice::Mandatory,
		other => {
			return Err(invalid(
				config,
				format!("option for group '{group}' must be a string, found {}", other.kind()),
			));
		}
	};

	Ok(DefaultElement::Group {
		group: normalize_path(group),
		choice,
		optional,
	})
}

/// Strip surrounding slashes and a known file extension from a config path.
pub fn normalize_path(path: &str) -> String {
	let trimmed = path.trim().trim_matches('/');
	for ext in [".toml", ".yaml", ".yml"] {
		if let Some(stripped) = trimmed.strip_suffix(ext) {
			return stripped.to_string();
		}
	}
	trimmed.to_string()
}

fn invalid(config: &str, message: impl Into<String>) -> CfgError {
	CfgError::InvalidDefaults {
		config: config.to_string(),
		message: message.into(),
	}
}
