//! Composition of a config from its defaults tree, overrides and schemas.
//!
//! This module handles:
//! - Expanding the framework bootstrap and the requested config's defaults
//! - Merging every resolved config at its package, in resolution order
//! - Applying overrides and validating the final tree
//! - Keeping the load history of the most recent composition

pub mod expand;
pub mod framework;
pub mod types;

pub use expand::{Expander, Expansion, PlannedNode};
pub use framework::{
	FRAMEWORK_CONFIG_NAME, FRAMEWORK_NAMESPACE, FRAMEWORK_PACKAGE, FRAMEWORK_PROVIDER,
	framework_schema, register_framework,
};
pub use types::LoadRecord;

use crate::error::{CfgError, Result};
use crate::merge::merge_into;
use crate::node::{ConfigNode, Value};
use crate::overrides::{Override, apply_overrides, parse_overrides};
use crate::schema::validate_tree;
use crate::search_path::SearchPath;
use crate::sources::{ConfigRepository, ResourceBundle};
use crate::store::{ConfigStore, split_config_path};
use tracing::{debug, info};

/// Job name used when no primary config is requested.
pub const DEFAULT_JOB_NAME: &str = "app";

/// Composes configs from a store and a search path.
///
/// The loader only reads the store; each call builds a fresh tree.
pub struct ConfigLoader<'a> {
	store: &'a ConfigStore,
	resources: &'a ResourceBundle,
	search_path: SearchPath,
	history: Vec<LoadRecord>,
}

impl<'a> ConfigLoader<'a> {
	pub fn new(store: &'a ConfigStore, search_path: SearchPath) -> Self {
		Self {
			store,
			resources: ResourceBundle::framework(),
			search_path,
			history: Vec::new(),
		}
	}

	/// Use `resources` for `pkg://` entries instead of the framework bundle.
	pub fn with_resources(mut self, resources: &'a ResourceBundle) -> Self {
		self.resources = resources;
		self
	}

	/// A repository over this loader's search path, for lookups and listings.
	pub fn repository(&self) -> ConfigRepository<'a> {
		ConfigRepository::new(&self.search_path, self.store, self.resources)
	}

	/// Compose `config_name` (or only the framework config when `None`) and
	/// apply `overrides` in order.
	///
	/// Overrides are all parsed before anything is loaded. The load history is
	/// reset at the start of every call and keeps whatever was resolved even
	/// when composition fails.
	pub fn load_configuration<S: AsRef<str>>(
		&mut self,
		config_name: Option<&str>,
		overrides: &[S],
	) -> Result<ConfigNode> {
		self.history.clear();
		let overrides = parse_overrides(overrides)?;
		let repo = self.repository();

		let (group_overrides, value_overrides): (Vec<Override>, Vec<Override>) = overrides
			.iter()
			.cloned()
			.partition(|ov| is_group_override(&repo, ov));

		let expansion = Expander::new(&repo, group_overrides).expand(config_name, &mut self.history)?;

		let mut cfg = ConfigNode::new();
		for planned in expansion.plan {
			debug!(
				config = %planned.config_path,
				package = %planned.package,
				"merging config"
			);
			merge_into(&mut cfg, ConfigNode::nest(&planned.package, planned.node), "")?;
		}

		populate_framework(&mut cfg, config_name, &overrides, expansion.choices)?;
		apply_overrides(&mut cfg, &value_overrides)?;
		validate_tree(&mut cfg, "")?;

		info!(
			config = config_name.unwrap_or("<none>"),
			loaded = self.history.len(),
			"composed config"
		);
		Ok(cfg)
	}

	/// Configs loaded by the most recent [`load_configuration`](Self::load_configuration), in order.
	pub fn get_load_history(&self) -> &[LoadRecord] {
		&self.history
	}
}

/// Whether `ov` selects a config group option rather than setting a value.
///
/// Only the key decides: `db=1` selects `db/1` whenever `db` is a group.
fn is_group_override(repo: &ConfigRepository<'_>, ov: &Override) -> bool {
	repo.group_exists(&ov.group_path())
}

/// Fill the runtime fields of the `framework` subtree, if it was composed.
fn populate_framework(
	cfg: &mut ConfigNode,
	config_name: Option<&str>,
	overrides: &[Override],
	choices: ConfigNode,
) -> Result<()> {
	let Some(framework) = cfg
		.get_mut(FRAMEWORK_NAMESPACE)
		.and_then(Value::as_map_mut)
	else {
		return Ok(());
	};

	let cwd = std::env::current_dir().map_err(|source| CfgError::CurrentDir { source })?;
	let task: Vec<Value> = overrides.iter().map(|ov| Value::from(ov.input.as_str())).collect();
	let job_name = config_name
		.map(|name| split_config_path(name.trim_matches('/')).1)
		.unwrap_or(DEFAULT_JOB_NAME);

	set_field(framework, "overrides", "task", Value::Seq(task));
	set_field(
		framework,
		"job",
		"config_name",
		config_name.map_or(Value::Null, Value::from),
	);
	set_field(framework, "job", "name", job_name);
	set_field(framework, "runtime", "cwd", cwd.display().to_string());
	set_field(framework, "runtime", "version", env!("CARGO_PKG_VERSION"));
	set_field(framework, "runtime", "choices", choices);
	Ok(())
}

fn set_field(node: &mut ConfigNode, section: &str, key: &str, value: impl Into<Value>) {
	if let Some(section) = node.get_mut(section).and_then(Value::as_map_mut) {
		section.insert(key, value);
	}
}
