//! Config sources and the repository that resolves names across them.
//!
//! This module handles:
//! - One reader per search path scheme (`file://`, `pkg://`, `structured://`)
//! - First-match resolution of a config name over the search path
//! - Config group discovery for overrides and listings

pub mod file;
pub mod package;
pub mod parser;
pub mod structured;

pub use file::FileSource;
pub use package::{PackageSource, ResourceBundle};
pub use parser::{ConfigFormat, ParsedConfig, parse_config_file, parse_config_str};
pub use structured::StructuredSource;

use crate::defaults::DefaultElement;
use crate::error::{CfgError, Result};
use crate::loader::types::LoadRecord;
use crate::node::{ConfigNode, GLOBAL_PACKAGE};
use crate::search_path::{SearchPath, SearchPathEntry, SourceLocator};
use crate::store::{ConfigStore, split_config_path};
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// Package header value meaning "the config's own group".
pub const GROUP_PACKAGE: &str = "_group_";

/// A config as read by a single source, before package resolution.
#[derive(Debug, Clone)]
pub struct RawConfig {
	pub node: ConfigNode,
	pub defaults: Vec<DefaultElement>,
	/// Package requested by the config itself (header or store path).
	pub package: Option<String>,
	/// Provider to record instead of the search path entry's provider.
	pub provider: Option<String>,
}

/// Reads configs from one search path root.
pub trait ConfigSource {
	/// The search path entry this source serves.
	fn entry(&self) -> &SearchPathEntry;

	/// Whether `config_path` exists in this source, without parsing it.
	fn contains(&self, config_path: &str) -> bool;

	/// Read `config_path`, returning `None` when this source does not have it.
	fn load(&self, config_path: &str) -> Result<Option<RawConfig>>;

	fn group_exists(&self, group: &str) -> bool;

	/// Option and sub-group names available in `group`.
	fn list(&self, group: &str) -> Vec<String>;
}

/// A config resolved against the search path.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
	pub config_path: String,
	pub node: ConfigNode,
	pub defaults: Vec<DefaultElement>,
	/// Dotted package the node is merged at; empty for the root.
	pub package: String,
	pub record: LoadRecord,
}

/// All sources of a search path, consulted in order.
pub struct ConfigRepository<'a> {
	search_path: SearchPath,
	sources: Vec<Box<dyn ConfigSource + 'a>>,
}

impl<'a> ConfigRepository<'a> {
	pub fn new(search_path: &SearchPath, store: &'a ConfigStore, resources: &'a ResourceBundle) -> Self {
		let sources = search_path
			.entries()
			.iter()
			.map(|entry| -> Box<dyn ConfigSource + 'a> {
				match &entry.locator {
					SourceLocator::File(root) => Box::new(FileSource::new(entry.clone(), root.clone())),
					SourceLocator::Package(package) => Box::new(PackageSource::new(
						entry.clone(),
						package.clone(),
						resources,
					)),
					SourceLocator::Structured => Box::new(StructuredSource::new(entry.clone(), store)),
				}
			})
			.collect();

		Self {
			search_path: search_path.clone(),
			sources,
		}
	}

	pub fn search_path(&self) -> &SearchPath {
		&self.search_path
	}

	/// Resolve `config_path` against the first source that has it.
	pub fn resolve(&self, config_path: &str) -> Result<Option<ResolvedConfig>> {
		for (index, source) in self.sources.iter().enumerate() {
			let Some(raw) = source.load(config_path)? else {
				trace!(config = config_path, source = %source.entry().locator, "not found in source");
				continue;
			};

			if let Some(shadowed) = self.sources[index + 1..]
				.iter()
				.find(|later| later.contains(config_path))
			{
				warn!(
					config = config_path,
					used = %source.entry().locator,
					shadowed = %shadowed.entry().locator,
					"config is shadowed by an earlier search path entry"
				);
			}

			let entry = source.entry();
			let (group, _) = split_config_path(config_path);
			let record = LoadRecord::new(
				config_path,
				entry.locator.to_string(),
				raw.provider.as_deref().unwrap_or(&entry.provider),
			);
			return Ok(Some(ResolvedConfig {
				config_path: config_path.to_string(),
				node: raw.node,
				defaults: raw.defaults,
				package: resolve_package(raw.package.as_deref(), group),
				record,
			}));
		}
		Ok(None)
	}

	/// Resolve `config_path`, failing with `ConfigNotFound` when it is required.
	pub fn load(&self, config_path: &str, required: bool) -> Result<Option<ResolvedConfig>> {
		match self.resolve(config_path)? {
			Some(resolved) => Ok(Some(resolved)),
			None if required => Err(CfgError::ConfigNotFound {
				name: config_path.to_string(),
				search_path: self.search_path.to_string(),
			}),
			None => Ok(None),
		}
	}

	pub fn group_exists(&self, group: &str) -> bool {
		let group = group.trim_matches('/');
		!group.is_empty() && self.sources.iter().any(|s| s.group_exists(group))
	}

	/// Sorted, de-duplicated options of `group` across every source.
	pub fn list_options(&self, group: &str) -> Vec<String> {
		let group = group.trim_matches('/');
		let names: BTreeSet<String> = self
			.sources
			.iter()
			.flat_map(|source| source.list(group))
			.collect();
		names.into_iter().collect()
	}
}

/// Turn a requested package into a dotted key path relative to the root.
pub fn resolve_package(requested: Option<&str>, group: &str) -> String {
	match requested {
		None | Some(GROUP_PACKAGE) => group.replace('/', "."),
		Some(GLOBAL_PACKAGE) => String::new(),
		Some(package) => package.to_string(),
	}
}
