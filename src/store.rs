//! The config store: an explicit registry of programmatically defined configs.
//!
//! Entries are keyed by `(group, name)` and remember the provider that
//! registered them. A [`ProviderScope`] registers entries under one provider
//! and removes them again when it is dropped, whichever way the scope exits.

use crate::error::{CfgError, Result};
use crate::loader::framework::register_framework;
use crate::node::ConfigNode;
use crate::schema::SchemaDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// What a store entry holds.
#[derive(Debug, Clone)]
pub enum StoreNode {
	/// A structured schema, instantiated on every load.
	Schema(Arc<SchemaDescriptor>),
	/// A raw, unstructured node.
	Node(ConfigNode),
}

impl From<SchemaDescriptor> for StoreNode {
	fn from(schema: SchemaDescriptor) -> Self {
		StoreNode::Schema(Arc::new(schema))
	}
}

impl From<Arc<SchemaDescriptor>> for StoreNode {
	fn from(schema: Arc<SchemaDescriptor>) -> Self {
		StoreNode::Schema(schema)
	}
}

impl From<ConfigNode> for StoreNode {
	fn from(node: ConfigNode) -> Self {
		StoreNode::Node(node)
	}
}

/// A registered config.
#[derive(Debug, Clone)]
pub struct StoreEntry {
	pub group: String,
	pub name: String,
	pub node: StoreNode,
	pub provider: String,
	/// Package the config is merged at. Defaults to the group.
	pub path: Option<String>,
	overwrite: bool,
}

impl StoreEntry {
	pub fn new(group: impl Into<String>, name: impl Into<String>, node: impl Into<StoreNode>) -> Self {
		Self {
			group: group.into().trim_matches('/').to_string(),
			name: name.into(),
			node: node.into(),
			provider: String::new(),
			path: None,
			overwrite: false,
		}
	}

	pub fn provider(mut self, provider: impl Into<String>) -> Self {
		self.provider = provider.into();
		self
	}

	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	/// Allow this entry to replace one registered by a different provider.
	pub fn allow_overwrite(mut self) -> Self {
		self.overwrite = true;
		self
	}

	/// `group/name`, or just `name` for root-level entries.
	pub fn config_path(&self) -> String {
		if self.group.is_empty() {
			self.name.clone()
		} else {
			format!("{}/{}", self.group, self.name)
		}
	}

	/// Dotted package the entry's content is merged at.
	pub fn package(&self) -> String {
		match &self.path {
			Some(path) => path.clone(),
			None => self.group.replace('/', "."),
		}
	}

	fn key(&self) -> (String, String) {
		(self.group.clone(), self.name.clone())
	}
}

/// Split `db/mysql` into `("db", "mysql")` and `config` into `("", "config")`.
pub fn split_config_path(config_path: &str) -> (&str, &str) {
	match config_path.rsplit_once('/') {
		Some((group, name)) => (group, name),
		None => ("", config_path),
	}
}

/// Registry of structured and raw configs addressable through `structured://`.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
	entries: BTreeMap<(String, String), StoreEntry>,
}

impl ConfigStore {
	/// A store holding the framework's own structured config.
	pub fn new() -> Self {
		let mut store = Self::empty();
		register_framework(&mut store);
		store
	}

	/// A store with no entries at all.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Register `node` as `group/name` on behalf of `provider`.
	pub fn store(
		&mut self,
		group: &str,
		name: &str,
		node: impl Into<StoreNode>,
		provider: &str,
		path: Option<&str>,
	) -> Result<()> {
		let mut entry = StoreEntry::new(group, name, node).provider(provider);
		if let Some(path) = path {
			entry = entry.path(path);
		}
		self.insert(entry).map(|_| ())
	}

	/// Register an entry, returning the entry it replaced.
	///
	/// Replacing an entry from another provider needs explicit intent via
	/// [`StoreEntry::allow_overwrite`]. The same provider may re-register freely.
	pub fn insert(&mut self, entry: StoreEntry) -> Result<Option<StoreEntry>> {
		if let Some(existing) = self.entries.get(&entry.key())
			&& existing.provider != entry.provider
			&& !entry.overwrite
		{
			return Err(CfgError::DuplicateEntry {
				group: entry.group.clone(),
				name: entry.name.clone(),
				existing_provider: existing.provider.clone(),
				provider: entry.provider.clone(),
			});
		}

		debug!(
			config = %entry.config_path(),
			provider = %entry.provider,
			"registered config"
		);
		Ok(self.entries.insert(entry.key(), entry))
	}

	pub fn get(&self, group: &str, name: &str) -> Option<&StoreEntry> {
		self.entries
			.get(&(group.trim_matches('/').to_string(), name.to_string()))
	}

	/// Look up an entry by its full config path, e.g. `db/mysql`.
	pub fn lookup(&self, config_path: &str) -> Option<&StoreEntry> {
		let (group, name) = split_config_path(config_path.trim_matches('/'));
		self.get(group, name)
	}

	pub fn remove(&mut self, group: &str, name: &str) -> Option<StoreEntry> {
		self.entries
			.remove(&(group.trim_matches('/').to_string(), name.to_string()))
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> impl Iterator<Item = &StoreEntry> {
		self.entries.values()
	}

	/// Whether any entry lives in `group` or one of its sub-groups.
	pub fn group_exists(&self, group: &str) -> bool {
		let group = group.trim_matches('/');
		let prefix = format!("{group}/");
		self.entries
			.keys()
			.any(|(g, _)| g == group || g.starts_with(&prefix))
	}

	/// Sorted names of entries and immediate sub-groups within `group`.
	pub fn list(&self, group: &str) -> Vec<String> {
		let group = group.trim_matches('/');
		let mut names = BTreeSet::new();
		for (g, name) in self.entries.keys() {
			if g == group {
				names.insert(name.clone());
				continue;
			}
			let rest = if group.is_empty() {
				Some(g.as_str())
			} else {
				g.strip_prefix(group).and_then(|r| r.strip_prefix('/'))
			};
			if let Some(child) = rest.and_then(|r| r.split('/').next()) {
				names.insert(child.to_string());
			}
		}
		names.into_iter().collect()
	}

	/// Open a registration scope for `provider`.
	///
	/// Everything registered through the scope is removed when it is dropped,
	/// and entries it displaced are put back.
	pub fn provider_scope(&mut self, provider: &str) -> ProviderScope<'_> {
		ProviderScope {
			store: self,
			provider: provider.to_string(),
			registered: Vec::new(),
			displaced: Vec::new(),
		}
	}

	/// Run `body` inside a provider scope, cleaning up however it returns.
	pub fn with_provider<T>(
		&mut self,
		provider: &str,
		body: impl FnOnce(&mut ProviderScope<'_>) -> Result<T>,
	) -> Result<T> {
		let mut scope = self.provider_scope(provider);
		body(&mut scope)
	}
}

/// A registration session bound to one provider.
pub struct ProviderScope<'a> {
	store: &'a mut ConfigStore,
	provider: String,
	registered: Vec<(String, String)>,
	displaced: Vec<StoreEntry>,
}

impl ProviderScope<'_> {
	pub fn provider(&self) -> &str {
		&self.provider
	}

	/// The underlying store, including entries registered in this scope.
	pub fn registry(&self) -> &ConfigStore {
		&*self.store
	}

	pub fn store(
		&mut self,
		group: &str,
		name: &str,
		node: impl Into<StoreNode>,
		path: Option<&str>,
	) -> Result<()> {
		let mut entry = StoreEntry::new(group, name, node);
		if let Some(path) = path {
			entry = entry.path(path);
		}
		self.store_entry(entry)
	}

	/// Register an entry; its provider is replaced with the scope's provider.
	pub fn store_entry(&mut self, entry: StoreEntry) -> Result<()> {
		let entry = entry.provider(self.provider.clone());
		let key = entry.key();
		let replaced = self.store.insert(entry)?;
		if !self.registered.contains(&key) {
			self.registered.push(key);
			if let Some(previous) = replaced {
				self.displaced.push(previous);
			}
		}
		Ok(())
	}
}

impl Drop for ProviderScope<'_> {
	fn drop(&mut self) {
		for (group, name) in self.registered.drain(..).rev() {
			self.store.remove(&group, &name);
		}
		for entry in self.displaced.drain(..) {
			self.store.entries.insert(entry.key(), entry);
		}
		debug!(provider = %self.provider, "closed provider scope");
	}
}
