use crate::defaults::take_defaults;
use crate::error::Result;
use crate::schema::instantiate;
use crate::search_path::SearchPathEntry;
use crate::sources::{ConfigSource, RawConfig};
use crate::store::{ConfigStore, StoreNode};

/// Reads configs registered in a [`ConfigStore`].
///
/// Schemas are instantiated fresh on every load, so no state leaks between
/// compositions. The provider recorded for a load is the one that registered
/// the entry, not the search path entry's.
pub struct StructuredSource<'a> {
	entry: SearchPathEntry,
	store: &'a ConfigStore,
}

impl<'a> StructuredSource<'a> {
	pub fn new(entry: SearchPathEntry, store: &'a ConfigStore) -> Self {
		Self { entry, store }
	}
}

impl ConfigSource for StructuredSource<'_> {
	fn entry(&self) -> &SearchPathEntry {
		&self.entry
	}

	fn contains(&self, config_path: &str) -> bool {
		self.store.lookup(config_path).is_some()
	}

	fn load(&self, config_path: &str) -> Result<Option<RawConfig>> {
		let Some(stored) = self.store.lookup(config_path) else {
			return Ok(None);
		};

		let (node, defaults) = match &stored.node {
			StoreNode::Schema(schema) => (instantiate(schema), schema.defaults().to_vec()),
			StoreNode::Node(node) => {
				let mut node = node.clone();
				let defaults = take_defaults(&mut node, config_path)?;
				(node, defaults)
			}
		};

		Ok(Some(RawConfig {
			node,
			defaults,
			package: Some(stored.package()),
			provider: Some(stored.provider.clone()),
		}))
	}

	fn group_exists(&self, group: &str) -> bool {
		self.store.group_exists(group)
	}

	fn list(&self, group: &str) -> Vec<String> {
		self.store.list(group)
	}
}
