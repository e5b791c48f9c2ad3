use crate::defaults::take_defaults;
use crate::error::Result;
use crate::search_path::SearchPathEntry;
use crate::sources::parser::{ConfigFormat, parse_config_file};
use crate::sources::{ConfigSource, RawConfig};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

/// Reads `<root>/<config_path>.{toml,yaml,yml}` from disk.
pub struct FileSource {
	entry: SearchPathEntry,
	root: PathBuf,
}

impl FileSource {
	pub fn new(entry: SearchPathEntry, root: PathBuf) -> Self {
		Self { entry, root }
	}

	/// First existing file for `config_path`, probing extensions in order.
	fn find(&self, config_path: &str) -> Option<PathBuf> {
		ConfigFormat::EXTENSIONS
			.iter()
			.map(|(ext, _)| self.root.join(format!("{config_path}.{ext}")))
			.find(|path| path.is_file())
	}
}

impl ConfigSource for FileSource {
	fn entry(&self) -> &SearchPathEntry {
		&self.entry
	}

	fn contains(&self, config_path: &str) -> bool {
		self.find(config_path).is_some()
	}

	fn load(&self, config_path: &str) -> Result<Option<RawConfig>> {
		let Some(path) = self.find(config_path) else {
			return Ok(None);
		};
		debug!(path = %path.display(), "reading config file");

		let parsed = parse_config_file(&path)?;
		let mut node = parsed.node;
		let defaults = take_defaults(&mut node, config_path)?;
		Ok(Some(RawConfig {
			node,
			defaults,
			package: parsed.package,
			provider: None,
		}))
	}

	fn group_exists(&self, group: &str) -> bool {
		self.root.join(group).is_dir()
	}

	fn list(&self, group: &str) -> Vec<String> {
		let Ok(dir) = std::fs::read_dir(self.root.join(group)) else {
			return Vec::new();
		};

		let mut names = BTreeSet::new();
		for entry in dir.flatten() {
			let path = entry.path();
			if path.is_dir() {
				if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
					names.insert(name.to_string());
				}
			} else if ConfigFormat::from_path(&path).is_some()
				&& let Some(stem) = path.file_stem().and_then(|s| s.to_str())
			{
				names.insert(stem.to_string());
			}
		}
		names.into_iter().collect()
	}
}
