use crate::defaults::take_defaults;
use crate::error::Result;
use crate::loader::framework::{FRAMEWORK_PACKAGE, FRAMEWORK_RESOURCES};
use crate::search_path::SearchPathEntry;
use crate::sources::parser::{ConfigFormat, parse_config_str};
use crate::sources::{ConfigSource, RawConfig};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

static FRAMEWORK_BUNDLE: LazyLock<ResourceBundle> = LazyLock::new(ResourceBundle::with_framework);

/// Config files bundled into the binary, addressed as `pkg://<package>`.
///
/// Each package maps file names relative to the package root, e.g.
/// `framework/logging/default.toml`, to their content.
#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
	packages: BTreeMap<String, BTreeMap<String, Cow<'static, str>>>,
}

impl ResourceBundle {
	pub fn new() -> Self {
		Self::default()
	}

	/// The shared bundle holding only the framework's own configs.
	pub fn framework() -> &'static ResourceBundle {
		&FRAMEWORK_BUNDLE
	}

	/// A new bundle preloaded with the framework's configs, open for additions.
	pub fn with_framework() -> Self {
		let mut bundle = Self::new();
		for (file, content) in FRAMEWORK_RESOURCES {
			bundle.insert(FRAMEWORK_PACKAGE, *file, *content);
		}
		bundle
	}

	pub fn insert(
		&mut self,
		package: impl Into<String>,
		file: impl Into<String>,
		content: impl Into<Cow<'static, str>>,
	) {
		self.packages
			.entry(package.into())
			.or_default()
			.insert(file.into().trim_matches('/').to_string(), content.into());
	}

	pub fn get(&self, package: &str, file: &str) -> Option<&str> {
		self.packages.get(package)?.get(file).map(|c| c.as_ref())
	}

	fn files(&self, package: &str) -> impl Iterator<Item = &str> {
		self.packages
			.get(package)
			.into_iter()
			.flat_map(|files| files.keys().map(String::as_str))
	}
}

/// Reads configs from one package of a [`ResourceBundle`].
pub struct PackageSource<'a> {
	entry: SearchPathEntry,
	package: String,
	bundle: &'a ResourceBundle,
}

impl<'a> PackageSource<'a> {
	pub fn new(entry: SearchPathEntry, package: String, bundle: &'a ResourceBundle) -> Self {
		Self {
			entry,
			package,
			bundle,
		}
	}

	fn find(&self, config_path: &str) -> Option<(String, ConfigFormat, &'a str)> {
		ConfigFormat::EXTENSIONS.iter().find_map(|(ext, format)| {
			let file = format!("{config_path}.{ext}");
			let content = self.bundle.get(&self.package, &file)?;
			Some((file, *format, content))
		})
	}
}

impl ConfigSource for PackageSource<'_> {
	fn entry(&self) -> &SearchPathEntry {
		&self.entry
	}

	fn contains(&self, config_path: &str) -> bool {
		self.find(config_path).is_some()
	}

	fn load(&self, config_path: &str) -> Result<Option<RawConfig>> {
		let Some((file, format, content)) = self.find(config_path) else {
			return Ok(None);
		};

		let origin = format!("pkg://{}/{file}", self.package);
		let parsed = parse_config_str(content, format, &origin)?;
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
		let prefix = format!("{group}/");
		self.bundle
			.files(&self.package)
			.any(|file| file.starts_with(&prefix))
	}

	fn list(&self, group: &str) -> Vec<String> {
		let mut names = BTreeSet::new();
		for file in self.bundle.files(&self.package) {
			let rest = if group.is_empty() {
				Some(file)
			} else {
				file.strip_prefix(group).and_then(|r| r.strip_prefix('/'))
			};
			let Some(rest) = rest else {
				continue;
			};
			match rest.split_once('/') {
				Some((subgroup, _)) => {
					names.insert(subgroup.to_string());
				}
				None => {
					if let Some(stem) = Path::new(rest).file_stem().and_then(|s| s.to_str()) {
						names.insert(stem.to_string());
					}
				}
			}
		}
		names.into_iter().collect()
	}
}
