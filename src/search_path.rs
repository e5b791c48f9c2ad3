//! Search path: the ordered list of roots consulted to resolve a config name.

use crate::error::{CfgError, Result};
use crate::loader::framework::{FRAMEWORK_PACKAGE, FRAMEWORK_PROVIDER};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Provider name of the current working directory entry.
pub const MAIN_PROVIDER: &str = "main";

/// Provider name of the config store entry.
pub const SCHEMA_PROVIDER: &str = "schema";

/// Where a search path entry reads configs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
	/// `file://<dir>`: a directory on disk.
	File(PathBuf),
	/// `pkg://<package.path>`: resources bundled into the binary.
	Package(String),
	/// `structured://`: the config store.
	Structured,
}

impl SourceLocator {
	pub fn scheme(&self) -> &'static str {
		match self {
			SourceLocator::File(_) => "file",
			SourceLocator::Package(_) => "pkg",
			SourceLocator::Structured => "structured",
		}
	}
}

impl FromStr for SourceLocator {
	type Err = CfgError;

	fn from_str(s: &str) -> Result<Self> {
		let invalid = || CfgError::InvalidLocator {
			locator: s.to_string(),
		};
		let (scheme, rest) = s.split_once("://").ok_or_else(invalid)?;
		match scheme {
			"file" if !rest.is_empty() => Ok(SourceLocator::File(PathBuf::from(rest))),
			"pkg" if !rest.is_empty() => Ok(SourceLocator::Package(rest.to_string())),
			"structured" if rest.is_empty() => Ok(SourceLocator::Structured),
			_ => Err(invalid()),
		}
	}
}

impl fmt::Display for SourceLocator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SourceLocator::File(path) => write!(f, "file://{}", path.display()),
			SourceLocator::Package(package) => write!(f, "pkg://{package}"),
			SourceLocator::Structured => f.write_str("structured://"),
		}
	}
}

/// One root on the search path, tagged with the provider that contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathEntry {
	pub provider: String,
	pub locator: SourceLocator,
}

impl SearchPathEntry {
	pub fn new(provider: impl Into<String>, locator: SourceLocator) -> Self {
		Self {
			provider: provider.into(),
			locator,
		}
	}

	/// Build an entry from a locator string such as `file://conf`.
	pub fn parse(provider: impl Into<String>, locator: &str) -> Result<Self> {
		Ok(Self::new(provider, locator.parse()?))
	}
}

impl fmt::Display for SearchPathEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.locator, self.provider)
	}
}

/// Ordered search path. The first entry that yields a config wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
	entries: Vec<SearchPathEntry>,
}

impl SearchPath {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn append(&mut self, entry: SearchPathEntry) {
		self.entries.push(entry);
	}

	pub fn entries(&self) -> &[SearchPathEntry] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Display for SearchPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, entry) in self.entries.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{}", entry.locator)?;
		}
		Ok(())
	}
}

/// Build the standard search path.
///
/// The order is:
/// 1. The framework's bundled defaults (`pkg://framework.conf`)
/// 2. `extra_entries`, in the order given
/// 3. The current working directory, unless `include_cwd` is false
/// 4. The config store (`structured://`)
pub fn create_search_path(
	extra_entries: &[SearchPathEntry],
	include_cwd: bool,
) -> Result<SearchPath> {
	let mut search_path = SearchPath::new();
	search_path.append(SearchPathEntry::new(
		FRAMEWORK_PROVIDER,
		SourceLocator::Package(FRAMEWORK_PACKAGE.to_string()),
	));

	for entry in extra_entries {
		search_path.append(entry.clone());
	}

	if include_cwd {
		let cwd = std::env::current_dir().map_err(|source| CfgError::CurrentDir { source })?;
		search_path.append(SearchPathEntry::new(MAIN_PROVIDER, SourceLocator::File(cwd)));
	}

	search_path.append(SearchPathEntry::new(
		SCHEMA_PROVIDER,
		SourceLocator::Structured,
	));
	Ok(search_path)
}
