use std::fmt;

/// One config actually loaded during composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRecord {
	/// Config path as resolved, e.g. `db/mysql`.
	pub config_path: String,
	/// Search path locator the config was read from, e.g. `file:///app/conf`.
	pub source: String,
	/// Provider credited with the config.
	pub provider: String,
}

impl LoadRecord {
	pub fn new(
		config_path: impl Into<String>,
		source: impl Into<String>,
		provider: impl Into<String>,
	) -> Self {
		Self {
			config_path: config_path.into(),
			source: source.into(),
			provider: provider.into(),
		}
	}

	/// Scheme of the source locator (`file`, `pkg` or `structured`).
	pub fn scheme(&self) -> &str {
		self.source
			.split_once("://")
			.map_or(self.source.as_str(), |(scheme, _)| scheme)
	}
}

impl fmt::Display for LoadRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} <- {} ({})", self.config_path, self.source, self.provider)
	}
}
