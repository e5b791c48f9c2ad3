use crate::error::{CfgError, Result};
use crate::node::ConfigNode;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// `# @package <name>` header selecting where a config file is merged.
static PACKAGE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^#\s*@package\s+(\S+)\s*$").expect("package header pattern is valid")
});

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
	Toml,
	Yaml,
}

impl ConfigFormat {
	/// Extensions probed when resolving a config name, in priority order.
	pub const EXTENSIONS: [(&'static str, ConfigFormat); 3] = [
		("toml", ConfigFormat::Toml),
		("yaml", ConfigFormat::Yaml),
		("yml", ConfigFormat::Yaml),
	];

	pub fn from_path(path: &Path) -> Option<Self> {
		let ext = path.extension()?.to_str()?;
		Self::EXTENSIONS
			.iter()
			.find(|(known, _)| *known == ext)
			.map(|(_, format)| *format)
	}
}

/// A parsed config file and its package header, if any.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
	pub node: ConfigNode,
	pub package: Option<String>,
}

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<ParsedConfig> {
	let content = std::fs::read_to_string(path).map_err(|source| CfgError::ConfigRead {
		path: path.to_path_buf(),
		source,
	})?;
	let format = ConfigFormat::from_path(path).unwrap_or(ConfigFormat::Toml);

	parse_config_str(&content, format, &path.display().to_string())
}

/// Parse a config from a string (useful for testing and bundled resources).
pub fn parse_config_str(content: &str, format: ConfigFormat, origin: &str) -> Result<ParsedConfig> {
	let node = match format {
		ConfigFormat::Toml => toml::from_str(content).map_err(|source| CfgError::TomlParse {
			origin: origin.to_string(),
			source,
		})?,
		ConfigFormat::Yaml if is_blank(content) => ConfigNode::new(),
		ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|source| CfgError::YamlParse {
			origin: origin.to_string(),
			source,
		})?,
	};

	Ok(ParsedConfig {
		node,
		package: package_header(content),
	})
}

/// Read the `# @package` header from the leading comment block.
fn package_header(content: &str) -> Option<String> {
	content
		.lines()
		.map(str::trim)
		.take_while(|line| line.is_empty() || line.starts_with('#'))
		.find_map(|line| PACKAGE_HEADER.captures(line))
		.map(|caps| caps[1].to_string())
}

fn is_blank(content: &str) -> bool {
	content.lines().map(str::trim).all(|line| line.is_empty() || line.starts_with('#'))
}
