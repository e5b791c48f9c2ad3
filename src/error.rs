use std::path::PathBuf;

/// Library-level structured errors for cfgstack.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum CfgError {
	#[error("Cannot find config '{name}' in search path: {search_path}")]
	ConfigNotFound { name: String, search_path: String },

	#[error("Failed to read config file: {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse TOML config: {origin}")]
	TomlParse {
		origin: String,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to parse YAML config: {origin}")]
	YamlParse {
		origin: String,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("Invalid config source locator: {locator}")]
	InvalidLocator { locator: String },

	#[error("Invalid defaults list in '{config}': {message}")]
	InvalidDefaults { config: String, message: String },

	#[error("Config '{config}' appears more than once in the defaults tree")]
	DuplicateDefault { config: String },

	#[error("You must specify '{group}', e.g. {group}=<OPTION>")]
	MissingGroupChoice { group: String },

	#[error("Merge conflict at '{path}': cannot merge {incoming} into {base}")]
	MergeConflict {
		path: String,
		base: &'static str,
		incoming: &'static str,
	},

	#[error("Validation error at '{path}': {message}")]
	Validation { path: String, message: String },

	#[error("Missing mandatory value: {path}")]
	MissingValue { path: String },

	#[error("Syntax error in override '{token}' at position {position}: {message}")]
	OverrideSyntax {
		token: String,
		position: usize,
		message: String,
	},

	#[error("Could not apply override '{token}': {message}")]
	OverrideApply { token: String, message: String },

	#[error(
		"Config '{group}/{name}' is already registered by provider '{existing_provider}', refusing registration from '{provider}'"
	)]
	DuplicateEntry {
		group: String,
		name: String,
		existing_provider: String,
		provider: String,
	},

	#[error("Failed to render config: {message}")]
	Render { message: String },

	#[error("Failed to resolve current directory")]
	CurrentDir {
		#[source]
		source: std::io::Error,
	},
}

/// Result type alias using CfgError.
pub type Result<T> = std::result::Result<T, CfgError>;
