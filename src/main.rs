use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cfgstack::loader::FRAMEWORK_NAMESPACE;
use cfgstack::{
	ConfigLoader, ConfigNode, ConfigStore, SearchPath, SearchPathEntry, SourceLocator, Value,
	create_search_path,
};

/// Provider credited with search path entries given on the command line.
const COMMAND_LINE_PROVIDER: &str = "command-line";

#[derive(Parser)]
#[command(name = "cfgstack")]
#[command(
	author,
	version,
	about = "Compose layered configuration from defaults lists, overrides and schemas"
)]
#[command(propagate_version = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Enable verbose logging (sets log level to DEBUG)
	#[arg(short, long, global = true)]
	verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Compose a config and print the result
	Compose {
		/// Primary config to compose, e.g. `config` or `db/mysql`
		name: Option<String>,

		/// Overrides applied in order: key=value, +key=value, ~key
		#[arg(allow_hyphen_values = true)]
		overrides: Vec<String>,

		#[command(flatten)]
		sources: SourceArgs,

		/// Print the load history before the config
		#[arg(long)]
		history: bool,

		/// Keep the framework namespace in the output
		#[arg(long)]
		include_framework: bool,

		/// Output format; TOML has no null, so null values are left out
		#[arg(long, value_enum, default_value_t = Format::Yaml)]
		format: Format,
	},
	/// List the options available in a config group
	List {
		/// Group to list; the search path root when omitted
		group: Option<String>,

		#[command(flatten)]
		sources: SourceArgs,
	},
	/// Print the resolved search path
	SearchPath {
		#[command(flatten)]
		sources: SourceArgs,
	},
}

#[derive(Args)]
struct SourceArgs {
	/// Directory searched for configs before the current directory
	#[arg(long, value_name = "DIR")]
	config_dir: Option<PathBuf>,

	/// Extra search path entry, e.g. file://conf or pkg://my.conf (repeatable)
	#[arg(long = "search-path", value_name = "LOCATOR")]
	search_path: Vec<String>,

	/// Do not search the current directory
	#[arg(long)]
	no_cwd: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
	Yaml,
	Toml,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	match cli.command {
		Commands::Compose {
			name,
			overrides,
			sources,
			history,
			include_framework,
			format,
		} => {
			let (name, overrides) = split_name(name, overrides);
			handle_compose(
				name.as_deref(),
				&overrides,
				&sources,
				history,
				include_framework,
				format,
			)
		}
		Commands::List { group, sources } => handle_list(group.as_deref().unwrap_or(""), &sources),
		Commands::SearchPath { sources } => handle_search_path(&sources),
	}
}

/// A leading override token is not a config name: `compose a=1` has no name.
fn split_name(name: Option<String>, mut overrides: Vec<String>) -> (Option<String>, Vec<String>) {
	match name {
		Some(token) if token.contains('=') || token.starts_with(['+', '~']) => {
			overrides.insert(0, token);
			(None, overrides)
		}
		name => (name, overrides),
	}
}

fn init_tracing(verbose: bool) {
	// RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
	let level = if verbose { Level::DEBUG } else { Level::WARN };
	let filter = EnvFilter::from_default_env().add_directive(level.into());
	let _ = tracing_subscriber::registry()
		.with(fmt::layer().with_writer(std::io::stderr))
		.with(filter)
		.try_init();
}

fn build_search_path(args: &SourceArgs) -> Result<SearchPath> {
	let mut extra = Vec::new();

	if let Some(ref dir) = args.config_dir {
		let dir = std::path::absolute(dir)
			.with_context(|| format!("Failed to resolve config dir: {}", dir.display()))?;
		if !dir.is_dir() {
			anyhow::bail!("Config dir does not exist: {}", dir.display());
		}
		extra.push(SearchPathEntry::new(
			COMMAND_LINE_PROVIDER,
			SourceLocator::File(dir),
		));
	}

	for locator in &args.search_path {
		let entry = SearchPathEntry::parse(COMMAND_LINE_PROVIDER, locator)
			.with_context(|| format!("Invalid --search-path entry: {locator}"))?;
		extra.push(entry);
	}

	create_search_path(&extra, !args.no_cwd).context("Failed to build search path")
}

fn handle_compose(
	name: Option<&str>,
	overrides: &[String],
	sources: &SourceArgs,
	show_history: bool,
	include_framework: bool,
	format: Format,
) -> Result<ExitCode> {
	let store = ConfigStore::new();
	let search_path = build_search_path(sources)?;
	let mut loader = ConfigLoader::new(&store, search_path);

	let result = loader.load_configuration(name, overrides);

	if show_history || result.is_err() {
		print_history(&loader, show_history);
	}

	let mut cfg = result.with_context(|| match name {
		Some(name) => format!("Failed to compose config '{name}'"),
		None => "Failed to compose config".to_string(),
	})?;

	if !include_framework {
		cfg.remove(FRAMEWORK_NAMESPACE);
	}

	print!("{}", render(&cfg, format)?);
	Ok(ExitCode::SUCCESS)
}

/// Print the load history to stdout, or to stderr when composition failed.
fn print_history(loader: &ConfigLoader<'_>, to_stdout: bool) {
	let history = loader.get_load_history();
	if history.is_empty() {
		return;
	}

	let mut lines = vec!["Load history:".to_string()];
	for record in history {
		lines.push(format!(
			"  {:<40} {:<12} {}",
			record.config_path, record.provider, record.source
		));
	}

	if to_stdout {
		println!("{}\n", lines.join("\n"));
	} else {
		eprintln!("{}", lines.join("\n"));
	}
}

fn render(cfg: &ConfigNode, format: Format) -> Result<String> {
	match format {
		Format::Yaml => serde_yaml::to_string(cfg).context("Failed to render config as YAML"),
		Format::Toml => {
			toml::to_string(&without_nulls(cfg)).context("Failed to render config as TOML")
		}
	}
}

fn without_nulls(node: &ConfigNode) -> ConfigNode {
	let mut out = ConfigNode::new();
	for (key, value) in node.iter() {
		if let Some(value) = non_null(value) {
			out.insert(key, value);
		}
	}
	out
}

fn non_null(value: &Value) -> Option<Value> {
	match value {
		Value::Null => None,
		Value::Map(node) => Some(Value::Map(without_nulls(node))),
		Value::Seq(items) => Some(Value::Seq(items.iter().filter_map(non_null).collect())),
		other => Some(other.clone()),
	}
}

fn handle_list(group: &str, sources: &SourceArgs) -> Result<ExitCode> {
	let store = ConfigStore::new();
	let search_path = build_search_path(sources)?;
	let repo = ConfigLoader::new(&store, search_path).repository();

	let group = group.trim_matches('/');
	if !group.is_empty() && !repo.group_exists(group) {
		eprintln!("Config group not found: {group}");
		return Ok(ExitCode::FAILURE);
	}

	let options = repo.list_options(group);
	if options.is_empty() {
		println!("No configs found.");
		return Ok(ExitCode::SUCCESS);
	}

	for option in options {
		println!("{option}");
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_search_path(sources: &SourceArgs) -> Result<ExitCode> {
	let search_path = build_search_path(sources)?;

	println!("Search path (in resolution order):\n");
	for (i, entry) in search_path.entries().iter().enumerate() {
		println!("  {}. {:<14} {}", i + 1, entry.provider, entry.locator);
	}
	Ok(ExitCode::SUCCESS)
}
