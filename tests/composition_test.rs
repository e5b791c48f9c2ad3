use cfgstack::schema::{FieldType, SchemaDescriptor};
use cfgstack::sources::ResourceBundle;
use cfgstack::{
	CfgError, ConfigLoader, ConfigNode, ConfigStore, LoadRecord, SearchPath, SearchPathEntry,
	SourceLocator, Value, create_search_path,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
	let path = dir.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

fn conf_dir(files: &[(&str, &str)]) -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	for (name, content) in files {
		write(dir.path(), name, content);
	}
	dir
}

fn search_path(dir: &Path) -> SearchPath {
	let entry = SearchPathEntry::new("main", SourceLocator::File(dir.to_path_buf()));
	create_search_path(&[entry], false).unwrap()
}

fn file_source(dir: &Path) -> String {
	format!("file://{}", dir.display())
}

fn bootstrap() -> Vec<LoadRecord> {
	let pkg = "pkg://framework.conf";
	vec![
		LoadRecord::new("framework_config", "structured://", "framework"),
		LoadRecord::new("framework/logging/default", pkg, "framework"),
		LoadRecord::new("framework/job_logging/default", pkg, "framework"),
		LoadRecord::new("framework/launcher/basic", pkg, "framework"),
		LoadRecord::new("framework/sweeper/basic", pkg, "framework"),
		LoadRecord::new("framework/output/default", pkg, "framework"),
		LoadRecord::new("framework/help/default", pkg, "framework"),
		LoadRecord::new("framework/framework_help/default", pkg, "framework"),
	]
}

fn mysql_schema() -> SchemaDescriptor {
	SchemaDescriptor::new("MySQLConfig")
		.field("driver", FieldType::Str)
		.field("host", FieldType::Str)
		.field("port", FieldType::Int)
		.field("user", FieldType::Str)
		.field("password", FieldType::Str)
}

// ============================================================================
// Load history
// ============================================================================

#[test]
fn test_history_starts_with_bootstrap() {
	let dir = conf_dir(&[("config.toml", "name = \"app\"\n")]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();

	let mut expected = bootstrap();
	expected.push(LoadRecord::new("config", file_source(dir.path()), "main"));
	assert_eq!(loader.get_load_history(), expected.as_slice());
	assert_eq!(cfg.get_str("name").unwrap(), "app");
}

#[test]
fn test_history_follows_defaults_depth_first() {
	let dir = conf_dir(&[
		(
			"config.yaml",
			"defaults:\n  - db: mysql\n  - server: http\n  - _self_\n",
		),
		("db/mysql.yaml", "defaults:\n  - db/pool\nhost: localhost\n"),
		("db/pool.toml", "size = 4\n"),
		("server/http.toml", "port = 80\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));
	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();

	let paths: Vec<_> = loader.get_load_history()[8..]
		.iter()
		.map(|r| r.config_path.as_str())
		.collect();
	assert_eq!(paths, vec!["config", "db/mysql", "db/pool", "server/http"]);
	assert_eq!(cfg.get_str("db.host").unwrap(), "localhost");
	assert_eq!(cfg.get_int("db.size").unwrap(), 4);
	assert_eq!(cfg.get_int("server.port").unwrap(), 80);
}

#[test]
fn test_history_kept_after_failed_load() {
	let dir = conf_dir(&[("config.yaml", "defaults:\n  - db: oracle\n")]);
	fs::create_dir(dir.path().join("db")).unwrap();
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration::<&str>(Some("config"), &[])
		.unwrap_err();
	assert!(matches!(err, CfgError::ConfigNotFound { ref name, .. } if name == "db/oracle"));

	let mut expected = bootstrap();
	expected.push(LoadRecord::new("config", file_source(dir.path()), "main"));
	assert_eq!(loader.get_load_history(), expected.as_slice());
}

#[test]
fn test_unknown_config_is_not_found() {
	let dir = conf_dir(&[]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration::<&str>(Some("nope"), &[])
		.unwrap_err();
	match err {
		CfgError::ConfigNotFound { name, search_path } => {
			assert_eq!(name, "nope");
			assert!(search_path.contains("pkg://framework.conf"));
			assert!(search_path.contains("structured://"));
		}
		other => panic!("Expected ConfigNotFound, got {other:?}"),
	}
	assert_eq!(loader.get_load_history(), bootstrap().as_slice());
}

#[test]
fn test_repeated_loads_are_identical() {
	let dir = conf_dir(&[
		("config.toml", "defaults = [{ db = \"mysql\" }]\nname = \"app\"\n"),
		("db/mysql.toml", "host = \"localhost\"\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let first = loader
		.load_configuration(Some("config"), &["db.port=3306"])
		.unwrap();
	let first_history = loader.get_load_history().to_vec();
	let second = loader
		.load_configuration(Some("config"), &["db.port=3306"])
		.unwrap();

	assert_eq!(first, second);
	assert_eq!(first_history, loader.get_load_history());
}

// ============================================================================
// Structured configs
// ============================================================================

#[test]
fn test_missing_schema_fields_stay_missing() {
	let dir = conf_dir(&[]);
	let mut store = ConfigStore::new();
	{
		let mut scope = store.provider_scope("test_provider");
		scope.store("db", "mysql", mysql_schema(), None).unwrap();

		let mut loader = ConfigLoader::new(scope.registry(), search_path(dir.path()));
		let cfg = loader
			.load_configuration::<&str>(Some("db/mysql"), &[])
			.unwrap();

		let db = cfg.select_node("db").unwrap();
		assert_eq!(db.len(), 5);
		assert!(db.iter().all(|(_, value)| value.is_missing()));
		assert!(matches!(
			cfg.get_str("db.host"),
			Err(CfgError::MissingValue { ref path }) if path == "db.host"
		));
		assert_eq!(
			loader.get_load_history().last(),
			Some(&LoadRecord::new("db/mysql", "structured://", "test_provider"))
		);
	}
	assert!(store.lookup("db/mysql").is_none());
}

#[test]
fn test_file_extends_schema() {
	let dir = conf_dir(&[(
		"db/mysql.yaml",
		"defaults:\n  - db/base_mysql\n  - _self_\nhost: localhost\nport: \"3307\"\n",
	)]);
	let mut store = ConfigStore::new();
	store
		.store(
			"db",
			"base_mysql",
			SchemaDescriptor::new("MySQLConfig")
				.field("host", FieldType::Str)
				.field_with_default("port", FieldType::Int, 3306),
			"app",
			None,
		)
		.unwrap();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration::<&str>(Some("db/mysql"), &[])
		.unwrap();
	assert_eq!(cfg.get_str("db.host").unwrap(), "localhost");
	assert_eq!(cfg.get_int("db.port").unwrap(), 3307);
}

#[test]
fn test_undeclared_key_in_file_is_rejected() {
	let dir = conf_dir(&[(
		"db/mysql.yaml",
		"defaults:\n  - db/base_mysql\n  - _self_\nsocket: /tmp/mysql.sock\n",
	)]);
	let mut store = ConfigStore::new();
	store
		.store(
			"db",
			"base_mysql",
			SchemaDescriptor::new("MySQLConfig").field("host", FieldType::Str),
			"app",
			None,
		)
		.unwrap();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration::<&str>(Some("db/mysql"), &[])
		.unwrap_err();
	assert!(matches!(err, CfgError::Validation { ref path, .. } if path == "db.socket"));
}

#[test]
fn test_override_on_closed_schema() {
	let dir = conf_dir(&[]);
	let mut store = ConfigStore::new();
	store
		.store("db", "mysql", mysql_schema(), "app", None)
		.unwrap();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration(Some("db/mysql"), &["db.socket=/tmp/s"])
		.unwrap_err();
	assert!(matches!(err, CfgError::Validation { .. }));

	let cfg = loader
		.load_configuration(Some("db/mysql"), &["+db.socket=/tmp/s", "db.port=3306"])
		.unwrap();
	assert_eq!(cfg.get_str("db.socket").unwrap(), "/tmp/s");
	assert_eq!(cfg.get_int("db.port").unwrap(), 3306);
}

// ============================================================================
// Merging and overrides
// ============================================================================

#[test]
fn test_sequences_are_replaced() {
	let dir = conf_dir(&[
		("base.toml", "items = [1, 2]\n"),
		("config.toml", "defaults = [\"base\", \"_self_\"]\nitems = [3]\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get("items"), Some(&Value::Seq(vec![Value::Int(3)])));
}

#[test]
fn test_missing_does_not_clobber_concrete() {
	let dir = conf_dir(&[
		("base.toml", "user = \"root\"\n"),
		("config.toml", "defaults = [\"base\", \"_self_\"]\nuser = \"???\"\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("user").unwrap(), "root");
}

#[test]
fn test_self_position_controls_precedence() {
	let files = |config: &'static str| {
		conf_dir(&[("base.toml", "level = \"base\"\n"), ("config.toml", config)])
	};

	let store = ConfigStore::new();
	let before = files("defaults = [\"_self_\", \"base\"]\nlevel = \"config\"\n");
	let mut loader = ConfigLoader::new(&store, search_path(before.path()));
	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("level").unwrap(), "base");

	let implicit = files("defaults = [\"base\"]\nlevel = \"config\"\n");
	let mut loader = ConfigLoader::new(&store, search_path(implicit.path()));
	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("level").unwrap(), "base");

	let after = files("defaults = [\"base\", \"_self_\"]\nlevel = \"config\"\n");
	let mut loader = ConfigLoader::new(&store, search_path(after.path()));
	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("level").unwrap(), "config");
}

#[test]
fn test_structural_conflict_names_path() {
	let dir = conf_dir(&[
		("base.toml", "[server]\nport = 80\n"),
		("config.toml", "defaults = [\"base\", \"_self_\"]\nserver = \"localhost\"\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration::<&str>(Some("config"), &[])
		.unwrap_err();
	assert!(matches!(err, CfgError::MergeConflict { ref path, .. } if path == "server"));
}

#[test]
fn test_later_override_wins() {
	let dir = conf_dir(&[("config.toml", "")]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["a.b=1", "a.b=2"])
		.unwrap();
	assert_eq!(cfg.get_int("a.b").unwrap(), 2);
}

#[test]
fn test_bad_override_applies_nothing() {
	let dir = conf_dir(&[("config.toml", "")]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration(Some("config"), &["a=1", "b={x: 1"])
		.unwrap_err();
	assert!(matches!(err, CfgError::OverrideSyntax { ref token, .. } if token == "b={x: 1"));
	assert!(loader.get_load_history().is_empty());
}

// ============================================================================
// Packages and groups
// ============================================================================

#[test]
fn test_package_header_moves_content() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: mysql\n  - server: http\n"),
		("db/mysql.yaml", "# @package _global_\ndatabase_url: mysql://localhost\n"),
		("server/http.toml", "# @package web.server\nport = 8080\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("database_url").unwrap(), "mysql://localhost");
	assert_eq!(cfg.get_int("web.server.port").unwrap(), 8080);
	assert!(!cfg.contains_key("db"));
	assert!(!cfg.contains_key("server"));
}

#[test]
fn test_group_override_selects_option() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: mysql\n  - _self_\n"),
		("db/mysql.yaml", "host: mysql.local\n"),
		("db/postgres.yaml", "host: pg.local\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["db=postgres"])
		.unwrap();
	assert_eq!(cfg.get_str("db.host").unwrap(), "pg.local");
	assert_eq!(
		cfg.select_node("framework.runtime.choices")
			.and_then(|choices| choices.get("db")),
		Some(&Value::from("postgres"))
	);
	assert_eq!(
		loader.get_load_history().last().unwrap().config_path,
		"db/postgres"
	);
}

#[test]
fn test_group_append_and_remove() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: mysql\n"),
		("db/mysql.yaml", "host: mysql.local\n"),
		("cache/redis.yaml", "port: 6379\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["~db", "+cache=redis"])
		.unwrap();
	assert!(!cfg.contains_key("db"));
	assert_eq!(cfg.get_int("cache.port").unwrap(), 6379);
}

#[test]
fn test_mandatory_group_choice() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: ???\n"),
		("db/mysql.yaml", "host: mysql.local\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let err = loader
		.load_configuration::<&str>(Some("config"), &[])
		.unwrap_err();
	assert!(matches!(err, CfgError::MissingGroupChoice { ref group } if group == "db"));

	let cfg = loader
		.load_configuration(Some("config"), &["db=mysql"])
		.unwrap();
	assert_eq!(cfg.get_str("db.host").unwrap(), "mysql.local");
}

#[test]
fn test_numeric_group_option() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - _self_\nname: base\n"),
		("db/1.yaml", "replicas: 1\n"),
		("db/2.yaml", "replicas: 2\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["+db=1"])
		.unwrap();
	assert_eq!(cfg.get_int("db.replicas").unwrap(), 1);
	assert_eq!(
		loader.get_load_history().last().unwrap().config_path,
		"db/1"
	);

	let err = loader
		.load_configuration(Some("config"), &["+db=[1,2]"])
		.unwrap_err();
	assert!(matches!(err, CfgError::OverrideApply { ref token, .. } if token == "+db=[1,2]"));
}

#[test]
fn test_remove_group_only_when_choice_matches() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: mysql\n"),
		("db/mysql.yaml", "host: mysql.local\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["~db=mysql"])
		.unwrap();
	assert!(!cfg.contains_key("db"));

	let err = loader
		.load_configuration(Some("config"), &["~db=postgres"])
		.unwrap_err();
	assert!(matches!(
		err,
		CfgError::OverrideApply { ref token, ref message }
			if token == "~db=postgres" && message.contains("mysql")
	));
}

#[test]
fn test_null_choice_loads_nothing() {
	let dir = conf_dir(&[
		("config.yaml", "defaults:\n  - db: mysql\n  - cache: null\n"),
		("db/mysql.yaml", "host: mysql.local\n"),
		("cache/redis.yaml", "port: 6379\n"),
	]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["db=null"])
		.unwrap();
	assert!(!cfg.contains_key("db"));
	assert!(!cfg.contains_key("cache"));

	let choices = cfg.select_node("framework.runtime.choices").unwrap();
	assert_eq!(choices.get("db"), Some(&Value::Null));
	assert_eq!(choices.get("cache"), Some(&Value::Null));
	assert!(
		loader
			.get_load_history()
			.iter()
			.all(|r| !r.config_path.starts_with("db/") && !r.config_path.starts_with("cache/"))
	);
}

#[test]
fn test_compose_from_custom_resource_bundle() {
	let mut resources = ResourceBundle::with_framework();
	resources.insert("plugin.conf", "config.yaml", "defaults:\n  - db: sqlite\n");
	resources.insert("plugin.conf", "db/sqlite.toml", "path = \"app.db\"\n");

	let plugin = SearchPathEntry::new("plugin", SourceLocator::Package("plugin.conf".to_string()));
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, create_search_path(&[plugin], false).unwrap())
		.with_resources(&resources);

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("db.path").unwrap(), "app.db");
	assert_eq!(
		&loader.get_load_history()[8..],
		&[
			LoadRecord::new("config", "pkg://plugin.conf", "plugin"),
			LoadRecord::new("db/sqlite", "pkg://plugin.conf", "plugin"),
		]
	);
}

#[test]
fn test_first_search_path_entry_wins() {
	let primary = conf_dir(&[("config.toml", "origin = \"primary\"\n")]);
	let secondary = conf_dir(&[("config.toml", "origin = \"secondary\"\n")]);
	let extra = [
		SearchPathEntry::new("primary", SourceLocator::File(primary.path().to_path_buf())),
		SearchPathEntry::new("secondary", SourceLocator::File(secondary.path().to_path_buf())),
	];
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, create_search_path(&extra, false).unwrap());

	let cfg = loader.load_configuration::<&str>(Some("config"), &[]).unwrap();
	assert_eq!(cfg.get_str("origin").unwrap(), "primary");
	assert_eq!(loader.get_load_history().last().unwrap().provider, "primary");
}

#[test]
fn test_framework_namespace_is_populated() {
	let dir = conf_dir(&[("config.toml", "")]);
	let store = ConfigStore::new();
	let mut loader = ConfigLoader::new(&store, search_path(dir.path()));

	let cfg = loader
		.load_configuration(Some("config"), &["x=1"])
		.unwrap();
	let framework: &ConfigNode = cfg.select_node("framework").unwrap();
	assert_eq!(framework.get_str("job.name").unwrap(), "config");
	assert_eq!(framework.get_str("job.config_name").unwrap(), "config");
	assert_eq!(framework.get_str("sweeper.target").unwrap(), "basic");
	assert_eq!(
		framework.select("overrides.task"),
		Some(&Value::Seq(vec![Value::from("x=1")]))
	);
}
