//! The framework's own configuration namespace.
//!
//! Every composition starts from `framework_config`, a structured config
//! registered by [`ConfigStore::new`]. Its defaults list pulls the bundled
//! logging, launcher, sweeper, output and help defaults from
//! `pkg://framework.conf`, so the `framework` subtree is always populated.

use crate::defaults::DefaultElement;
use crate::node::{ConfigNode, Value};
use crate::schema::{FieldType, SchemaDescriptor};
use crate::store::{ConfigStore, StoreEntry};
use std::sync::Arc;

/// Provider credited with everything the framework contributes.
pub const FRAMEWORK_PROVIDER: &str = "framework";

/// Bundled package holding the framework's config files.
pub const FRAMEWORK_PACKAGE: &str = "framework.conf";

/// Store name of the framework's structured config.
pub const FRAMEWORK_CONFIG_NAME: &str = "framework_config";

/// Key the framework config is merged under.
pub const FRAMEWORK_NAMESPACE: &str = "framework";

/// Config files of the `framework.conf` package, relative to its root.
pub(crate) const FRAMEWORK_RESOURCES: &[(&str, &str)] = &[
	(
		"framework/logging/default.toml",
		include_str!("../../conf/framework/logging/default.toml"),
	),
	(
		"framework/job_logging/default.toml",
		include_str!("../../conf/framework/job_logging/default.toml"),
	),
	(
		"framework/launcher/basic.toml",
		include_str!("../../conf/framework/launcher/basic.toml"),
	),
	(
		"framework/sweeper/basic.toml",
		include_str!("../../conf/framework/sweeper/basic.toml"),
	),
	(
		"framework/output/default.toml",
		include_str!("../../conf/framework/output/default.toml"),
	),
	(
		"framework/help/default.toml",
		include_str!("../../conf/framework/help/default.toml"),
	),
	(
		"framework/framework_help/default.toml",
		include_str!("../../conf/framework/framework_help/default.toml"),
	),
];

/// Schema of the `framework` subtree.
pub fn framework_schema() -> SchemaDescriptor {
	let job = SchemaDescriptor::new("JobConf")
		.field("name", FieldType::Str)
		.optional_field("config_name", FieldType::Str);
	let runtime = SchemaDescriptor::new("RuntimeConf")
		.field("cwd", FieldType::Str)
		.field("version", FieldType::Str)
		.field_with_default("choices", FieldType::Map, ConfigNode::new());
	let overrides = SchemaDescriptor::new("OverridesConf").field_with_default(
		"task",
		FieldType::List(Box::new(FieldType::Str)),
		Value::Seq(Vec::new()),
	);
	let run = SchemaDescriptor::new("RunConf").field_with_default("dir", FieldType::Str, "outputs");

	SchemaDescriptor::new("FrameworkConf")
		.field("run", FieldType::Node(Arc::new(run)))
		.field("job", FieldType::Node(Arc::new(job)))
		.field("runtime", FieldType::Node(Arc::new(runtime)))
		.field("overrides", FieldType::Node(Arc::new(overrides)))
		.field_with_default("verbose", FieldType::Bool, false)
		.field("logging", FieldType::Map)
		.field("job_logging", FieldType::Map)
		.field("launcher", FieldType::Map)
		.field("sweeper", FieldType::Map)
		.field("output", FieldType::Map)
		.field("help", FieldType::Map)
		.field("framework_help", FieldType::Map)
		.with_defaults(vec![
			DefaultElement::group("framework/logging", "default"),
			DefaultElement::group("framework/job_logging", "default"),
			DefaultElement::group("framework/launcher", "basic"),
			DefaultElement::group("framework/sweeper", "basic"),
			DefaultElement::group("framework/output", "default"),
			DefaultElement::group("framework/help", "default"),
			DefaultElement::group("framework/framework_help", "default"),
		])
}

/// Register `framework_config` in `store` on behalf of the framework.
pub fn register_framework(store: &mut ConfigStore) {
	let entry = StoreEntry::new("", FRAMEWORK_CONFIG_NAME, framework_schema())
		.provider(FRAMEWORK_PROVIDER)
		.path(FRAMEWORK_NAMESPACE)
		.allow_overwrite();
	// Cannot fail: overwrite intent is explicit.
	let _ = store.insert(entry);
}
