//! cfgstack - layered configuration composition.
//!
//! This library provides the core functionality for cfgstack, including:
//! - A config store for programmatically registered schemas and nodes
//! - Search path resolution over `file://`, `pkg://` and `structured://` sources
//! - Defaults list expansion, deep merging and override application
//! - Schema validation and an ordered load history of every composition
//!
//! # Example
//!
//! ```no_run
//! use cfgstack::schema::{FieldType, SchemaDescriptor};
//! use cfgstack::{ConfigLoader, ConfigStore, create_search_path};
//!
//! let mut store = ConfigStore::new();
//! store
//!     .store(
//!         "db",
//!         "mysql",
//!         SchemaDescriptor::new("MySQLConfig")
//!             .field("host", FieldType::Str)
//!             .field_with_default("port", FieldType::Int, 3306),
//!         "my_app",
//!         None,
//!     )
//!     .unwrap();
//!
//! let search_path = create_search_path(&[], true).unwrap();
//! let mut loader = ConfigLoader::new(&store, search_path);
//! let cfg = loader
//!     .load_configuration(Some("db/mysql"), &["db.host=localhost"])
//!     .unwrap();
//!
//! assert_eq!(cfg.get_str("db.host").unwrap(), "localhost");
//! for record in loader.get_load_history() {
//!     println!("{record}");
//! }
//! ```

pub mod defaults;
pub mod error;
pub mod loader;
pub mod merge;
pub mod node;
pub mod overrides;
pub mod schema;
pub mod search_path;
pub mod sources;
pub mod store;

pub use error::{CfgError, Result};
pub use loader::{ConfigLoader, LoadRecord};
pub use node::{ConfigNode, MISSING_LITERAL, Value};
pub use search_path::{SearchPath, SearchPathEntry, SourceLocator, create_search_path};
pub use store::{ConfigStore, ProviderScope, StoreEntry, StoreNode};
