//! Override parsing and application.
//!
//! This module handles:
//! - Parsing `[+|~]key[=value]` tokens, including structured value literals
//! - Applying parsed overrides to a composed tree in order

pub mod apply;
pub mod parser;

pub use apply::{apply_override, apply_overrides};
pub use parser::{Override, OverrideOp, parse_override, parse_overrides, parse_value};
