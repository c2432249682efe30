//! Support code for the `beatport` command-line tool.

pub mod config;

pub use config::{credentials_from_env, load_config, resolve_config_path};
