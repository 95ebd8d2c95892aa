//! Configuration module for hfcache
//!
//! Loads config from `$XDG_CONFIG_HOME/hfcache/config.toml` or
//! `~/.config/hfcache/config.toml`. Falls back to embedded defaults if
//! the file doesn't exist. Partial configs are merged with defaults
//! using serde's default attributes.
//!
//! The resolved config is built once at process start and passed into
//! the synchronizer explicitly; nothing here mutates the process
//! environment.

pub mod schema;

pub use schema::Config;
