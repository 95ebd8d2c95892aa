#![allow(clippy::multiple_crate_versions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod sync;
pub mod token;

pub use error::{CacheError, Result};
