// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model and resolved timeouts.
//! - `loader.rs`: reading the file from disk.
//! - `validate.rs`: global sanity checks and case list parsing.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{Config, RawConfig, SshSection, TimeoutSection, Timeouts};
