//! Configuration for the Atoll placement flow.
//!
//! The placer is callable as a library with a configuration map; this
//! crate turns that map into a validated [`PlacerConfig`]. Missing
//! required keys fail fast and identify themselves by name, and the dump
//! directory is created at construction.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::load_config;
pub use types::PlacerConfig;
