//! Core building blocks shared by the RoriCode front-ends.
//!
//! Currently this is the profile configuration: which completion endpoint,
//! credentials and model the assistant talks to.

pub mod config;

pub use config::{Config, ConfigError, ConfigResult, Profile, DEFAULT_MODEL, DEFAULT_PROFILE};
