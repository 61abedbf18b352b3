//! Completion API clients for RoriCode.

pub mod factory;
pub mod openai;

pub use factory::client_from_config;
pub use openai::{DEFAULT_BASE_URL, OpenAIClient};
