//! Command implementations for the RoriCode CLI.

pub mod chat;
pub mod event_renderer;
pub mod profile;
pub mod types;
