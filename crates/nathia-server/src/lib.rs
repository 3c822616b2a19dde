//! NAT-IA Server
//!
//! REST surface over the safety core. Every safety decision is made by the
//! library crates; this crate wires them to HTTP, configuration, audit
//! storage and metrics export.

pub mod config;
pub mod routes;
pub mod sanitize;
pub mod security;
pub mod state;

pub use config::{ConfigOverrides, ServerConfig};
pub use routes::{create_router, AppError};
pub use state::{AppState, MessageStore, Providers, StoredMessage};
