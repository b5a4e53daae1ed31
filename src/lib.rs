//! Library surface so the engine is reachable from headless/integration
//! tests without a terminal.

pub mod auth;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod passage;
pub mod runtime;
pub mod session;
pub mod store;
