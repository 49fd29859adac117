// ABOUTME: Library root for shipyard - exposes the pipeline building blocks.
// ABOUTME: The main binary is in main.rs.

pub mod audit;
pub mod build;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod gc;
pub mod host;
pub mod notify;
pub mod output;
pub mod registry;
pub mod rollout;
pub mod source;
pub mod store;
pub mod trigger;
pub mod types;
