//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config, credentials, CSV loading, display)
//! - `data` - Table validation and the synthetic sample
//! - `prompts` - Prompt library management commands
//! - `run` - One-shot forecast + insight
//! - `session` - Interactive session over one cached forecast

pub mod core;
pub mod data;
pub mod prompts;
pub mod run;
pub mod session;

// Re-export command functions for main.rs
pub use core::*;
pub use data::*;
pub use prompts::*;
pub use run::*;
pub use session::*;
