//! Core domain types
//!
//! The structures shared between the webhook service (which compiles and
//! creates runs), the watcher (which observes them) and the CLI.

pub mod pipeline;
pub mod run;
pub mod state;
pub mod status;
