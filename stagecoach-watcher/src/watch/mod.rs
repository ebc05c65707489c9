//! Run watching
//!
//! A [`Subscription`] turns periodic listings of the engine's runs into a
//! stream of run updates; the [`RunWatcher`] consumes that stream and reports
//! each state change to the source host exactly once.

pub mod subscription;
pub mod watcher;

pub use subscription::Subscription;
pub use watcher::{Outcome, RunWatcher, WatchError};
