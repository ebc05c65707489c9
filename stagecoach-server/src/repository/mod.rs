//! Repository Module
//!
//! Access to the remote systems the hook service depends on. Each trait is
//! implemented by the matching HTTP client and faked in tests.

pub mod engine;
pub mod source;

pub use engine::{RunRepository, VolumeRepository};
pub use source::SourceRepository;
