//! Service Module
//!
//! Business logic for the webhook service.

pub mod definition;
pub mod hook;

pub use definition::{DefinitionService, DefinitionServiceError};
pub use hook::{HookService, HookServiceError};
