//! Stagecoach HTTP Clients
//!
//! Typed clients for the two remote systems the service talks to:
//! - [`EngineClient`]: the execution engine (Tekton `PipelineRun`s and
//!   volume claims over the Kubernetes REST API)
//! - [`ScmClient`]: the source host (file contents and commit statuses over a
//!   GitHub-style REST API)
//!
//! Every call is counted through the [`Metrics`] collaborator handed to the
//! client at construction.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stagecoach_client::{Counters, ScmClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scm = ScmClient::new("https://api.github.com", Arc::new(Counters::new()));
//!     let body = scm
//!         .file_contents("Codertocat/Hello-World", ".tekton_ci.yaml", "main")
//!         .await?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```

mod engine;
pub mod error;
pub mod metrics;
mod scm;

pub use engine::EngineClient;
pub use error::{ClientError, Result};
pub use metrics::{Counters, Metrics};
pub use scm::ScmClient;

use serde::de::DeserializeOwned;

/// Checks the status code and deserializes a JSON body
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Checks the status code of a response whose body isn't needed
async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
