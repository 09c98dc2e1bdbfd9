//! Quay HTTP Client
//!
//! A typed async client for the Quay task service, shared by the `quay` CLI
//! and by worker agents.
//!
//! Every request carries the agent identity in the `X-Agent-Id` header.
//!
//! # Example
//!
//! ```no_run
//! use quay_client::QuayClient;
//! use quay_core::domain::pipeline::PipelineRef;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = QuayClient::new("http://localhost:8080", "worker-7");
//!
//!     let tasks = client.claim_tasks(&PipelineRef::latest("align"), 5).await?;
//!     for task in tasks {
//!         println!("claimed {}", task.job_descriptor);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;
mod tasks;

pub use error::{ClientError, Result};

use quay_core::domain::agent::AgentId;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Header carrying the caller identity
pub const AGENT_HEADER: &str = "X-Agent-Id";

/// HTTP client for the Quay API
#[derive(Debug, Clone)]
pub struct QuayClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    agent_id: AgentId,
    client: Client,
}

impl QuayClient {
    /// Create a new client acting as `agent_id`
    ///
    /// # Example
    /// ```
    /// use quay_client::QuayClient;
    ///
    /// let client = QuayClient::new("http://localhost:8080", "worker-7");
    /// ```
    pub fn new(base_url: impl Into<String>, agent_id: impl Into<AgentId>) -> Self {
        Self::with_client(base_url, agent_id, Client::new())
    }

    /// Create a client with a preconfigured reqwest `Client` (timeouts, TLS, ...)
    pub fn with_client(
        base_url: impl Into<String>,
        agent_id: impl Into<AgentId>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_id: agent_id.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn identified(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AGENT_HEADER, self.agent_id.as_str())
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_body(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
