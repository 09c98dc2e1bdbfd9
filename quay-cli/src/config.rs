//! Configuration module
//!
//! Server URL and agent identity for the CLI.

use quay_client::QuayClient;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub agent_id: String,
}

impl Config {
    pub fn new(server_url: String, agent_id: Option<String>) -> Self {
        Self {
            server_url,
            agent_id: resolve_agent_id(agent_id),
        }
    }

    pub fn client(&self) -> QuayClient {
        QuayClient::new(&self.server_url, self.agent_id.as_str())
    }
}

/// Use the given identity, or a fresh UUID when none (or a blank one) was given
fn resolve_agent_id(agent_id: Option<String>) -> String {
    agent_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_agent_id_is_kept() {
        let config = Config::new("http://localhost:8080".to_string(), Some("worker-7".into()));
        assert_eq!(config.agent_id, "worker-7");
    }

    #[test]
    fn test_missing_agent_id_is_generated() {
        let first = resolve_agent_id(None);
        let second = resolve_agent_id(Some("  ".to_string()));

        assert!(uuid::Uuid::parse_str(&first).is_ok());
        assert!(uuid::Uuid::parse_str(&second).is_ok());
        assert_ne!(first, second);
    }
}
