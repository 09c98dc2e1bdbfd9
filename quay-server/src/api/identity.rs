//! Caller identity
//!
//! Authentication happens in front of this service. Whatever fronts it
//! forwards the authenticated agent in the `X-Agent-Id` header, and handlers
//! that mutate tasks take the [`Caller`] extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use quay_core::domain::agent::AgentId;

use crate::api::error::ApiError;

pub const AGENT_HEADER: &str = "x-agent-id";

/// Identity of the agent making the request
#[derive(Debug, Clone)]
pub struct Caller(pub AgentId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AGENT_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", AGENT_HEADER)))?;

        let agent = value
            .to_str()
            .map(|s| AgentId::new(s.trim()))
            .map_err(|_| ApiError::Unauthorized(format!("Malformed {} header", AGENT_HEADER)))?;

        if agent.is_blank() {
            return Err(ApiError::Unauthorized(format!(
                "Empty {} header",
                AGENT_HEADER
            )));
        }

        if agent.is_too_long() {
            return Err(ApiError::BadRequest(format!(
                "{} header is too long (max {} characters)",
                AGENT_HEADER,
                AgentId::MAX_LEN
            )));
        }

        Ok(Caller(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(agent: Option<&str>) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/tasks");
        if let Some(agent) = agent {
            builder = builder.header(AGENT_HEADER, agent);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    fn status_of(result: Result<Caller, ApiError>) -> StatusCode {
        result.unwrap_err().into_response().status()
    }

    #[tokio::test]
    async fn test_caller_is_trimmed() {
        let Caller(agent) = extract(Some("  worker-7 ")).await.unwrap();
        assert_eq!(agent.as_str(), "worker-7");
    }

    #[tokio::test]
    async fn test_missing_or_blank_caller_is_unauthorized() {
        assert_eq!(status_of(extract(None).await), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(extract(Some("   ")).await), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_overlong_caller_is_rejected() {
        let at_limit = "a".repeat(AgentId::MAX_LEN);
        assert!(extract(Some(&at_limit)).await.is_ok());

        let too_long = "a".repeat(AgentId::MAX_LEN + 1);
        assert_eq!(
            status_of(extract(Some(&too_long)).await),
            StatusCode::BAD_REQUEST
        );
    }
}
