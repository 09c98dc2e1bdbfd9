//! Pipeline Registry Service
//!
//! Registration of pipeline versions and resolution of pipeline references,
//! including the "latest" alias.

use quay_core::domain::pipeline::{LATEST, Pipeline, PipelineRef, VersionSpec};
use quay_core::dto::pipeline::{PipelineFilter, PipelineVersions, RegisterPipeline};
use thiserror::Error;

use crate::repository::{Store, StoreError};

/// Service error type
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("pipeline '{0}' not found")]
    NotFound(String),

    #[error("pipeline '{name}' has no version '{version}'")]
    VersionNotFound { name: String, version: String },

    #[error("pipeline '{0}' has no current version")]
    NoCurrentVersion(String),

    /// The reference contradicts what the registry holds
    #[error("{0}")]
    Conflict(String),

    #[error("pipeline {name}@{version} is already registered")]
    Duplicate { name: String, version: String },

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Resolve a pipeline reference to its registry entry
///
/// "latest" follows the name's current pointer; any other version must match
/// exactly. A `uri` given by the caller must agree with the registered one.
pub async fn resolve(store: &Store, reference: &PipelineRef) -> Result<Pipeline> {
    validate_name(&reference.name)?;

    let found = match &reference.version {
        VersionSpec::Latest => store.pipelines.find_current(&reference.name).await?,
        VersionSpec::Exact(version) => store.pipelines.find(&reference.name, version).await?,
    };

    let pipeline = match found {
        Some(pipeline) => pipeline,
        None => return Err(missing(store, reference).await?),
    };

    if let Some(uri) = &reference.uri {
        if pipeline.uri.as_ref() != Some(uri) {
            return Err(RegistryError::Conflict(format!(
                "pipeline {}@{} is registered with uri {}, not {}",
                pipeline.name,
                pipeline.version,
                pipeline.uri.as_deref().unwrap_or("<none>"),
                uri
            )));
        }
    }

    tracing::debug!("Resolved {} to version {}", reference, pipeline.version);

    Ok(pipeline)
}

/// Register a concrete pipeline version
pub async fn register_pipeline(store: &Store, req: RegisterPipeline) -> Result<Pipeline> {
    validate_register_request(&req)?;

    let pipeline = store.pipelines.register(&req).await.map_err(|e| match e {
        StoreError::Duplicate(_) => RegistryError::Duplicate {
            name: req.name.clone(),
            version: req.version.clone(),
        },
        other => RegistryError::Store(other),
    })?;

    tracing::info!(
        "Pipeline registered: {}@{} (current: {})",
        pipeline.name,
        pipeline.version,
        req.make_current
    );

    Ok(pipeline)
}

/// List registry entries
pub async fn list_pipelines(store: &Store, filter: &PipelineFilter) -> Result<Vec<Pipeline>> {
    let pipelines = store.pipelines.list(filter).await?;
    Ok(pipelines)
}

/// All versions of a pipeline plus its current version
pub async fn get_versions(store: &Store, name: &str) -> Result<PipelineVersions> {
    let versions = store.pipelines.versions(name).await?;

    if versions.is_empty() {
        return Err(RegistryError::NotFound(name.to_string()));
    }

    let current = store
        .pipelines
        .find_current(name)
        .await?
        .map(|p| p.version);

    Ok(PipelineVersions {
        name: name.to_string(),
        current,
        versions,
    })
}

/// Move the "latest" pointer of `name` to an already registered version
pub async fn set_current(store: &Store, name: &str, version: &str) -> Result<Pipeline> {
    validate_name(name)?;

    if !store.pipelines.set_current(name, version).await? {
        return Err(missing(store, &PipelineRef::pinned(name, version)).await?);
    }

    tracing::info!("Pipeline {} now resolves latest to {}", name, version);

    store
        .pipelines
        .find(name, version)
        .await?
        .ok_or_else(|| RegistryError::VersionNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })
}

/// Pick the most specific not-found error for an unresolvable reference
async fn missing(store: &Store, reference: &PipelineRef) -> Result<RegistryError> {
    if store.pipelines.versions(&reference.name).await?.is_empty() {
        return Ok(RegistryError::NotFound(reference.name.clone()));
    }

    Ok(match &reference.version {
        VersionSpec::Latest => RegistryError::NoCurrentVersion(reference.name.clone()),
        VersionSpec::Exact(version) => RegistryError::VersionNotFound {
            name: reference.name.clone(),
            version: version.clone(),
        },
    })
}

// =============================================================================
// Validation
// =============================================================================

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::ValidationError(
            "Pipeline name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(RegistryError::ValidationError(
            "Pipeline name is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}

fn validate_register_request(req: &RegisterPipeline) -> Result<()> {
    validate_name(&req.name)?;

    if req.version.trim().is_empty() {
        return Err(RegistryError::ValidationError(
            "Pipeline version cannot be empty".to_string(),
        ));
    }

    if req.version == LATEST {
        return Err(RegistryError::ValidationError(format!(
            "'{}' is an alias and cannot be registered as a version",
            LATEST
        )));
    }

    if req.version.len() > 255 {
        return Err(RegistryError::ValidationError(
            "Pipeline version is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(name: &str, version: &str, make_current: bool) -> RegisterPipeline {
        RegisterPipeline {
            name: name.to_string(),
            version: version.to_string(),
            uri: Some("https://example.org/align.git".to_string()),
            make_current,
        }
    }

    async fn store_with_versions() -> Store {
        let store = Store::in_memory();
        register_pipeline(&store, register_req("align", "1.0", true))
            .await
            .unwrap();
        register_pipeline(&store, register_req("align", "2.0-rc", false))
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_validate_latest_is_not_a_version() {
        let result = validate_register_request(&register_req("align", "latest", true));
        assert!(matches!(result, Err(RegistryError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_name() {
        let result = validate_register_request(&register_req("  ", "1.0", true));
        assert!(matches!(result, Err(RegistryError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_resolve_latest_returns_current_version() {
        let store = store_with_versions().await;

        let pipeline = resolve(&store, &PipelineRef::latest("align")).await.unwrap();
        assert_eq!(pipeline.version, "1.0");
        assert_eq!(pipeline.uri.as_deref(), Some("https://example.org/align.git"));
    }

    #[tokio::test]
    async fn test_resolve_pinned_non_current_version() {
        let store = store_with_versions().await;

        let pipeline = resolve(&store, &PipelineRef::pinned("align", "2.0-rc"))
            .await
            .unwrap();
        assert_eq!(pipeline.version, "2.0-rc");
    }

    #[tokio::test]
    async fn test_resolve_unknown_name_and_version() {
        let store = store_with_versions().await;

        let unknown = resolve(&store, &PipelineRef::latest("call")).await;
        assert!(matches!(unknown, Err(RegistryError::NotFound(_))));

        let unregistered = resolve(&store, &PipelineRef::pinned("align", "9.9")).await;
        assert!(matches!(
            unregistered,
            Err(RegistryError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_rejects_conflicting_uri() {
        let store = store_with_versions().await;

        let reference = PipelineRef::pinned("align", "1.0").with_uri("https://elsewhere.org/x.git");
        let result = resolve(&store, &reference).await;
        assert!(matches!(result, Err(RegistryError::Conflict(_))));

        let matching =
            PipelineRef::pinned("align", "1.0").with_uri("https://example.org/align.git");
        assert!(resolve(&store, &matching).await.is_ok());
    }

    #[tokio::test]
    async fn test_latest_without_current_version() {
        let store = Store::in_memory();
        register_pipeline(&store, register_req("align", "1.0", false))
            .await
            .unwrap();

        let result = resolve(&store, &PipelineRef::latest("align")).await;
        assert!(matches!(result, Err(RegistryError::NoCurrentVersion(_))));
    }

    #[tokio::test]
    async fn test_set_current_moves_latest() {
        let store = store_with_versions().await;

        let promoted = set_current(&store, "align", "2.0-rc").await.unwrap();
        assert_eq!(promoted.version, "2.0-rc");

        let pipeline = resolve(&store, &PipelineRef::latest("align")).await.unwrap();
        assert_eq!(pipeline.version, "2.0-rc");

        let versions = get_versions(&store, "align").await.unwrap();
        assert_eq!(versions.current.as_deref(), Some("2.0-rc"));
        assert_eq!(versions.versions.len(), 2);
    }

    #[tokio::test]
    async fn test_set_current_to_unregistered_version() {
        let store = store_with_versions().await;

        let result = set_current(&store, "align", "3.0").await;
        assert!(matches!(result, Err(RegistryError::VersionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_register_duplicate_version() {
        let store = store_with_versions().await;

        let result = register_pipeline(&store, register_req("align", "1.0", true)).await;
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
    }
}
