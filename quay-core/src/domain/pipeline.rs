//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The symbolic version that resolves to a pipeline's current version
pub const LATEST: &str = "latest";

/// A registry entry: one concrete version of a named pipeline
///
/// `(name, version)` is unique; `version` is never the literal `"latest"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    /// Reference pinned to this exact entry, carrying its registry attributes
    pub fn to_ref(&self) -> PipelineRef {
        PipelineRef {
            name: self.name.clone(),
            version: VersionSpec::Exact(self.version.clone()),
            uri: self.uri.clone(),
        }
    }
}

/// Version part of a pipeline reference
///
/// Serialized as a plain string; `"latest"` maps to [`VersionSpec::Latest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionSpec {
    /// Whatever version the registry currently marks as current
    #[default]
    Latest,
    /// A pinned version string
    Exact(String),
}

impl VersionSpec {
    pub fn as_str(&self) -> &str {
        match self {
            VersionSpec::Latest => LATEST,
            VersionSpec::Exact(v) => v,
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, VersionSpec::Latest)
    }
}

impl From<String> for VersionSpec {
    fn from(s: String) -> Self {
        if s == LATEST {
            VersionSpec::Latest
        } else {
            VersionSpec::Exact(s)
        }
    }
}

impl From<&str> for VersionSpec {
    fn from(s: &str) -> Self {
        VersionSpec::from(s.to_string())
    }
}

impl From<VersionSpec> for String {
    fn from(v: VersionSpec) -> Self {
        match v {
            VersionSpec::Latest => LATEST.to_string(),
            VersionSpec::Exact(v) => v,
        }
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's reference to a pipeline
///
/// This is what creators and agents send. Tasks returned by the server embed
/// the resolved form: a pinned version plus the registered `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
    #[serde(default)]
    pub version: VersionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl PipelineRef {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionSpec::Latest,
            uri: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionSpec::Exact(version.into()),
            uri: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

impl std::fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defaults_to_latest() {
        let pipeline: PipelineRef = serde_json::from_str(r#"{"name": "align"}"#).unwrap();
        assert_eq!(pipeline.version, VersionSpec::Latest);
        assert!(pipeline.uri.is_none());
    }

    #[test]
    fn test_version_string_mapping() {
        let pinned: PipelineRef =
            serde_json::from_str(r#"{"name": "align", "version": "1.0"}"#).unwrap();
        assert_eq!(pinned.version, VersionSpec::Exact("1.0".to_string()));

        let latest: PipelineRef =
            serde_json::from_str(r#"{"name": "align", "version": "latest"}"#).unwrap();
        assert!(latest.version.is_latest());

        let json = serde_json::to_value(PipelineRef::pinned("align", "2.1")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "align", "version": "2.1"}));
    }

    #[test]
    fn test_to_ref_pins_version_and_uri() {
        let entry = Pipeline {
            id: 7,
            name: "align".to_string(),
            version: "1.0".to_string(),
            uri: Some("https://example.org/align.git".to_string()),
            created_at: Utc::now(),
        };

        let reference = entry.to_ref();
        assert_eq!(reference.to_string(), "align@1.0");
        assert_eq!(reference.uri.as_deref(), Some("https://example.org/align.git"));
    }
}
