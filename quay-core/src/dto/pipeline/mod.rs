//! Pipeline registry DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::Pipeline;

/// Request to register a concrete pipeline version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPipeline {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub uri: Option<String>,
    /// Point "latest" at this version once registered
    #[serde(default = "default_make_current")]
    pub make_current: bool,
}

fn default_make_current() -> bool {
    true
}

/// Request to move the "latest" pointer of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCurrentVersion {
    pub version: String,
}

/// Query filter for listing registry entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineFilter {
    pub name: Option<String>,
    pub version: Option<String>,
    pub uri: Option<String>,
}

impl PipelineFilter {
    pub fn matches(&self, pipeline: &Pipeline) -> bool {
        self.name.as_ref().is_none_or(|n| *n == pipeline.name)
            && self.version.as_ref().is_none_or(|v| *v == pipeline.version)
            && self
                .uri
                .as_ref()
                .is_none_or(|u| pipeline.uri.as_ref() == Some(u))
    }
}

/// All registered versions of one pipeline name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineVersions {
    pub name: String,
    /// Version "latest" resolves to, if one is marked current
    pub current: Option<String>,
    pub versions: Vec<Pipeline>,
}
