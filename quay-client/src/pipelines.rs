//! Pipeline registry endpoints

use quay_core::domain::pipeline::Pipeline;
use quay_core::dto::pipeline::{
    PipelineFilter, PipelineVersions, RegisterPipeline, SetCurrentVersion,
};

use crate::QuayClient;
use crate::error::Result;

impl QuayClient {
    /// Register a pipeline version
    pub async fn register_pipeline(&self, req: &RegisterPipeline) -> Result<Pipeline> {
        let request = self.client.post(self.url("/pipelines")).json(req);
        let response = self.identified(request).send().await?;

        self.handle_response(response).await
    }

    pub async fn list_pipelines(&self, filter: &PipelineFilter) -> Result<Vec<Pipeline>> {
        let response = self
            .client
            .get(self.url("/pipelines"))
            .query(filter)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Current version and all registered versions of `name`
    pub async fn get_pipeline(&self, name: &str) -> Result<PipelineVersions> {
        let response = self
            .client
            .get(self.url(&format!("/pipelines/{}", name)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Point "latest" of `name` at `version`
    pub async fn set_current_version(&self, name: &str, version: &str) -> Result<Pipeline> {
        let request = self
            .client
            .put(self.url(&format!("/pipelines/{}/current", name)))
            .json(&SetCurrentVersion {
                version: version.to_string(),
            });
        let response = self.identified(request).send().await?;

        self.handle_response(response).await
    }
}
