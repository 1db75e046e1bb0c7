/// ComfyUI server client
///
/// Queues translated API graphs on a local or remote ComfyUI instance.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TranslatorConfig;
use crate::document::ApiGraph;
use crate::{Result, WorkflowError};

/// Body of `POST /prompt`.
#[derive(Debug, Serialize)]
pub struct PromptRequest<'a> {
    pub prompt: &'a ApiGraph,
    pub client_id: String,
}

impl<'a> PromptRequest<'a> {
    /// Request with a fresh client id.
    pub fn new(prompt: &'a ApiGraph) -> Self {
        Self {
            prompt,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Server acknowledgement of a queued prompt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueuedPrompt {
    pub prompt_id: String,
    /// Queue position.
    #[serde(default)]
    pub number: i64,
}

pub struct ComfyUiClient {
    api_url: String,
    client: reqwest::Client,
}

impl ComfyUiClient {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_url: config.server_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Queue a graph for execution
    pub async fn queue_prompt(&self, graph: &ApiGraph) -> Result<QueuedPrompt> {
        let request = PromptRequest::new(graph);
        tracing::info!(
            "queueing {} nodes on {} as {}",
            graph.node_count(),
            self.api_url,
            request.client_id
        );

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            tracing::warn!("ComfyUI rejected prompt: {status}");
            return Err(WorkflowError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let queued: QueuedPrompt = response.json().await?;
        tracing::debug!("queued prompt {}", queued.prompt_id);
        Ok(queued)
    }

    /// Whether the server answers `/system_stats`
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("ComfyUI not reachable at {}: {e}", self.api_url);
                false
            }
        }
    }

    /// Stop whatever the server is currently executing
    pub async fn interrupt(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.api_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkflowError::Server {
                status: status.as_u16(),
                body: response.text().await?,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_request_body() {
        let graph: ApiGraph = serde_json::from_value(json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": 5}}
        }))
        .unwrap();

        let request = PromptRequest::new(&graph);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body["prompt"],
            json!({"3": {"class_type": "KSampler", "inputs": {"seed": 5}}})
        );
        assert!(uuid::Uuid::parse_str(body["client_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_client_ids_are_unique() {
        let graph = ApiGraph::new();
        assert_ne!(
            PromptRequest::new(&graph).client_id,
            PromptRequest::new(&graph).client_id
        );
    }

    #[test]
    fn test_queued_prompt_response() {
        let queued: QueuedPrompt = serde_json::from_value(json!({
            "prompt_id": "abc-123",
            "number": 4,
            "node_errors": {}
        }))
        .unwrap();
        assert_eq!(queued.prompt_id, "abc-123");
        assert_eq!(queued.number, 4);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = TranslatorConfig::default().with_server_url("http://gpu-box:8188/");
        let client = ComfyUiClient::new(&config).unwrap();
        assert_eq!(client.api_url(), "http://gpu-box:8188");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let config = TranslatorConfig::default()
            .with_server_url("http://127.0.0.1:1")
            .with_timeout(2);
        let client = ComfyUiClient::new(&config).unwrap();
        assert!(!client.is_available().await);
    }
}
