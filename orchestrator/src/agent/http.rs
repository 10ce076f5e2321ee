use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{AgentRequest, AutomationAgent, StepRecorder};
use crate::config::AgentConfig;
use crate::constants::agent::RUN_ENDPOINT;

#[derive(Debug, Deserialize)]
struct AgentStepPayload {
    action: Option<String>,
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentRunResponse {
    success: bool,
    result_summary: Option<String>,
    error: Option<String>,
    #[serde(default)]
    steps: Vec<AgentStepPayload>,
}

/// Runs tasks on a remote automation agent service over HTTP
pub struct HttpAutomationAgent {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpAutomationAgent {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to build agent HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }
}

#[async_trait]
impl AutomationAgent for HttpAutomationAgent {
    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn run(&self, request: AgentRequest, steps: StepRecorder) -> Result<String> {
        let base_url = self
            .base_url
            .as_ref()
            .ok_or_else(|| anyhow!("Automation agent is not configured"))?;
        let url = format!("{}{}", base_url, RUN_ENDPOINT);

        info!("Dispatching run {} of task {} to {}", request.run_id, request.task_id, url);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("Agent request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Agent returned status {}: {}", status, error_text));
        }

        let body: AgentRunResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse agent response: {}", e))?;

        debug!("Agent reported {} steps for run {}", body.steps.len(), request.run_id);
        for step in body.steps {
            steps.record(step.action, step.result);
        }

        if body.success {
            Ok(body.result_summary.unwrap_or_default())
        } else {
            Err(anyhow!(
                "{}",
                body.error.unwrap_or_else(|| "Unknown agent error".to_string())
            ))
        }
    }
}
