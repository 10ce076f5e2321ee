//! Automation agent doubles
//!
//! `ScriptedAgent` is an in-process agent whose behavior each test picks.
//! `MockAgentServer` simulates the remote agent service over HTTP for the
//! `HttpAutomationAgent` tests.

use async_trait::async_trait;
use orchestrator::agent::{AgentRequest, AutomationAgent, StepRecorder};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Debug, Clone)]
pub enum AgentBehavior {
    /// Returns the summary right away
    Succeed(String),
    /// Returns the summary after a delay
    SucceedAfter(Duration, String),
    Fail(String),
    /// Never returns
    Hang,
    Panic,
    /// Blocks until `release()` is called, then succeeds
    WaitForRelease(String),
}

/// Every behavior records two steps before acting
pub struct ScriptedAgent {
    behavior: Mutex<AgentBehavior>,
    calls: AtomicUsize,
    requests: Mutex<Vec<AgentRequest>>,
    gate: Semaphore,
}

impl ScriptedAgent {
    pub fn new(behavior: AgentBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(AgentBehavior::Succeed("Found 3 items".to_string()))
    }

    pub fn set_behavior(&self, behavior: AgentBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Lets one blocked `WaitForRelease` run finish
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationAgent for ScriptedAgent {
    fn is_configured(&self) -> bool {
        true
    }

    async fn run(&self, request: AgentRequest, steps: StepRecorder) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let behavior = self.behavior.lock().unwrap().clone();

        steps.record(Some("open start page".to_string()), Some("loaded".to_string()));
        steps.record(Some("read content".to_string()), None);

        match behavior {
            AgentBehavior::Succeed(summary) => Ok(summary),
            AgentBehavior::SucceedAfter(delay, summary) => {
                tokio::time::sleep(delay).await;
                Ok(summary)
            }
            AgentBehavior::Fail(error) => Err(anyhow::anyhow!(error)),
            AgentBehavior::Hang => std::future::pending().await,
            AgentBehavior::Panic => panic!("browser process died"),
            AgentBehavior::WaitForRelease(summary) => {
                self.gate.acquire().await?.forget();
                Ok(summary)
            }
        }
    }
}

/// Mock agent server that simulates the agent service HTTP API
pub struct MockAgentServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockAgentServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Mock a successful run that reports two steps
    pub async fn mock_run_success(&self, summary: &str) {
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result_summary": summary,
                "steps": [
                    {"action": "navigate", "result": "ok"},
                    {"action": "extract", "result": summary}
                ]
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a successful run that requires a bearer token
    pub async fn mock_run_success_with_auth(&self, api_key: &str, summary: &str) {
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(header("Authorization", format!("Bearer {}", api_key).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result_summary": summary,
                "steps": []
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a run the agent reports as failed
    pub async fn mock_run_failure(&self, error: &str) {
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": error,
                "steps": [{"action": "navigate", "result": "timeout waiting for selector"}]
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock an agent service error
    pub async fn mock_server_error(&self, status_code: u16) {
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string("agent overloaded"))
            .mount(&self.server)
            .await;
    }
}
