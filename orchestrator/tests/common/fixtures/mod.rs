//! Shared fixtures: agent and notifier doubles, mock HTTP services,
//! config directories, in-memory databases and the wired-up harness.

// Each test binary uses a subset
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod harness;
pub mod mock_agent;
pub mod mock_webhook;
pub mod recording_notifier;
pub mod test_config;
pub mod test_data;
pub mod test_database;

pub use harness::TestHarness;
pub use mock_agent::{AgentBehavior, MockAgentServer, ScriptedAgent};
pub use mock_webhook::MockWebhookServer;
pub use recording_notifier::RecordingNotifier;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
