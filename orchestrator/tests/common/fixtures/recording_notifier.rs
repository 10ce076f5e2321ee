//! In-process notifier that records deliveries

use async_trait::async_trait;
use orchestrator::errors::SchedulerError;
use orchestrator::services::{Notifier, RunNotification};
use std::sync::Mutex;

pub struct RecordingNotifier {
    configured: bool,
    failing: bool,
    delivered: Mutex<Vec<RunNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            configured: true,
            failing: false,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Every delivery attempt is recorded and then reported as failed
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn delivered(&self) -> Vec<RunNotification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn deliver(&self, notification: &RunNotification) -> Result<(), SchedulerError> {
        self.delivered.lock().unwrap().push(notification.clone());
        if self.failing {
            return Err(SchedulerError::NotificationDelivery {
                destination: "test".to_string(),
                reason: "webhook returned status 500".to_string(),
            });
        }
        Ok(())
    }
}
