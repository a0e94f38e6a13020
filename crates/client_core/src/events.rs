use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Progress {
        at: DateTime<Utc>,
        message: String,
    },
    Failed {
        at: DateTime<Utc>,
        message: String,
    },
    RegistryRefreshed {
        at: DateTime<Utc>,
        occupied: usize,
    },
    RegistryRefreshFailed {
        at: DateTime<Utc>,
        message: String,
    },
    OperationStarted {
        id: Uuid,
        name: String,
    },
    OperationFinished {
        id: Uuid,
        name: String,
        success: bool,
    },
}

impl WorkflowEvent {
    pub fn log_line(&self) -> Option<&str> {
        match self {
            Self::Progress { message, .. } | Self::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress { at, message } => write!(f, "[{}] {message}", at.format("%H:%M:%S")),
            Self::Failed { at, message } => {
                write!(f, "[{}] ERROR {message}", at.format("%H:%M:%S"))
            }
            Self::RegistryRefreshed { at, occupied } => write!(
                f,
                "[{}] slot listing refreshed ({occupied} occupied)",
                at.format("%H:%M:%S")
            ),
            Self::RegistryRefreshFailed { at, message } => write!(
                f,
                "[{}] slot listing refresh failed: {message}",
                at.format("%H:%M:%S")
            ),
            Self::OperationStarted { name, .. } => write!(f, "operation '{name}' started"),
            Self::OperationFinished { name, success, .. } => {
                let outcome = if *success { "completed" } else { "failed" };
                write!(f, "operation '{name}' {outcome}")
            }
        }
    }
}

/// Fan-out sink for [`WorkflowEvent`]s; sending never blocks and never fails
/// when nobody is listening.
#[derive(Clone)]
pub struct ProgressPublisher {
    events: broadcast::Sender<WorkflowEvent>,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.publish(WorkflowEvent::Progress {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn failure(&self, message: impl Into<String>) {
        self.publish(WorkflowEvent::Failed {
            at: Utc::now(),
            message: message.into(),
        });
    }
}
