use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ConsoleError, ConsoleResult},
    events::{ProgressPublisher, WorkflowEvent},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOperation {
    pub id: Uuid,
    pub name: String,
}

/// Admits one operator-initiated hardware operation at a time.
#[derive(Clone)]
pub struct OperationGate {
    current: Arc<Mutex<Option<ActiveOperation>>>,
    events: ProgressPublisher,
}

impl OperationGate {
    pub fn new(events: ProgressPublisher) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn try_begin(&self, name: impl Into<String>) -> ConsoleResult<OperationToken> {
        let name = name.into();
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = current.as_ref() {
            warn!(requested = %name, current = %active.name, "operation rejected while busy");
            return Err(ConsoleError::Busy {
                current: active.name.clone(),
            });
        }

        let operation = ActiveOperation {
            id: Uuid::new_v4(),
            name,
        };
        *current = Some(operation.clone());
        drop(current);

        info!(operation = %operation.name, id = %operation.id, "operation started");
        self.events.publish(WorkflowEvent::OperationStarted {
            id: operation.id,
            name: operation.name.clone(),
        });

        Ok(OperationToken {
            gate: self.clone(),
            operation,
            succeeded: false,
        })
    }

    pub fn current(&self) -> Option<ActiveOperation> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_busy(&self) -> bool {
        self.current().is_some()
    }

    fn release(&self, operation: &ActiveOperation, success: bool) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().map(|active| active.id) == Some(operation.id) {
            *current = None;
        }
        drop(current);

        info!(operation = %operation.name, id = %operation.id, success, "operation finished");
        self.events.publish(WorkflowEvent::OperationFinished {
            id: operation.id,
            name: operation.name.clone(),
            success,
        });
    }
}

/// Proof that the caller holds the [`OperationGate`]. Unless
/// [`OperationToken::complete`] is called the operation is reported as failed.
pub struct OperationToken {
    gate: OperationGate,
    operation: ActiveOperation,
    succeeded: bool,
}

impl OperationToken {
    pub fn id(&self) -> Uuid {
        self.operation.id
    }

    pub fn name(&self) -> &str {
        &self.operation.name
    }

    pub fn complete(mut self) {
        self.succeeded = true;
    }
}

impl Drop for OperationToken {
    fn drop(&mut self) {
        self.gate.release(&self.operation, self.succeeded);
    }
}

#[cfg(test)]
#[path = "tests/operation_tests.rs"]
mod tests;
