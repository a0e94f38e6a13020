use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use hypha_integration::MicroscopeService;
use serde::Serialize;
use shared::domain::MicroscopeId;
use tokio::sync::broadcast;
use tracing::info;

pub mod error;
pub mod events;
pub mod operation;
pub mod registry;
pub mod services;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use error::{ConsoleError, ConsoleResult};
pub use events::{ProgressPublisher, WorkflowEvent};
pub use operation::{ActiveOperation, OperationGate, OperationToken};
pub use registry::{RefreshLoop, SlotCache, SlotRegistry, DEFAULT_REFRESH_INTERVAL};
pub use services::ServiceHandles;
pub use types::SampleForm;
pub use workflow::{TransferStep, TransferWorkflow};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IncubatorEnvironment {
    pub temperature_c: f64,
    pub co2_percent: f64,
    pub read_at: DateTime<Utc>,
}

/// Wires the hardware handles, the operation gate, the transfer workflow and
/// the slot registry around one shared event channel.
pub struct LabConsole {
    services: ServiceHandles,
    events: ProgressPublisher,
    gate: OperationGate,
    workflow: Arc<TransferWorkflow>,
    registry: Arc<SlotRegistry>,
}

impl LabConsole {
    pub fn new(services: ServiceHandles) -> Self {
        let events = ProgressPublisher::default();
        let workflow = Arc::new(TransferWorkflow::new(services.clone(), events.clone()));
        let registry = Arc::new(SlotRegistry::new(
            services.clone(),
            Arc::clone(&workflow),
            events.clone(),
        ));
        Self {
            gate: OperationGate::new(events.clone()),
            services,
            events,
            workflow,
            registry,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn begin_operation(&self, name: impl Into<String>) -> ConsoleResult<OperationToken> {
        self.gate.try_begin(name)
    }

    pub fn gate(&self) -> &OperationGate {
        &self.gate
    }

    pub fn workflow(&self) -> &TransferWorkflow {
        &self.workflow
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn microscope(
        &self,
        microscope: MicroscopeId,
    ) -> ConsoleResult<Arc<dyn MicroscopeService>> {
        self.services.microscope(microscope)
    }

    pub fn spawn_refresh_loop(&self, every: Duration) -> RefreshLoop {
        RefreshLoop::spawn(Arc::clone(&self.registry), every)
    }

    pub async fn environment(&self) -> ConsoleResult<IncubatorEnvironment> {
        let incubator = self.services.incubator()?;
        let temperature_c = incubator
            .get_temperature()
            .await
            .map_err(|error| ConsoleError::remote("read incubator temperature", error))?;
        let co2_percent = incubator
            .get_co2_level()
            .await
            .map_err(|error| ConsoleError::remote("read incubator CO2 level", error))?;
        info!(temperature_c, co2_percent, "incubator environment read");
        Ok(IncubatorEnvironment {
            temperature_c,
            co2_percent,
            read_at: Utc::now(),
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
