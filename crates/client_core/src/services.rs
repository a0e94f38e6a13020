use std::{collections::HashMap, sync::Arc};

use hypha_integration::{IncubatorService, MicroscopeService, RoboticArmService};
use shared::domain::MicroscopeId;

use crate::error::{ConsoleError, ConsoleResult};

#[derive(Clone, Default)]
pub struct ServiceHandles {
    microscopes: HashMap<MicroscopeId, Arc<dyn MicroscopeService>>,
    robotic_arm: Option<Arc<dyn RoboticArmService>>,
    incubator: Option<Arc<dyn IncubatorService>>,
}

impl ServiceHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_microscope(
        mut self,
        microscope: MicroscopeId,
        handle: Arc<dyn MicroscopeService>,
    ) -> Self {
        self.microscopes.insert(microscope, handle);
        self
    }

    pub fn with_robotic_arm(mut self, handle: Arc<dyn RoboticArmService>) -> Self {
        self.robotic_arm = Some(handle);
        self
    }

    pub fn with_incubator(mut self, handle: Arc<dyn IncubatorService>) -> Self {
        self.incubator = Some(handle);
        self
    }

    pub fn microscope(
        &self,
        microscope: MicroscopeId,
    ) -> ConsoleResult<Arc<dyn MicroscopeService>> {
        self.microscopes
            .get(&microscope)
            .cloned()
            .ok_or_else(|| ConsoleError::unavailable(format!("microscope {microscope}")))
    }

    pub fn robotic_arm(&self) -> ConsoleResult<Arc<dyn RoboticArmService>> {
        self.robotic_arm
            .clone()
            .ok_or_else(|| ConsoleError::unavailable("robotic arm"))
    }

    pub fn incubator(&self) -> ConsoleResult<Arc<dyn IncubatorService>> {
        self.incubator
            .clone()
            .ok_or_else(|| ConsoleError::unavailable("incubator"))
    }
}
