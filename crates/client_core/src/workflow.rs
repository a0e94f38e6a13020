//! Physical sample transfers between microscope stages and incubator slots.
//!
//! Steps run strictly in order. A failing step aborts the transfer; steps
//! that already completed are not undone and the operator has to recover the
//! hardware by hand.

use std::future::Future;

use shared::domain::{MicroscopeId, Slot, SlotNumber};
use tracing::{error, info};

use crate::{
    error::{ConsoleError, ConsoleResult},
    events::ProgressPublisher,
    operation::OperationToken,
    services::ServiceHandles,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    HomeStage(MicroscopeId),
    ConnectArm,
    ArmLightOn,
    MicroscopeToTransferStation(MicroscopeId),
    TransferStationToSlot(SlotNumber),
    SlotToTransferStation(SlotNumber),
    TransferStationToMicroscope(MicroscopeId),
    ReturnStage(MicroscopeId),
    ArmLightOff,
    DisconnectArm,
}

impl TransferStep {
    pub fn action(self) -> String {
        match self {
            Self::HomeStage(m) => format!("home microscope {m} stage"),
            Self::ConnectArm => "connect robotic arm".to_string(),
            Self::ArmLightOn => "turn on robotic arm light".to_string(),
            Self::MicroscopeToTransferStation(m) => {
                format!("move sample from microscope {m} to the transfer station")
            }
            Self::TransferStationToSlot(s) => {
                format!("move sample from the transfer station into slot {s}")
            }
            Self::SlotToTransferStation(s) => {
                format!("move sample from slot {s} to the transfer station")
            }
            Self::TransferStationToMicroscope(m) => {
                format!("move sample from the transfer station to microscope {m}")
            }
            Self::ReturnStage(m) => format!("return microscope {m} stage"),
            Self::ArmLightOff => "turn off robotic arm light".to_string(),
            Self::DisconnectArm => "disconnect robotic arm".to_string(),
        }
    }

    pub fn started_message(self) -> String {
        match self {
            Self::HomeStage(m) => format!("Homing microscope {m} stage..."),
            Self::ConnectArm => "Connecting robotic arm...".to_string(),
            Self::ArmLightOn => "Turning on robotic arm light...".to_string(),
            Self::MicroscopeToTransferStation(m) => {
                format!("Robotic arm moving sample from microscope {m} to the transfer station...")
            }
            Self::TransferStationToSlot(s) => {
                format!("Incubator moving sample from the transfer station into slot {s}...")
            }
            Self::SlotToTransferStation(s) => {
                format!("Incubator moving sample from slot {s} to the transfer station...")
            }
            Self::TransferStationToMicroscope(m) => {
                format!("Robotic arm moving sample from the transfer station to microscope {m}...")
            }
            Self::ReturnStage(m) => format!("Returning microscope {m} stage..."),
            Self::ArmLightOff => "Turning off robotic arm light...".to_string(),
            Self::DisconnectArm => "Disconnecting robotic arm...".to_string(),
        }
    }

    pub fn finished_message(self) -> String {
        match self {
            Self::HomeStage(m) => format!("Microscope {m} stage homed."),
            Self::ConnectArm => "Robotic arm connected.".to_string(),
            Self::ArmLightOn => "Robotic arm light on.".to_string(),
            Self::MicroscopeToTransferStation(m) => {
                format!("Sample moved from microscope {m} to the transfer station.")
            }
            Self::TransferStationToSlot(s) => format!("Sample placed in incubator slot {s}."),
            Self::SlotToTransferStation(s) => {
                format!("Sample from slot {s} is at the transfer station.")
            }
            Self::TransferStationToMicroscope(m) => format!("Sample placed on microscope {m}."),
            Self::ReturnStage(m) => format!("Microscope {m} stage returned."),
            Self::ArmLightOff => "Robotic arm light off.".to_string(),
            Self::DisconnectArm => "Robotic arm disconnected.".to_string(),
        }
    }
}

pub fn find_microscope_occupant(slots: &[Slot], microscope: MicroscopeId) -> Option<&Slot> {
    slots.iter().find(|slot| slot.is_on_microscope(microscope))
}

pub struct TransferWorkflow {
    services: ServiceHandles,
    progress: ProgressPublisher,
}

impl TransferWorkflow {
    pub fn new(services: ServiceHandles, progress: ProgressPublisher) -> Self {
        Self { services, progress }
    }

    pub async fn check_microscope_conflict(
        &self,
        microscope: MicroscopeId,
    ) -> ConsoleResult<Option<Slot>> {
        let incubator = self.services.incubator()?;
        let slots = incubator
            .list_slots()
            .await
            .map_err(|error| ConsoleError::remote("list incubator slots", error))?;
        let occupant = find_microscope_occupant(&slots, microscope).cloned();
        if let Some(slot) = &occupant {
            info!(
                microscope = microscope.get(),
                slot = slot.slot_number.get(),
                sample = slot.sample_name.as_deref().unwrap_or_default(),
                "microscope already holds a registered sample"
            );
        }
        Ok(occupant)
    }

    pub async fn transfer_from_microscope_to_slot(
        &self,
        token: &OperationToken,
        microscope: MicroscopeId,
        slot: SlotNumber,
    ) -> ConsoleResult<()> {
        let stage = self.services.microscope(microscope)?;
        let arm = self.services.robotic_arm()?;
        let incubator = self.services.incubator()?;

        info!(
            operation = token.name(),
            microscope = microscope.get(),
            slot = slot.get(),
            "transfer to incubator started"
        );
        self.progress.progress(format!(
            "Starting transfer from microscope {microscope} to incubator slot {slot}."
        ));

        self.run_step(TransferStep::HomeStage(microscope), stage.home_stage())
            .await?;
        self.run_step(TransferStep::ConnectArm, arm.connect()).await?;
        self.run_step(TransferStep::ArmLightOn, arm.light_on()).await?;
        self.run_step(
            TransferStep::MicroscopeToTransferStation(microscope),
            arm.microscope_to_incubator(microscope),
        )
        .await?;
        self.run_step(
            TransferStep::TransferStationToSlot(slot),
            incubator.put_sample_from_transfer_station_to_slot(slot),
        )
        .await?;
        self.run_step(TransferStep::ReturnStage(microscope), stage.return_stage())
            .await?;
        self.run_step(TransferStep::ArmLightOff, arm.light_off()).await?;
        self.run_step(TransferStep::DisconnectArm, arm.disconnect())
            .await?;

        self.progress.progress(format!(
            "Sample transferred from microscope {microscope} to incubator slot {slot}."
        ));
        Ok(())
    }

    pub async fn transfer_from_slot_to_microscope(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
        microscope: MicroscopeId,
    ) -> ConsoleResult<()> {
        let stage = self.services.microscope(microscope)?;
        let arm = self.services.robotic_arm()?;
        let incubator = self.services.incubator()?;

        info!(
            operation = token.name(),
            microscope = microscope.get(),
            slot = slot.get(),
            "transfer to microscope started"
        );
        self.progress.progress(format!(
            "Starting transfer from incubator slot {slot} to microscope {microscope}."
        ));

        self.run_step(TransferStep::HomeStage(microscope), stage.home_stage())
            .await?;
        self.run_step(TransferStep::ConnectArm, arm.connect()).await?;
        self.run_step(TransferStep::ArmLightOn, arm.light_on()).await?;
        self.run_step(
            TransferStep::SlotToTransferStation(slot),
            incubator.get_sample_from_slot_to_transfer_station(slot),
        )
        .await?;
        self.run_step(
            TransferStep::TransferStationToMicroscope(microscope),
            arm.incubator_to_microscope(microscope),
        )
        .await?;
        self.run_step(TransferStep::ReturnStage(microscope), stage.return_stage())
            .await?;
        self.run_step(TransferStep::ArmLightOff, arm.light_off()).await?;
        self.run_step(TransferStep::DisconnectArm, arm.disconnect())
            .await?;

        self.progress.progress(format!(
            "Sample transferred from incubator slot {slot} to microscope {microscope}."
        ));
        Ok(())
    }

    /// Pulls a sample an operator left at the transfer station into `slot`.
    pub async fn transfer_from_station_to_slot(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
    ) -> ConsoleResult<()> {
        let incubator = self.services.incubator()?;
        info!(operation = token.name(), slot = slot.get(), "transfer from station started");
        self.run_step(
            TransferStep::TransferStationToSlot(slot),
            incubator.put_sample_from_transfer_station_to_slot(slot),
        )
        .await
    }

    async fn run_step<F>(&self, step: TransferStep, call: F) -> ConsoleResult<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        self.progress.progress(step.started_message());
        match call.await {
            Ok(()) => {
                info!(step = %step.action(), "transfer step completed");
                self.progress.progress(step.finished_message());
                Ok(())
            }
            Err(source) => {
                let err = ConsoleError::remote(step.action(), source);
                error!(
                    step = %step.action(),
                    error = %err,
                    "transfer step failed; aborting transfer"
                );
                self.progress.failure(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
