use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{MicroscopeId, SampleRegistration, Slot, SlotNumber, StagePosition, WellPlateType},
    protocol::{
        ExposureArgs, IlluminationArgs, IncubatorFunction, MicroscopeArgs, MicroscopeFunction,
        NavigateToWellArgs, RoboticArmFunction, SlotArgs, SlotQueryArgs,
    },
};
use tracing::warn;

use crate::{HyphaClient, IncubatorService, MicroscopeService, RoboticArmService};

fn no_args() -> serde_json::Value {
    json!({})
}

pub struct RemoteMicroscope {
    client: HyphaClient,
    service_id: String,
}

impl RemoteMicroscope {
    pub fn new(client: HyphaClient, service_id: impl Into<String>) -> Self {
        Self {
            client,
            service_id: service_id.into(),
        }
    }

    async fn invoke(&self, function: MicroscopeFunction, args: serde_json::Value) -> Result<()> {
        self.client
            .invoke(&self.service_id, function.as_str(), &args)
            .await
    }
}

#[async_trait]
impl MicroscopeService for RemoteMicroscope {
    async fn get_status(&self) -> Result<serde_json::Value> {
        self.client
            .call(
                &self.service_id,
                MicroscopeFunction::GetStatus.as_str(),
                &no_args(),
            )
            .await
    }

    async fn home_stage(&self) -> Result<()> {
        self.invoke(MicroscopeFunction::HomeStage, no_args()).await
    }

    async fn return_stage(&self) -> Result<()> {
        self.invoke(MicroscopeFunction::ReturnStage, no_args()).await
    }

    async fn move_by_distance(&self, delta: StagePosition) -> Result<()> {
        self.invoke(MicroscopeFunction::MoveByDistance, serde_json::to_value(delta)?)
            .await
    }

    async fn move_to_position(&self, target: StagePosition) -> Result<()> {
        self.invoke(MicroscopeFunction::MoveToPosition, serde_json::to_value(target)?)
            .await
    }

    async fn snap(&self) -> Result<String> {
        self.client
            .call(&self.service_id, MicroscopeFunction::Snap.as_str(), &no_args())
            .await
    }

    async fn auto_focus(&self) -> Result<()> {
        self.invoke(MicroscopeFunction::AutoFocus, no_args()).await
    }

    async fn set_illumination(&self, channel: u32, intensity: f64) -> Result<()> {
        let args = IlluminationArgs { channel, intensity };
        self.invoke(MicroscopeFunction::SetIllumination, serde_json::to_value(args)?)
            .await
    }

    async fn set_camera_exposure(&self, channel: u32, exposure_ms: f64) -> Result<()> {
        let args = ExposureArgs {
            channel,
            exposure_time: exposure_ms,
        };
        self.invoke(MicroscopeFunction::SetCameraExposure, serde_json::to_value(args)?)
            .await
    }

    async fn navigate_to_well(&self, row: &str, col: u32, plate: WellPlateType) -> Result<()> {
        let args = NavigateToWellArgs {
            row: row.to_string(),
            col,
            wellplate_type: plate,
        };
        self.invoke(MicroscopeFunction::NavigateToWell, serde_json::to_value(args)?)
            .await
    }
}

pub struct RemoteRoboticArm {
    client: HyphaClient,
    service_id: String,
}

impl RemoteRoboticArm {
    pub fn new(client: HyphaClient, service_id: impl Into<String>) -> Self {
        Self {
            client,
            service_id: service_id.into(),
        }
    }

    async fn invoke<A>(&self, function: RoboticArmFunction, args: &A) -> Result<()>
    where
        A: serde::Serialize + Sync,
    {
        self.client
            .invoke(&self.service_id, function.as_str(), args)
            .await
    }
}

#[async_trait]
impl RoboticArmService for RemoteRoboticArm {
    async fn connect(&self) -> Result<()> {
        self.invoke(RoboticArmFunction::Connect, &no_args()).await
    }

    async fn disconnect(&self) -> Result<()> {
        self.invoke(RoboticArmFunction::Disconnect, &no_args()).await
    }

    async fn light_on(&self) -> Result<()> {
        self.invoke(RoboticArmFunction::LightOn, &no_args()).await
    }

    async fn light_off(&self) -> Result<()> {
        self.invoke(RoboticArmFunction::LightOff, &no_args()).await
    }

    async fn microscope_to_incubator(&self, microscope: MicroscopeId) -> Result<()> {
        let args = MicroscopeArgs {
            microscope_id: microscope,
        };
        self.invoke(RoboticArmFunction::MicroscopeToIncubator, &args)
            .await
    }

    async fn incubator_to_microscope(&self, microscope: MicroscopeId) -> Result<()> {
        let args = MicroscopeArgs {
            microscope_id: microscope,
        };
        self.invoke(RoboticArmFunction::IncubatorToMicroscope, &args)
            .await
    }
}

pub struct RemoteIncubator {
    client: HyphaClient,
    service_id: String,
    batched_listing: bool,
}

impl RemoteIncubator {
    pub fn new(client: HyphaClient, service_id: impl Into<String>) -> Self {
        Self {
            client,
            service_id: service_id.into(),
            batched_listing: true,
        }
    }

    /// Services that only answer per-slot queries are polled one slot at a time.
    pub fn with_batched_listing(mut self, enabled: bool) -> Self {
        self.batched_listing = enabled;
        self
    }

    async fn invoke<A>(&self, function: IncubatorFunction, args: &A) -> Result<()>
    where
        A: serde::Serialize + Sync,
    {
        self.client
            .invoke(&self.service_id, function.as_str(), args)
            .await
    }

    async fn list_slots_one_by_one(&self) -> Result<Vec<Slot>> {
        let mut slots = Vec::new();
        for slot in SlotNumber::all() {
            slots.push(self.get_slot_information(slot).await?);
        }
        Ok(slots)
    }
}

#[async_trait]
impl IncubatorService for RemoteIncubator {
    async fn get_temperature(&self) -> Result<f64> {
        self.client
            .call(
                &self.service_id,
                IncubatorFunction::GetTemperature.as_str(),
                &no_args(),
            )
            .await
    }

    async fn get_co2_level(&self) -> Result<f64> {
        self.client
            .call(
                &self.service_id,
                IncubatorFunction::GetCo2Level.as_str(),
                &no_args(),
            )
            .await
    }

    async fn get_slot_information(&self, slot: SlotNumber) -> Result<Slot> {
        self.client
            .call(
                &self.service_id,
                IncubatorFunction::GetSlotInformation.as_str(),
                &SlotQueryArgs { slot: Some(slot) },
            )
            .await
    }

    async fn add_sample(&self, registration: &SampleRegistration) -> Result<()> {
        self.invoke(IncubatorFunction::AddSample, registration).await
    }

    async fn remove_sample(&self, slot: SlotNumber) -> Result<()> {
        self.invoke(IncubatorFunction::RemoveSample, &SlotArgs { slot })
            .await
    }

    async fn put_sample_from_transfer_station_to_slot(&self, slot: SlotNumber) -> Result<()> {
        self.invoke(
            IncubatorFunction::PutSampleFromTransferStationToSlot,
            &SlotArgs { slot },
        )
        .await
    }

    async fn get_sample_from_slot_to_transfer_station(&self, slot: SlotNumber) -> Result<()> {
        self.invoke(
            IncubatorFunction::GetSampleFromSlotToTransferStation,
            &SlotArgs { slot },
        )
        .await
    }

    async fn list_slots(&self) -> Result<Vec<Slot>> {
        if !self.batched_listing {
            return self.list_slots_one_by_one().await;
        }

        let batched: Result<Vec<Slot>> = self
            .client
            .call(
                &self.service_id,
                IncubatorFunction::GetSlotInformation.as_str(),
                &SlotQueryArgs::default(),
            )
            .await;
        match batched {
            Ok(slots) => Ok(slots),
            Err(error) => {
                warn!(
                    service_id = %self.service_id,
                    %error,
                    "batched slot listing failed; querying slots individually"
                );
                self.list_slots_one_by_one().await
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
