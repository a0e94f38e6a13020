use async_trait::async_trait;
use shared::domain::{
    MicroscopeId, SampleRegistration, Slot, SlotNumber, StagePosition, WellPlateType,
};

pub mod remote;
pub mod transport;

pub use remote::{RemoteIncubator, RemoteMicroscope, RemoteRoboticArm};
pub use transport::{HyphaClient, HyphaConfig};

#[async_trait]
pub trait MicroscopeService: Send + Sync {
    async fn get_status(&self) -> anyhow::Result<serde_json::Value>;
    async fn home_stage(&self) -> anyhow::Result<()>;
    async fn return_stage(&self) -> anyhow::Result<()>;
    async fn move_by_distance(&self, delta: StagePosition) -> anyhow::Result<()>;
    async fn move_to_position(&self, target: StagePosition) -> anyhow::Result<()>;
    /// Captures one frame and returns a reference to the stored image.
    async fn snap(&self) -> anyhow::Result<String>;
    async fn auto_focus(&self) -> anyhow::Result<()>;
    async fn set_illumination(&self, channel: u32, intensity: f64) -> anyhow::Result<()>;
    async fn set_camera_exposure(&self, channel: u32, exposure_ms: f64) -> anyhow::Result<()>;
    async fn navigate_to_well(
        &self,
        row: &str,
        col: u32,
        plate: WellPlateType,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RoboticArmService: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;
    async fn light_on(&self) -> anyhow::Result<()>;
    async fn light_off(&self) -> anyhow::Result<()>;
    async fn microscope_to_incubator(&self, microscope: MicroscopeId) -> anyhow::Result<()>;
    async fn incubator_to_microscope(&self, microscope: MicroscopeId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait IncubatorService: Send + Sync {
    async fn get_temperature(&self) -> anyhow::Result<f64>;
    async fn get_co2_level(&self) -> anyhow::Result<f64>;
    async fn get_slot_information(&self, slot: SlotNumber) -> anyhow::Result<Slot>;
    async fn add_sample(&self, registration: &SampleRegistration) -> anyhow::Result<()>;
    async fn remove_sample(&self, slot: SlotNumber) -> anyhow::Result<()>;
    async fn put_sample_from_transfer_station_to_slot(&self, slot: SlotNumber)
        -> anyhow::Result<()>;
    async fn get_sample_from_slot_to_transfer_station(&self, slot: SlotNumber)
        -> anyhow::Result<()>;

    /// Lists every slot of the rack. Services without a batched listing fall
    /// back to one `get_slot_information` call per slot.
    async fn list_slots(&self) -> anyhow::Result<Vec<Slot>> {
        let mut slots = Vec::with_capacity(usize::from(shared::domain::INCUBATOR_SLOT_COUNT));
        for slot in SlotNumber::all() {
            slots.push(self.get_slot_information(slot).await?);
        }
        Ok(slots)
    }
}
