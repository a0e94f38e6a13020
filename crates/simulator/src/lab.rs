//! In-process stand-ins for the incubator, the robotic arm and the
//! microscopes.
//!
//! Slot records live in the [`SlotStore`]; everything physical (which bays
//! hold a plate, what sits on the transfer station, stage positions, arm
//! state) is kept in memory and reset on restart. The rack is seeded from
//! the stored records on startup.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use shared::{
    domain::{
        MicroscopeId, SampleRegistration, Slot, SlotNumber, StagePosition, WellPlateType,
        INCUBATOR_LOCATION,
    },
    error::{ApiError, ErrorCode},
};
use storage::SlotStore;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Travel limits of the simulated stage, in millimetres.
pub const STAGE_LIMITS: StagePosition = StagePosition {
    x: 120.0,
    y: 86.0,
    z: 6.0,
};
pub const FOCUS_Z: f64 = 3.2;
const MAX_ILLUMINATION_CHANNEL: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub temperature_c: f64,
    pub co2_percent: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            temperature_c: 37.0,
            co2_percent: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MicroscopeState {
    pub position: StagePosition,
    pub homed: bool,
    #[serde(skip)]
    parked_from: Option<StagePosition>,
    pub holds_sample: bool,
    pub illumination: BTreeMap<u32, f64>,
    pub exposure_ms: BTreeMap<u32, f64>,
    pub frames_captured: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArmState {
    pub connected: bool,
    pub light_on: bool,
}

#[derive(Debug, Default)]
struct Floor {
    rack: HashSet<SlotNumber>,
    station_occupied: bool,
    arm: ArmState,
    microscopes: HashMap<MicroscopeId, MicroscopeState>,
}

pub struct Lab {
    store: Arc<dyn SlotStore>,
    environment: Environment,
    floor: Mutex<Floor>,
}

impl Lab {
    pub async fn open(
        store: Arc<dyn SlotStore>,
        environment: Environment,
    ) -> anyhow::Result<Self> {
        let rack: HashSet<SlotNumber> = store
            .list_slots()
            .await?
            .into_iter()
            .filter(|slot| slot.is_occupied() && is_resident(slot))
            .map(|slot| slot.slot_number)
            .collect();
        info!(occupied = rack.len(), "simulated rack seeded from stored slots");

        let microscopes = [MicroscopeId::ONE, MicroscopeId::TWO]
            .into_iter()
            .map(|id| (id, MicroscopeState::default()))
            .collect();
        Ok(Self {
            store,
            environment,
            floor: Mutex::new(Floor {
                rack,
                microscopes,
                ..Floor::default()
            }),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    // incubator

    pub async fn slot(&self, slot: SlotNumber) -> Result<Slot, ApiError> {
        self.store.get_slot(slot).await.map_err(internal)
    }

    pub async fn slots(&self) -> Result<Vec<Slot>, ApiError> {
        self.store.list_slots().await.map_err(internal)
    }

    /// Records a sample. A resident registration also marks the bay as
    /// physically filled, since the operator placed it by hand.
    pub async fn add_sample(&self, registration: &SampleRegistration) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        self.store
            .upsert_sample(registration)
            .await
            .map_err(internal)?;
        if registration.location == INCUBATOR_LOCATION {
            floor.rack.insert(registration.slot);
        }
        info!(
            slot = registration.slot.get(),
            sample = %registration.name,
            location = %registration.location,
            "sample recorded"
        );
        Ok(())
    }

    pub async fn remove_sample(&self, slot: SlotNumber) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        let existed = self.store.clear_slot(slot).await.map_err(internal)?;
        floor.rack.remove(&slot);
        info!(slot = slot.get(), existed, "slot record cleared");
        Ok(())
    }

    pub async fn put_from_transfer_station(&self, slot: SlotNumber) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        if floor.rack.contains(&slot) {
            return Err(conflict(format!("slot {slot} already holds a plate")));
        }
        floor.station_occupied = false;
        floor.rack.insert(slot);
        info!(slot = slot.get(), "plate moved from transfer station into slot");
        Ok(())
    }

    pub async fn get_to_transfer_station(&self, slot: SlotNumber) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        if floor.station_occupied {
            return Err(conflict("transfer station is already occupied"));
        }
        if !floor.rack.remove(&slot) {
            return Err(conflict(format!("slot {slot} holds no plate")));
        }
        floor.station_occupied = true;
        info!(slot = slot.get(), "plate moved from slot to transfer station");
        Ok(())
    }

    // robotic arm

    pub async fn arm(&self) -> ArmState {
        self.floor.lock().await.arm
    }

    pub async fn connect_arm(&self) {
        self.floor.lock().await.arm.connected = true;
        debug!("arm connected");
    }

    pub async fn disconnect_arm(&self) {
        self.floor.lock().await.arm = ArmState::default();
        debug!("arm disconnected");
    }

    pub async fn set_arm_light(&self, on: bool) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        require_connected(&floor)?;
        floor.arm.light_on = on;
        Ok(())
    }

    pub async fn microscope_to_incubator(&self, microscope: MicroscopeId) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        require_connected(&floor)?;
        if floor.station_occupied {
            return Err(conflict("transfer station is already occupied"));
        }
        let stage = stage_mut(&mut floor, microscope)?;
        require_homed(stage, microscope)?;
        stage.holds_sample = false;
        floor.station_occupied = true;
        info!(microscope = microscope.get(), "arm moved plate to transfer station");
        Ok(())
    }

    pub async fn incubator_to_microscope(&self, microscope: MicroscopeId) -> Result<(), ApiError> {
        let mut floor = self.floor.lock().await;
        require_connected(&floor)?;
        if !floor.station_occupied {
            return Err(conflict("transfer station is empty"));
        }
        let stage = stage_mut(&mut floor, microscope)?;
        require_homed(stage, microscope)?;
        if stage.holds_sample {
            return Err(conflict(format!("microscope {microscope} already holds a plate")));
        }
        stage.holds_sample = true;
        floor.station_occupied = false;
        info!(microscope = microscope.get(), "arm placed plate on microscope");
        Ok(())
    }

    // microscopes

    pub async fn microscope(
        &self,
        microscope: MicroscopeId,
    ) -> Result<MicroscopeState, ApiError> {
        let mut floor = self.floor.lock().await;
        Ok(stage_mut(&mut floor, microscope)?.clone())
    }

    pub async fn home_stage(&self, microscope: MicroscopeId) -> Result<(), ApiError> {
        self.with_stage(microscope, |stage| {
            if !stage.homed {
                stage.parked_from = Some(stage.position);
            }
            stage.position = StagePosition::default();
            stage.homed = true;
            Ok(())
        })
        .await
    }

    pub async fn return_stage(&self, microscope: MicroscopeId) -> Result<(), ApiError> {
        self.with_stage(microscope, |stage| {
            if let Some(position) = stage.parked_from.take() {
                stage.position = position;
            }
            stage.homed = false;
            Ok(())
        })
        .await
    }

    pub async fn move_by(
        &self,
        microscope: MicroscopeId,
        delta: StagePosition,
    ) -> Result<(), ApiError> {
        self.with_stage(microscope, |stage| {
            let target = StagePosition {
                x: stage.position.x + delta.x,
                y: stage.position.y + delta.y,
                z: stage.position.z + delta.z,
            };
            move_stage(stage, target)
        })
        .await
    }

    pub async fn move_to(
        &self,
        microscope: MicroscopeId,
        target: StagePosition,
    ) -> Result<(), ApiError> {
        self.with_stage(microscope, |stage| move_stage(stage, target))
            .await
    }

    pub async fn snap(&self, microscope: MicroscopeId) -> Result<String, ApiError> {
        let mut floor = self.floor.lock().await;
        let stage = stage_mut(&mut floor, microscope)?;
        stage.frames_captured += 1;
        Ok(format!(
            "simulated://microscope{microscope}/frame-{:05}.png",
            stage.frames_captured
        ))
    }

    pub async fn auto_focus(&self, microscope: MicroscopeId) -> Result<(), ApiError> {
        self.with_stage(microscope, |stage| {
            if !stage.holds_sample {
                return Err(conflict(format!("microscope {microscope} has nothing to focus on")));
            }
            stage.position.z = FOCUS_Z;
            Ok(())
        })
        .await
    }

    pub async fn set_illumination(
        &self,
        microscope: MicroscopeId,
        channel: u32,
        intensity: f64,
    ) -> Result<(), ApiError> {
        if channel > MAX_ILLUMINATION_CHANNEL {
            return Err(validation(format!("illumination channel {channel} does not exist")));
        }
        if !(0.0..=100.0).contains(&intensity) {
            return Err(validation("intensity must be between 0 and 100"));
        }
        self.with_stage(microscope, |stage| {
            stage.illumination.insert(channel, intensity);
            Ok(())
        })
        .await
    }

    pub async fn set_camera_exposure(
        &self,
        microscope: MicroscopeId,
        channel: u32,
        exposure_ms: f64,
    ) -> Result<(), ApiError> {
        if channel > MAX_ILLUMINATION_CHANNEL {
            return Err(validation(format!("illumination channel {channel} does not exist")));
        }
        if exposure_ms <= 0.0 {
            return Err(validation("exposure time must be positive"));
        }
        self.with_stage(microscope, |stage| {
            stage.exposure_ms.insert(channel, exposure_ms);
            Ok(())
        })
        .await
    }

    pub async fn navigate_to_well(
        &self,
        microscope: MicroscopeId,
        row: &str,
        col: u32,
        plate: WellPlateType,
    ) -> Result<StagePosition, ApiError> {
        let target = well_position(row, col, plate)?;
        self.with_stage(microscope, |stage| move_stage(stage, target))
            .await?;
        Ok(target)
    }

    async fn with_stage<F>(&self, microscope: MicroscopeId, apply: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut MicroscopeState) -> Result<(), ApiError>,
    {
        let mut floor = self.floor.lock().await;
        apply(stage_mut(&mut floor, microscope)?)
    }
}

/// Stage coordinates of a well centre, A1 at the plate origin.
pub fn well_position(
    row: &str,
    col: u32,
    plate: WellPlateType,
) -> Result<StagePosition, ApiError> {
    let (rows, cols) = plate.dimensions();
    let row_index = match row.trim().as_bytes() {
        [letter] if letter.is_ascii_alphabetic() => u32::from(letter.to_ascii_uppercase() - b'A'),
        _ => return Err(validation(format!("well row '{row}' is not a single letter"))),
    };
    if row_index >= u32::from(rows) || col == 0 || col > u32::from(cols) {
        return Err(validation(format!(
            "well {row}{col} is outside a {plate}-well plate"
        )));
    }
    let pitch = well_pitch_mm(plate);
    Ok(StagePosition {
        x: 14.38 + f64::from(col - 1) * pitch,
        y: 11.24 + f64::from(row_index) * pitch,
        z: 0.0,
    })
}

fn well_pitch_mm(plate: WellPlateType) -> f64 {
    match plate {
        WellPlateType::Wells96 => 9.0,
        WellPlateType::Wells384 => 4.5,
        WellPlateType::Wells24 => 19.3,
        WellPlateType::Wells48 => 13.0,
    }
}

fn move_stage(stage: &mut MicroscopeState, target: StagePosition) -> Result<(), ApiError> {
    let within = |value: f64, limit: f64| (0.0..=limit).contains(&value);
    if !(within(target.x, STAGE_LIMITS.x)
        && within(target.y, STAGE_LIMITS.y)
        && within(target.z, STAGE_LIMITS.z))
    {
        return Err(validation(format!(
            "target ({:.2}, {:.2}, {:.2}) is outside the stage travel",
            target.x, target.y, target.z
        )));
    }
    stage.position = target;
    stage.homed = false;
    Ok(())
}

fn is_resident(slot: &Slot) -> bool {
    slot.location.as_deref() == Some(INCUBATOR_LOCATION)
}

fn stage_mut(
    floor: &mut Floor,
    microscope: MicroscopeId,
) -> Result<&mut MicroscopeState, ApiError> {
    floor.microscopes.get_mut(&microscope).ok_or_else(|| {
        ApiError::new(
            ErrorCode::NotFound,
            format!("microscope {microscope} is not simulated"),
        )
    })
}

fn require_connected(floor: &Floor) -> Result<(), ApiError> {
    if floor.arm.connected {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Unavailable,
            "robotic arm is not connected",
        ))
    }
}

fn require_homed(stage: &MicroscopeState, microscope: MicroscopeId) -> Result<(), ApiError> {
    if stage.homed {
        Ok(())
    } else {
        Err(conflict(format!(
            "microscope {microscope} stage must be homed before the arm reaches in"
        )))
    }
}

fn conflict(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Conflict, message)
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

fn internal(error: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{error:#}"))
}

#[cfg(test)]
#[path = "tests/lab_tests.rs"]
mod tests;
