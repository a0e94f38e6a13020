//! Recording fakes for the hardware services.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hypha_integration::{IncubatorService, MicroscopeService, RoboticArmService};
use shared::domain::{
    MicroscopeId, SampleRegistration, Slot, SlotNumber, StagePosition, WellPlateType,
};

use crate::{LabConsole, ServiceHandles};

/// Ordered journal of every call across all fakes, e.g. `arm.connect`.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("call log").push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("call log").clear();
    }
}

#[derive(Default)]
struct Failures {
    functions: Mutex<HashSet<String>>,
}

impl Failures {
    fn fail(&self, function: &str) {
        self.functions
            .lock()
            .expect("failures")
            .insert(function.to_string());
    }

    fn heal(&self, function: &str) {
        self.functions.lock().expect("failures").remove(function);
    }

    fn check(&self, function: &str) -> Result<()> {
        if self.functions.lock().expect("failures").contains(function) {
            return Err(anyhow!("{function} failed: device not responding"));
        }
        Ok(())
    }
}

pub struct FakeIncubator {
    log: CallLog,
    failures: Failures,
    slots: Mutex<Vec<Slot>>,
}

impl FakeIncubator {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
            slots: Mutex::new(SlotNumber::all().map(Slot::empty).collect()),
        }
    }

    pub fn fail(&self, function: &str) {
        self.failures.fail(function);
    }

    pub fn heal(&self, function: &str) {
        self.failures.heal(function);
    }

    pub fn seed(&self, registration: SampleRegistration) {
        let slot = registration.into_slot();
        let index = slot.slot_number.index();
        self.slots.lock().expect("slots")[index] = slot;
    }

    pub fn slot(&self, slot: SlotNumber) -> Slot {
        self.slots.lock().expect("slots")[slot.index()].clone()
    }

    fn call(&self, function: &str, detail: impl std::fmt::Display) -> Result<()> {
        self.log.record(format!("incubator.{function}{detail}"));
        self.failures.check(function)
    }
}

#[async_trait]
impl IncubatorService for FakeIncubator {
    async fn get_temperature(&self) -> Result<f64> {
        self.call("get_temperature", "")?;
        Ok(37.0)
    }

    async fn get_co2_level(&self) -> Result<f64> {
        self.call("get_co2_level", "")?;
        Ok(5.0)
    }

    async fn get_slot_information(&self, slot: SlotNumber) -> Result<Slot> {
        self.call("get_slot_information", format!("({slot})"))?;
        Ok(self.slot(slot))
    }

    async fn add_sample(&self, registration: &SampleRegistration) -> Result<()> {
        self.call("add_sample", format!("({})", registration.slot))?;
        self.seed(registration.clone());
        Ok(())
    }

    async fn remove_sample(&self, slot: SlotNumber) -> Result<()> {
        self.call("remove_sample", format!("({slot})"))?;
        self.slots.lock().expect("slots")[slot.index()] = Slot::empty(slot);
        Ok(())
    }

    async fn put_sample_from_transfer_station_to_slot(&self, slot: SlotNumber) -> Result<()> {
        self.call("put_sample_from_transfer_station_to_slot", format!("({slot})"))
    }

    async fn get_sample_from_slot_to_transfer_station(&self, slot: SlotNumber) -> Result<()> {
        self.call("get_sample_from_slot_to_transfer_station", format!("({slot})"))
    }

    async fn list_slots(&self) -> Result<Vec<Slot>> {
        self.call("list_slots", "")?;
        Ok(self.slots.lock().expect("slots").clone())
    }
}

pub struct FakeMicroscope {
    id: MicroscopeId,
    log: CallLog,
    failures: Failures,
}

impl FakeMicroscope {
    pub fn new(id: MicroscopeId, log: CallLog) -> Self {
        Self {
            id,
            log,
            failures: Failures::default(),
        }
    }

    pub fn fail(&self, function: &str) {
        self.failures.fail(function);
    }

    fn call(&self, function: &str) -> Result<()> {
        self.log.record(format!("microscope{}.{function}", self.id));
        self.failures.check(function)
    }
}

#[async_trait]
impl MicroscopeService for FakeMicroscope {
    async fn get_status(&self) -> Result<serde_json::Value> {
        self.call("get_status")?;
        Ok(serde_json::json!({ "microscope": self.id.get(), "is_busy": false }))
    }

    async fn home_stage(&self) -> Result<()> {
        self.call("home_stage")
    }

    async fn return_stage(&self) -> Result<()> {
        self.call("return_stage")
    }

    async fn move_by_distance(&self, _delta: StagePosition) -> Result<()> {
        self.call("move_by_distance")
    }

    async fn move_to_position(&self, _target: StagePosition) -> Result<()> {
        self.call("move_to_position")
    }

    async fn snap(&self) -> Result<String> {
        self.call("snap")?;
        Ok(format!("frames/microscope{}/latest.png", self.id))
    }

    async fn auto_focus(&self) -> Result<()> {
        self.call("auto_focus")
    }

    async fn set_illumination(&self, _channel: u32, _intensity: f64) -> Result<()> {
        self.call("set_illumination")
    }

    async fn set_camera_exposure(&self, _channel: u32, _exposure_ms: f64) -> Result<()> {
        self.call("set_camera_exposure")
    }

    async fn navigate_to_well(&self, _row: &str, _col: u32, _plate: WellPlateType) -> Result<()> {
        self.call("navigate_to_well")
    }
}

pub struct FakeArm {
    log: CallLog,
    failures: Failures,
}

impl FakeArm {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
        }
    }

    pub fn fail(&self, function: &str) {
        self.failures.fail(function);
    }

    fn call(&self, function: &str) -> Result<()> {
        self.log.record(format!("arm.{function}"));
        self.failures.check(function)
    }
}

#[async_trait]
impl RoboticArmService for FakeArm {
    async fn connect(&self) -> Result<()> {
        self.call("connect")
    }

    async fn disconnect(&self) -> Result<()> {
        self.call("disconnect")
    }

    async fn light_on(&self) -> Result<()> {
        self.call("light_on")
    }

    async fn light_off(&self) -> Result<()> {
        self.call("light_off")
    }

    async fn microscope_to_incubator(&self, microscope: MicroscopeId) -> Result<()> {
        self.call(&format!("microscope_to_incubator({microscope})"))
    }

    async fn incubator_to_microscope(&self, microscope: MicroscopeId) -> Result<()> {
        self.call(&format!("incubator_to_microscope({microscope})"))
    }
}

pub struct Fixture {
    pub log: CallLog,
    pub incubator: Arc<FakeIncubator>,
    pub arm: Arc<FakeArm>,
    pub microscope1: Arc<FakeMicroscope>,
    pub microscope2: Arc<FakeMicroscope>,
}

impl Fixture {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            incubator: Arc::new(FakeIncubator::new(log.clone())),
            arm: Arc::new(FakeArm::new(log.clone())),
            microscope1: Arc::new(FakeMicroscope::new(MicroscopeId::ONE, log.clone())),
            microscope2: Arc::new(FakeMicroscope::new(MicroscopeId::TWO, log.clone())),
            log,
        }
    }

    pub fn services(&self) -> ServiceHandles {
        ServiceHandles::new()
            .with_incubator(self.incubator.clone())
            .with_robotic_arm(self.arm.clone())
            .with_microscope(MicroscopeId::ONE, self.microscope1.clone())
            .with_microscope(MicroscopeId::TWO, self.microscope2.clone())
    }

    pub fn console(&self) -> LabConsole {
        LabConsole::new(self.services())
    }
}

pub fn slot(n: u8) -> SlotNumber {
    SlotNumber::new(n).expect("slot")
}

pub fn registration(
    n: u8,
    name: &str,
    status: shared::domain::SampleStatus,
    location: &str,
) -> SampleRegistration {
    SampleRegistration {
        slot: slot(n),
        name: name.to_string(),
        status,
        location: location.to_string(),
        date_to_incubator: "2025-05-01T12:00:00".to_string(),
        well_plate_type: WellPlateType::Wells96,
    }
}

/// Drains every event currently buffered on `rx`.
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<crate::WorkflowEvent>,
) -> Vec<crate::WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
