//! Client-side mirror of the incubator rack.
//!
//! The incubator service is the source of truth. The cache is rebuilt from a
//! full listing on every poll and after every successful mutation, never
//! patched in place.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::domain::{
    MicroscopeId, SampleRegistration, SampleStatus, Slot, SlotNumber, INCUBATOR_LOCATION,
    INCUBATOR_SLOT_COUNT,
};
use tokio::{sync::RwLock, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    error::{ConsoleError, ConsoleResult},
    events::{ProgressPublisher, WorkflowEvent},
    operation::OperationToken,
    services::ServiceHandles,
    types::{format_incubator_date, SampleForm},
    workflow::{find_microscope_occupant, TransferWorkflow},
};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCache {
    slots: Vec<Slot>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl SlotCache {
    pub fn empty() -> Self {
        Self {
            slots: SlotNumber::all().map(Slot::empty).collect(),
            refreshed_at: None,
        }
    }

    pub fn from_listing(listing: Vec<Slot>, refreshed_at: DateTime<Utc>) -> Self {
        let mut cache = Self::empty();
        for slot in listing {
            let index = slot.slot_number.index();
            cache.slots[index] = slot;
        }
        cache.refreshed_at = Some(refreshed_at);
        cache
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, slot: SlotNumber) -> &Slot {
        &self.slots[slot.index()]
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn occupied(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.is_occupied())
    }

    pub fn occupant_of(&self, microscope: MicroscopeId) -> Option<&Slot> {
        find_microscope_occupant(&self.slots, microscope)
    }
}

pub struct SlotRegistry {
    services: ServiceHandles,
    workflow: Arc<TransferWorkflow>,
    events: ProgressPublisher,
    cache: RwLock<SlotCache>,
}

impl SlotRegistry {
    pub fn new(
        services: ServiceHandles,
        workflow: Arc<TransferWorkflow>,
        events: ProgressPublisher,
    ) -> Self {
        Self {
            services,
            workflow,
            events,
            cache: RwLock::new(SlotCache::empty()),
        }
    }

    pub async fn snapshot(&self) -> SlotCache {
        self.cache.read().await.clone()
    }

    pub async fn cached_slot(&self, slot: SlotNumber) -> Slot {
        self.cache.read().await.get(slot).clone()
    }

    pub async fn refresh(&self) -> ConsoleResult<SlotCache> {
        let incubator = self.services.incubator()?;
        match incubator.list_slots().await {
            Ok(listing) => {
                let now = Utc::now();
                let cache = SlotCache::from_listing(listing, now);
                let occupied = cache.occupied().count();
                *self.cache.write().await = cache.clone();
                debug!(occupied, "slot cache refreshed");
                self.events
                    .publish(WorkflowEvent::RegistryRefreshed { at: now, occupied });
                Ok(cache)
            }
            Err(error) => {
                warn!(%error, "slot listing refresh failed; keeping previous cache");
                self.events.publish(WorkflowEvent::RegistryRefreshFailed {
                    at: Utc::now(),
                    message: error.to_string(),
                });
                Err(ConsoleError::remote("refresh incubator slot listing", error))
            }
        }
    }

    /// Registers a sample. Transfer-source statuses first move the sample
    /// physically, then register it as resident in the incubator.
    pub async fn add_sample(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
        form: &SampleForm,
    ) -> ConsoleResult<Slot> {
        let mut registration = form.validate(slot)?;

        if let Some(microscope) = registration.status.source_microscope() {
            if let Some(occupant) = self.workflow.check_microscope_conflict(microscope).await? {
                return Err(conflict(microscope, &occupant));
            }
            self.ensure_slot_free(slot).await?;
            self.workflow
                .transfer_from_microscope_to_slot(token, microscope, slot)
                .await?;
            registration = resident(registration);
        } else if registration.status == SampleStatus::TransferStationSource {
            self.ensure_slot_free(slot).await?;
            self.workflow
                .transfer_from_station_to_slot(token, slot)
                .await?;
            registration = resident(registration);
        }

        self.register(&registration).await?;
        self.refresh_after_mutation().await;
        Ok(registration.into_slot())
    }

    pub async fn remove_sample(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
    ) -> ConsoleResult<()> {
        self.unregister(token, slot).await?;
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Edits a slot as remove-then-add. The pair is not atomic: when the add
    /// fails the slot stays empty and the removed record is returned inside
    /// [`ConsoleError::EditIncomplete`].
    pub async fn edit_sample(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
        form: &SampleForm,
    ) -> ConsoleResult<Slot> {
        form.validate(slot)?;
        let previous = self.fetch_slot(slot).await?;

        self.unregister(token, slot).await?;
        match self.add_sample(token, slot, form).await {
            Ok(updated) => Ok(updated),
            Err(source) => Err(self.edit_incomplete(slot, previous, source).await),
        }
    }

    pub async fn load_sample_onto_microscope(
        &self,
        token: &OperationToken,
        slot: SlotNumber,
        microscope: MicroscopeId,
    ) -> ConsoleResult<Slot> {
        let current = self.fetch_slot(slot).await?;
        let (name, well_plate_type) = match (&current.sample_name, current.well_plate_type) {
            (Some(name), Some(plate)) if current.is_occupied() => (name.clone(), plate),
            _ => {
                return Err(ConsoleError::InvalidRequest(format!(
                    "slot {slot} holds no registered sample"
                )))
            }
        };
        if let Some(location) = current.location.as_deref() {
            if location != INCUBATOR_LOCATION {
                return Err(ConsoleError::InvalidRequest(format!(
                    "sample '{name}' from slot {slot} is already at {location}"
                )));
            }
        }
        if let Some(occupant) = self.workflow.check_microscope_conflict(microscope).await? {
            return Err(conflict(microscope, &occupant));
        }

        self.workflow
            .transfer_from_slot_to_microscope(token, slot, microscope)
            .await?;

        let registration = SampleRegistration {
            slot,
            name,
            status: SampleStatus::Out,
            location: microscope.location(),
            date_to_incubator: current
                .date_to_incubator
                .clone()
                .unwrap_or_else(|| format_incubator_date(Utc::now())),
            well_plate_type,
        };
        self.replace_registration(token, current, registration).await
    }

    pub async fn return_sample_from_microscope(
        &self,
        token: &OperationToken,
        microscope: MicroscopeId,
    ) -> ConsoleResult<Slot> {
        let occupant = self
            .workflow
            .check_microscope_conflict(microscope)
            .await?
            .ok_or_else(|| {
                ConsoleError::InvalidRequest(format!(
                    "no sample is registered on microscope {microscope}"
                ))
            })?;
        let slot = occupant.slot_number;
        let (name, well_plate_type) = match (&occupant.sample_name, occupant.well_plate_type) {
            (Some(name), Some(plate)) => (name.clone(), plate),
            _ => {
                return Err(ConsoleError::InvalidRequest(format!(
                    "slot {slot} record for microscope {microscope} is incomplete"
                )))
            }
        };

        self.workflow
            .transfer_from_microscope_to_slot(token, microscope, slot)
            .await?;

        let registration = SampleRegistration {
            slot,
            name,
            status: SampleStatus::In,
            location: INCUBATOR_LOCATION.to_string(),
            date_to_incubator: format_incubator_date(Utc::now()),
            well_plate_type,
        };
        self.replace_registration(token, occupant, registration).await
    }

    async fn replace_registration(
        &self,
        token: &OperationToken,
        previous: Slot,
        registration: SampleRegistration,
    ) -> ConsoleResult<Slot> {
        let slot = registration.slot;
        self.unregister(token, slot).await?;
        if let Err(source) = self.register(&registration).await {
            return Err(self.edit_incomplete(slot, previous, source).await);
        }
        self.refresh_after_mutation().await;
        Ok(registration.into_slot())
    }

    async fn edit_incomplete(
        &self,
        slot: SlotNumber,
        previous: Slot,
        source: ConsoleError,
    ) -> ConsoleError {
        warn!(
            slot = slot.get(),
            sample = previous.sample_name.as_deref().unwrap_or_default(),
            error = %source,
            "slot left empty after re-registration failed"
        );
        let err = ConsoleError::EditIncomplete {
            slot,
            removed: Box::new(previous),
            source: Box::new(source),
        };
        self.events.failure(err.to_string());
        self.refresh_after_mutation().await;
        err
    }

    async fn fetch_slot(&self, slot: SlotNumber) -> ConsoleResult<Slot> {
        self.services
            .incubator()?
            .get_slot_information(slot)
            .await
            .map_err(|error| ConsoleError::remote(format!("read incubator slot {slot}"), error))
    }

    async fn ensure_slot_free(&self, slot: SlotNumber) -> ConsoleResult<()> {
        let current = self.fetch_slot(slot).await?;
        if current.is_occupied() {
            return Err(ConsoleError::SlotOccupied {
                slot,
                sample_name: current.sample_name.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn register(&self, registration: &SampleRegistration) -> ConsoleResult<()> {
        let incubator = self.services.incubator()?;
        let slot = registration.slot;
        incubator.add_sample(registration).await.map_err(|error| {
            let err = ConsoleError::remote(format!("register sample in slot {slot}"), error);
            self.events.failure(err.to_string());
            err
        })?;
        info!(
            slot = slot.get(),
            sample = %registration.name,
            status = %registration.status,
            location = %registration.location,
            "sample registered"
        );
        self.events.progress(format!(
            "Sample '{}' registered in slot {slot} ({}, {}).",
            registration.name, registration.status, registration.location
        ));
        Ok(())
    }

    async fn unregister(&self, token: &OperationToken, slot: SlotNumber) -> ConsoleResult<()> {
        let incubator = self.services.incubator()?;
        incubator.remove_sample(slot).await.map_err(|error| {
            let err = ConsoleError::remote(format!("remove sample from slot {slot}"), error);
            self.events.failure(err.to_string());
            err
        })?;
        info!(operation = token.name(), slot = slot.get(), "slot vacated");
        self.events.progress(format!("Slot {slot} vacated."));
        Ok(())
    }

    async fn refresh_after_mutation(&self) {
        if let Err(error) = self.refresh().await {
            warn!(%error, "slot cache refresh after mutation failed");
        }
    }
}

fn resident(registration: SampleRegistration) -> SampleRegistration {
    SampleRegistration {
        status: SampleStatus::In,
        location: INCUBATOR_LOCATION.to_string(),
        ..registration
    }
}

fn conflict(microscope: MicroscopeId, occupant: &Slot) -> ConsoleError {
    ConsoleError::Conflict {
        microscope,
        sample_name: occupant.sample_name.clone().unwrap_or_default(),
        slot: occupant.slot_number,
    }
}

/// Background poller; aborted when dropped.
pub struct RefreshLoop {
    task: JoinHandle<()>,
}

impl RefreshLoop {
    pub fn spawn(registry: Arc<SlotRegistry>, every: Duration) -> Self {
        let every = every.max(MIN_REFRESH_INTERVAL);
        info!(
            interval_ms = every.as_millis() as u64,
            slots = INCUBATOR_SLOT_COUNT,
            "starting slot refresh loop"
        );
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // failures are already logged and published by refresh()
                let _ = registry.refresh().await;
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
