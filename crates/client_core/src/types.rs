use chrono::{DateTime, Utc};
use shared::domain::{
    SampleRegistration, SampleStatus, SlotNumber, WellPlateType, INCUBATOR_LOCATION,
};

use crate::error::{ConsoleError, ConsoleResult};

pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_incubator_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleForm {
    pub name: String,
    pub status: Option<SampleStatus>,
    pub well_plate_type: Option<WellPlateType>,
    pub location: Option<String>,
    pub date_to_incubator: Option<String>,
}

impl SampleForm {
    pub fn new(
        name: impl Into<String>,
        status: SampleStatus,
        well_plate_type: WellPlateType,
    ) -> Self {
        Self {
            name: name.into(),
            status: Some(status),
            well_plate_type: Some(well_plate_type),
            location: None,
            date_to_incubator: None,
        }
    }

    pub fn validate(&self, slot: SlotNumber) -> ConsoleResult<SampleRegistration> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConsoleError::Validation { field: "name" });
        }
        let status = self
            .status
            .ok_or(ConsoleError::Validation { field: "status" })?;
        let well_plate_type = self
            .well_plate_type
            .ok_or(ConsoleError::Validation {
                field: "well_plate_type",
            })?;

        Ok(SampleRegistration {
            slot,
            name: name.to_string(),
            status,
            location: non_blank(self.location.as_deref())
                .unwrap_or(INCUBATOR_LOCATION)
                .to_string(),
            date_to_incubator: non_blank(self.date_to_incubator.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format_incubator_date(Utc::now())),
            well_plate_type,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
