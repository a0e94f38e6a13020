use std::{fmt, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

pub const INCUBATOR_SLOT_COUNT: u8 = 42;
pub const INCUBATOR_LOCATION: &str = "incubator_slot";

/// One addressable bay of the incubator rack, always within `1..=42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotNumber(u8);

impl SlotNumber {
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (1..=INCUBATOR_SLOT_COUNT).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidSlotNumber(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = SlotNumber> {
        (1..=INCUBATOR_SLOT_COUNT).map(SlotNumber)
    }
}

impl TryFrom<u8> for SlotNumber {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotNumber> for u8 {
    fn from(value: SlotNumber) -> Self {
        value.0
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MicroscopeId(u8);

impl MicroscopeId {
    pub const ONE: MicroscopeId = MicroscopeId(1);
    pub const TWO: MicroscopeId = MicroscopeId(2);

    pub fn new(value: u8) -> Result<Self, DomainError> {
        match value {
            1 | 2 => Ok(Self(value)),
            other => Err(DomainError::InvalidMicroscope(other)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn location(self) -> String {
        format!("microscope{}", self.0)
    }

    pub fn source_status(self) -> SampleStatus {
        match self.0 {
            1 => SampleStatus::Microscope1Source,
            _ => SampleStatus::Microscope2Source,
        }
    }
}

impl TryFrom<u8> for MicroscopeId {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MicroscopeId> for u8 {
    fn from(value: MicroscopeId) -> Self {
        value.0
    }
}

impl fmt::Display for MicroscopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleStatus {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "Not Available", alias = "NotAvailable")]
    NotAvailable,
    TransferStationSource,
    Microscope1Source,
    Microscope2Source,
}

impl SampleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::NotAvailable => "Not Available",
            Self::TransferStationSource => "TransferStationSource",
            Self::Microscope1Source => "Microscope1Source",
            Self::Microscope2Source => "Microscope2Source",
        }
    }

    pub fn source_microscope(self) -> Option<MicroscopeId> {
        match self {
            Self::Microscope1Source => Some(MicroscopeId::ONE),
            Self::Microscope2Source => Some(MicroscopeId::TWO),
            _ => None,
        }
    }

    pub fn is_transfer_source(self) -> bool {
        matches!(
            self,
            Self::TransferStationSource | Self::Microscope1Source | Self::Microscope2Source
        )
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "Not Available" | "NotAvailable" => Ok(Self::NotAvailable),
            "TransferStationSource" => Ok(Self::TransferStationSource),
            "Microscope1Source" => Ok(Self::Microscope1Source),
            "Microscope2Source" => Ok(Self::Microscope2Source),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WellPlateRepr", into = "String")]
pub enum WellPlateType {
    Wells96,
    Wells384,
    Wells24,
    Wells48,
}

impl WellPlateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wells96 => "96",
            Self::Wells384 => "384",
            Self::Wells24 => "24",
            Self::Wells48 => "48",
        }
    }

    pub fn dimensions(self) -> (u8, u8) {
        match self {
            Self::Wells96 => (8, 12),
            Self::Wells384 => (16, 24),
            Self::Wells24 => (4, 6),
            Self::Wells48 => (6, 8),
        }
    }
}

impl fmt::Display for WellPlateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellPlateType {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "96" => Ok(Self::Wells96),
            "384" => Ok(Self::Wells384),
            "24" => Ok(Self::Wells24),
            "48" => Ok(Self::Wells48),
            other => Err(DomainError::UnknownWellPlateType(other.to_string())),
        }
    }
}

impl From<WellPlateType> for String {
    fn from(value: WellPlateType) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WellPlateRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<WellPlateRepr> for WellPlateType {
    type Error = DomainError;

    fn try_from(value: WellPlateRepr) -> Result<Self, Self::Error> {
        match value {
            WellPlateRepr::Number(n) => n.to_string().parse(),
            WellPlateRepr::Text(raw) => raw.parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "incubator_slot")]
    pub slot_number: SlotNumber,
    #[serde(
        rename = "name",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub sample_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<SampleStatus>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_to_incubator: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub well_plate_type: Option<WellPlateType>,
}

impl Slot {
    pub fn empty(slot_number: SlotNumber) -> Self {
        Self {
            slot_number,
            sample_name: None,
            status: None,
            location: None,
            date_to_incubator: None,
            well_plate_type: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.sample_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    pub fn is_on_microscope(&self, microscope: MicroscopeId) -> bool {
        self.location.as_deref() == Some(microscope.location().as_str())
    }
}

/// Incubator services report unoccupied fields as `""` or `null`; both map to `None`.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(value) => T::deserialize(value).map(Some).map_err(D::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRegistration {
    pub slot: SlotNumber,
    pub name: String,
    pub status: SampleStatus,
    pub location: String,
    pub date_to_incubator: String,
    pub well_plate_type: WellPlateType,
}

impl SampleRegistration {
    pub fn into_slot(self) -> Slot {
        Slot {
            slot_number: self.slot,
            sample_name: Some(self.name),
            status: Some(self.status),
            location: Some(self.location),
            date_to_incubator: Some(self.date_to_incubator),
            well_plate_type: Some(self.well_plate_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_number_rejects_out_of_range_values() {
        assert!(SlotNumber::new(0).is_err());
        assert!(SlotNumber::new(43).is_err());
        assert_eq!(SlotNumber::new(42).expect("slot").index(), 41);
        assert_eq!(SlotNumber::all().count(), 42);
    }

    #[test]
    fn microscope_location_matches_wire_convention() {
        assert_eq!(MicroscopeId::ONE.location(), "microscope1");
        assert_eq!(MicroscopeId::TWO.source_status(), SampleStatus::Microscope2Source);
        assert!(MicroscopeId::new(3).is_err());
    }

    #[test]
    fn unoccupied_slot_fields_deserialize_as_none() {
        let slot: Slot = serde_json::from_value(serde_json::json!({
            "incubator_slot": 4,
            "name": "",
            "status": "",
            "location": null,
            "date_to_incubator": "",
            "well_plate_type": ""
        }))
        .expect("slot");
        assert_eq!(slot, Slot::empty(SlotNumber::new(4).expect("slot")));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn well_plate_type_accepts_numbers_and_strings() {
        let slot: Slot = serde_json::from_value(serde_json::json!({
            "incubator_slot": 9,
            "name": "plate-a",
            "status": "Not Available",
            "location": "incubator_slot",
            "date_to_incubator": "2025-01-01T00:00:00",
            "well_plate_type": 384
        }))
        .expect("slot");
        assert_eq!(slot.well_plate_type, Some(WellPlateType::Wells384));
        assert_eq!(slot.status, Some(SampleStatus::NotAvailable));

        let encoded = serde_json::to_value(&slot).expect("encode");
        assert_eq!(encoded["well_plate_type"], "384");
        assert_eq!(encoded["status"], "Not Available");
    }

    #[test]
    fn transfer_source_statuses_are_flagged() {
        assert!(SampleStatus::TransferStationSource.is_transfer_source());
        assert_eq!(
            SampleStatus::Microscope1Source.source_microscope(),
            Some(MicroscopeId::ONE)
        );
        assert!(!SampleStatus::In.is_transfer_source());
        assert_eq!("OUT".parse::<SampleStatus>().expect("status"), SampleStatus::Out);
    }
}
