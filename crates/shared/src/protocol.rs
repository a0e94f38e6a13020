//! Function names and keyword-argument payloads of the hardware services.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{MicroscopeId, SlotNumber, WellPlateType},
    error::{ApiError, ErrorCode},
};

macro_rules! service_functions {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ApiError::new(
                        ErrorCode::NotFound,
                        format!("unknown function '{other}'"),
                    )),
                }
            }
        }
    };
}

service_functions!(MicroscopeFunction {
    GetStatus => "get_status",
    HomeStage => "home_stage",
    ReturnStage => "return_stage",
    MoveByDistance => "move_by_distance",
    MoveToPosition => "move_to_position",
    Snap => "snap",
    AutoFocus => "auto_focus",
    SetIllumination => "set_illumination",
    SetCameraExposure => "set_camera_exposure",
    NavigateToWell => "navigate_to_well",
});

service_functions!(RoboticArmFunction {
    Connect => "connect",
    Disconnect => "disconnect",
    LightOn => "light_on",
    LightOff => "light_off",
    MicroscopeToIncubator => "microscope_to_incubator",
    IncubatorToMicroscope => "incubator_to_microscope",
});

service_functions!(IncubatorFunction {
    GetTemperature => "get_temperature",
    GetCo2Level => "get_co2_level",
    GetSlotInformation => "get_slot_information",
    AddSample => "add_sample",
    RemoveSample => "remove_sample",
    PutSampleFromTransferStationToSlot => "put_sample_from_transfer_station_to_slot",
    GetSampleFromSlotToTransferStation => "get_sample_from_slot_to_transfer_station",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotArgs {
    pub slot: SlotNumber,
}

/// `get_slot_information` without a slot lists the whole rack in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotQueryArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroscopeArgs {
    pub microscope_id: MicroscopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IlluminationArgs {
    pub channel: u32,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureArgs {
    pub channel: u32,
    pub exposure_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateToWellArgs {
    pub row: String,
    pub col: u32,
    pub wellplate_type: WellPlateType,
}
