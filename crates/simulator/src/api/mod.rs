//! Maps `{service_id}/{function}` calls with keyword-argument bodies onto
//! the simulated devices.

use std::{collections::HashMap, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    domain::{MicroscopeId, SampleRegistration, StagePosition},
    error::{ApiError, ErrorCode},
    protocol::{
        ExposureArgs, IlluminationArgs, IncubatorFunction, MicroscopeArgs, MicroscopeFunction,
        NavigateToWellArgs, RoboticArmFunction, SlotArgs, SlotQueryArgs,
    },
};
use tracing::debug;

use crate::lab::Lab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Incubator,
    RoboticArm,
    Microscope(MicroscopeId),
}

#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    services: HashMap<String, ServiceKind>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, service_id: impl Into<String>, kind: ServiceKind) -> Self {
        self.services.insert(service_id.into(), kind);
        self
    }

    pub fn resolve(&self, service_id: &str) -> Result<ServiceKind, ApiError> {
        self.services.get(service_id).copied().ok_or_else(|| {
            ApiError::new(
                ErrorCode::NotFound,
                format!("service '{service_id}' is not registered"),
            )
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = (&str, ServiceKind)> {
        self.services.iter().map(|(id, kind)| (id.as_str(), *kind))
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub lab: Arc<Lab>,
    pub directory: ServiceDirectory,
}

pub async fn call_function(
    ctx: &ApiContext,
    service_id: &str,
    function: &str,
    args: Value,
) -> Result<Value, ApiError> {
    let kind = ctx.directory.resolve(service_id)?;
    debug!(service_id, function, ?kind, "dispatching service call");
    match kind {
        ServiceKind::Incubator => incubator(&ctx.lab, function.parse()?, args).await,
        ServiceKind::RoboticArm => robotic_arm(&ctx.lab, function.parse()?, args).await,
        ServiceKind::Microscope(id) => microscope(&ctx.lab, id, function.parse()?, args).await,
    }
}

async fn incubator(
    lab: &Lab,
    function: IncubatorFunction,
    args: Value,
) -> Result<Value, ApiError> {
    match function {
        IncubatorFunction::GetTemperature => Ok(json!(lab.environment().temperature_c)),
        IncubatorFunction::GetCo2Level => Ok(json!(lab.environment().co2_percent)),
        IncubatorFunction::GetSlotInformation => {
            let query: SlotQueryArgs = kwargs(args)?;
            match query.slot {
                Some(slot) => to_value(lab.slot(slot).await?),
                None => to_value(lab.slots().await?),
            }
        }
        IncubatorFunction::AddSample => {
            let registration: SampleRegistration = kwargs(args)?;
            lab.add_sample(&registration).await?;
            Ok(Value::Null)
        }
        IncubatorFunction::RemoveSample => {
            let SlotArgs { slot } = kwargs(args)?;
            lab.remove_sample(slot).await?;
            Ok(Value::Null)
        }
        IncubatorFunction::PutSampleFromTransferStationToSlot => {
            let SlotArgs { slot } = kwargs(args)?;
            lab.put_from_transfer_station(slot).await?;
            Ok(Value::Null)
        }
        IncubatorFunction::GetSampleFromSlotToTransferStation => {
            let SlotArgs { slot } = kwargs(args)?;
            lab.get_to_transfer_station(slot).await?;
            Ok(Value::Null)
        }
    }
}

async fn robotic_arm(
    lab: &Lab,
    function: RoboticArmFunction,
    args: Value,
) -> Result<Value, ApiError> {
    match function {
        RoboticArmFunction::Connect => lab.connect_arm().await,
        RoboticArmFunction::Disconnect => lab.disconnect_arm().await,
        RoboticArmFunction::LightOn => lab.set_arm_light(true).await?,
        RoboticArmFunction::LightOff => lab.set_arm_light(false).await?,
        RoboticArmFunction::MicroscopeToIncubator => {
            let MicroscopeArgs { microscope_id } = kwargs(args)?;
            lab.microscope_to_incubator(microscope_id).await?;
        }
        RoboticArmFunction::IncubatorToMicroscope => {
            let MicroscopeArgs { microscope_id } = kwargs(args)?;
            lab.incubator_to_microscope(microscope_id).await?;
        }
    }
    let arm = lab.arm().await;
    debug!(?arm, function = function.as_str(), "arm call completed");
    Ok(Value::Null)
}

async fn microscope(
    lab: &Lab,
    id: MicroscopeId,
    function: MicroscopeFunction,
    args: Value,
) -> Result<Value, ApiError> {
    match function {
        MicroscopeFunction::GetStatus => {
            let state = lab.microscope(id).await?;
            let mut status = to_value(state)?;
            if let Value::Object(fields) = &mut status {
                fields.insert("microscope_id".to_string(), json!(id.get()));
                fields.insert("is_busy".to_string(), json!(false));
            }
            return Ok(status);
        }
        MicroscopeFunction::HomeStage => lab.home_stage(id).await?,
        MicroscopeFunction::ReturnStage => lab.return_stage(id).await?,
        MicroscopeFunction::MoveByDistance => {
            let delta: StagePosition = kwargs(args)?;
            lab.move_by(id, delta).await?;
        }
        MicroscopeFunction::MoveToPosition => {
            let target: StagePosition = kwargs(args)?;
            lab.move_to(id, target).await?;
        }
        MicroscopeFunction::Snap => return Ok(json!(lab.snap(id).await?)),
        MicroscopeFunction::AutoFocus => lab.auto_focus(id).await?,
        MicroscopeFunction::SetIllumination => {
            let IlluminationArgs { channel, intensity } = kwargs(args)?;
            lab.set_illumination(id, channel, intensity).await?;
        }
        MicroscopeFunction::SetCameraExposure => {
            let ExposureArgs {
                channel,
                exposure_time,
            } = kwargs(args)?;
            lab.set_camera_exposure(id, channel, exposure_time).await?;
        }
        MicroscopeFunction::NavigateToWell => {
            let NavigateToWellArgs {
                row,
                col,
                wellplate_type,
            } = kwargs(args)?;
            let position = lab.navigate_to_well(id, &row, col, wellplate_type).await?;
            return to_value(position);
        }
    }
    Ok(Value::Null)
}

/// Decodes a keyword-argument object; a missing body counts as no arguments.
fn kwargs<T: DeserializeOwned>(args: Value) -> Result<T, ApiError> {
    let args = match args {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(args).map_err(|error| {
        ApiError::new(
            ErrorCode::Validation,
            format!("invalid arguments: {error}"),
        )
    })
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|error| ApiError::new(ErrorCode::Internal, error.to_string()))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
