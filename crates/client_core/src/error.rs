use shared::{
    domain::{MicroscopeId, Slot, SlotNumber},
    error::DomainError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{service} service is not connected")]
    ServiceUnavailable { service: String },
    #[error("{field} is required")]
    Validation { field: &'static str },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("microscope {microscope} already holds sample '{sample_name}' registered to slot {slot}")]
    Conflict {
        microscope: MicroscopeId,
        sample_name: String,
        slot: SlotNumber,
    },
    #[error("slot {slot} already holds sample '{sample_name}'")]
    SlotOccupied {
        slot: SlotNumber,
        sample_name: String,
    },
    #[error("operation '{current}' is still in progress")]
    Busy { current: String },
    #[error("failed to {operation}: {source}")]
    RemoteCall {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(
        "slot {slot} was emptied but the updated sample could not be registered: {source}"
    )]
    EditIncomplete {
        slot: SlotNumber,
        removed: Box<Slot>,
        #[source]
        source: Box<ConsoleError>,
    },
}

impl ConsoleError {
    pub fn unavailable(service: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::RemoteCall {
            operation: operation.into(),
            source,
        }
    }

    /// Errors raised before any remote side effect happened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. }
                | Self::Validation { .. }
                | Self::Domain(_)
                | Self::InvalidRequest(_)
                | Self::Conflict { .. }
                | Self::SlotOccupied { .. }
                | Self::Busy { .. }
        )
    }
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
