use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use client_core::SampleForm;
use shared::domain::{MicroscopeId, SampleStatus, SlotNumber, WellPlateType};

#[derive(Parser, Debug)]
#[command(name = "console", about = "Operate the incubator, robotic arm and microscopes")]
pub struct Cli {
    /// Settings file; defaults to `console.toml` when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub server_url: Option<String>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Refresh and print the slot listing.
    Slots {
        /// Include empty slots.
        #[arg(long)]
        all: bool,
    },
    /// Keep refreshing the slot listing until interrupted.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Register a sample; source statuses move it into the slot first.
    Add(SampleArgs),
    Remove {
        #[arg(long, value_parser = parse_slot)]
        slot: SlotNumber,
    },
    /// Replace the record of an occupied slot.
    Edit(SampleArgs),
    /// Move a sample from a microscope back to its slot.
    Unload {
        #[arg(long, value_parser = parse_microscope)]
        microscope: MicroscopeId,
    },
    /// Move a sample from its slot onto a microscope.
    Load {
        #[arg(long, value_parser = parse_slot)]
        slot: SlotNumber,
        #[arg(long, value_parser = parse_microscope)]
        microscope: MicroscopeId,
    },
    /// Show which registered sample, if any, sits on a microscope.
    Conflict {
        #[arg(long, value_parser = parse_microscope)]
        microscope: MicroscopeId,
    },
    Environment,
    MicroscopeStatus {
        #[arg(long, value_parser = parse_microscope)]
        microscope: MicroscopeId,
    },
}

#[derive(Args, Debug, PartialEq)]
pub struct SampleArgs {
    #[arg(long, value_parser = parse_slot)]
    pub slot: SlotNumber,
    #[arg(long)]
    pub name: String,
    /// IN, OUT, "Not Available", TransferStationSource, Microscope1Source or Microscope2Source.
    #[arg(long)]
    pub status: SampleStatus,
    /// 96, 384, 24 or 48.
    #[arg(long = "plate")]
    pub well_plate_type: WellPlateType,
    #[arg(long)]
    pub location: Option<String>,
    /// Defaults to now, formatted `YYYY-MM-DDTHH:MM:SS`.
    #[arg(long)]
    pub date: Option<String>,
}

impl SampleArgs {
    pub fn form(&self) -> SampleForm {
        SampleForm {
            location: self.location.clone(),
            date_to_incubator: self.date.clone(),
            ..SampleForm::new(self.name.clone(), self.status, self.well_plate_type)
        }
    }
}

pub fn parse_slot(raw: &str) -> Result<SlotNumber, String> {
    let value: u8 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a slot number"))?;
    SlotNumber::new(value).map_err(|e| e.to_string())
}

pub fn parse_microscope(raw: &str) -> Result<MicroscopeId, String> {
    let value: u8 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a microscope number"))?;
    MicroscopeId::new(value).map_err(|e| e.to_string())
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
