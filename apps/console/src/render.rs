use std::fmt::Write as _;

use client_core::IncubatorEnvironment;
use shared::domain::{MicroscopeId, Slot};

const COLUMNS: [&str; 6] = ["slot", "name", "status", "location", "date", "plate"];

pub fn slot_table(slots: &[Slot], include_empty: bool) -> String {
    let rows: Vec<[String; 6]> = slots
        .iter()
        .filter(|slot| include_empty || slot.is_occupied())
        .map(slot_row)
        .collect();
    if rows.is_empty() {
        return "no registered samples\n".to_string();
    }

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &COLUMNS.map(str::to_string), &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out
}

fn slot_row(slot: &Slot) -> [String; 6] {
    [
        slot.slot_number.to_string(),
        slot.sample_name.clone().unwrap_or_default(),
        slot.status.map(|s| s.to_string()).unwrap_or_default(),
        slot.location.clone().unwrap_or_default(),
        slot.date_to_incubator.clone().unwrap_or_default(),
        slot.well_plate_type.map(|p| p.to_string()).unwrap_or_default(),
    ]
}

fn push_line(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

pub fn slot_summary(slot: &Slot) -> String {
    match &slot.sample_name {
        Some(name) if slot.is_occupied() => format!(
            "slot {}: '{}' {} at {}",
            slot.slot_number,
            name,
            slot.status.map(|s| s.as_str()).unwrap_or("?"),
            slot.location.as_deref().unwrap_or("?"),
        ),
        _ => format!("slot {}: empty", slot.slot_number),
    }
}

pub fn conflict_line(microscope: MicroscopeId, occupant: Option<&Slot>) -> String {
    match occupant {
        Some(slot) => format!(
            "microscope {microscope} holds '{}' registered to slot {}",
            slot.sample_name.as_deref().unwrap_or_default(),
            slot.slot_number
        ),
        None => format!("microscope {microscope} is free"),
    }
}

pub fn environment_line(environment: &IncubatorEnvironment) -> String {
    format!(
        "temperature {:.1} °C, CO2 {:.1} %",
        environment.temperature_c, environment.co2_percent
    )
}

/// Command that registers `removed` again after a failed edit, quoted for
/// POSIX shells.
pub fn restore_hint(removed: &Slot) -> Option<String> {
    let name = removed.sample_name.as_deref().filter(|_| removed.is_occupied())?;
    let mut hint = format!(
        "console add --slot {} --name {}",
        removed.slot_number,
        shell_quote(name)
    );
    if let Some(status) = removed.status {
        let _ = write!(hint, " --status {}", shell_quote(status.as_str()));
    }
    if let Some(plate) = removed.well_plate_type {
        let _ = write!(hint, " --plate {}", shell_quote(plate.as_str()));
    }
    if let Some(location) = &removed.location {
        let _ = write!(hint, " --location {}", shell_quote(location));
    }
    if let Some(date) = &removed.date_to_incubator {
        let _ = write!(hint, " --date {}", shell_quote(date));
    }
    Some(hint)
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
