use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{SampleRegistration, SampleStatus, Slot, SlotNumber, WellPlateType};

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn list_slots(&self) -> Result<Vec<Slot>>;
    async fn get_slot(&self, slot: SlotNumber) -> Result<Slot>;
    async fn upsert_sample(&self, registration: &SampleRegistration) -> Result<()>;
    /// Returns `false` when the slot was already empty.
    async fn clear_slot(&self, slot: SlotNumber) -> Result<bool>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredSlot {
    pub slot: Slot,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Each pooled connection to an in-memory database would see its own empty schema.
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn stored_slot(&self, slot: SlotNumber) -> Result<Option<StoredSlot>> {
        let row = sqlx::query(
            "SELECT slot_number, sample_name, status, location, date_to_incubator, well_plate_type, updated_at
             FROM incubator_slots WHERE slot_number = ?",
        )
        .bind(i64::from(slot.get()))
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load incubator slot {slot}"))?;

        row.map(|row| -> Result<StoredSlot> {
            let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
            Ok(StoredSlot {
                slot: slot_from_row(&row)?,
                updated_at,
            })
        })
        .transpose()
    }

    pub async fn occupied_slot_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incubator_slots")
            .fetch_one(&self.pool)
            .await
            .context("failed to count occupied incubator slots")?;
        Ok(count)
    }
}

#[async_trait]
impl SlotStore for Storage {
    async fn list_slots(&self) -> Result<Vec<Slot>> {
        let rows = sqlx::query(
            "SELECT slot_number, sample_name, status, location, date_to_incubator, well_plate_type
             FROM incubator_slots ORDER BY slot_number",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list incubator slots")?;

        let mut slots: Vec<Slot> = SlotNumber::all().map(Slot::empty).collect();
        for row in rows {
            let slot = slot_from_row(&row)?;
            let index = slot.slot_number.index();
            slots[index] = slot;
        }
        Ok(slots)
    }

    async fn get_slot(&self, slot: SlotNumber) -> Result<Slot> {
        Ok(self
            .stored_slot(slot)
            .await?
            .map(|stored| stored.slot)
            .unwrap_or_else(|| Slot::empty(slot)))
    }

    async fn upsert_sample(&self, registration: &SampleRegistration) -> Result<()> {
        sqlx::query(
            "INSERT INTO incubator_slots
                (slot_number, sample_name, status, location, date_to_incubator, well_plate_type, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(slot_number) DO UPDATE SET
                sample_name = excluded.sample_name,
                status = excluded.status,
                location = excluded.location,
                date_to_incubator = excluded.date_to_incubator,
                well_plate_type = excluded.well_plate_type,
                updated_at = excluded.updated_at",
        )
        .bind(i64::from(registration.slot.get()))
        .bind(&registration.name)
        .bind(registration.status.as_str())
        .bind(&registration.location)
        .bind(&registration.date_to_incubator)
        .bind(registration.well_plate_type.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store sample in slot {}", registration.slot))?;
        Ok(())
    }

    async fn clear_slot(&self, slot: SlotNumber) -> Result<bool> {
        let result = sqlx::query("DELETE FROM incubator_slots WHERE slot_number = ?")
            .bind(i64::from(slot.get()))
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear incubator slot {slot}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn slot_from_row(row: &SqliteRow) -> Result<Slot> {
    let raw_slot: i64 = row.try_get("slot_number")?;
    let slot_number = u8::try_from(raw_slot)
        .map_err(|_| anyhow!("stored slot number {raw_slot} does not fit the rack"))
        .and_then(|value| SlotNumber::new(value).map_err(anyhow::Error::from))?;
    let status: String = row.try_get("status")?;
    let well_plate_type: String = row.try_get("well_plate_type")?;

    Ok(Slot {
        slot_number,
        sample_name: Some(row.try_get("sample_name")?),
        status: Some(SampleStatus::from_str(&status)?),
        location: Some(row.try_get("location")?),
        date_to_incubator: Some(row.try_get("date_to_incubator")?),
        well_plate_type: Some(WellPlateType::from_str(&well_plate_type)?),
    })
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
