use shared::domain::{SampleRegistration, SampleStatus, SlotNumber, WellPlateType};
use storage::{SlotStore, Storage};

#[tokio::test]
async fn slots_survive_reopening_the_database_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("incubator.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let registration = SampleRegistration {
        slot: SlotNumber::new(30).expect("slot"),
        name: "organoid-plate".to_string(),
        status: SampleStatus::Out,
        location: "microscope2".to_string(),
        date_to_incubator: "2025-04-02T08:00:00".to_string(),
        well_plate_type: WellPlateType::Wells384,
    };

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage.upsert_sample(&registration).await.expect("upsert");
        storage.pool().close().await;
    }

    assert!(db_path.exists(), "database file should exist: {}", db_path.display());

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let slot = reopened.get_slot(registration.slot).await.expect("get");
    assert_eq!(slot, registration.into_slot());
}
