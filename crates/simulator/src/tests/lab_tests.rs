use shared::domain::SampleStatus;
use storage::Storage;

use super::*;

async fn lab() -> Lab {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    Lab::open(Arc::new(storage), Environment::default())
        .await
        .expect("lab")
}

fn slot(n: u8) -> SlotNumber {
    SlotNumber::new(n).expect("slot")
}

fn resident(n: u8, name: &str) -> SampleRegistration {
    SampleRegistration {
        slot: slot(n),
        name: name.to_string(),
        status: SampleStatus::In,
        location: INCUBATOR_LOCATION.to_string(),
        date_to_incubator: "2025-05-01T12:00:00".to_string(),
        well_plate_type: WellPlateType::Wells96,
    }
}

#[tokio::test]
async fn rack_is_seeded_from_stored_records() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.upsert_sample(&resident(4, "S1")).await.expect("seed");
    let lab = Lab::open(Arc::new(storage), Environment::default())
        .await
        .expect("lab");

    lab.get_to_transfer_station(slot(4)).await.expect("plate present");
    let err = lab
        .get_to_transfer_station(slot(5))
        .await
        .expect_err("station busy");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn arm_motion_requires_connection_and_homed_stage() {
    let lab = lab().await;

    let err = lab
        .microscope_to_incubator(MicroscopeId::ONE)
        .await
        .expect_err("not connected");
    assert_eq!(err.code, ErrorCode::Unavailable);

    lab.connect_arm().await;
    let err = lab
        .microscope_to_incubator(MicroscopeId::ONE)
        .await
        .expect_err("not homed");
    assert_eq!(err.code, ErrorCode::Conflict);

    lab.home_stage(MicroscopeId::ONE).await.expect("home");
    lab.microscope_to_incubator(MicroscopeId::ONE)
        .await
        .expect("to station");
    lab.put_from_transfer_station(slot(9)).await.expect("into slot");

    let err = lab
        .put_from_transfer_station(slot(9))
        .await
        .expect_err("bay already filled");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn plate_travels_slot_to_microscope_and_back() {
    let lab = lab().await;
    lab.add_sample(&resident(12, "S2")).await.expect("add");
    lab.connect_arm().await;
    lab.home_stage(MicroscopeId::TWO).await.expect("home");

    lab.get_to_transfer_station(slot(12)).await.expect("out of slot");
    lab.incubator_to_microscope(MicroscopeId::TWO)
        .await
        .expect("onto stage");
    assert!(lab.microscope(MicroscopeId::TWO).await.expect("state").holds_sample);

    let err = lab
        .incubator_to_microscope(MicroscopeId::TWO)
        .await
        .expect_err("station empty");
    assert_eq!(err.code, ErrorCode::Conflict);

    lab.microscope_to_incubator(MicroscopeId::TWO)
        .await
        .expect("back to station");
    lab.put_from_transfer_station(slot(12)).await.expect("back in slot");
    assert!(!lab.microscope(MicroscopeId::TWO).await.expect("state").holds_sample);
}

#[tokio::test]
async fn disconnect_turns_light_off() {
    let lab = lab().await;
    assert!(lab.set_arm_light(true).await.is_err());

    lab.connect_arm().await;
    lab.set_arm_light(true).await.expect("light");
    assert_eq!(
        lab.arm().await,
        ArmState {
            connected: true,
            light_on: true
        }
    );

    lab.disconnect_arm().await;
    assert_eq!(lab.arm().await, ArmState::default());
}

#[tokio::test]
async fn return_stage_restores_position_before_homing() {
    let lab = lab().await;
    let target = StagePosition {
        x: 30.0,
        y: 20.0,
        z: 1.0,
    };
    lab.move_to(MicroscopeId::ONE, target).await.expect("move");
    lab.home_stage(MicroscopeId::ONE).await.expect("home");
    assert_eq!(
        lab.microscope(MicroscopeId::ONE).await.expect("state").position,
        StagePosition::default()
    );

    lab.return_stage(MicroscopeId::ONE).await.expect("return");
    let state = lab.microscope(MicroscopeId::ONE).await.expect("state");
    assert_eq!(state.position, target);
    assert!(!state.homed);
}

#[tokio::test]
async fn stage_refuses_targets_outside_travel() {
    let lab = lab().await;
    let err = lab
        .move_by(
            MicroscopeId::ONE,
            StagePosition {
                x: -1.0,
                y: 0.0,
                z: 0.0,
            },
        )
        .await
        .expect_err("negative x");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[test]
fn well_positions_follow_plate_pitch() {
    let a1 = well_position("A", 1, WellPlateType::Wells96).expect("A1");
    let b3 = well_position("b", 3, WellPlateType::Wells96).expect("B3");
    assert!((b3.x - a1.x - 18.0).abs() < 1e-9);
    assert!((b3.y - a1.y - 9.0).abs() < 1e-9);

    assert!(well_position("I", 1, WellPlateType::Wells96).is_err());
    assert!(well_position("A", 13, WellPlateType::Wells96).is_err());
    assert!(well_position("AA", 1, WellPlateType::Wells384).is_err());
    assert!(well_position("P", 24, WellPlateType::Wells384).is_ok());
}

#[tokio::test]
async fn imaging_settings_are_validated_and_kept() {
    let lab = lab().await;
    lab.set_illumination(MicroscopeId::ONE, 11, 45.0)
        .await
        .expect("illumination");
    lab.set_camera_exposure(MicroscopeId::ONE, 11, 80.0)
        .await
        .expect("exposure");
    assert!(lab.set_illumination(MicroscopeId::ONE, 11, 140.0).await.is_err());
    assert!(lab.set_camera_exposure(MicroscopeId::ONE, 11, 0.0).await.is_err());

    let frame = lab.snap(MicroscopeId::ONE).await.expect("snap");
    assert_eq!(frame, "simulated://microscope1/frame-00001.png");

    let state = lab.microscope(MicroscopeId::ONE).await.expect("state");
    assert_eq!(state.illumination.get(&11), Some(&45.0));
    assert_eq!(state.exposure_ms.get(&11), Some(&80.0));
    assert_eq!(state.frames_captured, 1);
}
