use serde_json::json;
use shared::domain::{Slot, SlotNumber};
use storage::Storage;

use super::*;
use crate::lab::Environment;

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let lab = Lab::open(Arc::new(storage), Environment::default())
        .await
        .expect("lab");
    ApiContext {
        lab: Arc::new(lab),
        directory: ServiceDirectory::new()
            .register("incubator-control", ServiceKind::Incubator)
            .register("robotic-arm-control", ServiceKind::RoboticArm)
            .register(
                "microscope-control-squid-1",
                ServiceKind::Microscope(MicroscopeId::ONE),
            ),
    }
}

async fn call(ctx: &ApiContext, service: &str, function: &str, args: Value) -> Value {
    call_function(ctx, service, function, args)
        .await
        .unwrap_or_else(|err| panic!("{service}.{function} failed: {}", err.message))
}

#[tokio::test]
async fn unknown_service_and_function_are_not_found() {
    let ctx = setup().await;
    let err = call_function(&ctx, "centrifuge", "spin", json!({}))
        .await
        .expect_err("no such service");
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = call_function(&ctx, "incubator-control", "open_door", json!({}))
        .await
        .expect_err("no such function");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn environment_readings_use_configured_values() {
    let ctx = setup().await;
    assert_eq!(call(&ctx, "incubator-control", "get_temperature", Value::Null).await, json!(37.0));
    assert_eq!(call(&ctx, "incubator-control", "get_co2_level", json!({})).await, json!(5.0));
}

#[tokio::test]
async fn slot_information_lists_rack_without_slot_argument() {
    let ctx = setup().await;
    call(
        &ctx,
        "incubator-control",
        "add_sample",
        json!({
            "slot": 5,
            "name": "S1",
            "status": "IN",
            "location": "incubator_slot",
            "date_to_incubator": "2025-05-01T12:00:00",
            "well_plate_type": "96"
        }),
    )
    .await;

    let listing: Vec<Slot> = serde_json::from_value(
        call(&ctx, "incubator-control", "get_slot_information", json!({})).await,
    )
    .expect("listing");
    assert_eq!(listing.len(), 42);
    assert_eq!(listing[4].sample_name.as_deref(), Some("S1"));

    let single: Slot = serde_json::from_value(
        call(&ctx, "incubator-control", "get_slot_information", json!({ "slot": 5 })).await,
    )
    .expect("slot");
    assert_eq!(single.slot_number, SlotNumber::new(5).expect("slot"));

    let empty = call(&ctx, "incubator-control", "get_slot_information", json!({ "slot": 6 })).await;
    assert_eq!(empty, json!({ "incubator_slot": 6 }));
}

#[tokio::test]
async fn malformed_arguments_are_validation_errors() {
    let ctx = setup().await;
    let err = call_function(&ctx, "incubator-control", "remove_sample", json!({ "slot": 43 }))
        .await
        .expect_err("slot out of range");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = call_function(
        &ctx,
        "robotic-arm-control",
        "microscope_to_incubator",
        json!({ "microscope_id": 3 }),
    )
    .await
    .expect_err("microscope 3");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn microscope_status_reports_stage_and_identity() {
    let ctx = setup().await;
    call(
        &ctx,
        "microscope-control-squid-1",
        "move_to_position",
        json!({ "x": 10.0, "y": 5.0, "z": 1.0 }),
    )
    .await;
    call(&ctx, "microscope-control-squid-1", "home_stage", Value::Null).await;

    let status = call(&ctx, "microscope-control-squid-1", "get_status", Value::Null).await;
    assert_eq!(status["microscope_id"], 1);
    assert_eq!(status["homed"], true);
    assert_eq!(status["position"], json!({ "x": 0.0, "y": 0.0, "z": 0.0 }));

    let frame = call(&ctx, "microscope-control-squid-1", "snap", Value::Null).await;
    assert!(frame.as_str().is_some_and(|path| path.ends_with(".png")));

    let well = call(
        &ctx,
        "microscope-control-squid-1",
        "navigate_to_well",
        json!({ "row": "A", "col": 1, "wellplate_type": "96" }),
    )
    .await;
    assert_eq!(well["z"], 0.0);
}

#[tokio::test]
async fn arm_calls_require_connection() {
    let ctx = setup().await;
    let err = call_function(&ctx, "robotic-arm-control", "light_on", Value::Null)
        .await
        .expect_err("not connected");
    assert_eq!(err.code, ErrorCode::Unavailable);

    call(&ctx, "robotic-arm-control", "connect", Value::Null).await;
    assert_eq!(call(&ctx, "robotic-arm-control", "light_on", Value::Null).await, Value::Null);
}
