use super::*;
use axum::{body, body::Body, http::Request};
use client_core::{LabConsole, SampleForm, ServiceHandles};
use hypha_integration::{
    HyphaClient, HyphaConfig, RemoteIncubator, RemoteMicroscope, RemoteRoboticArm,
};
use shared::domain::{SampleStatus, SlotNumber, WellPlateType, INCUBATOR_LOCATION};
use tower::ServiceExt;

async fn test_state() -> Arc<AppState> {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    Arc::new(
        build_state(&Settings::default(), storage)
            .await
            .expect("state"),
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_reports_ok_when_storage_is_ready() {
    let app = build_router(test_state().await);
    let request = Request::get("/health").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn service_functions_answer_get_and_post() {
    let app = build_router(test_state().await);

    let request = Request::get("/reef-imaging/services/incubator-control/get_temperature")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!(37.0));

    let response = app
        .oneshot(post(
            "/reef-imaging/services/incubator-control/get_slot_information",
            r#"{"slot": 1}"#,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["incubator_slot"], 1);
}

#[tokio::test]
async fn failures_carry_api_error_bodies() {
    let app = build_router(test_state().await);

    let response = app
        .clone()
        .oneshot(post("/other-lab/services/incubator-control/get_co2_level", "{}"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = serde_json::from_value(json_body(response).await).expect("api error");
    assert_eq!(err.code, ErrorCode::NotFound);

    let response = app
        .clone()
        .oneshot(post(
            "/reef-imaging/services/incubator-control/remove_sample",
            "{not json",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .oneshot(post(
            "/reef-imaging/services/incubator-control/get_sample_from_slot_to_transfer_station",
            r#"{"slot": 8}"#,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let err: ApiError = serde_json::from_value(json_body(response).await).expect("api error");
    assert_eq!(err.message, "slot 8 holds no plate");
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn arm_calls_are_served_by_the_router() {
    let state = test_state().await;
    let pending = dispatch(&state, "reef-imaging", "robotic-arm-control", "connect", Value::Null);
    assert_send(&pending);
    assert_eq!(pending.await.expect("connect").0, Value::Null);

    let app = build_router(state);
    let response = app
        .clone()
        .oneshot(post("/reef-imaging/services/robotic-arm-control/light_on", ""))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/reef-imaging/services/robotic-arm-control/microscope_to_incubator",
            r#"{"microscope_id": 1}"#,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

async fn spawn_simulator() -> ServiceHandles {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(test_state().await);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let settings = Settings::default();
    let config = HyphaConfig::new(&format!("http://{addr}"), &settings.workspace).expect("config");
    let client = HyphaClient::new(config).expect("client");
    ServiceHandles::new()
        .with_incubator(Arc::new(RemoteIncubator::new(
            client.clone(),
            &settings.incubator_service_id,
        )))
        .with_robotic_arm(Arc::new(RemoteRoboticArm::new(
            client.clone(),
            &settings.robotic_arm_service_id,
        )))
        .with_microscope(
            MicroscopeId::ONE,
            Arc::new(RemoteMicroscope::new(
                client.clone(),
                &settings.microscope_1_service_id,
            )),
        )
        .with_microscope(
            MicroscopeId::TWO,
            Arc::new(RemoteMicroscope::new(
                client,
                &settings.microscope_2_service_id,
            )),
        )
}

#[tokio::test(flavor = "multi_thread")]
async fn console_moves_samples_through_the_simulator() {
    let console = LabConsole::new(spawn_simulator().await);
    let registry = console.registry();
    let slot = SlotNumber::new(3).expect("slot");

    let token = console.begin_operation("add").expect("token");
    let added = registry
        .add_sample(
            &token,
            slot,
            &SampleForm::new("S1", SampleStatus::Microscope1Source, WellPlateType::Wells96),
        )
        .await
        .expect("add from microscope 1");
    token.complete();
    assert_eq!(added.status, Some(SampleStatus::In));

    let token = console.begin_operation("load").expect("token");
    registry
        .load_sample_onto_microscope(&token, slot, MicroscopeId::TWO)
        .await
        .expect("load onto microscope 2");
    token.complete();

    let cache = registry.refresh().await.expect("refresh");
    assert_eq!(cache.get(slot).location.as_deref(), Some("microscope2"));
    assert_eq!(cache.get(slot).status, Some(SampleStatus::Out));

    let token = console.begin_operation("return").expect("token");
    registry
        .return_sample_from_microscope(&token, MicroscopeId::TWO)
        .await
        .expect("return from microscope 2");
    token.complete();

    let cache = registry.refresh().await.expect("refresh");
    assert_eq!(cache.get(slot).location.as_deref(), Some(INCUBATOR_LOCATION));
    assert_eq!(cache.occupied().count(), 1);

    let environment = console.environment().await.expect("environment");
    assert_eq!(environment.co2_percent, 5.0);
}
