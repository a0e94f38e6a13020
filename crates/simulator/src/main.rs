use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use shared::{
    domain::MicroscopeId,
    error::{ApiError, ErrorCode},
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod lab;

use api::{call_function, ApiContext, ServiceDirectory, ServiceKind};
use app_state::AppState;
use config::{load_settings, normalize_database_url, Settings};
use lab::{Environment, Lab};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = build_state(&settings, storage).await?;
    for (service_id, kind) in state.api.directory.ids() {
        info!(workspace = %state.workspace, service_id, ?kind, "service registered");
    }
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "hardware simulator listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(settings: &Settings, storage: Storage) -> anyhow::Result<AppState> {
    let environment = Environment {
        temperature_c: settings.temperature_c,
        co2_percent: settings.co2_percent,
    };
    let lab = Lab::open(Arc::new(storage.clone()), environment).await?;
    let directory = ServiceDirectory::new()
        .register(&settings.incubator_service_id, ServiceKind::Incubator)
        .register(&settings.robotic_arm_service_id, ServiceKind::RoboticArm)
        .register(
            &settings.microscope_1_service_id,
            ServiceKind::Microscope(MicroscopeId::ONE),
        )
        .register(
            &settings.microscope_2_service_id,
            ServiceKind::Microscope(MicroscopeId::TWO),
        );

    Ok(AppState {
        workspace: settings.workspace.clone(),
        storage,
        api: ApiContext {
            lab: Arc::new(lab),
            directory,
        },
    })
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/:workspace/services/:service_id/:function",
            get(call_without_args).post(call_with_args),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type Rejection = (StatusCode, Json<ApiError>);

async fn health(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Unavailable, e.to_string())))?;
    Ok("ok")
}

async fn call_with_args(
    State(state): State<Arc<AppState>>,
    Path((workspace, service_id, function)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<Value>, Rejection> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            reject(ApiError::new(
                ErrorCode::Validation,
                format!("request body is not valid JSON: {e}"),
            ))
        })?
    };
    dispatch(&state, &workspace, &service_id, &function, args).await
}

async fn call_without_args(
    State(state): State<Arc<AppState>>,
    Path((workspace, service_id, function)): Path<(String, String, String)>,
) -> Result<Json<Value>, Rejection> {
    dispatch(&state, &workspace, &service_id, &function, Value::Null).await
}

async fn dispatch(
    state: &AppState,
    workspace: &str,
    service_id: &str,
    function: &str,
    args: Value,
) -> Result<Json<Value>, Rejection> {
    if workspace != state.workspace {
        return Err(reject(ApiError::new(
            ErrorCode::NotFound,
            format!("workspace '{workspace}' does not exist"),
        )));
    }
    match call_function(&state.api, service_id, function, args).await {
        Ok(value) => Ok(Json(value)),
        Err(err) => {
            warn!(
                service_id,
                function,
                code = ?err.code,
                message = %err.message,
                "service call failed"
            );
            Err(reject(err))
        }
    }
}

fn reject(err: ApiError) -> Rejection {
    (status_for(err.code), Json(err))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
