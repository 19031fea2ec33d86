use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::catalog::DEFAULT_THEME;
use crate::catalog::SensorTypes;
use crate::catalog::Theme;
use crate::catalog::sensor_types;
use crate::control::ControlError;
use crate::control::DEFAULT_ACTION;
use crate::control::control_entity;
use crate::host::ServiceCaller;
use crate::host::StateReader;
use crate::identity::IdentityResolver;
use crate::rooms::RoomsError;
use crate::rooms::room_summaries;
use crate::store::ConfigStore;
use crate::store::StoreError;
use crate::topology::Floors;
use crate::topology::Topology;

/// Same as axum's default request body limit.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub topology: Arc<Topology>,
    pub states: Arc<dyn StateReader>,
    pub services: Arc<dyn ServiceCaller>,
    pub identities: Arc<dyn IdentityResolver>,
    pub store: Arc<dyn ConfigStore>,
}

/// Request failures. The response only carries a fixed message; the details
/// are logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rooms(#[from] RoomsError),

    #[error("Configuration update rejected for non-admin caller")]
    Forbidden,

    #[error("Failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("Invalid configuration body: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    #[error("Failed to save configuration: {0}")]
    SaveConfig(#[source] StoreError),

    #[error("Failed to load configuration: {0}")]
    LoadConfig(#[source] StoreError),

    #[error("Invalid control body: {0}")]
    InvalidControl(#[source] serde_json::Error),

    #[error("Control body is not a JSON object: {0}")]
    ControlNotObject(Value),

    #[error(transparent)]
    Control(#[from] ControlError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rooms(RoomsError::UnknownFloor(_)) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::Rooms(RoomsError::UnknownFloor(_)) => "Floor not found",
            ApiError::Rooms(RoomsError::Host(_)) => "Error loading rooms",
            ApiError::Forbidden => "Admin access required",
            ApiError::Body(_) | ApiError::InvalidConfig(_) | ApiError::SaveConfig(_) => {
                "Error saving configuration"
            }
            ApiError::LoadConfig(_) => "Error loading configuration",
            ApiError::InvalidControl(_) | ApiError::ControlNotObject(_) | ApiError::Control(_) => {
                "Error controlling entity"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}

#[derive(Serialize)]
struct AdminCheckResponse {
    is_admin: bool,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Serialize)]
struct DashboardConfig<'a> {
    floors: Floors<'a>,
    sensor_types: SensorTypes,
    theme: Theme,
    rooms: Value,
    entities: Value,
}

/// Action named by a control body, which must be a JSON object.
///
/// A missing `action` means the default action. Any other non-string value
/// is passed on in its JSON form, which matches no known action.
fn control_action(body: &[u8]) -> Result<String, ApiError> {
    match serde_json::from_slice::<Value>(body).map_err(ApiError::InvalidControl)? {
        Value::Object(fields) => Ok(match fields.get("action") {
            None => DEFAULT_ACTION.to_string(),
            Some(Value::String(action)) => action.clone(),
            Some(other) => other.to_string(),
        }),
        other => Err(ApiError::ControlNotObject(other)),
    }
}

/// Handler for GET /api/ha_dashstyle/admin_check
#[tracing::instrument(skip_all)]
async fn admin_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AdminCheckResponse> {
    let identity = state.identities.resolve(&headers);
    tracing::debug!("Admin check for {:?}", identity.as_ref().map(|i| &i.name));

    Json(AdminCheckResponse {
        is_admin: identity.is_some_and(|i| i.is_admin),
    })
}

/// Handler for GET /api/ha_dashstyle/rooms/:floor
#[tracing::instrument(skip(state))]
async fn rooms(
    State(state): State<Arc<AppState>>,
    Path(floor): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = room_summaries(&state.topology, &floor, state.states.as_ref()).await?;
    Ok(Json(summaries))
}

/// Handler for GET /api/ha_dashstyle/config
#[tracing::instrument(skip_all)]
async fn get_config(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let layout = state.store.load().await.map_err(ApiError::LoadConfig)?;

    let config = DashboardConfig {
        floors: state.topology.floors(),
        sensor_types: sensor_types(),
        theme: DEFAULT_THEME,
        rooms: layout.rooms,
        entities: layout.entities,
    };
    Ok(Json(config).into_response())
}

/// Handler for POST /api/ha_dashstyle/config
///
/// The caller must be an admin; the body is only read once that holds.
#[tracing::instrument(skip_all)]
async fn save_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<SuccessResponse>, ApiError> {
    let identity = state.identities.resolve(&headers);
    let Some(identity) = identity.filter(|i| i.is_admin) else {
        return Err(ApiError::Forbidden);
    };

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(ApiError::Body)?;
    let config: Value = serde_json::from_slice(&body).map_err(ApiError::InvalidConfig)?;

    tracing::debug!("Configuration update from {}", identity.name);
    state
        .store
        .save(&config)
        .await
        .map_err(ApiError::SaveConfig)?;

    Ok(SuccessResponse::ok())
}

/// Handler for POST /api/ha_dashstyle/control/:entity_id
#[tracing::instrument(skip(state, body))]
async fn control(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let action = control_action(&body)?;

    control_entity(&entity_id, &action, state.services.as_ref()).await?;
    Ok(SuccessResponse::ok())
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ha_dashstyle/admin_check", get(admin_check))
        .route("/api/ha_dashstyle/rooms/:floor", get(rooms))
        .route("/api/ha_dashstyle/config", get(get_config).post(save_config))
        .route("/api/ha_dashstyle/control/:entity_id", post(control))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires, then drains
/// in-flight requests.
pub async fn serve(
    listen: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
