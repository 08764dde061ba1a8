//! HealthPod Pod Server
//!
//! Serves a directory-backed pod per user over HTTP. This is the server the
//! `healthpod` CLI talks to when `pod.server_url` is configured.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HEALTHPOD_SERVER_PORT`: Port to listen on (default: 8080)
//! - `HEALTHPOD_SERVER_DATA_DIR`: Directory holding the pods (default: ~/.local/share/healthpod-server)
//! - `HEALTHPOD_SERVER_CONFIG`: Path to config file (default: ~/.config/healthpod-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /dir`, `GET /dir/{path}`: List a directory of the caller's pod
//! - `GET /blob/{path}`: Read a blob
//! - `PUT /blob/{path}`: Create or replace a blob with the request body
//! - `DELETE /blob/{path}`: Delete a blob

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use healthpod_core::{DirListing, DirStore, PodStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Request header carrying the client's encryption flag.
const ENCRYPTED_HEADER: &str = "x-pod-encrypted";

// ============================================================================
// Configuration
// ============================================================================

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    key: String,
    user_id: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory holding one pod directory per user
    data_dir: PathBuf,
    /// Path to config file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("HEALTHPOD_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("HEALTHPOD_SERVER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("healthpod-server")
            });

        let config_path = std::env::var("HEALTHPOD_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("healthpod-server")
                    .join("config.yaml")
            });

        Self {
            port,
            data_dir,
            config_path,
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user info, added to request extensions after auth
#[derive(Debug, Clone)]
struct AuthUser {
    user_id: String,
}

/// API key store - maps key -> AuthUser
#[derive(Debug, Clone, Default)]
struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    /// Load API keys from config file
    fn load(config_path: &PathBuf) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => {
                    let store = Self::from_entries(config.api_keys);
                    tracing::info!("Loaded {} API key(s)", store.keys.len());
                    store
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                Self::default()
            }
        }
    }

    /// Builds the store, dropping entries whose user id cannot name a directory.
    fn from_entries(entries: Vec<ApiKeyEntry>) -> Self {
        let mut keys = HashMap::new();
        for entry in entries {
            if !valid_user_id(&entry.user_id) {
                tracing::warn!("Ignoring API key for invalid user id '{}'", entry.user_id);
                continue;
            }
            keys.insert(
                entry.key,
                AuthUser {
                    user_id: entry.user_id,
                },
            );
        }
        Self { keys }
    }

    /// Validate an API key and return the associated user
    fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }
}

/// User ids become directory names under the data directory.
fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && !user_id.starts_with('.')
        && !user_id.contains('/')
        && !user_id.contains('\\')
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    api_keys: Arc<ApiKeyStore>,
    data_dir: PathBuf,
}

impl AppState {
    /// The caller's pod.
    fn pod(&self, user: &AuthUser) -> DirStore {
        DirStore::new(self.data_dir.join(&user.user_id))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                )
            }
        },
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            )
        }
    };

    match state.api_keys.validate(api_key) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Store failure turned into an HTTP response. `HttpStore` maps these
/// statuses back to the same `StoreError` variants.
struct ApiError(StoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "invalid_path"),
            StoreError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "not_logged_in"),
            StoreError::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "rejected"),
            StoreError::Unavailable(_) | StoreError::Io { .. } => {
                tracing::error!("Storage failure: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };
        error_response(status, error, self.0.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError(e)
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_root(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DirListing>, ApiError> {
    Ok(Json(state.pod(&user).list_directory("").await?))
}

async fn list_dir(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> Result<Json<DirListing>, ApiError> {
    Ok(Json(state.pod(&user).list_directory(&path).await?))
}

async fn read_blob(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> Result<String, ApiError> {
    Ok(state.pod(&user).read_blob(&path).await?)
}

async fn write_blob(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let encrypted = headers
        .get(ENCRYPTED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    state.pod(&user).write_blob(&path, &body, encrypted).await?;
    tracing::debug!(
        "{} wrote {} ({} bytes, encrypted={})",
        user.user_id,
        path,
        body.len(),
        encrypted
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_blob(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.pod(&user).delete_blob(&path).await?;
    tracing::debug!("{} deleted {}", user.user_id, path);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/dir", get(list_root))
        .route("/dir/{*path}", get(list_dir))
        .route(
            "/blob/{*path}",
            get(read_blob).put(write_blob).delete(delete_blob),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthpod_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let state = AppState {
        api_keys: Arc::new(ApiKeyStore::load(&config.config_path)),
        data_dir: config.data_dir,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
