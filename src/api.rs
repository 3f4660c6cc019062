use crate::config::AddressBook;
use crate::dispatch::{WakeDispatcher, WakeError};
use crate::iface::DiscoveryError;
use crate::ping::{LivenessChecker, PingError};
use axum::extract;
use axum::extract::rejection::JsonRejection;
use axum::http::Request;
use axum::http::StatusCode;
use axum::middleware;
use axum::response;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing;
use axum::Router;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub address_book: Arc<AddressBook>,
    pub dispatcher: WakeDispatcher,
    pub checker: LivenessChecker,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound {
        name: String,
        reason: &'static str,
    },
    Wake(WakeError),
    Discovery(DiscoveryError),
    Ping {
        name: String,
        source: PingError,
    },
}

impl From<WakeError> for ApiError {
    fn from(err: WakeError) -> Self {
        Self::Wake(err)
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::NotFound { name, reason } => {
                (StatusCode::NOT_FOUND, json!({ "error": reason, "name": name }))
            }
            Self::Wake(err @ WakeError::InvalidMacAddress(_)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
            }
            Self::Wake(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Self::Discovery(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("{}: {}", err, err.0) }),
            ),
            Self::Ping { name, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": source.to_string(), "name": name }),
            ),
        };
        (status, response::Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct WolRequest {
    mac_addr: String,
    #[serde(default)]
    broadcast_addr: String,
}

async fn index() -> impl IntoResponse {
    response::Html(include_str!("index.html"))
}

async fn wake(
    state: extract::State<AppState>,
    req: Result<extract::Json<WolRequest>, JsonRejection>,
) -> response::Result<impl IntoResponse, ApiError> {
    let extract::Json(req) = req.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let broadcast = if req.broadcast_addr.is_empty() {
        state
            .address_book
            .find_by_mac(&req.mac_addr)
            .and_then(|entry| entry.broadcast_address.clone())
    } else {
        Some(req.broadcast_addr)
    };
    if let Err(err) = state.dispatcher.wake(&req.mac_addr, broadcast.as_deref()).await {
        error!("failed to send WoL for {}: {}", req.mac_addr, err);
        return Err(err.into());
    }
    Ok(response::Json(json!({ "message": "success" })))
}

async fn wake_by_name(
    state: extract::State<AppState>,
    extract::Path(name): extract::Path<String>,
) -> response::Result<impl IntoResponse, ApiError> {
    let entry = state
        .address_book
        .find_by_name(&name)
        .ok_or_else(|| ApiError::NotFound {
            name: name.clone(),
            reason: "configuration not found",
        })?;
    if let Err(err) = state
        .dispatcher
        .wake(&entry.mac_address, entry.broadcast_address.as_deref())
        .await
    {
        error!("failed to send WoL to {}: {}", name, err);
        return Err(err.into());
    }
    Ok(response::Json(json!({ "message": "success", "name": name })))
}

async fn macs(state: extract::State<AppState>) -> impl IntoResponse {
    response::Json(json!({ "macs": state.address_book.entries() }))
}

async fn broadcasts(
    state: extract::State<AppState>,
) -> response::Result<impl IntoResponse, ApiError> {
    let broadcasts: Vec<String> = state
        .dispatcher
        .discover_broadcast_addresses()?
        .iter()
        .map(|addr| addr.to_string())
        .collect();
    Ok(response::Json(json!({ "broadcasts": broadcasts })))
}

async fn ping(
    state: extract::State<AppState>,
    extract::Path(name): extract::Path<String>,
) -> response::Result<impl IntoResponse, ApiError> {
    let entry = state
        .address_book
        .find_by_name(&name)
        .or_else(|| state.address_book.find_by_mac(&name))
        .ok_or_else(|| ApiError::NotFound {
            name: name.clone(),
            reason: "configuration not found",
        })?;
    let host = entry.host.as_deref().ok_or_else(|| ApiError::NotFound {
        name: name.clone(),
        reason: "no host configured",
    })?;
    let reachable = state.checker.ping(host).await.map_err(|source| {
        warn!("ping {} ({}) failed: {}", name, host, source);
        ApiError::Ping {
            name: name.clone(),
            source,
        }
    })?;
    let status = if reachable { "ok" } else { "failed" };
    Ok(response::Json(json!({ "status": status, "name": name })))
}

async fn varz() -> response::Result<impl IntoResponse> {
    let metrics = prometheus::gather();
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode_to_string(&metrics)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", e)).into())
}

async fn add_observability<B>(
    req: Request<B>,
    next: middleware::Next<B>,
) -> response::Result<Response> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let resp = next.run(req).await;
    // POST /api/wol 200
    info!(
        "{method} {request} {status}",
        method = method,
        request = path,
        status = resp.status().as_str(),
    );
    Ok(resp)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/varz", routing::get(varz))
        .route("/api/wol", routing::post(wake))
        .route("/api/wol/:name", routing::post(wake_by_name))
        .route("/api/macs", routing::get(macs))
        .route("/api/broadcasts", routing::get(broadcasts))
        .route("/api/ping/:name", routing::get(ping))
        .route_layer(middleware::from_fn(add_observability))
        .with_state(state)
}
