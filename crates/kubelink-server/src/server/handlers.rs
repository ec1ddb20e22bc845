//! HTTP handlers for the kubelink server

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json},
};
use kubelink_core::{Identity, KubeContext, SaveContextsResponse, SystemEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiError, ServiceContainer};

/// Largest accepted kubeconfig upload
pub const MAX_BUNDLE_BYTES: usize = 1024 * 1024;

/// Multipart field carrying the kubeconfig
pub const BUNDLE_FIELD: &str = "k8sfile";

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ServiceContainer>,
}

/// Caller identity from `Authorization: Bearer` and `X-User-Id`.
///
/// A missing user id is the nil UUID; a missing token is only rejected by
/// operations that need one.
#[derive(Debug, Clone)]
pub struct RequestIdentity(pub Identity);

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = match parts.headers.get(USER_ID_HEADER) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<Uuid>().ok())
                .ok_or_else(|| ApiError::BadRequest("invalid X-User-Id header".to_string()))?,
            None => Uuid::nil(),
        };

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self(Identity { user_id, token }))
    }
}

/// Read a kubeconfig from a multipart `k8sfile` field or the raw body
async fn read_bundle(request: Request) -> Result<Vec<u8>, ApiError> {
    let headers = request.headers();
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BUNDLE_BYTES) {
        return Err(ApiError::PayloadTooLarge(MAX_BUNDLE_BYTES));
    }

    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        // Buffered under the router's DefaultBodyLimit, with or without Content-Length
        let body = Bytes::from_request(request, &()).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge(MAX_BUNDLE_BYTES)
            } else {
                ApiError::BadRequest(format!("failed to read kubeconfig: {}", e.body_text()))
            }
        })?;
        return Ok(body.to_vec());
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(BUNDLE_FIELD) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::BadRequest(format!(
        "missing multipart field \"{}\"",
        BUNDLE_FIELD
    )))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(MAX_BUNDLE_BYTES)
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

fn parse_connection_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("connection_id is required".to_string()))?;
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid connection_id {:?}", raw)))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Server] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/system/kubernetes`
pub async fn submit_kubeconfig(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    request: Request,
) -> Result<Json<SaveContextsResponse>, ApiError> {
    identity.require_token()?;
    let bundle = read_bundle(request).await?;
    info!(
        user_id = %identity.user_id,
        bytes = bundle.len(),
        "[Server] Kubeconfig uploaded"
    );

    let response = state
        .services
        .services
        .connection
        .submit_bundle(&identity, &bundle)
        .await?;
    Ok(Json(response))
}

/// `POST /api/system/kubernetes/contexts`
pub async fn list_contexts(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    request: Request,
) -> Result<Json<Vec<KubeContext>>, ApiError> {
    let bundle = read_bundle(request).await?;
    let contexts = state
        .services
        .services
        .connection
        .list_contexts(&identity, &bundle)
        .await?;
    Ok(Json(contexts))
}

#[derive(Debug, Deserialize)]
pub struct ConnectionQuery {
    pub connection_id: Option<String>,
}

/// `DELETE /api/system/kubernetes?connection_id=`
pub async fn delete_connection(
    State(state): State<AppState>,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<Value>, ApiError> {
    let connection_id = parse_connection_id(query.connection_id.as_deref())?;
    // Cleanup continues in the background
    let _cleanup = state
        .services
        .services
        .connection
        .delete_connection(connection_id)
        .await;
    Ok(Json(json!({})))
}

/// `GET /api/system/kubernetes/ping?connection_id=`
pub async fn ping(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<Value>, ApiError> {
    let connection_id = parse_connection_id(query.connection_id.as_deref())?;
    let token = identity.require_token()?;

    let version = state
        .services
        .services
        .connection
        .ping(token, connection_id)
        .await?;
    Ok(Json(json!({ "server_version": version })))
}

/// `POST /api/system/kubernetes/register`
///
/// Registration runs in the background; the response only confirms it
/// was scheduled.
pub async fn register_components(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let bundle = read_bundle(request).await?;
    let services = &state.services.services;
    let (contexts, _) = services.connection.extract(&identity, &bundle)?;

    info!(
        user_id = %identity.user_id,
        contexts = contexts.len(),
        "[Server] Scheduling component registration"
    );
    let _registration = services
        .registration
        .spawn_registration(contexts, identity.user_id);

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// `POST /api/system/kubernetes/discover`
pub async fn discover(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<Vec<KubeContext>>, ApiError> {
    let token = identity.require_token()?;
    let contexts = state
        .services
        .services
        .discovery
        .discover(identity.user_id, token)
        .await?;
    Ok(Json(contexts))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// `GET /api/system/events?limit=`
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<SystemEvent>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    let events = state
        .services
        .event_repo
        .list_recent(limit)
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    Ok(Json(events))
}
