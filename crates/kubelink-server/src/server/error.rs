//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use kubelink_core::{ConnectionError, DiscoveryError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("kubeconfig exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "[Server] Request failed");
        } else {
            warn!(status = %status, error = %self, "[Server] Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ConnectionError> for ApiError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::MissingToken => Self::Unauthorized(e.to_string()),
            ConnectionError::EmptyBundle | ConnectionError::Malformed(_) => {
                Self::BadRequest(e.to_string())
            }
            ConnectionError::NotFound(_) => Self::NotFound(e.to_string()),
            ConnectionError::Cluster(_) => Self::BadGateway(e.to_string()),
            ConnectionError::Storage(_) => Self::Internal(format!("{:#}", e)),
        }
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Malformed(_) => Self::BadRequest(e.to_string()),
            DiscoveryError::NoInClusterIdentity => Self::NotFound(e.to_string()),
            DiscoveryError::InClusterUnavailable(_) => Self::ServiceUnavailable(e.to_string()),
            DiscoveryError::Persist { .. } => Self::Internal(e.to_string()),
        }
    }
}
