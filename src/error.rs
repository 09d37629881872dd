// error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Failure codes reported to callers alongside a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InitError,
    NotInitialized,
    DiscoveryError,
    StopError,
    GetDevicesError,
    AddDeviceError,
    GetDeviceListError,
    ControlError,
    GetStatusError,
    DeviceNotFound,
    UnknownMethod,
    InvalidParams,
    InvalidRequest,
    SessionNotFound,
    Busy,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InitError => "INIT_ERROR",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::DiscoveryError => "DISCOVERY_ERROR",
            ErrorCode::StopError => "STOP_ERROR",
            ErrorCode::GetDevicesError => "GET_DEVICES_ERROR",
            ErrorCode::AddDeviceError => "ADD_DEVICE_ERROR",
            ErrorCode::GetDeviceListError => "GET_DEVICE_LIST_ERROR",
            ErrorCode::ControlError => "CONTROL_ERROR",
            ErrorCode::GetStatusError => "GET_STATUS_ERROR",
            ErrorCode::DeviceNotFound => "DEVICE_NOT_FOUND",
            ErrorCode::UnknownMethod => "UNKNOWN_METHOD",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::Busy => "BUSY",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected bridge call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::NotInitialized, "Device SDK not initialized")
    }

    pub fn device_not_found() -> Self {
        Self::new(ErrorCode::DeviceNotFound, "Device not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend answered with an error of its own; the message is relayed verbatim.
    #[error("{message}")]
    Rejected { code: String, message: String },
    #[error("Device not found")]
    NotFound,
    #[error("{0}")]
    Busy(String),
    #[error("{0}")]
    Cancelled(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BackendError {
    /// Maps a backend failure onto the calling operation's error code.
    /// `context` is the operation's failure text used for unexpected faults.
    pub fn into_bridge(self, code: ErrorCode, context: &str) -> BridgeError {
        match self {
            BackendError::Rejected { message, .. } => BridgeError::new(code, message),
            BackendError::NotFound => BridgeError::device_not_found(),
            BackendError::Busy(message) | BackendError::Cancelled(message) => {
                BridgeError::new(code, message)
            }
            BackendError::Internal(e) => BridgeError::new(code, format!("{context}: {e}")),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("Too many connections")]
    Busy,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::SessionNotFound => (StatusCode::NOT_FOUND, ErrorCode::SessionNotFound),
            AppError::Busy => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Busy),
        };
        let body = ErrorBody {
            code: code.as_str().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_like_their_wire_names() {
        for code in [
            ErrorCode::InitError,
            ErrorCode::GetDeviceListError,
            ErrorCode::DeviceNotFound,
            ErrorCode::SessionNotFound,
            ErrorCode::Busy,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn internal_faults_carry_operation_context() {
        let err = BackendError::Internal(anyhow::anyhow!("socket closed"))
            .into_bridge(ErrorCode::DiscoveryError, "Failed to start device discovery");
        assert_eq!(err.code, ErrorCode::DiscoveryError);
        assert_eq!(err.message, "Failed to start device discovery: socket closed");
    }

    #[test]
    fn rejections_keep_backend_message() {
        let err = BackendError::Rejected {
            code: "1004".into(),
            message: "device offline".into(),
        }
        .into_bridge(ErrorCode::ControlError, "Failed to control device");
        assert_eq!(err, BridgeError::new(ErrorCode::ControlError, "device offline"));
    }

    #[test]
    fn missing_device_overrides_operation_code() {
        let err = BackendError::NotFound
            .into_bridge(ErrorCode::GetStatusError, "Failed to get device status");
        assert_eq!(err, BridgeError::device_not_found());
    }

    #[test]
    fn cancelled_discovery_keeps_operation_code() {
        let err = BackendError::Cancelled("Device discovery was stopped before it started".into())
            .into_bridge(ErrorCode::DiscoveryError, "Failed to start device discovery");
        assert_eq!(err.code, ErrorCode::DiscoveryError);
        assert_eq!(err.message, "Device discovery was stopped before it started");
    }

    #[tokio::test]
    async fn busy_renders_through_error_code() {
        let response = AppError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], ErrorCode::Busy.as_str());
        assert_eq!(json["message"], "Too many connections");
    }
}
