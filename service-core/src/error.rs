use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in every JSON error body.
pub mod codes {
    pub const UNCLASSIFIED: u32 = 0;
    pub const BAD_REQUEST: u32 = 0x5000;
    pub const DATA_CONVERSION: u32 = 0x5001;
    pub const RECORD_NOT_FOUND: u32 = 0x5002;
    pub const INVALID_CREDENTIALS: u32 = 0x5003;
    pub const DATABASE_DUPLICATE: u32 = 0x5004;
    pub const RECORD_IN_USE: u32 = 0x5006;
    pub const PERMISSION_DENIED: u32 = 0x5007;
    pub const INTERNAL_DATABASE: u32 = 0x5008;
    pub const INTERNAL: u32 = 0x5009;
    pub const PRECONDITION_FAILED: u32 = 0x5011;
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Data conversion error: {0}")]
    DataConversion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Record in use: {0}")]
    RecordInUse(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Server not ready: {0}")]
    ServerNotReady(anyhow::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Wire shape of every JSON error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error_code: u32,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::DataConversion(_)
            | AppError::Duplicate(_)
            | AppError::RecordInUse(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::InvalidCredentials | AppError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ServerNotReady(_)
            | AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> u32 {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::DataConversion(_) => codes::DATA_CONVERSION,
            AppError::NotFound(_) => codes::RECORD_NOT_FOUND,
            AppError::Unauthorized(_) | AppError::InvalidCredentials | AppError::InvalidToken(_) => {
                codes::INVALID_CREDENTIALS
            }
            AppError::Duplicate(_) => codes::DATABASE_DUPLICATE,
            AppError::RecordInUse(_) => codes::RECORD_IN_USE,
            AppError::PermissionDenied(_) => codes::PERMISSION_DENIED,
            AppError::PreconditionFailed(_) => codes::PRECONDITION_FAILED,
            AppError::DatabaseError(_) => codes::INTERNAL_DATABASE,
            AppError::ServerNotReady(_)
            | AppError::ConfigError(_)
            | AppError::ServiceUnavailable(_)
            | AppError::Timeout(_) => codes::INTERNAL,
            AppError::PayloadTooLarge(_) | AppError::InternalError(_) => codes::UNCLASSIFIED,
        }
    }

    /// Client-facing message. Authentication failures and internal errors never
    /// leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized(_) | AppError::InvalidCredentials | AppError::InvalidToken(_) => {
                "Unauthorized".to_string()
            }
            AppError::ServerNotReady(_) => "server not ready".to_string(),
            AppError::DatabaseError(_) => "internal database error".to_string(),
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                "internal server error".to_string()
            }
            AppError::ValidationError(err) => format!("Invalid input data: {}", err),
            AppError::BadRequest(msg)
            | AppError::DataConversion(msg)
            | AppError::Duplicate(msg)
            | AppError::RecordInUse(msg)
            | AppError::PermissionDenied(msg)
            | AppError::PreconditionFailed(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::Timeout(msg) => msg.clone(),
            AppError::NotFound(what) => format!("Record not found: {}", what),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status_code: self.status_code().as_u16(),
            error_code: self.error_code(),
            message: self.public_message(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DataConversion(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else if status != StatusCode::UNAUTHORIZED {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn permission_denied_maps_to_forbidden_with_code() {
        let (status, body) = body_json(AppError::PermissionDenied("Trial expired".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["statusCode"], 403);
        assert_eq!(body["errorCode"], 0x5007);
        assert_eq!(body["message"], "Trial expired");
    }

    #[tokio::test]
    async fn unauthorized_hides_detail() {
        let (status, body) =
            body_json(AppError::Unauthorized(anyhow::anyhow!("signature mismatch"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn unclassified_errors_are_generic_500() {
        let (status, body) = body_json(AppError::InternalError(anyhow::anyhow!("boom"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["errorCode"], 0);
        assert_eq!(body["message"], "internal server error");
    }

    #[test]
    fn not_found_uses_record_not_found_code() {
        let err = AppError::NotFound("project p1".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), codes::RECORD_NOT_FOUND);
    }
}
