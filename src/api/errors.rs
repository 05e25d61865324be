use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use crate::errors::{ErrorKind, ScanError};
use tracing::error;

impl ScanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScanError::InvalidRequest(_) | ScanError::Config(_) | ScanError::Regex(_) => StatusCode::BAD_REQUEST,
            _ => match self.classify().kind {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Persistence | ErrorKind::Background => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let class = self.classify();
        (status, Json(json!({"error": self.to_string(), "type": class.error_type}))).into_response()
    }
}
