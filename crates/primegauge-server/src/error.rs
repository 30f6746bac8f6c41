//! HTTP mapping for `PrimeGaugeError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use primegauge_core::error::{ClientCode, PrimeGaugeError};

/// Handler error: the core error rendered as `{"error", "message"}` JSON.
#[derive(Debug)]
pub struct ApiError(pub PrimeGaugeError);

impl From<PrimeGaugeError> for ApiError {
    fn from(e: PrimeGaugeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status = match code {
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => StatusCode::BAD_REQUEST,
            ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": code.as_str(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
