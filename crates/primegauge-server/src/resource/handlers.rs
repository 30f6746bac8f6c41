//! HTTP surface of an `ExampleResource`.
//!
//! - `GET /gauge/:number` : parity queue probe
//! - `GET /prime/:number` : primality check
//! - `GET /`              : greeting (diagnostics only)
//! - `GET /print`         : meter dump to the log (diagnostics only)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};

use primegauge_core::error::{PrimeGaugeError, Result};

use super::{ExampleResource, GREETING};
use crate::error::ApiError;

fn parse_number(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| PrimeGaugeError::BadRequest(format!("not an integer: {raw}")))
}

pub async fn check_if_prime(
    State(res): State<Arc<ExampleResource>>,
    Path(raw): Path<String>,
) -> std::result::Result<String, ApiError> {
    let number = parse_number(&raw)?;
    Ok(res.check_if_prime(number).await?)
}

pub async fn check_list_size(
    State(res): State<Arc<ExampleResource>>,
    Path(raw): Path<String>,
) -> std::result::Result<String, ApiError> {
    let number = parse_number(&raw)?;
    Ok(res.check_list_size(number).to_string())
}

pub async fn greeting() -> &'static str {
    GREETING
}

pub async fn print_meters(State(res): State<Arc<ExampleResource>>) -> StatusCode {
    let n = res.print_meters().len();
    tracing::debug!(prefix = %res.prefix(), meters = n, "meter dump written");
    StatusCode::NO_CONTENT
}

/// Routes relative to the resource prefix.
pub fn routes(res: Arc<ExampleResource>) -> Router {
    let mut router = Router::new()
        .route("/gauge/:number", get(check_list_size))
        .route("/prime/:number", get(check_if_prime));
    if res.diagnostics() {
        router = router
            .route("/", get(greeting))
            .route("/print", get(print_meters));
    }
    router.with_state(res)
}
