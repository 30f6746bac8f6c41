//! HTTP server request timing (`http.server.requests`).

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use regex::RegexSet;

use primegauge_core::error::{PrimeGaugeError, Result};

use super::metrics::{MeterRegistry, Sample};

pub const HTTP_SERVER_REQUESTS: &str = "http.server.requests";

/// Request timing state shared by the middleware.
pub struct HttpServerMetrics {
    registry: Arc<MeterRegistry>,
    ignore: RegexSet,
}

impl HttpServerMetrics {
    /// `ignore_patterns` are matched against the whole request path.
    pub fn new(registry: Arc<MeterRegistry>, ignore_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            registry,
            ignore: compile_ignore_patterns(ignore_patterns)?,
        })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }
}

pub fn compile_ignore_patterns(patterns: &[String]) -> Result<RegexSet> {
    RegexSet::new(patterns.iter().map(|p| format!("^(?:{p})$")))
        .map_err(|e| PrimeGaugeError::BadRequest(format!("invalid ignore pattern: {e}")))
}

fn outcome(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "INFORMATIONAL",
        200..=299 => "SUCCESS",
        300..=399 => "REDIRECTION",
        400..=499 => "CLIENT_ERROR",
        500..=599 => "SERVER_ERROR",
        _ => "UNKNOWN",
    }
}

pub async fn track_requests(
    State(http): State<Arc<HttpServerMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    if http.is_ignored(req.uri().path()) {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let route = req.extensions().get::<MatchedPath>().map(|p| p.as_str().to_owned());
    let sample = Sample::start();

    let resp = next.run(req).await;

    let status = resp.status();
    let uri = route.unwrap_or_else(|| {
        let fallback = if status == StatusCode::NOT_FOUND { "NOT_FOUND" } else { "UNKNOWN" };
        fallback.to_owned()
    });
    let timer = http.registry.timer(
        HTTP_SERVER_REQUESTS,
        &[
            ("method", method.as_str()),
            ("uri", uri.as_str()),
            ("status", status.as_str()),
            ("outcome", outcome(status)),
        ],
    );
    sample.stop(&timer);
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_patterns_match_whole_path() {
        let m = HttpServerMetrics::new(
            Arc::new(MeterRegistry::new()),
            &["/metrics".to_string(), "/example/gauge/.*".to_string()],
        )
        .unwrap();
        assert!(m.is_ignored("/metrics"));
        assert!(!m.is_ignored("/metrics/extra"));
        assert!(m.is_ignored("/example/gauge/4"));
        assert!(!m.is_ignored("/example/prime/4"));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let err = compile_ignore_patterns(&["(".to_string()]).unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn outcome_classes() {
        assert_eq!(outcome(StatusCode::OK), "SUCCESS");
        assert_eq!(outcome(StatusCode::NO_CONTENT), "SUCCESS");
        assert_eq!(outcome(StatusCode::BAD_REQUEST), "CLIENT_ERROR");
        assert_eq!(outcome(StatusCode::INTERNAL_SERVER_ERROR), "SERVER_ERROR");
    }
}
