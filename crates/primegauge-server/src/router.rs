//! Axum router wiring.
//!
//! Ops routes live at the root; each example resource is nested under its
//! prefix (merged when the prefix is `/`). Request timing wraps everything.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, obs, ops, resource};

pub fn build_router(state: AppState) -> Router {
    let mut ops_routes = Router::new().route("/healthz", get(ops::healthz));
    if state.metrics_enabled() {
        ops_routes = ops_routes.route("/metrics", get(ops::metrics));
    }
    let mut app = ops_routes.with_state(state.clone());

    for res in state.resources() {
        let routes = resource::routes(Arc::clone(res));
        app = match res.prefix() {
            "/" => app.merge(routes),
            prefix => app.nest(prefix, routes),
        };
    }

    if let Some(http) = state.http_metrics() {
        app = app.layer(middleware::from_fn_with_state(http, obs::http::track_requests));
    }
    app
}
