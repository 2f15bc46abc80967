use axum::{middleware, routing::get, Router};
use crate::handlers::report;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/reports/weekly/customer", get(report::weekly_by_customer))
        .route("/reports/weekly/date", get(report::weekly_by_date))
        .route("/receipt/{sale_id}", get(report::receipt))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
