use axum::{middleware, routing::get, Router};
use crate::handlers::analytics;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/analytics/dashboard-stats", get(analytics::dashboard_stats))
        .route("/analytics/top-selling-products", get(analytics::top_selling_products))
        .route("/analytics/customer-analysis", get(analytics::customer_analysis))
        .route("/analytics/stock-movement", get(analytics::stock_movement))
        .route("/analytics/low-stock-alerts", get(analytics::low_stock_alerts))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
