pub mod analytics;
pub mod auth;
pub mod reports;
pub mod sales;
pub mod stock;

use axum::Router;
use crate::state::AppState;

/// Every `/api` route. Protected routers take the state for their auth layer.
pub fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(stock::routes(state))
        .merge(sales::routes(state))
        .merge(analytics::routes(state))
        .merge(reports::routes(state))
        .merge(auth::routes(state))
}
