use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use crate::handlers::sale;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/sales", get(sale::list_sales).post(sale::create_sale))
        .route("/sales/weekly", get(sale::weekly_sales))
        .route("/sales/daily", get(sale::daily_sales))
        .route("/sales/{id}", get(sale::get_sale).delete(sale::delete_sale))
        .route("/sales/{id}/mark-paid", post(sale::mark_paid))
        .route("/sales/{id}/mark-unpaid", post(sale::mark_unpaid))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
