use axum::{middleware, routing::get, Router};
use crate::handlers::stock::{
    add_stock, delete_stock, get_stock, list_stock, search_stock, update_stock,
};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(list_stock).post(add_stock))
        .route("/stock/search", get(search_stock))
        .route("/stock/{id}", get(get_stock).put(update_stock).delete(delete_stock))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
