use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use crate::handlers::user::{
    check_admin_exists, get_me, list_users, login, logout, register_admin,
    register_salesperson, verify_session,
};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/auth/register/admin", post(register_admin))
        .route("/auth/login", post(login))
        .route("/auth/check-admin-exists", get(check_admin_exists));

    let protected = Router::new()
        .route("/auth/register/salesperson", post(register_salesperson))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-session", post(verify_session))
        .route("/auth/me", get(get_me))
        .route("/auth/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    open.merge(protected)
}
