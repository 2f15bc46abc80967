use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::instrument;

use crate::auth;
use crate::dtos::user::{
    AdminExistsResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    UserResponse, UsersResponse, VerifySessionResponse,
};
use crate::dtos::MessageResponse;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::middleware::auth::AuthContext;
use crate::models::user::User;
use crate::state::AppState;

async fn current_user(state: &AppState, auth: &AuthContext) -> Result<User, AppError> {
    state
        .accounts
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found or deactivated"))
}

#[instrument(skip(state, payload))]
pub async fn register_admin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = auth::register_admin(&state, payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Admin registered successfully",
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, auth, payload), fields(user = %auth.username))]
pub async fn register_salesperson(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = auth::register_salesperson(&state, &auth, payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Salesperson registered successfully",
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (session, user) = auth::login(&state, &payload.username, &payload.password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        user: user.into(),
        session_token: session.token,
        token_type: "Bearer",
        expires_at: session.expires_at,
    }))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MessageResponse>, AppError> {
    auth::logout(&state, &auth.token).await?;
    Ok(Json(MessageResponse {
        message: "Logout successful",
    }))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn verify_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<VerifySessionResponse>, AppError> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(VerifySessionResponse {
        valid: true,
        user: user.into(),
    }))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(current_user(&state, &auth).await?.into()))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UsersResponse>, AppError> {
    auth.require_admin()?;
    let users = state.accounts.list_users().await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn check_admin_exists(
    State(state): State<AppState>,
) -> Result<Json<AdminExistsResponse>, AppError> {
    Ok(Json(AdminExistsResponse {
        admin_exists: state.accounts.admin_exists().await?,
    }))
}
