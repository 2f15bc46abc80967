//! Two-role accounts and opaque session tokens.
//!
//! Passwords are bcrypt hashes. A successful login stores a session row keyed
//! by a random token; every authenticated request looks the token up again
//! and compares its expiry against the current time. Nothing sweeps expired
//! sessions in the background.

pub mod password;
pub mod session;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::user::{Role, Session, User};
use crate::state::AppState;
use crate::store::NewUser;

const MAX_USERNAME_LEN: usize = 80;
const MAX_FULL_NAME_LEN: usize = 100;

/// Registration form as submitted, before hashing.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl Registration {
    fn into_new_user(self, password_hash: String, role: Role, created_by: Option<i64>) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            full_name: self.full_name.trim().to_string(),
            password_hash,
            role,
            created_by,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let username = self.username.trim();
        let email = self.email.trim();
        let full_name = self.full_name.trim();
        if username.is_empty() || email.is_empty() || self.password.is_empty() || full_name.is_empty() {
            return Err(AppError::validation(
                "username, email, password and full_name are required",
            ));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(AppError::validation(format!(
                "Username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }
        if full_name.chars().count() > MAX_FULL_NAME_LEN {
            return Err(AppError::validation(format!(
                "Full name must be at most {MAX_FULL_NAME_LEN} characters"
            )));
        }
        password::validate_email(email)?;
        password::validate_password(&self.password)
    }
}

async fn register(
    state: &AppState,
    registration: Registration,
    role: Role,
    created_by: Option<i64>,
) -> Result<User, AppError> {
    registration.validate()?;
    let hash = password::hash_password(registration.password.clone(), state.config.bcrypt_cost).await?;
    let user = state
        .accounts
        .create_user(registration.into_new_user(hash, role, created_by))
        .await?;
    info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
    Ok(user)
}

/// First-run registration. Refused once any admin exists.
pub async fn register_admin(state: &AppState, registration: Registration) -> Result<User, AppError> {
    if state.accounts.admin_exists().await? {
        return Err(AppError::conflict(
            "Admin already exists. Only one admin registration allowed.",
        ));
    }
    register(state, registration, Role::Admin, None).await
}

pub async fn register_salesperson(
    state: &AppState,
    admin: &AuthContext,
    registration: Registration,
) -> Result<User, AppError> {
    admin.require_admin()?;
    register(state, registration, Role::Salesperson, Some(admin.user_id)).await
}

/// Checks credentials and opens a session. Returns the user as of this login.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<(Session, User), AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::validation("Username and password required"));
    }

    let Some(mut user) = state.accounts.find_user_by_username(username).await? else {
        warn!(%username, "login for unknown user");
        return Err(AppError::unauthorized("Invalid username or password"));
    };
    if !password::verify_password(password.to_string(), user.password_hash.clone()).await? {
        warn!(%username, "login with wrong password");
        return Err(AppError::unauthorized("Invalid username or password"));
    }
    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    let now = Utc::now();
    let session = session::new_session(user.id, now, state.config.session_ttl);
    state.accounts.insert_session(session.clone()).await?;
    state.accounts.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);

    info!(user_id = user.id, "session opened");
    Ok((session, user))
}

/// Deactivates the session. Unknown tokens are ignored.
pub async fn logout(state: &AppState, token: &str) -> Result<(), AppError> {
    if !state.accounts.deactivate_session(token).await? {
        warn!("logout with unknown session token");
    }
    Ok(())
}

/// Resolves a bearer token to the active user behind it.
pub async fn authenticate(state: &AppState, token: &str) -> Result<(AuthContext, User), AppError> {
    authenticate_at(state, token, Utc::now()).await
}

async fn authenticate_at(
    state: &AppState,
    token: &str,
    now: DateTime<Utc>,
) -> Result<(AuthContext, User), AppError> {
    let session = state
        .accounts
        .find_session(token)
        .await?
        .filter(|session| session.is_valid_at(now))
        .ok_or_else(|| AppError::unauthorized("Invalid or expired session"))?;

    let user = state
        .accounts
        .get_user(session.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::unauthorized("User not found or deactivated"))?;

    let context = AuthContext {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
        token: session.token,
    };
    Ok((context, user))
}
