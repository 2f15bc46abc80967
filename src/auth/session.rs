use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::models::user::Session;

const TOKEN_BYTES: usize = 32;

/// 32 random bytes, URL-safe base64 without padding (43 characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn new_session(user_id: i64, now: DateTime<Utc>, ttl: Duration) -> Session {
    Session {
        token: generate_token(),
        user_id,
        created_at: now,
        expires_at: now + ttl,
        is_active: true,
    }
}
