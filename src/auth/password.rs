use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() > 120 || !EMAIL_PATTERN.is_match(email) {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(())
}

/// At least six characters with one letter and one digit.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 6 {
        return Err(AppError::validation("Password must be at least 6 characters long"));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation("Password must contain at least one letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("Password must contain at least one number"));
    }
    Ok(())
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::internal(format!("Hash task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::internal(format!("Verify task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(validate_password("abc12").is_err());
        assert!(validate_password("abcdefg").is_err());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("secret1").is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("owner@shop.in").is_ok());
        assert!(validate_email("first.last+tag@mail.example.com").is_ok());
        assert!(validate_email("owner@shop").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("secret1".into(), 4).await.unwrap();
        assert!(verify_password("secret1".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("secret2".into(), hash).await.unwrap());
    }
}
