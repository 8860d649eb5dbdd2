//! # Accounts
//!
//! Registration, login and password change.
//!
//! Credentials are stored as a salted SHA-256 hash with a fresh random salt
//! per password. Access tokens are signed blobs
//! `<account_id>.<role>.<expiry>.<signature>` where the signature covers the
//! payload plus the server secret; they expire after 14 days. Nothing about
//! a token is stored server side.
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{error::AppError, state::AppState, store::conflict_on, validate::is_provided};

const TOKEN_LIFETIME_DAYS: i64 = 14;

#[derive(Deserialize)]
pub struct RegisterBody {
    firstname: Option<String>,
    lastname: Option<String>,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    email: Option<String>,
    #[serde(rename = "oldPassword")]
    old_password: Option<String>,
    #[serde(rename = "newPassword")]
    new_password: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    account_id: i64,
    firstname: String,
    email: String,
    account_role: i32,
    salted_hash: String,
    salt: String,
}

pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());

    format!("{:x}", hasher.finalize())
}

fn sign(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(payload.as_bytes());

    format!("{:x}", hasher.finalize())
}

pub fn issue_token(secret: &str, account_id: i64, role: i32) -> String {
    let expires = (Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp();
    let payload = format!("{account_id}.{role}.{expires}");
    let signature = sign(secret, &payload);

    format!("{payload}.{signature}")
}

/// Returns the `(account_id, role)` the token was issued for, or `None` if
/// the token is malformed, tampered with, or expired.
pub fn verify_token(secret: &str, token: &str) -> Option<(i64, i32)> {
    let (payload, signature) = token.rsplit_once('.')?;

    if sign(secret, payload) != signature {
        return None;
    }

    let mut parts = payload.split('.');
    let account_id: i64 = parts.next()?.parse().ok()?;
    let role: i32 = parts.next()?.parse().ok()?;
    let expires: i64 = parts.next()?.parse().ok()?;

    if parts.next().is_some() || expires < Utc::now().timestamp() {
        return None;
    }

    Some((account_id, role))
}

// Password rules mirror what clients validate against: at least 10 chars of
// [A-Za-z0-9!] with one lowercase, one uppercase, one digit, one '!', and
// no character repeated three or more times in a row.
fn is_valid_password(password: &str) -> bool {
    let trimmed = password.trim();

    if trimmed.len() < 10 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '!') {
        return false;
    }

    if !trimmed.chars().any(|c| c.is_ascii_lowercase())
        || !trimmed.chars().any(|c| c.is_ascii_uppercase())
        || !trimmed.chars().any(|c| c.is_ascii_digit())
        || !trimmed.contains('!')
    {
        return false;
    }

    let chars: Vec<char> = trimmed.chars().collect();
    !chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap().is_match(email)
}

// NANP: optional +1, area and exchange codes starting 2-9, common separator
// styles, and a non-zero serial.
fn is_valid_phone(phone: &str) -> bool {
    let trimmed = phone.trim();

    let format =
        Regex::new(r"^(?:\+1[-.\s]?)?\(?([2-9][0-9]{2})\)?[-.\s]?([2-9][0-9]{2})[-.\s]?(\d{4})$")
            .unwrap();
    if !format.is_match(trimmed) {
        return false;
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if digits.len() == 11 && digits.starts_with('1') {
        &digits[1..]
    } else {
        &digits[..]
    };

    normalized.len() == 10 && &normalized[6..] != "0000"
}

fn parse_role(role: Option<&String>) -> Option<i32> {
    role.and_then(|s| s.parse::<i32>().ok())
        .filter(|r| (1..=5).contains(r))
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> Result<Response, AppError> {
    if !body.email.as_deref().is_some_and(is_valid_email) {
        return Err(AppError::Validation(
            "Invalid or missing email - please refer to documentation".to_string(),
        ));
    }
    if !body.phone.as_deref().is_some_and(is_valid_phone) {
        return Err(AppError::Validation(
            "Invalid or missing phone number - please refer to documentation".to_string(),
        ));
    }
    if !body.password.as_deref().is_some_and(is_valid_password) {
        return Err(AppError::Validation(
            "Invalid or missing password - must be at least 10 characters, include one uppercase, \
            one lowercase, one digit, and one !, with no 3+ repeated characters"
                .to_string(),
        ));
    }
    let Some(role) = parse_role(body.role.as_ref()) else {
        return Err(AppError::Validation(
            "Invalid or missing role - must be a number between 1 and 5".to_string(),
        ));
    };
    if !is_provided(body.firstname.as_ref())
        || !is_provided(body.lastname.as_ref())
        || !is_provided(body.username.as_ref())
    {
        return Err(AppError::Validation(
            "Missing required information".to_string(),
        ));
    }

    let firstname = body.firstname.unwrap_or_default();
    let email = body.email.unwrap_or_default();

    // Account row and credential row land together or not at all.
    let mut tx = state.pool.begin().await?;

    let account_id: i64 = sqlx::query_scalar(
        "INSERT INTO account (firstname, lastname, username, email, phone, account_role) \
        VALUES ($1, $2, $3, $4, $5, $6) \
        RETURNING account_id",
    )
    .bind(&firstname)
    .bind(body.lastname.unwrap_or_default())
    .bind(body.username.unwrap_or_default())
    .bind(&email)
    .bind(body.phone.unwrap_or_default())
    .bind(role)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_account_conflict)?;

    let salt = generate_salt();
    let salted_hash = hash_password(&body.password.unwrap_or_default(), &salt);

    sqlx::query("INSERT INTO account_credential (account_id, salted_hash, salt) VALUES ($1, $2, $3)")
        .bind(account_id)
        .bind(salted_hash)
        .bind(salt)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let access_token = issue_token(&state.config.token_secret, account_id, role);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "accessToken": access_token,
            "user": {
                "id": account_id,
                "name": firstname,
                "email": email,
                "role": role,
            }
        })),
    )
        .into_response())
}

fn map_account_conflict(err: sqlx::Error) -> AppError {
    let err = conflict_on(err, "account_username_key", "Username exists");
    let AppError::Database(err) = err else {
        return err;
    };

    let err = conflict_on(err, "account_email_key", "Email exists");
    let AppError::Database(err) = err else {
        return err;
    };

    conflict_on(err, "account_phone_key", "Duplicate phone number not allowed")
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> Result<Response, AppError> {
    if !is_provided(body.email.as_ref()) || !is_provided(body.password.as_ref()) {
        return Err(AppError::Validation(
            "Missing required information".to_string(),
        ));
    }

    let Some(row) = fetch_credential(&state, body.email.as_deref().unwrap_or_default()).await?
    else {
        return Err(AppError::Validation("User not found".to_string()));
    };

    let attempted = hash_password(body.password.as_deref().unwrap_or_default(), &row.salt);
    if attempted != row.salted_hash {
        return Err(AppError::Validation(
            "Credentials did not match".to_string(),
        ));
    }

    let access_token = issue_token(&state.config.token_secret, row.account_id, row.account_role);

    Ok(Json(json!({
        "accessToken": access_token,
        "user": {
            "id": row.account_id,
            "name": row.firstname,
            "email": row.email,
            "role": row.account_role,
        }
    }))
    .into_response())
}

pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Response, AppError> {
    if !is_provided(body.email.as_ref())
        || !is_provided(body.old_password.as_ref())
        || !is_provided(body.new_password.as_ref())
    {
        return Err(AppError::Validation(
            "Missing required information".to_string(),
        ));
    }

    let Some(row) = fetch_credential(&state, body.email.as_deref().unwrap_or_default()).await?
    else {
        return Err(AppError::Validation("User not found".to_string()));
    };

    let attempted = hash_password(body.old_password.as_deref().unwrap_or_default(), &row.salt);
    if attempted != row.salted_hash {
        return Err(AppError::Validation(
            "Old password does not match".to_string(),
        ));
    }

    let new_salt = generate_salt();
    let new_hash = hash_password(body.new_password.as_deref().unwrap_or_default(), &new_salt);

    sqlx::query("UPDATE account_credential SET salted_hash = $1, salt = $2 WHERE account_id = $3")
        .bind(new_hash)
        .bind(new_salt)
        .bind(row.account_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(json!({ "message": "Password updated successfully" })).into_response())
}

async fn fetch_credential(
    state: &AppState,
    email: &str,
) -> Result<Option<CredentialRow>, AppError> {
    let row = sqlx::query_as(
        "SELECT a.account_id, a.firstname, a.email, a.account_role, c.salted_hash, c.salt \
        FROM account_credential c \
        INNER JOIN account a ON a.account_id = c.account_id \
        WHERE a.email = $1",
    )
    .bind(email)
    .fetch_optional(&state.pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_per_salt() {
        let salt = "0123456789abcdef";

        assert_eq!(
            hash_password("Correct1horse!", salt),
            hash_password("Correct1horse!", salt)
        );
        assert_ne!(
            hash_password("Correct1horse!", salt),
            hash_password("Correct1horse!", "another salt")
        );
        assert_ne!(
            hash_password("Correct1horse!", salt),
            hash_password("correct1horse!", salt)
        );
    }

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("secret", 42, 3);

        assert_eq!(verify_token("secret", &token), Some((42, 3)));
        assert_eq!(verify_token("other-secret", &token), None);
        assert_eq!(verify_token("secret", &format!("{token}x")), None);
        assert_eq!(verify_token("secret", "not.a.token"), None);
    }

    #[test]
    fn test_password_rules() {
        assert!(is_valid_password("Abcdefgh1!"));
        assert!(is_valid_password("  Abcdefgh1!  "));

        assert!(!is_valid_password("Abcdef1!")); // too short
        assert!(!is_valid_password("abcdefgh1!")); // no uppercase
        assert!(!is_valid_password("ABCDEFGH1!")); // no lowercase
        assert!(!is_valid_password("Abcdefghi!")); // no digit
        assert!(!is_valid_password("Abcdefgh12")); // no '!'
        assert!(!is_valid_password("Abcdddefg1!")); // 3 repeats in a row
        assert!(!is_valid_password("Abcdefgh1!#")); // disallowed symbol
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("testuser@example.com"));
        assert!(!is_valid_email("testuser@example"));
        assert!(!is_valid_email("test user@example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("(555) 555-5555"));
        assert!(is_valid_phone("555-555-5555"));
        assert!(is_valid_phone("+1 555 555 5555"));
        assert!(is_valid_phone("5555555555"));

        assert!(!is_valid_phone("123-555-5555")); // area code starts with 1
        assert!(!is_valid_phone("555-555-0000")); // zero serial
        assert!(!is_valid_phone("555-5555"));
        assert!(!is_valid_phone("phone"));
    }

    #[test]
    fn test_role_bounds() {
        assert_eq!(parse_role(Some(&"1".to_string())), Some(1));
        assert_eq!(parse_role(Some(&"5".to_string())), Some(5));
        assert_eq!(parse_role(Some(&"0".to_string())), None);
        assert_eq!(parse_role(Some(&"6".to_string())), None);
        assert_eq!(parse_role(Some(&"admin".to_string())), None);
        assert_eq!(parse_role(None), None);
    }
}
