use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::{Administrator, Participant};
use crate::storage::Storage;

const HASH_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;

/// Claims carried by access and refresh tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Participant public id or administrator id
    pub sub: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: usize,
}

/// Hashes a password with a random salt. Output format is
/// `salt_hex$digest_hex`, with the digest produced by iterated SHA-256.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest_with_salt(password, &salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    hex::encode(digest_with_salt(password, &salt)) == digest_hex
}

fn digest_with_salt(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    };
    for _ in 1..HASH_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(&out);
        out = hasher.finalize().to_vec();
    }
    out
}

/// Access token with the minute-scale expiry window
pub fn create_access_token(settings: &Settings, sub: &str, is_admin: bool) -> Result<String> {
    create_token(
        settings,
        sub,
        is_admin,
        Duration::minutes(settings.access_token_expire_minutes),
    )
}

/// Refresh token with the day-scale expiry window
pub fn create_refresh_token(settings: &Settings, sub: &str, is_admin: bool) -> Result<String> {
    create_token(
        settings,
        sub,
        is_admin,
        Duration::days(settings.refresh_token_expire_days),
    )
}

fn create_token(
    settings: &Settings,
    sub: &str,
    is_admin: bool,
    lifetime: Duration,
) -> Result<String> {
    let exp = (Utc::now() + lifetime).timestamp().max(0) as usize;
    let claims = Claims {
        sub: sub.to_string(),
        is_admin,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.secret_key.as_bytes()),
    )
    .map_err(|e| AppError::Token(e.to_string()))
}

pub fn decode_token(settings: &Settings, token: &str) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Could not validate credentials.".to_string()))
}

/// The authenticated caller behind a bearer token
#[derive(Debug, Clone)]
pub enum CurrentUser {
    Participant(Participant),
    Administrator(Administrator),
}

impl CurrentUser {
    pub fn require_participant(self) -> Result<Participant> {
        match self {
            CurrentUser::Participant(participant) => Ok(participant),
            CurrentUser::Administrator(_) => Err(AppError::Forbidden(
                "This action requires a participant account.".to_string(),
            )),
        }
    }

    pub fn require_administrator(self) -> Result<Administrator> {
        match self {
            CurrentUser::Administrator(administrator) => Ok(administrator),
            CurrentUser::Participant(_) => Err(AppError::Forbidden(
                "This action requires administrator privileges.".to_string(),
            )),
        }
    }
}

/// Resolves a bearer token to the participant or administrator it names
pub async fn current_user(
    storage: &Arc<dyn Storage>,
    settings: &Settings,
    token: &str,
) -> Result<CurrentUser> {
    let claims = decode_token(settings, token)?;
    let unauthorized = || AppError::Unauthorized("Could not validate credentials.".to_string());

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| unauthorized())?;

    if claims.is_admin {
        let administrator = storage
            .get_administrator_by_id(user_id)
            .await?
            .ok_or_else(unauthorized)?;
        return Ok(CurrentUser::Administrator(administrator));
    }

    let participant = storage
        .get_participant_by_public_id(user_id)
        .await?
        .ok_or_else(unauthorized)?;
    Ok(CurrentUser::Participant(participant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let stored = hash_password("Miojo*123");
        assert!(verify_password("Miojo*123", &stored));
        assert!(!verify_password("miojo*123", &stored));
    }

    #[test]
    fn distinct_salts_for_equal_passwords() {
        assert_ne!(hash_password("Miojo*123"), hash_password("Miojo*123"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("Miojo*123", "not-a-hash"));
        assert!(!verify_password("Miojo*123", "zzzz$abcd"));
    }
}
