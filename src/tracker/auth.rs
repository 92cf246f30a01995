//! Password hashing, bearer tokens and the auth middleware.
//!
//! Passwords are bcrypt hashes. Tokens are `<user_id>.<hex(hmac_sha256(secret, user_id))>`:
//! stable per user and verifiable without a session table. Rotating the secret
//! revokes every token.

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::api::{ApiError, SharedState};
use super::models::Role;
use crate::errors::TrackerError;

type HmacSha256 = Hmac<Sha256>;

#[cfg(not(test))]
const PASSWORD_COST: u32 = 10;
#[cfg(test)]
const PASSWORD_COST: u32 = 4;

/// The authenticated caller, attached to each protected request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, PASSWORD_COST).context("Failed to hash password")
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// Hash on the blocking pool; bcrypt is CPU-bound.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password_blocking(password: String, stored: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .unwrap_or(false)
}

fn token_mac(secret: &str, user_id: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid token secret: {}", e))?;
    mac.update(user_id.to_string().as_bytes());
    Ok(mac)
}

pub fn issue_token(secret: &str, user_id: i64) -> Result<String> {
    let signature = token_mac(secret, user_id)?.finalize().into_bytes();
    Ok(format!("{}.{}", user_id, hex::encode(signature)))
}

/// Return the user id a token was issued for, if its signature checks out.
/// The signature comparison is constant-time.
pub fn verify_token(secret: &str, token: &str) -> Option<i64> {
    let (id, signature) = token.split_once('.')?;
    let user_id: i64 = id.parse().ok()?;
    let signature = hex::decode(signature).ok()?;
    token_mac(secret, user_id)
        .ok()?
        .verify_slice(&signature)
        .ok()
        .map(|()| user_id)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware guarding every protected route.
///
/// A missing header is a 401; a token that fails verification or names a
/// deleted user is a 403.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(TrackerError::Unauthorized)?;
    let user_id = verify_token(&state.secret, token).ok_or(TrackerError::InvalidToken)?;

    let user = state
        .db
        .call(move |db| db.get_user(user_id))
        .await?
        .ok_or(TrackerError::InvalidToken)?;

    tracing::debug!(user = %user.username, role = %user.role, "authenticated request");
    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
        name: user.name,
        role: user.role,
    });
    Ok(next.run(req).await)
}

impl AuthUser {
    /// Board content may only be changed by admins and managers.
    pub fn require_editor(&self) -> Result<(), TrackerError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(TrackerError::Forbidden("Manager or admin"))
        }
    }

    pub fn require_admin(&self) -> Result<(), TrackerError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(TrackerError::Forbidden("Admin"))
        }
    }
}
