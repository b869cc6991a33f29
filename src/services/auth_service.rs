//! Email/password accounts with server-side sessions.
//!
//! A session is a row in `sessions` plus an HS256 JWT carrying its id. The
//! token is only honoured while the row exists and has not expired, so
//! signing out revokes it immediately.

use chrono::Duration;
use sqlx::SqlitePool;
use tracing::{info, warn};
use validator::Validate;

use crate::dto::{
    account_dto::AccountResponse,
    auth_dto::{SessionResponse, SignInPayload, SignUpPayload},
};
use crate::error::{Error, Result};
use crate::middleware::auth::{Claims, JwtKeys};
use crate::models::account::{Account, Session};
use crate::utils::{
    crypto::{hash_password, verify_password},
    time::now,
    token::{generate_account_id, generate_session_id},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    keys: JwtKeys,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(pool: SqlitePool, keys: JwtKeys, session_ttl: Duration) -> Self {
        Self {
            pool,
            keys,
            session_ttl,
        }
    }

    pub async fn sign_up(&self, mut payload: SignUpPayload) -> Result<SessionResponse> {
        payload.email = normalize_email(&payload.email);
        payload.validate()?;
        let password_hash = hash_blocking(payload.password).await?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, name, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(generate_account_id())
        .bind(&payload.email)
        .bind(payload.name.trim())
        .bind(&password_hash)
        .bind(now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict("Email is already registered".to_string()),
            other => other,
        })?;

        info!(account_id = %account.id, "Account created");
        self.start_session(account).await
    }

    pub async fn sign_in(&self, mut payload: SignInPayload) -> Result<SessionResponse> {
        payload.email = normalize_email(&payload.email);
        payload.validate()?;

        let Some(account) = self.find_account_by_email(&payload.email).await? else {
            warn!("Sign-in for unknown email");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_blocking(payload.password, account.password_hash.clone()).await? {
            warn!(account_id = %account.id, "Sign-in with wrong password");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        self.start_session(account).await
    }

    /// Deletes the session row; the bearer token stops working at once.
    pub async fn sign_out(&self, claims: &Claims) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&claims.sid)
            .execute(&self.pool)
            .await?;
        info!(account_id = %claims.sub, "Session ended");
        Ok(())
    }

    /// Validates a bearer token against its signature, expiry and session row.
    pub async fn authenticate(&self, token: &str) -> Result<Claims> {
        let claims = self.keys.decode(token)?;

        let session = sqlx::query_as::<_, Session>(
            r#"SELECT id, account_id, expires_at, created_at FROM sessions WHERE id = ?1"#,
        )
        .bind(&claims.sid)
        .fetch_optional(&self.pool)
        .await?;

        match session {
            Some(session) if session.account_id == claims.sub && !session.is_expired_at(now()) => {
                Ok(claims)
            }
            _ => Err(Error::Unauthorized("invalid_token".to_string())),
        }
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"SELECT id, email, name, password_hash, created_at FROM accounts WHERE id = ?1"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Account not found".to_string()))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            r#"SELECT id, email, name, password_hash, created_at FROM accounts WHERE email = ?1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn start_session(&self, account: Account) -> Result<SessionResponse> {
        let created_at = now();
        let expires_at = created_at + self.session_ttl;

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, account_id, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, account_id, expires_at, created_at
            "#,
        )
        .bind(generate_session_id())
        .bind(&account.id)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        let token = self.keys.issue(&Claims {
            sub: account.id.clone(),
            sid: session.id,
            iat: created_at.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        })?;

        Ok(SessionResponse {
            token,
            expires_at,
            user: AccountResponse::from(account),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("Stored password hash is invalid: {}", e)))
}
