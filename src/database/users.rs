use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use super::models::User;
use super::{is_unique_violation, StoreError};

/// Errors from credential verification
#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately identical for an unknown username and a wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(StoreError::Sqlx(err))
    }
}

const USER_COLUMNS: &str = "id, username, email, hashed_password, is_admin";

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, StoreError> {
        // bcrypt is CPU-bound; keep it off the async executor
        let password = password.to_string();
        let hashed = tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
            .await
            .map_err(|e| StoreError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| StoreError::Internal(format!("password hashing failed: {e}")))?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, hashed_password) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(&hashed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!("Registration conflict for username {:?}", username);
                StoreError::Conflict("username or email already registered".to_string())
            } else {
                StoreError::from(e)
            }
        })?;

        info!("User {} registered", user.id);
        Ok(user)
    }

    /// Verify a username/password pair. The failure mode never reveals
    /// whether the username exists.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(user) = user else {
            warn!("Login attempt for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let hashed = user.hashed_password.clone();
        let password_ok = tokio::task::spawn_blocking(move || verify(&password, &hashed).unwrap_or(false))
            .await
            .unwrap_or(false);

        if !password_ok {
            warn!("Failed login attempt for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {} not found", user_id)))
    }
}
