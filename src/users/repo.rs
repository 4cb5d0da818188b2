use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::auth::tokens::token_digest;
use crate::filters::{calculate_metadata, Filters, Metadata};
use crate::users::error::UserRepoError;
use crate::users::repo_types::{ListedUserRow, User, UserRow};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Persistence for user records.
///
/// Implementations enforce email uniqueness and apply updates only when the
/// stored `version` equals the caller's copy.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Stores a new user and fills in `id`, `created_at` and `version`.
    ///
    /// Panics if the user's credential has no hash.
    async fn insert(&self, user: &mut User) -> Result<(), UserRepoError>;

    async fn get_by_email(&self, email: &str) -> Result<User, UserRepoError>;

    /// Writes the mutable fields if `(id, version)` still matches, bumping
    /// `user.version` on success. Zero matched rows is `EditConflict`.
    async fn update(&self, user: &mut User) -> Result<(), UserRepoError>;

    /// Resolves the owner of an unexpired token of the given scope. Unknown,
    /// expired and wrong-scope tokens all yield `RecordNotFound`.
    async fn get_for_token(&self, scope: &str, plaintext: &str) -> Result<User, UserRepoError>;

    /// A page of users whose name matches `name` (empty matches all).
    /// `filters` must already have passed `validate_filters`.
    async fn list(
        &self,
        name: &str,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), UserRepoError>;
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one store call, dropping (and so cancelling) it once the timeout
    /// elapses.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, UserRepoError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(UserRepoError::from),
            Err(_) => {
                warn!(op, timeout = ?self.timeout, "user store call timed out");
                Err(UserRepoError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &mut User) -> Result<(), UserRepoError> {
        let hash = user.password.persisted_hash();

        let (id, created_at, version) = self
            .bounded(
                "insert",
                sqlx::query_as::<_, (i64, OffsetDateTime, i32)>(
                    r#"
                    INSERT INTO users (name, email, password_hash, activated)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, created_at, version
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(hash)
                .bind(user.activated)
                .fetch_one(&self.pool),
            )
            .await?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        debug!(user_id = id, "user inserted");
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, UserRepoError> {
        let row = self
            .bounded(
                "get_by_email",
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, created_at, name, email, password_hash, activated, version
                    FROM users
                    WHERE email = $1
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(User::from).ok_or(UserRepoError::RecordNotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), UserRepoError> {
        let hash = user.password.persisted_hash();

        let version = self
            .bounded(
                "update",
                sqlx::query_scalar::<_, i32>(
                    r#"
                    UPDATE users
                    SET name = $1, email = $2, password_hash = $3, activated = $4,
                        version = version + 1
                    WHERE id = $5 AND version = $6
                    RETURNING version
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(hash)
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_optional(&self.pool),
            )
            .await?;

        match version {
            Some(v) => {
                user.version = v;
                debug!(user_id = user.id, version = v, "user updated");
                Ok(())
            }
            None => {
                debug!(user_id = user.id, version = user.version, "user update conflict");
                Err(UserRepoError::EditConflict)
            }
        }
    }

    async fn get_for_token(&self, scope: &str, plaintext: &str) -> Result<User, UserRepoError> {
        let digest = token_digest(plaintext);

        let row = self
            .bounded(
                "get_for_token",
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT users.id, users.created_at, users.name, users.email,
                           users.password_hash, users.activated, users.version
                    FROM users
                    INNER JOIN tokens ON users.id = tokens.user_id
                    WHERE tokens.hash = $1
                      AND tokens.scope = $2
                      AND tokens.expiry > $3
                    "#,
                )
                .bind(&digest[..])
                .bind(scope)
                .bind(OffsetDateTime::now_utc())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(User::from).ok_or(UserRepoError::RecordNotFound)
    }

    async fn list(
        &self,
        name: &str,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), UserRepoError> {
        // Both fragments are static strings from the safelist.
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records,
                   id, created_at, name, email, password_hash, activated, version
            FROM users
            WHERE (to_tsvector('simple', name) @@ plainto_tsquery('simple', $1) OR $1 = '')
            ORDER BY {} {}, id ASC
            LIMIT $2 OFFSET $3
            "#,
            filters.sort_column(),
            filters.sort_direction(),
        );

        let rows = self
            .bounded(
                "list",
                sqlx::query_as::<_, ListedUserRow>(&query)
                    .bind(name)
                    .bind(filters.limit())
                    .bind(filters.offset())
                    .fetch_all(&self.pool),
            )
            .await?;

        let total = rows.first().map(|r| r.total_records).unwrap_or(0);
        let users = rows.into_iter().map(|r| User::from(r.user)).collect();
        Ok((users, calculate_metadata(total, filters.page, filters.page_size)))
    }
}
