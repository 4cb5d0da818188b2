use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::password::Password;
use crate::auth::tokens::token_digest;
use crate::filters::{calculate_metadata, Filters, Metadata};
use crate::users::error::UserRepoError;
use crate::users::repo::UserRepository;
use crate::users::repo_types::User;

#[derive(Debug, Clone)]
struct TokenBinding {
    hash: [u8; 32],
    scope: String,
    expiry: OffsetDateTime,
    user_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    tokens: Vec<TokenBinding>,
    next_id: i64,
}

/// In-process `UserRepository` with the same uniqueness, version and token
/// semantics as the Postgres one. Stored users keep only the password hash.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a token binding, standing in for the external token store.
    pub async fn bind_token(
        &self,
        plaintext: &str,
        scope: &str,
        expiry: OffsetDateTime,
        user_id: i64,
    ) {
        self.inner.write().await.tokens.push(TokenBinding {
            hash: token_digest(plaintext),
            scope: scope.to_string(),
            expiry,
            user_id,
        });
    }
}

fn stored_copy(user: &User) -> User {
    User {
        password: Password::from_hash(user.password.persisted_hash().to_vec()),
        ..user.clone()
    }
}

fn compare(column: &str, a: &User, b: &User) -> Ordering {
    match column {
        "name" => a.name.cmp(&b.name),
        "email" => a.email.cmp(&b.email),
        "created_at" => a.created_at.cmp(&b.created_at),
        _ => a.id.cmp(&b.id),
    }
}

fn name_matches(query: &str, name: &str) -> bool {
    let words: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .all(|term| words.contains(&term))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &mut User) -> Result<(), UserRepoError> {
        // Panics without a hash, before any uniqueness check.
        user.password.persisted_hash();

        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(UserRepoError::DuplicateEmail);
        }

        inner.next_id += 1;
        user.id = inner.next_id;
        user.created_at = OffsetDateTime::now_utc();
        user.version = 1;
        inner.users.insert(user.id, stored_copy(user));
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, UserRepoError> {
        let inner = self.inner.read().await;
        inner
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(UserRepoError::RecordNotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), UserRepoError> {
        user.password.persisted_hash();

        let mut inner = self.inner.write().await;
        let current = match inner.users.get(&user.id) {
            Some(stored) if stored.version == user.version => stored.version,
            _ => return Err(UserRepoError::EditConflict),
        };
        if inner
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(UserRepoError::DuplicateEmail);
        }

        user.version = current + 1;
        let mut stored = stored_copy(user);
        if let Some(existing) = inner.users.get(&user.id) {
            stored.created_at = existing.created_at;
        }
        inner.users.insert(user.id, stored);
        Ok(())
    }

    async fn get_for_token(&self, scope: &str, plaintext: &str) -> Result<User, UserRepoError> {
        let digest = token_digest(plaintext);
        let now = OffsetDateTime::now_utc();

        let inner = self.inner.read().await;
        inner
            .tokens
            .iter()
            .find(|t| t.hash == digest && t.scope == scope && t.expiry > now)
            .and_then(|t| inner.users.get(&t.user_id))
            .cloned()
            .ok_or(UserRepoError::RecordNotFound)
    }

    async fn list(
        &self,
        name: &str,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), UserRepoError> {
        let column = filters.sort_column();
        let descending = filters.sort_direction() == "DESC";

        let inner = self.inner.read().await;
        let mut matched: Vec<User> = inner
            .users
            .values()
            .filter(|u| name.is_empty() || name_matches(name, &u.name))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let primary = compare(column, a, b);
            let primary = if descending { primary.reverse() } else { primary };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let page: Vec<User> = matched
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();

        let metadata = if page.is_empty() {
            // Mirrors count(*) OVER(): a page past the end carries no total.
            Metadata::default()
        } else {
            calculate_metadata(total, filters.page, filters.page_size)
        };
        Ok((page, metadata))
    }
}
