use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::Password;

/// Sort values accepted by the users list query.
pub const USER_SORT_SAFELIST: &[&str] = &[
    "id",
    "name",
    "email",
    "created_at",
    "-id",
    "-name",
    "-email",
    "-created_at",
];

/// User record. `id`, `created_at` and `version` are assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl User {
    /// A not-yet-persisted user with no credential.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            name: name.into(),
            email: email.into(),
            password: Password::default(),
            activated: false,
            version: 0,
        }
    }
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            name: r.name,
            email: r.email,
            password: Password::from_hash(r.password_hash),
            activated: r.activated,
            version: r.version,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ListedUserRow {
    pub total_records: i64,
    #[sqlx(flatten)]
    pub user: UserRow,
}
