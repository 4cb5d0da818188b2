use std::time::Duration;

/// Unique constraint on `users.email`, as named in the migration. Duplicate
/// email detection compares against this name exactly.
pub const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum UserRepoError {
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("record not found")]
    RecordNotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(sqlx::Error),
}

impl UserRepoError {
    /// Connectivity, timeout or schema failures, as opposed to the outcomes
    /// a caller is expected to branch on.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Store(_))
    }
}

impl From<sqlx::Error> for UserRepoError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.constraint() == Some(USERS_EMAIL_KEY) {
                return Self::DuplicateEmail;
            }
        }
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// Stands in for the driver's unique-violation report.
    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value violates unique constraint \"{constraint}\"")]
    struct UniqueViolation {
        constraint: &'static str,
    }

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn unique_violation(constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
    }

    #[test]
    fn email_constraint_violation_is_duplicate_email() {
        let err = UserRepoError::from(unique_violation("users_email_key"));
        assert!(matches!(err, UserRepoError::DuplicateEmail));
        assert!(!err.is_operational());
    }

    #[test]
    fn other_constraint_names_stay_operational() {
        for name in ["user_email_key", "users_pkey", "USERS_EMAIL_KEY"] {
            let err = UserRepoError::from(unique_violation(name));
            assert!(matches!(err, UserRepoError::Store(_)), "{name}");
            assert!(err.is_operational());
        }
    }

    #[test]
    fn migration_declares_the_email_constraint() {
        let sql = include_str!("../../migrations/20240101000001_create_users.sql");
        assert!(sql.contains(&format!("CONSTRAINT {USERS_EMAIL_KEY} UNIQUE (email)")));
    }

    #[test]
    fn non_database_errors_pass_through() {
        let err = UserRepoError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, UserRepoError::Store(sqlx::Error::PoolTimedOut)));
        assert!(err.is_operational());
    }

    #[test]
    fn row_not_found_is_not_reinterpreted() {
        let err = UserRepoError::from(sqlx::Error::RowNotFound);
        assert!(err.is_operational());
    }

    #[test]
    fn expected_outcomes_are_not_operational() {
        for err in [
            UserRepoError::DuplicateEmail,
            UserRepoError::RecordNotFound,
            UserRepoError::EditConflict,
        ] {
            assert!(!err.is_operational());
        }
        assert!(UserRepoError::Timeout(Duration::from_secs(3)).is_operational());
    }
}
