use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::password::CredentialError;
use crate::users::error::UserRepoError;

/// Handler error type; maps repository outcomes onto HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidToken,
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Repo(UserRepoError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<UserRepoError> for ApiError {
    fn from(e: UserRepoError) -> Self {
        match e {
            e if e.is_operational() => Self::Repo(e),
            UserRepoError::DuplicateEmail => Self::DuplicateEmail,
            UserRepoError::RecordNotFound => Self::NotFound,
            UserRepoError::EditConflict => Self::EditConflict,
            other => Self::Repo(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": errors }))
            }
            ApiError::DuplicateEmail => (
                StatusCode::CONFLICT,
                json!({ "error": { "email": self.to_string() } }),
            ),
            ApiError::InvalidCredentials | ApiError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() }))
            }
            ApiError::InactiveAccount => {
                (StatusCode::FORBIDDEN, json!({ "error": self.to_string() }))
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            ApiError::EditConflict => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            ApiError::Repo(e) => {
                tracing::error!(error = %e, "user store error");
                internal()
            }
            ApiError::Credential(e) => {
                tracing::error!(error = %e, "credential error");
                internal()
            }
        };

        let mut res = (status, axum::Json(body)).into_response();
        if matches!(self, ApiError::InvalidToken) {
            res.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        res
    }
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "the server encountered a problem and could not process your request" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn repo_errors_map_to_statuses() {
        let cases = [
            (UserRepoError::DuplicateEmail, StatusCode::CONFLICT),
            (UserRepoError::RecordNotFound, StatusCode::NOT_FOUND),
            (UserRepoError::EditConflict, StatusCode::CONFLICT),
            (
                UserRepoError::Timeout(Duration::from_secs(3)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                UserRepoError::Store(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn invalid_token_sets_challenge_header() {
        let res = ApiError::InvalidToken.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[axum::http::header::WWW_AUTHENTICATE], "Bearer");

        let res = ApiError::InvalidCredentials.into_response();
        assert!(res.headers().get(axum::http::header::WWW_AUTHENTICATE).is_none());
    }
}
