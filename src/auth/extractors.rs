use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{error, warn};

use super::tokens::{validate_token_plaintext, SCOPE_AUTHENTICATION};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::error::UserRepoError;
use crate::users::repo_types::User;
use crate::validator::Validator;

/// The user owning the request's `Authorization: Bearer <token>`.
pub struct AuthUser(pub User);

/// Like [`AuthUser`], but the account must be activated.
pub struct ActivatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidToken)?;

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token);
        if !v.valid() {
            return Err(ApiError::InvalidToken);
        }

        match state.users.get_for_token(SCOPE_AUTHENTICATION, token).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(UserRepoError::RecordNotFound) => {
                warn!("unknown, expired or wrong-scope token");
                Err(ApiError::InvalidToken)
            }
            Err(e) => {
                error!(error = %e, "token lookup failed");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ActivatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.activated {
            return Err(ApiError::InactiveAccount);
        }
        Ok(ActivatedUser(user))
    }
}
