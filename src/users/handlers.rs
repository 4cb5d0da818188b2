use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{
    ActivateRequest, ChangePasswordRequest, ListUsersQuery, RegisterRequest, UserEnvelope,
    UserListResponse,
};
use super::repo_types::{User, USER_SORT_SAFELIST};
use super::validation::{
    validate_email, validate_name, validate_password_plaintext, validate_user,
};
use crate::auth::extractors::{ActivatedUser, AuthUser};
use crate::auth::tokens::{validate_token_plaintext, SCOPE_ACTIVATION};
use crate::error::{ApiError, ApiResult};
use crate::filters::{validate_filters, Filters};
use crate::state::AppState;
use crate::users::error::UserRepoError;
use crate::validator::Validator;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register).get(list_users))
        .route("/v1/users/activated", put(activate))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me", get(get_me))
        .route("/v1/me/password", put(change_password))
}

fn ensure_valid(v: Validator) -> ApiResult<()> {
    if v.valid() {
        Ok(())
    } else {
        Err(ApiError::Validation(v.into_errors()))
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserEnvelope>)> {
    let mut user = User::new(payload.name.trim(), payload.email.trim().to_lowercase());

    // Field checks run before the password is hashed.
    let mut v = Validator::new();
    validate_name(&mut v, &user.name);
    validate_email(&mut v, &user.email);
    validate_password_plaintext(&mut v, &payload.password);
    ensure_valid(v)?;

    user.password.set(&payload.password)?;

    match state.users.insert(&mut user).await {
        Ok(()) => {}
        Err(UserRepoError::DuplicateEmail) => {
            warn!(email = %user.email, "email already registered");
            return Err(ApiError::DuplicateEmail);
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    Json(payload): Json<ActivateRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &payload.token);
    ensure_valid(v)?;

    let mut user = match state.users.get_for_token(SCOPE_ACTIVATION, &payload.token).await {
        Ok(user) => user,
        Err(UserRepoError::RecordNotFound) => {
            let mut v = Validator::new();
            v.add_error("token", "invalid or expired activation token");
            return Err(ApiError::Validation(v.into_errors()));
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.users.update(&mut user).await?;

    info!(user_id = user.id, "user activated");
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip_all, fields(sort = %q.sort, page = q.page))]
pub async fn list_users(
    State(state): State<AppState>,
    ActivatedUser(_caller): ActivatedUser,
    Query(q): Query<ListUsersQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let filters = Filters {
        page: q.page,
        page_size: q.page_size,
        sort: q.sort,
        sort_safelist: USER_SORT_SAFELIST,
    };

    let mut v = Validator::new();
    validate_filters(&mut v, &filters);
    ensure_valid(v)?;

    let (users, metadata) = state.users.list(&q.name, &filters).await?;
    Ok(Json(UserListResponse { users, metadata }))
}

pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope { user })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &payload.new_password);
    ensure_valid(v)?;

    if !user.password.matches(&payload.current_password)? {
        warn!("password change with wrong current password");
        return Err(ApiError::InvalidCredentials);
    }

    user.password.set(&payload.new_password)?;
    let mut v = Validator::new();
    validate_user(&mut v, &user);
    ensure_valid(v)?;

    state.users.update(&mut user).await?;
    info!(version = user.version, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
