use crate::state::AppState;
use axum::Router;

mod dto;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod validation;

pub use error::UserRepoError;
pub use repo::{PgUserRepository, UserRepository};
pub use repo_types::User;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::user_routes())
        .merge(handlers::me_routes())
}
