use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod repo;
pub mod role;
pub mod services;

pub use extractors::CurrentUser;
pub use role::{Role, UserStatus, ADMIN_ONLY, STAFF};

pub fn router() -> Router<AppState> {
    handlers::router()
}
