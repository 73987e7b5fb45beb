use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod schema;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::profile_routes()
}
