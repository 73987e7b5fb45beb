use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod registration;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
