use axum::{Router, routing::get};

use crate::app::AppState;

pub mod auth;
pub mod items;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/items", items::router())
}
