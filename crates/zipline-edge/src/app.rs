use axum::routing::get;
use axum::Router;

use crate::handlers::{health_handler, public_redirect_handler, user_redirect_handler};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/p/:short_key", get(public_redirect_handler))
            .route("/u/:short_key", get(user_redirect_handler))
            .with_state(state)
    }
}
