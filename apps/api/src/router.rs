use std::sync::Arc;

use axum::{routing::get, Router};

use personnel_cell::{personnel_routes, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Materna personnel API is running!" }))
        .nest("/api/personnel", personnel_routes(state))
}
