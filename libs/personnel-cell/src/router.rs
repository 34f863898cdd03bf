// libs/personnel-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppState;

pub fn personnel_routes(state: Arc<AppState>) -> Router {
    // Every operation requires an authenticated caller.
    let protected_routes = Router::new()
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/analytics", get(handlers::get_analytics))
        // Patient roster and per-patient views
        .route("/patients", get(handlers::list_patients))
        .route("/patients/{patient_id}", get(handlers::get_patient_detail))
        .route("/patients/{patient_id}/notes", post(handlers::add_patient_note))
        .route(
            "/patients/{patient_id}/medications",
            post(handlers::add_medication),
        )
        // Appointment management
        .route(
            "/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route(
            "/appointments/{appointment_id}",
            patch(handlers::update_appointment),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
