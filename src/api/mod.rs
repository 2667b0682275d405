//! JSON procedure surface over the registration service.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod principal;

pub use principal::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};

use crate::services::RegistrationService;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registrations: Arc<RegistrationService>,
}

impl AppState {
    pub fn new(registrations: Arc<RegistrationService>) -> Self {
        Self { registrations }
    }
}

pub fn router(state: AppState) -> Router {
    let events = Router::new()
        .route("/", post(handlers::create_event))
        .route("/:id", get(handlers::get_event).delete(handlers::delete_event))
        .route("/:id/status", patch(handlers::update_event_status))
        .route("/:id/capacity", patch(handlers::update_event_capacity))
        .route("/:id/reconcile", post(handlers::reconcile_event))
        .route(
            "/:id/registrations",
            get(handlers::list_registrations).post(handlers::register),
        );

    let registrations = Router::new()
        .route(
            "/:id",
            get(handlers::get_registration)
                .patch(handlers::update_registration)
                .delete(handlers::remove_registration),
        )
        .route("/:id/cancel", post(handlers::cancel_registration));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/events", events)
        .nest("/registrations", registrations)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
