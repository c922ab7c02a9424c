// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Availability
        .route("/availability/doctors/{doctor_id}", get(handlers::get_doctor_availability))
        .route("/availability/specialties/{specialty_id}", get(handlers::get_specialty_availability))

        // Booking and lifecycle
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).patch(handlers::update_appointment),
        )
        .route("/{appointment_id}/transitions", post(handlers::transition_appointment))

        // Payment status (staff only)
        .route("/{appointment_id}/payment-events", post(handlers::record_payment_event))
        .route("/payments/follow-up", get(handlers::get_payment_follow_up))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
