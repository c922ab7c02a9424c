use axum::{
    Router,
    routing::{get, put, delete},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DoctorCellState};

pub fn doctor_routes(state: DoctorCellState) -> Router {
    // Reads are open to any authenticated user; writes check for admin in the handler
    let protected_routes = Router::new()
        .route(
            "/{doctor_id}/schedule",
            get(handlers::get_weekly_schedule).put(handlers::set_weekly_schedule),
        )
        .route("/{doctor_id}/schedule/{day_of_week}", put(handlers::set_day_schedule))
        .route("/{doctor_id}/block-availability", get(handlers::check_block_availability))
        .route("/availability/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
