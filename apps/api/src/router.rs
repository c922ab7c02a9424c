use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::{AvailabilityCalculator, BookingEngine, PaymentStatusBridge};
use doctor_cell::handlers::DoctorCellState;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::WeeklyScheduleService;
use shared_config::AppConfig;

use crate::backends::Backends;

pub fn create_router(config: Arc<AppConfig>, backends: Backends) -> Router {
    let Backends { store, ledger, directory } = backends;

    let schedules = Arc::new(WeeklyScheduleService::new(
        store.clone(),
        directory.clone(),
        config.scheduling.clone(),
    ));
    let calculator = Arc::new(AvailabilityCalculator::new(store, ledger.clone(), directory.clone()));
    let engine = Arc::new(BookingEngine::new(
        directory,
        ledger.clone(),
        calculator.clone(),
        config.scheduling.clone(),
    ));
    let payments = Arc::new(PaymentStatusBridge::new(ledger));

    let doctor_state = DoctorCellState {
        config: config.clone(),
        schedules,
    };
    let appointment_state = AppointmentCellState {
        config,
        engine,
        calculator,
        payments,
    };

    Router::new()
        .route("/", get(|| async { "Hospital scheduling API is running!" }))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
