// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{ActingUser, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_staff;

use crate::models::{
    AppointmentEvent, AppointmentFilter, CreateAppointmentRequest, PaymentEventRequest,
    UpdateAppointmentRequest,
};
use crate::services::{AvailabilityCalculator, BookingEngine, PaymentStatusBridge};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<BookingEngine>,
    pub calculator: Arc<AvailabilityCalculator>,
    pub payments: Arc<PaymentStatusBridge>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let blocks = state.calculator.get_available_blocks(doctor_id, query.date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "blocks": blocks,
    })))
}

#[axum::debug_handler]
pub async fn get_specialty_availability(
    State(state): State<AppointmentCellState>,
    Path(specialty_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let blocks = state
        .calculator
        .get_availability_by_specialty(specialty_id, query.date)
        .await?;

    Ok(Json(json!({
        "specialty_id": specialty_id,
        "date": query.date,
        "blocks": blocks,
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state
        .engine
        .create_appointment(&ActingUser::from(&user), request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.engine.list_appointments(&filter).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.engine.get_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .engine
        .update_appointment(&ActingUser::from(&user), appointment_id, request)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(event): Json<AppointmentEvent>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .engine
        .transition_appointment(&ActingUser::from(&user), appointment_id, event)
        .await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// PAYMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn record_payment_event(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<PaymentEventRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let appointment = state
        .payments
        .handle_payment_event(&ActingUser::from(&user), appointment_id, request.event)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_payment_follow_up(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let appointments = state.payments.pending_follow_up().await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}
