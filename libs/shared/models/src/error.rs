use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::debug!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// ==============================================================================
// SCHEDULING DOMAIN ERRORS
// ==============================================================================

/// Errors surfaced by the availability store, booking ledger and booking engine.
/// None of them are retried; callers receive them verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Business rule violation: {0}")]
    BusinessRule(#[from] RuleViolation),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SchedulingError::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SchedulingError::Validation(message.into())
    }

    pub fn is_business_rule(&self) -> bool {
        matches!(self, SchedulingError::BusinessRule(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleViolation {
    #[error("Doctor not available on {date} in the {block} block")]
    DoctorNotAvailable { date: NaiveDate, block: String },

    #[error("The {block} block on {date} is at maximum capacity ({capacity})")]
    CapacityExceeded { date: NaiveDate, block: String, capacity: u32 },

    #[error("Doctor already has an appointment on {date} at {start_time}")]
    TimeConflict { date: NaiveDate, start_time: NaiveTime },

    #[error("Cannot {event} an appointment in status {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Cannot move payment status from {from} to {to}")]
    InvalidPaymentTransition { from: String, to: String },

    #[error("Doctor {doctor_id} does not hold specialty {specialty_id}")]
    SpecialtyMismatch { doctor_id: String, specialty_id: String },

    #[error("Appointment in status {0} can no longer be modified")]
    NotEditable(String),

    #[error("Start time {0} falls outside every consultation block")]
    OutsideConsultationHours(NaiveTime),

    #[error("Cannot book an appointment in the past ({date} {start_time})")]
    InPast { date: NaiveDate, start_time: NaiveTime },

    #[error("More than one configuration for the {block} block on day {day_of_week}")]
    DuplicateBlock { day_of_week: i32, block: String },

    #[error("Specialty {0} requires a medical referral")]
    ReferralRequired(String),

    #[error("Appointment {0} was modified concurrently")]
    ConcurrentModification(String),
}

impl From<SchedulingError> for AppError {
    fn from(error: SchedulingError) -> Self {
        match error {
            SchedulingError::NotFound { .. } => AppError::NotFound(error.to_string()),
            SchedulingError::BusinessRule(rule) => AppError::Conflict(rule.to_string()),
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::Storage(msg) => AppError::Database(msg),
        }
    }
}
