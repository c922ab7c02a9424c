use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{ActingUser, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{DayScheduleRequest, TimeBlock, WeeklyScheduleRequest};
use crate::services::WeeklyScheduleService;

#[derive(Clone)]
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<WeeklyScheduleService>,
}

#[derive(Debug, Deserialize)]
pub struct BlockAvailabilityQuery {
    pub day_of_week: i32,
    pub time_block: TimeBlock,
}

// ==============================================================================
// WEEKLY SCHEDULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let days = state.schedules.get_weekly_schedule(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "days": days,
    })))
}

#[axum::debug_handler]
pub async fn set_weekly_schedule(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<WeeklyScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let diff = state
        .schedules
        .set_weekly_schedule(&ActingUser::from(&user), doctor_id, request.entries)
        .await?;

    Ok(Json(json!(diff)))
}

#[axum::debug_handler]
pub async fn set_day_schedule(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Path((doctor_id, day_of_week)): Path<(Uuid, i32)>,
    Json(request): Json<DayScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let diff = state
        .schedules
        .set_day_schedule(&ActingUser::from(&user), doctor_id, day_of_week, request.blocks)
        .await?;

    Ok(Json(json!(diff)))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    state.schedules.delete_slot(&ActingUser::from(&user), slot_id).await?;

    Ok(Json(json!({
        "deleted": true,
        "slot_id": slot_id,
    })))
}

#[axum::debug_handler]
pub async fn check_block_availability(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<BlockAvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let available = state
        .schedules
        .is_doctor_available_on(doctor_id, query.day_of_week, query.time_block)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": query.day_of_week,
        "time_block": query.time_block,
        "available": available,
    })))
}
