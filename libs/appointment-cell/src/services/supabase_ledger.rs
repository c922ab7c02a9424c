use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::models::TimeBlock;
use shared_config::ConflictPolicy;
use shared_database::supabase::{DatabaseError, SupabaseClient};
use shared_models::error::{RuleViolation, SchedulingError};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, CapacityClaim, PaymentStatus};
use crate::services::ledger::BookingLedger;

const ACTIVE_STATUSES: &str = "in.(SCHEDULED,CONFIRMED,COMPLETED)";

/// Ledger over the `appointments` table.
///
/// Bookings and reschedules go through database functions that take a
/// transaction-scoped advisory lock on (doctor, date) before re-checking
/// conflict and capacity. A partial unique index on active
/// (doctor_id, appointment_date, start_time) rows backs them up.
pub struct SupabaseBookingLedger {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseBookingLedger {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.supabase.request(Method::GET, path, None).await?)
    }

    /// PATCH guarded by `guard` (a PostgREST filter). An empty result means
    /// the row is gone or the guard no longer holds.
    async fn patch_guarded(&self, appointment_id: Uuid, guard: &str, body: Value) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&{}", appointment_id, guard);
        let rows: Vec<Appointment> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(body))
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(row),
            None if self.get(appointment_id).await?.is_none() => {
                Err(SchedulingError::not_found("Appointment", appointment_id))
            }
            None => {
                warn!("Appointment {} changed underneath a guarded update ({})", appointment_id, guard);
                Err(RuleViolation::ConcurrentModification(appointment_id.to_string()).into())
            }
        }
    }
}

fn time_param(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Translate the signals raised by the booking functions into domain errors.
fn claim_error(error: DatabaseError, appointment: &Appointment, claim: &CapacityClaim) -> SchedulingError {
    let time_conflict = || -> SchedulingError {
        RuleViolation::TimeConflict {
            date: appointment.appointment_date,
            start_time: appointment.start_time,
        }
        .into()
    };

    if matches!(error, DatabaseError::UniqueViolation(_)) {
        return time_conflict();
    }

    let signal = error.raised_message().map(str::to_string);
    match signal.as_deref() {
        Some("time_conflict") => time_conflict(),
        Some("capacity_exceeded") => RuleViolation::CapacityExceeded {
            date: appointment.appointment_date,
            block: claim.block.to_string(),
            capacity: claim.capacity,
        }
        .into(),
        Some("status_changed") => RuleViolation::ConcurrentModification(appointment.id.to_string()).into(),
        Some("appointment_not_found") => SchedulingError::not_found("Appointment", appointment.id),
        _ => error.into(),
    }
}

#[async_trait]
impl BookingLedger for SupabaseBookingLedger {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let rows = self
            .fetch(&format!("/rest/v1/appointments?id=eq.{}", appointment_id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn count_active_in_block(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
        exclude: Option<Uuid>,
    ) -> Result<u32, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?select=id&doctor_id=eq.{}&appointment_date=eq.{}&time_block=eq.{}&status={}",
            doctor_id, date, block, ACTIVE_STATUSES
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.len() as u32)
    }

    async fn find_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        policy: ConflictPolicy,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&start_time=eq.{}",
            doctor_id,
            date,
            time_param(start_time)
        );
        if policy == ConflictPolicy::ActiveOnly {
            path.push_str(&format!("&status={}", ACTIVE_STATUSES));
        }
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }
        path.push_str("&limit=1");

        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();
        if let Some(id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", id));
        }
        if let Some(id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", id));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(block) = filter.time_block {
            query_parts.push(format!("time_block=eq.{}", block));
        }
        if let Some(status) = filter.payment_status {
            query_parts.push(format!("payment_status=eq.{}", status));
        }
        query_parts.push("order=appointment_date.asc,start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        debug!("Listing appointments: {}", path);
        self.fetch(&path).await
    }

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
    ) -> Result<Appointment, SchedulingError> {
        self.supabase
            .rpc(
                "book_appointment_within_capacity",
                json!({
                    "p_appointment": appointment,
                    "p_capacity": claim.capacity,
                    "p_conflict_policy": claim.conflict_policy,
                }),
            )
            .await
            .map_err(|e| claim_error(e, &appointment, &claim))
    }

    async fn reschedule_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        self.supabase
            .rpc(
                "reschedule_appointment_within_capacity",
                json!({
                    "p_appointment": appointment,
                    "p_capacity": claim.capacity,
                    "p_conflict_policy": claim.conflict_policy,
                    "p_expected_status": expected_status,
                }),
            )
            .await
            .map_err(|e| claim_error(e, &appointment, &claim))
    }

    async fn replace(
        &self,
        appointment: Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let body = json!({
            "reason": appointment.reason,
            "notes": appointment.notes,
            "cancellation_reason": appointment.cancellation_reason,
            "follow_up_appointment_id": appointment.follow_up_appointment_id,
            "status": appointment.status,
            "updated_by": appointment.updated_by,
            "updated_at": appointment.updated_at,
        });

        self.patch_guarded(appointment.id, &format!("status=eq.{}", expected_status), body)
            .await
    }

    async fn set_payment_status(
        &self,
        appointment_id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        updated_by: &str,
    ) -> Result<Appointment, SchedulingError> {
        let body = json!({
            "payment_status": next,
            "updated_by": updated_by,
            "updated_at": Utc::now(),
        });

        self.patch_guarded(appointment_id, &format!("payment_status=eq.{}", expected), body)
            .await
    }
}
