use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::TimeBlock;
use shared_config::ConflictPolicy;
use shared_models::error::{RuleViolation, SchedulingError};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, CapacityClaim, PaymentStatus};

/// Persistence port for appointments.
///
/// The `*_within_capacity` operations are the booking authority: they repeat
/// the exact-time conflict check and the block capacity count and commit only
/// if both still pass, as one atomic unit.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Appointments occupying capacity in (doctor, date, block).
    async fn count_active_in_block(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
        exclude: Option<Uuid>,
    ) -> Result<u32, SchedulingError>;

    /// An appointment at the exact (doctor, date, start time) that blocks it
    /// under `policy`.
    async fn find_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        policy: ConflictPolicy,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError>;

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
    ) -> Result<Appointment, SchedulingError>;

    /// Move an existing appointment to the date/time/block in `appointment`,
    /// provided its stored status is still `expected_status`. Payment status
    /// is never written.
    async fn reschedule_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError>;

    /// Compare-and-set on the stored status. Writes status, reasons, notes,
    /// follow-up link and audit fields only; the slot and payment status of
    /// the stored row are kept.
    async fn replace(
        &self,
        appointment: Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError>;

    /// Compare-and-set on the stored payment status.
    async fn set_payment_status(
        &self,
        appointment_id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        updated_by: &str,
    ) -> Result<Appointment, SchedulingError>;
}

/// Conflict and capacity check for `candidate` against `existing`. The
/// candidate's own row is never counted.
pub fn check_claim<'a>(
    existing: impl Iterator<Item = &'a Appointment>,
    candidate: &Appointment,
    claim: &CapacityClaim,
) -> Result<(), SchedulingError> {
    let mut occupied = 0u32;

    for other in existing.filter(|other| other.id != candidate.id) {
        if other.is_at(candidate.doctor_id, candidate.appointment_date, candidate.start_time)
            && other.blocks_timestamp(claim.conflict_policy)
        {
            return Err(RuleViolation::TimeConflict {
                date: candidate.appointment_date,
                start_time: candidate.start_time,
            }
            .into());
        }

        if other.doctor_id == candidate.doctor_id
            && other.appointment_date == candidate.appointment_date
            && other.time_block == claim.block
            && other.occupies_capacity()
        {
            occupied += 1;
        }
    }

    if occupied >= claim.capacity {
        return Err(RuleViolation::CapacityExceeded {
            date: candidate.appointment_date,
            block: claim.block.to_string(),
            capacity: claim.capacity,
        }
        .into());
    }

    Ok(())
}

/// Copy the fields a status change or edit owns onto the stored row. Slot and
/// payment fields are left to their own operations.
fn apply_edits(stored: &mut Appointment, edit: Appointment) {
    stored.status = edit.status;
    stored.cancellation_reason = edit.cancellation_reason;
    stored.reason = edit.reason;
    stored.notes = edit.notes;
    stored.follow_up_appointment_id = edit.follow_up_appointment_id;
    stored.updated_by = edit.updated_by;
    stored.updated_at = edit.updated_at;
}

/// Process-local ledger. One write guard covers check and commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingLedger {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryBookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

#[async_trait]
impl BookingLedger for InMemoryBookingLedger {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn count_active_in_block(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
        exclude: Option<Uuid>,
    ) -> Result<u32, SchedulingError> {
        let appointments = self.appointments.read().await;
        let count = appointments
            .values()
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date == date && a.time_block == block)
            .filter(|a| a.occupies_capacity())
            .count();
        Ok(count as u32)
    }

    async fn find_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        policy: ConflictPolicy,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .filter(|a| Some(a.id) != exclude)
            .find(|a| a.is_at(doctor_id, date, start_time) && a.blocks_timestamp(policy))
            .cloned())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.appointment_date, a.start_time, a.created_at));
        Ok(matching)
    }

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;

        check_claim(appointments.values(), &appointment, &claim)?;

        debug!(
            "Committing appointment {} in {} block on {}",
            appointment.id, claim.block, appointment.appointment_date
        );
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn reschedule_within_capacity(
        &self,
        appointment: Appointment,
        claim: CapacityClaim,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;

        let stored = appointments
            .get(&appointment.id)
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment.id))?;
        if stored.status != expected_status {
            return Err(RuleViolation::ConcurrentModification(appointment.id.to_string()).into());
        }

        // Claim is checked against the stored row moved to the new slot
        let candidate = Appointment {
            appointment_date: appointment.appointment_date,
            start_time: appointment.start_time,
            time_block: claim.block,
            ..stored.clone()
        };
        check_claim(appointments.values(), &candidate, &claim)?;

        let stored = appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment.id))?;
        stored.appointment_date = candidate.appointment_date;
        stored.start_time = candidate.start_time;
        stored.time_block = candidate.time_block;
        apply_edits(stored, appointment);
        Ok(stored.clone())
    }

    async fn replace(
        &self,
        appointment: Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;

        let stored = appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment.id))?;
        if stored.status != expected_status {
            return Err(RuleViolation::ConcurrentModification(appointment.id.to_string()).into());
        }

        apply_edits(stored, appointment);
        Ok(stored.clone())
    }

    async fn set_payment_status(
        &self,
        appointment_id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        updated_by: &str,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;

        let stored = appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment_id))?;
        if stored.payment_status != expected {
            return Err(RuleViolation::ConcurrentModification(appointment_id.to_string()).into());
        }

        stored.payment_status = next;
        stored.updated_by = updated_by.to_string();
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }
}
