// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::TimeBlock;
use doctor_cell::services::ClinicDirectory;
use shared_config::{CredentialFallbackPolicy, SchedulingConfig};
use shared_models::auth::ActingUser;
use shared_models::error::{RuleViolation, SchedulingError};

use crate::models::{
    Appointment, AppointmentEvent, AppointmentFilter, AppointmentStatus, CapacityClaim,
    CreateAppointmentRequest, PaymentStatus, UpdateAppointmentRequest,
};
use crate::services::availability::AvailabilityCalculator;
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Validates and commits bookings, reschedules and lifecycle transitions.
///
/// The engine's own checks give callers precise errors; the ledger repeats
/// the conflict and capacity checks atomically when committing.
pub struct BookingEngine {
    directory: Arc<dyn ClinicDirectory>,
    ledger: Arc<dyn BookingLedger>,
    calculator: Arc<AvailabilityCalculator>,
    lifecycle: AppointmentLifecycleService,
    config: SchedulingConfig,
}

impl BookingEngine {
    pub fn new(
        directory: Arc<dyn ClinicDirectory>,
        ledger: Arc<dyn BookingLedger>,
        calculator: Arc<AvailabilityCalculator>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            directory,
            ledger,
            calculator,
            lifecycle: AppointmentLifecycleService::new(),
            config,
        }
    }

    // ==============================================================================
    // COMMANDS
    // ==============================================================================

    #[instrument(
        skip(self, request),
        fields(actor = %actor, doctor_id = %request.doctor_id, date = %request.appointment_date)
    )]
    pub async fn create_appointment(
        &self,
        actor: &ActingUser,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let patient = self
            .directory
            .find_patient(request.patient_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Patient", request.patient_id))?;
        let doctor = self
            .directory
            .find_doctor(request.doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Doctor", request.doctor_id))?;
        let specialty = self
            .directory
            .find_specialty(request.specialty_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Specialty", request.specialty_id))?;

        self.verify_credentials(doctor.id, specialty.id).await?;
        self.reject_if_past(request.appointment_date, request.start_time)?;

        if self.config.enforce_referral_requirement && specialty.requires_referral && request.referral_id.is_none() {
            return Err(RuleViolation::ReferralRequired(specialty.name.clone()).into());
        }

        if request.reason.trim().is_empty() {
            return Err(SchedulingError::validation("Reason for the appointment is required"));
        }

        let claim = self
            .check_slot(doctor.id, request.appointment_date, request.start_time, None)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            specialty_id: specialty.id,
            referral_id: request.referral_id,
            appointment_date: request.appointment_date,
            start_time: request.start_time,
            time_block: claim.block,
            price: specialty.final_price(),
            reason: request.reason.trim().to_string(),
            notes: request.notes,
            cancellation_reason: None,
            follow_up_appointment_id: None,
            payment_status: PaymentStatus::Processing,
            status: AppointmentStatus::Scheduled,
            created_by: actor.id.clone(),
            updated_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };

        let booked = self.ledger.insert_within_capacity(appointment, claim).await?;

        info!(
            "Appointment {} booked with {} on {} at {} ({})",
            booked.id,
            doctor.full_name(),
            booked.appointment_date,
            booked.start_time,
            booked.time_block
        );
        Ok(booked)
    }

    #[instrument(skip(self, request), fields(actor = %actor))]
    pub async fn update_appointment(
        &self,
        actor: &ActingUser,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id).await?;

        if current.status.is_terminal() {
            return Err(RuleViolation::NotEditable(current.status.to_string()).into());
        }

        let mut updated = current.clone();

        if let Some(reason) = request.reason.as_deref().map(str::trim) {
            if reason.is_empty() {
                debug!("Ignoring blank reason in update of appointment {}", appointment_id);
            } else {
                updated.reason = reason.to_string();
            }
        }
        if let Some(notes) = request.notes {
            updated.notes = Some(notes);
        }
        if let Some(follow_up) = request.follow_up_appointment_id {
            updated.follow_up_appointment_id = Some(follow_up);
        }
        updated.updated_by = actor.id.clone();
        updated.updated_at = Utc::now();

        let new_date = request.appointment_date.unwrap_or(current.appointment_date);
        let new_time = request.start_time.unwrap_or(current.start_time);

        if new_date == current.appointment_date && new_time == current.start_time {
            return self.ledger.replace(updated, current.status).await;
        }

        self.reject_if_past(new_date, new_time)?;
        let claim = self
            .check_slot(current.doctor_id, new_date, new_time, Some(current.id))
            .await?;

        updated.appointment_date = new_date;
        updated.start_time = new_time;
        updated.time_block = claim.block;

        let rescheduled = self
            .ledger
            .reschedule_within_capacity(updated, claim, current.status)
            .await?;

        info!(
            "Appointment {} rescheduled from {} {} to {} {}",
            appointment_id, current.appointment_date, current.start_time, new_date, new_time
        );
        Ok(rescheduled)
    }

    #[instrument(skip(self), fields(actor = %actor, event = event.name()))]
    pub async fn transition_appointment(
        &self,
        actor: &ActingUser,
        appointment_id: Uuid,
        event: AppointmentEvent,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id).await?;
        let next = self.lifecycle.next_status(current.status, &event)?;

        let mut updated = current.clone();
        if let AppointmentEvent::Cancel { reason } = &event {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(SchedulingError::validation("A cancellation reason is required"));
            }
            updated.cancellation_reason = Some(reason.to_string());
        }
        updated.status = next;
        updated.updated_by = actor.id.clone();
        updated.updated_at = Utc::now();

        let saved = self.ledger.replace(updated, current.status).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, current.status, saved.status);
        Ok(saved)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment_id))
    }

    pub async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        self.ledger.list(filter).await
    }

    pub async fn doctor_appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.ledger
            .list(&AppointmentFilter {
                doctor_id: Some(doctor_id),
                date: Some(date),
                ..Default::default()
            })
            .await
    }

    pub async fn appointments_by_block(
        &self,
        date: NaiveDate,
        block: TimeBlock,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.ledger
            .list(&AppointmentFilter {
                date: Some(date),
                time_block: Some(block),
                ..Default::default()
            })
            .await
    }

    // ==============================================================================
    // VALIDATION
    // ==============================================================================

    async fn verify_credentials(&self, doctor_id: Uuid, specialty_id: Uuid) -> Result<(), SchedulingError> {
        match self.directory.doctor_specialties(doctor_id).await {
            Ok(specialties) if specialties.contains(&specialty_id) => Ok(()),
            Ok(_) => Err(RuleViolation::SpecialtyMismatch {
                doctor_id: doctor_id.to_string(),
                specialty_id: specialty_id.to_string(),
            }
            .into()),
            Err(e) => match self.config.credential_fallback {
                CredentialFallbackPolicy::Reject => Err(e),
                CredentialFallbackPolicy::AssumeQualified => {
                    warn!(
                        "Could not load specialties of doctor {} ({}); assuming the doctor holds {}",
                        doctor_id, e, specialty_id
                    );
                    Ok(())
                }
            },
        }
    }

    fn reject_if_past(&self, date: NaiveDate, start_time: NaiveTime) -> Result<(), SchedulingError> {
        if self.config.reject_past_bookings && date.and_time(start_time) < Local::now().naive_local() {
            return Err(RuleViolation::InPast { date, start_time }.into());
        }
        Ok(())
    }

    /// Exact-time conflict and block capacity, excluding `exclude` from both.
    async fn check_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<CapacityClaim, SchedulingError> {
        let policy = self.config.conflict_policy;

        if let Some(existing) = self.ledger.find_at(doctor_id, date, start_time, policy, exclude).await? {
            debug!("Slot {} {} already taken by appointment {}", date, start_time, existing.id);
            return Err(RuleViolation::TimeConflict { date, start_time }.into());
        }

        let block = TimeBlock::for_time(start_time, &self.config)
            .ok_or(RuleViolation::OutsideConsultationHours(start_time))?;

        let availability = self
            .calculator
            .block_availability(doctor_id, date, block, exclude)
            .await?;

        if availability.capacity == 0 {
            return Err(RuleViolation::DoctorNotAvailable {
                date,
                block: block.to_string(),
            }
            .into());
        }
        if !availability.is_available {
            return Err(RuleViolation::CapacityExceeded {
                date,
                block: block.to_string(),
                capacity: availability.capacity,
            }
            .into());
        }

        Ok(CapacityClaim {
            block,
            capacity: availability.capacity,
            conflict_policy: policy,
        })
    }
}
