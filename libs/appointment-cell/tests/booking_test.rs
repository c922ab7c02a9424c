mod common;

use std::str::FromStr;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentEvent, AppointmentFilter, AppointmentStatus, PaymentStatus, UpdateAppointmentRequest,
};
use common::{at, monday, tuesday, Clinic};
use doctor_cell::models::TimeBlock;
use shared_config::{ConflictPolicy, SchedulingConfig};
use shared_models::clinic::Specialty;
use shared_models::error::{RuleViolation, SchedulingError};

#[tokio::test]
async fn test_booking_derives_block_and_discounted_price() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;

    let morning = clinic
        .engine
        .create_appointment(&clinic.receptionist, clinic.request(monday(), at(9, 0)))
        .await
        .unwrap();
    let afternoon = clinic
        .engine
        .create_appointment(&clinic.receptionist, clinic.request(monday(), at(16, 30)))
        .await
        .unwrap();

    assert_eq!(morning.time_block, TimeBlock::Morning);
    assert_eq!(afternoon.time_block, TimeBlock::Afternoon);
    assert_eq!(morning.status, AppointmentStatus::Scheduled);
    assert_eq!(morning.payment_status, PaymentStatus::Processing);
    assert_eq!(morning.price, Decimal::from_str("85.00").unwrap());
    assert_eq!(morning.created_by, "reception-1");
}

#[tokio::test]
async fn test_block_capacity_is_enforced_and_cancellation_frees_it() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let first = clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 0))).await.unwrap();
    clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 30))).await.unwrap();

    let full = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await;
    assert_matches!(
        full,
        Err(SchedulingError::BusinessRule(RuleViolation::CapacityExceeded { capacity: 2, .. }))
    );

    clinic
        .engine
        .transition_appointment(actor, first.id, AppointmentEvent::Cancel { reason: "Patient travelling".into() })
        .await
        .unwrap();

    let rebooked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await;
    assert!(rebooked.is_ok());
}

#[tokio::test]
async fn test_cancelled_slot_still_blocks_exact_time_by_default() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await.unwrap();
    clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: "Rescheduling".into() })
        .await
        .unwrap();

    let again = clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await;
    assert_matches!(again, Err(SchedulingError::BusinessRule(RuleViolation::TimeConflict { .. })));
}

#[tokio::test]
async fn test_active_only_policy_reopens_cancelled_time() {
    let config = SchedulingConfig {
        conflict_policy: ConflictPolicy::ActiveOnly,
        ..SchedulingConfig::default()
    };
    let clinic = Clinic::new(config).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await.unwrap();
    let duplicate = clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await;
    assert_matches!(duplicate, Err(SchedulingError::BusinessRule(RuleViolation::TimeConflict { .. })));

    clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: "Rescheduling".into() })
        .await
        .unwrap();

    let again = clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn test_booking_outside_published_hours_is_rejected() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    // Between the morning and afternoon blocks
    let gap = clinic.engine.create_appointment(actor, clinic.request(monday(), at(14, 0))).await;
    assert_matches!(
        gap,
        Err(SchedulingError::BusinessRule(RuleViolation::OutsideConsultationHours(_)))
    );

    // No schedule published for Tuesdays
    let unpublished = clinic.engine.create_appointment(actor, clinic.request(tuesday(), at(9, 0))).await;
    assert_matches!(
        unpublished,
        Err(SchedulingError::BusinessRule(RuleViolation::DoctorNotAvailable { .. }))
    );
}

#[tokio::test]
async fn test_booking_in_the_past_is_rejected() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let past_monday = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();

    let result = clinic
        .engine
        .create_appointment(&clinic.receptionist, clinic.request(past_monday, at(9, 0)))
        .await;

    assert_matches!(result, Err(SchedulingError::BusinessRule(RuleViolation::InPast { .. })));
}

#[tokio::test]
async fn test_unknown_references_and_missing_credentials() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let mut request = clinic.request(monday(), at(9, 0));
    request.doctor_id = Uuid::new_v4();
    assert_matches!(
        clinic.engine.create_appointment(actor, request).await,
        Err(SchedulingError::NotFound { entity: "Doctor", .. })
    );

    let dermatology = Specialty {
        id: Uuid::new_v4(),
        name: "Dermatology".to_string(),
        consultation_price: Decimal::from(60),
        discount_percentage: None,
        requires_referral: false,
        is_active: true,
    };
    clinic.directory.add_specialty(dermatology.clone()).await;

    let mut request = clinic.request(monday(), at(9, 0));
    request.specialty_id = dermatology.id;
    assert_matches!(
        clinic.engine.create_appointment(actor, request).await,
        Err(SchedulingError::BusinessRule(RuleViolation::SpecialtyMismatch { .. }))
    );
    assert!(clinic.ledger.is_empty().await);
}

#[tokio::test]
async fn test_blank_reason_is_rejected_on_create() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;

    let mut request = clinic.request(monday(), at(9, 0));
    request.reason = "   ".to_string();

    assert_matches!(
        clinic.engine.create_appointment(&clinic.receptionist, request).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn test_referral_requirement_when_enforced() {
    let config = SchedulingConfig {
        enforce_referral_requirement: true,
        ..SchedulingConfig::default()
    };
    let clinic = Clinic::new(config).await;

    let without = clinic
        .engine
        .create_appointment(&clinic.receptionist, clinic.request(monday(), at(9, 0)))
        .await;
    assert_matches!(without, Err(SchedulingError::BusinessRule(RuleViolation::ReferralRequired(_))));

    let mut request = clinic.request(monday(), at(9, 0));
    request.referral_id = Some(Uuid::new_v4());
    let with = clinic.engine.create_appointment(&clinic.receptionist, request).await.unwrap();
    assert!(with.referral_id.is_some());
}

#[tokio::test]
async fn test_lifecycle_transitions_and_terminal_states() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();

    let blank = clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: " ".into() })
        .await;
    assert_matches!(blank, Err(SchedulingError::Validation(_)));

    let confirmed = clinic.engine.transition_appointment(actor, booked.id, AppointmentEvent::Confirm).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = clinic.engine.transition_appointment(actor, booked.id, AppointmentEvent::Complete).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let reopened = clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: "Changed mind".into() })
        .await;
    assert_matches!(
        reopened,
        Err(SchedulingError::BusinessRule(RuleViolation::InvalidTransition { ref from, .. })) if from == "COMPLETED"
    );

    // Completed appointments keep occupying capacity
    let morning = clinic.calculator.block_availability(clinic.doctor.id, monday(), TimeBlock::Morning, None).await.unwrap();
    assert_eq!(morning.current_count, 1);
}

#[tokio::test]
async fn test_cancelled_appointment_cannot_be_confirmed() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();
    let cancelled = clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: "Patient request".into() })
        .await
        .unwrap();
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Patient request"));

    let confirm = clinic.engine.transition_appointment(actor, booked.id, AppointmentEvent::Confirm).await;
    assert_matches!(
        confirm,
        Err(SchedulingError::BusinessRule(RuleViolation::InvalidTransition { .. }))
    );
}

#[tokio::test]
async fn test_partial_update_ignores_blank_reason() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();

    let updated = clinic
        .engine
        .update_appointment(
            &clinic.admin,
            booked.id,
            UpdateAppointmentRequest {
                reason: Some("  ".to_string()),
                notes: Some("Bring previous ECG".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.reason, booked.reason);
    assert_eq!(updated.notes.as_deref(), Some("Bring previous ECG"));
    assert_eq!(updated.updated_by, "admin-1");
    assert_eq!(updated.start_time, booked.start_time);
}

#[tokio::test]
async fn test_reschedule_excludes_itself_from_capacity() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let first = clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 0))).await.unwrap();
    clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 30))).await.unwrap();

    // Morning is full, yet moving within it must succeed
    let moved = clinic
        .engine
        .update_appointment(
            actor,
            first.id,
            UpdateAppointmentRequest {
                start_time: Some(at(11, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.start_time, at(11, 0));
    assert_eq!(moved.time_block, TimeBlock::Morning);

    let onto_other = clinic
        .engine
        .update_appointment(
            actor,
            first.id,
            UpdateAppointmentRequest {
                start_time: Some(at(8, 30)),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(onto_other, Err(SchedulingError::BusinessRule(RuleViolation::TimeConflict { .. })));

    let to_afternoon = clinic
        .engine
        .update_appointment(
            actor,
            first.id,
            UpdateAppointmentRequest {
                start_time: Some(at(17, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(to_afternoon.time_block, TimeBlock::Afternoon);

    let morning = clinic.calculator.block_availability(clinic.doctor.id, monday(), TimeBlock::Morning, None).await.unwrap();
    assert_eq!(morning.remaining_slots, 1);
}

#[tokio::test]
async fn test_terminal_appointments_are_not_editable() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();
    clinic
        .engine
        .transition_appointment(actor, booked.id, AppointmentEvent::Cancel { reason: "Duplicate".into() })
        .await
        .unwrap();

    let edit = clinic
        .engine
        .update_appointment(
            actor,
            booked.id,
            UpdateAppointmentRequest {
                notes: Some("late note".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(edit, Err(SchedulingError::BusinessRule(RuleViolation::NotEditable(_))));
}

#[tokio::test]
async fn test_queries_filter_by_doctor_block_and_status() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let morning = clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();
    clinic.engine.create_appointment(actor, clinic.request(monday(), at(16, 0))).await.unwrap();
    clinic.engine.transition_appointment(actor, morning.id, AppointmentEvent::Confirm).await.unwrap();

    let day = clinic.engine.doctor_appointments_on(clinic.doctor.id, monday()).await.unwrap();
    assert_eq!(day.len(), 2);
    assert!(day[0].start_time < day[1].start_time);

    let afternoon = clinic.engine.appointments_by_block(monday(), TimeBlock::Afternoon).await.unwrap();
    assert_eq!(afternoon.len(), 1);
    assert_eq!(afternoon[0].start_time, at(16, 0));

    let confirmed = clinic
        .engine
        .list_appointments(&AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, morning.id);

    assert_matches!(
        clinic.engine.get_appointment(Uuid::new_v4()).await,
        Err(SchedulingError::NotFound { entity: "Appointment", .. })
    );
}
