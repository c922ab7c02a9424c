mod common;

use futures::future::join_all;

use appointment_cell::models::{AppointmentStatus, CapacityClaim, PaymentEvent, PaymentStatus, UpdateAppointmentRequest};
use appointment_cell::services::BookingLedger;
use common::{at, monday, Clinic};
use doctor_cell::models::TimeBlock;
use shared_config::{ConflictPolicy, SchedulingConfig};
use shared_models::auth::ActingUser;
use shared_models::error::{RuleViolation, SchedulingError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_bookings_never_exceed_block_capacity() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;

    let attempts = (0..12u32).map(|i| {
        let engine = clinic.engine.clone();
        let actor = clinic.receptionist.clone();
        let request = clinic.request(monday(), at(7 + i / 2, (i % 2) * 30));
        tokio::spawn(async move { engine.create_appointment(&actor, request).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 2);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        SchedulingError::BusinessRule(RuleViolation::CapacityExceeded { .. })
    )));

    let morning = clinic
        .calculator
        .block_availability(clinic.doctor.id, monday(), TimeBlock::Morning, None)
        .await
        .unwrap();
    assert_eq!(morning.current_count, 2);
    assert_eq!(clinic.ledger.len().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_bookings_for_same_time_admit_one() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;

    let attempts = (0..8).map(|_| {
        let engine = clinic.engine.clone();
        let actor = clinic.receptionist.clone();
        let request = clinic.request(monday(), at(17, 0));
        tokio::spawn(async move { engine.create_appointment(&actor, request).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        SchedulingError::BusinessRule(RuleViolation::TimeConflict { .. })
    )));
}

#[tokio::test]
async fn test_stale_transition_keeps_rescheduled_slot() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let moved = clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 0))).await.unwrap();
    clinic.engine.create_appointment(actor, clinic.request(monday(), at(9, 0))).await.unwrap();

    // Read before the reschedule below
    let snapshot = clinic.ledger.get(moved.id).await.unwrap().unwrap();

    clinic
        .engine
        .update_appointment(
            actor,
            moved.id,
            UpdateAppointmentRequest {
                start_time: Some(at(17, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    clinic.engine.create_appointment(actor, clinic.request(monday(), at(10, 0))).await.unwrap();

    let mut confirmed = snapshot;
    confirmed.status = AppointmentStatus::Confirmed;
    let saved = clinic.ledger.replace(confirmed, AppointmentStatus::Scheduled).await.unwrap();

    assert_eq!(saved.status, AppointmentStatus::Confirmed);
    assert_eq!(saved.start_time, at(17, 0));
    assert_eq!(saved.time_block, TimeBlock::Afternoon);

    let morning = clinic
        .calculator
        .block_availability(clinic.doctor.id, monday(), TimeBlock::Morning, None)
        .await
        .unwrap();
    assert_eq!(morning.current_count, 2);
    assert_eq!(morning.capacity, 2);
}

#[tokio::test]
async fn test_stale_writes_keep_payment_status() {
    let clinic = Clinic::new(SchedulingConfig::default()).await;
    let actor = &clinic.receptionist;

    let booked = clinic.engine.create_appointment(actor, clinic.request(monday(), at(8, 0))).await.unwrap();
    let snapshot = clinic.ledger.get(booked.id).await.unwrap().unwrap();

    clinic
        .payments
        .handle_payment_event(&ActingUser::new("payments", Some("system")), booked.id, PaymentEvent::Failed)
        .await
        .unwrap();

    let mut confirmed = snapshot.clone();
    confirmed.status = AppointmentStatus::Confirmed;
    let saved = clinic.ledger.replace(confirmed, AppointmentStatus::Scheduled).await.unwrap();
    assert_eq!(saved.status, AppointmentStatus::Confirmed);
    assert_eq!(saved.payment_status, PaymentStatus::Failed);

    let mut later = snapshot;
    later.status = AppointmentStatus::Confirmed;
    later.start_time = at(11, 0);
    let claim = CapacityClaim {
        block: TimeBlock::Morning,
        capacity: 2,
        conflict_policy: ConflictPolicy::AnyStatus,
    };
    let rescheduled = clinic
        .ledger
        .reschedule_within_capacity(later, claim, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(rescheduled.start_time, at(11, 0));
    assert_eq!(rescheduled.payment_status, PaymentStatus::Failed);
}
