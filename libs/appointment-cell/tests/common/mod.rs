#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use appointment_cell::models::CreateAppointmentRequest;
use appointment_cell::services::{
    AvailabilityCalculator, BookingEngine, InMemoryBookingLedger, PaymentStatusBridge,
};
use doctor_cell::models::{ScheduleEntryRequest, TimeBlock};
use doctor_cell::services::{InMemoryAvailabilityStore, InMemoryClinicDirectory, WeeklyScheduleService};
use shared_config::SchedulingConfig;
use shared_models::auth::ActingUser;
use shared_models::clinic::{Doctor, Patient, Specialty};

/// A Monday well in the future so past-booking rejection never kicks in.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 8).unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub struct Clinic {
    pub directory: InMemoryClinicDirectory,
    pub store: InMemoryAvailabilityStore,
    pub ledger: InMemoryBookingLedger,
    pub schedules: WeeklyScheduleService,
    pub calculator: Arc<AvailabilityCalculator>,
    pub engine: Arc<BookingEngine>,
    pub payments: Arc<PaymentStatusBridge>,
    pub patient: Patient,
    pub doctor: Doctor,
    pub specialty: Specialty,
    pub admin: ActingUser,
    pub receptionist: ActingUser,
}

impl Clinic {
    /// Monday MORNING with capacity 2 and Monday AFTERNOON with capacity 3.
    pub async fn new(config: SchedulingConfig) -> Self {
        let directory = InMemoryClinicDirectory::new();
        let store = InMemoryAvailabilityStore::new();
        let ledger = InMemoryBookingLedger::new();

        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: "Lucia".to_string(),
            last_name: "Fernandez".to_string(),
            is_active: true,
        };
        let doctor = doctor("Elena", "Ruiz");
        let specialty = Specialty {
            id: Uuid::new_v4(),
            name: "Cardiology".to_string(),
            consultation_price: Decimal::from_str("100.00").unwrap(),
            discount_percentage: Some(Decimal::from(15)),
            requires_referral: true,
            is_active: true,
        };

        directory.add_patient(patient.clone()).await;
        directory.add_doctor(doctor.clone()).await;
        directory.add_specialty(specialty.clone()).await;
        directory.assign_specialty(doctor.id, specialty.id).await;

        let schedules = WeeklyScheduleService::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            config.clone(),
        );
        let calculator = Arc::new(AvailabilityCalculator::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Arc::new(directory.clone()),
        ));
        let engine = Arc::new(BookingEngine::new(
            Arc::new(directory.clone()),
            Arc::new(ledger.clone()),
            calculator.clone(),
            config,
        ));
        let payments = Arc::new(PaymentStatusBridge::new(Arc::new(ledger.clone())));

        let clinic = Self {
            directory,
            store,
            ledger,
            schedules,
            calculator,
            engine,
            payments,
            patient,
            doctor,
            specialty,
            admin: ActingUser::new("admin-1", Some("admin")),
            receptionist: ActingUser::new("reception-1", Some("receptionist")),
        };

        clinic
            .publish_schedule(
                clinic.doctor.id,
                vec![entry(1, TimeBlock::Morning, 2), entry(1, TimeBlock::Afternoon, 3)],
            )
            .await;
        clinic
    }

    pub async fn publish_schedule(&self, doctor_id: Uuid, entries: Vec<ScheduleEntryRequest>) {
        self.schedules
            .set_weekly_schedule(&self.admin, doctor_id, entries)
            .await
            .unwrap();
    }

    /// Adds another doctor credentialed for the clinic's specialty.
    pub async fn add_colleague(&self, first_name: &str, last_name: &str) -> Doctor {
        let colleague = doctor(first_name, last_name);
        self.directory.add_doctor(colleague.clone()).await;
        self.directory.assign_specialty(colleague.id, self.specialty.id).await;
        colleague
    }

    pub fn request(&self, date: NaiveDate, start_time: NaiveTime) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: self.patient.id,
            doctor_id: self.doctor.id,
            specialty_id: self.specialty.id,
            appointment_date: date,
            start_time,
            reason: "Chest pain follow-up".to_string(),
            referral_id: None,
            notes: None,
        }
    }
}

pub fn doctor(first_name: &str, last_name: &str) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        is_active: true,
    }
}

pub fn entry(day: i32, block: TimeBlock, capacity: u32) -> ScheduleEntryRequest {
    ScheduleEntryRequest {
        day_of_week: day,
        time_block: block,
        start_time: None,
        end_time: None,
        max_patients: Some(capacity),
        is_active: None,
    }
}
