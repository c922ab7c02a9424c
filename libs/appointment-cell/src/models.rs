// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::TimeBlock;
use shared_config::ConflictPolicy;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub referral_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub time_block: TimeBlock,
    pub price: Decimal,
    pub reason: String,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub follow_up_appointment_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub status: AppointmentStatus,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether the appointment still holds a unit of block capacity.
    pub fn occupies_capacity(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_at(&self, doctor_id: Uuid, date: NaiveDate, start_time: NaiveTime) -> bool {
        self.doctor_id == doctor_id && self.appointment_date == date && self.start_time == start_time
    }

    /// Whether this appointment blocks another booking at the same exact time.
    pub fn blocks_timestamp(&self, policy: ConflictPolicy) -> bool {
        match policy {
            ConflictPolicy::AnyStatus => true,
            ConflictPolicy::ActiveOnly => self.occupies_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Counted against block capacity.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed | AppointmentStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// EVENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppointmentEvent {
    Confirm,
    Complete,
    Cancel { reason: String },
    MarkNoShow,
}

impl AppointmentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppointmentEvent::Confirm => "confirm",
            AppointmentEvent::Complete => "complete",
            AppointmentEvent::Cancel { .. } => "cancel",
            AppointmentEvent::MarkNoShow => "mark_no_show",
        }
    }
}

/// Notifications from the payment service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    Confirmed,
    Failed,
    Refunded,
}

impl PaymentEvent {
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            PaymentEvent::Confirmed => PaymentStatus::Completed,
            PaymentEvent::Failed => PaymentStatus::Failed,
            PaymentEvent::Refunded => PaymentStatus::Refunded,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub reason: String,
    pub referral_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields are left untouched; a blank reason is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub follow_up_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventRequest {
    pub event: PaymentEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub time_block: Option<TimeBlock>,
    pub payment_status: Option<PaymentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.date.map_or(true, |date| appointment.appointment_date == date)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.time_block.map_or(true, |block| appointment.time_block == block)
            && self.payment_status.map_or(true, |status| appointment.payment_status == status)
    }
}

/// What the ledger must re-verify atomically before committing a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityClaim {
    pub block: TimeBlock,
    pub capacity: u32,
    pub conflict_policy: ConflictPolicy,
}

// ==============================================================================
// AVAILABILITY RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockAvailability {
    pub block: TimeBlock,
    pub is_available: bool,
    pub capacity: u32,
    pub current_count: u32,
    pub remaining_slots: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorBlockAvailability {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub block: TimeBlock,
    pub capacity: u32,
    pub current_count: u32,
    pub remaining_slots: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let cancel: AppointmentEvent =
            serde_json::from_str(r#"{"event":"cancel","reason":"patient travelling"}"#).unwrap();
        assert_eq!(cancel, AppointmentEvent::Cancel { reason: "patient travelling".to_string() });

        let no_show: AppointmentEvent = serde_json::from_str(r#"{"event":"mark_no_show"}"#).unwrap();
        assert_eq!(no_show, AppointmentEvent::MarkNoShow);

        assert_eq!(serde_json::to_string(&AppointmentStatus::NoShow).unwrap(), "\"NO_SHOW\"");
    }

    #[test]
    fn test_active_and_terminal_statuses() {
        let active: Vec<_> = AppointmentStatus::ALL.into_iter().filter(|s| s.is_active()).collect();
        assert_eq!(
            active,
            vec![AppointmentStatus::Scheduled, AppointmentStatus::Confirmed, AppointmentStatus::Completed]
        );
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }
}
