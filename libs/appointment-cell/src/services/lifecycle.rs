// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::error::RuleViolation;

use crate::models::{AppointmentEvent, AppointmentStatus, PaymentStatus};

/// Appointment and payment state machines.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Status reached by applying `event`, or the violation if the event is
    /// not allowed from `current`.
    pub fn next_status(
        &self,
        current: AppointmentStatus,
        event: &AppointmentEvent,
    ) -> Result<AppointmentStatus, RuleViolation> {
        use AppointmentStatus::*;

        let next = match (current, event) {
            (Scheduled, AppointmentEvent::Confirm) => Confirmed,
            (Confirmed, AppointmentEvent::Complete) => Completed,
            (Confirmed, AppointmentEvent::MarkNoShow) => NoShow,
            (Scheduled | Confirmed, AppointmentEvent::Cancel { .. }) => Cancelled,
            _ => {
                warn!("Invalid transition attempted: {} on {}", event.name(), current);
                return Err(RuleViolation::InvalidTransition {
                    from: current.to_string(),
                    event: event.name().to_string(),
                });
            }
        };

        debug!("Transition {} --{}--> {}", current, event.name(), next);
        Ok(next)
    }

    /// Events accepted from `current`.
    pub fn allowed_events(&self, current: AppointmentStatus) -> Vec<&'static str> {
        match current {
            AppointmentStatus::Scheduled => vec!["confirm", "cancel"],
            AppointmentStatus::Confirmed => vec!["complete", "mark_no_show", "cancel"],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Returns `Ok(false)` when `next` equals `current` (a replayed event).
    pub fn validate_payment_transition(
        &self,
        current: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, RuleViolation> {
        use PaymentStatus::*;

        if current == next {
            return Ok(false);
        }

        match (current, next) {
            (Processing, Completed) | (Processing, Failed) | (Failed, Completed) | (Completed, Refunded) => Ok(true),
            _ => Err(RuleViolation::InvalidPaymentTransition {
                from: current.to_string(),
                to: next.to_string(),
            }),
        }
    }
}
