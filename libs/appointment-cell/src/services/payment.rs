use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_models::auth::ActingUser;
use shared_models::error::SchedulingError;

use crate::models::{Appointment, AppointmentFilter, PaymentEvent, PaymentStatus};
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Feeds payment lifecycle events into appointments. Only the payment status
/// changes; the appointment status is left as is.
pub struct PaymentStatusBridge {
    ledger: Arc<dyn BookingLedger>,
    lifecycle: AppointmentLifecycleService,
}

impl PaymentStatusBridge {
    pub fn new(ledger: Arc<dyn BookingLedger>) -> Self {
        Self {
            ledger,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn handle_payment_event(
        &self,
        actor: &ActingUser,
        appointment_id: Uuid,
        event: PaymentEvent,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment_id))?;

        let target = event.target_status();
        if !self.lifecycle.validate_payment_transition(appointment.payment_status, target)? {
            debug!("Payment of appointment {} already {}", appointment_id, target);
            return Ok(appointment);
        }

        let updated = self
            .ledger
            .set_payment_status(appointment_id, appointment.payment_status, target, &actor.id)
            .await?;

        info!(
            "Payment of appointment {} moved from {} to {}",
            appointment_id, appointment.payment_status, updated.payment_status
        );
        Ok(updated)
    }

    /// Appointments still holding a slot whose payment failed.
    pub async fn pending_follow_up(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let failed = self
            .ledger
            .list(&AppointmentFilter {
                payment_status: Some(PaymentStatus::Failed),
                ..Default::default()
            })
            .await?;

        Ok(failed.into_iter().filter(|a| a.occupies_capacity()).collect())
    }
}
