pub mod availability;
pub mod booking;
pub mod ledger;
pub mod lifecycle;
pub mod payment;
pub mod supabase_ledger;

pub use availability::AvailabilityCalculator;
pub use booking::BookingEngine;
pub use ledger::{BookingLedger, InMemoryBookingLedger};
pub use lifecycle::AppointmentLifecycleService;
pub use payment::PaymentStatusBridge;
pub use supabase_ledger::SupabaseBookingLedger;
