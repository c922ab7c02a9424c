pub mod availability;
pub mod directory;
pub mod store;
pub mod supabase_store;

pub use availability::WeeklyScheduleService;
pub use directory::{CatalogSeed, ClinicDirectory, InMemoryClinicDirectory, SupabaseClinicDirectory};
pub use store::{AvailabilityStore, InMemoryAvailabilityStore};
pub use supabase_store::SupabaseAvailabilityStore;
