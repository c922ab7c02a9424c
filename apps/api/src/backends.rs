use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use appointment_cell::services::{BookingLedger, InMemoryBookingLedger, SupabaseBookingLedger};
use doctor_cell::services::{
    AvailabilityStore, CatalogSeed, ClinicDirectory, InMemoryAvailabilityStore, InMemoryClinicDirectory,
    SupabaseAvailabilityStore, SupabaseClinicDirectory,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::supabase::SupabaseClient;

/// The three persistence ports, all on the same backend.
pub struct Backends {
    pub store: Arc<dyn AvailabilityStore>,
    pub ledger: Arc<dyn BookingLedger>,
    pub directory: Arc<dyn ClinicDirectory>,
}

impl Backends {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                let supabase = Arc::new(SupabaseClient::new(config));
                Ok(Self {
                    store: Arc::new(SupabaseAvailabilityStore::new(supabase.clone())),
                    ledger: Arc::new(SupabaseBookingLedger::new(supabase.clone())),
                    directory: Arc::new(SupabaseClinicDirectory::new(supabase)),
                })
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage; schedules and appointments are lost on restart");
                Ok(Self {
                    store: Arc::new(InMemoryAvailabilityStore::new()),
                    ledger: Arc::new(InMemoryBookingLedger::new()),
                    directory: Arc::new(seeded_directory().await?),
                })
            }
        }
    }
}

/// Loads the catalog from `CLINIC_SEED_FILE` when set.
async fn seeded_directory() -> anyhow::Result<InMemoryClinicDirectory> {
    let Ok(path) = std::env::var("CLINIC_SEED_FILE") else {
        warn!("CLINIC_SEED_FILE not set, starting with an empty clinic catalog");
        return Ok(InMemoryClinicDirectory::new());
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read clinic seed file {}", path))?;
    let seed: CatalogSeed = serde_json::from_str(&raw)
        .with_context(|| format!("clinic seed file {} is not a valid catalog", path))?;

    info!(
        "Seeded catalog with {} patients, {} doctors and {} specialties",
        seed.patients.len(),
        seed.doctors.len(),
        seed.specialties.len()
    );
    Ok(InMemoryClinicDirectory::from_seed(seed).await)
}
