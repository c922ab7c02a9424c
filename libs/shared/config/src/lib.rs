use std::env;
use tracing::warn;

pub mod scheduling;

pub use scheduling::{
    BlockHours, ConflictPolicy, CredentialFallbackPolicy, SchedulingConfig,
};

/// Which persistence backend the scheduling cells run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub storage_backend: StorageBackend,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|raw| {
                    raw.parse().map_err(|_| warn!("SERVER_PORT '{}' is not a port, using 3000", raw)).ok()
                })
                .unwrap_or(3000),
            storage_backend: match env::var("SCHEDULING_BACKEND").as_deref() {
                Ok("supabase") => StorageBackend::Supabase,
                Ok("memory") | Err(_) => StorageBackend::Memory,
                Ok(other) => {
                    warn!("Unknown SCHEDULING_BACKEND '{}', using in-memory storage", other);
                    StorageBackend::Memory
                }
            },
            scheduling: SchedulingConfig::from_env(),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase backend selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used for server-side PostgREST calls. Falls back to the anon key.
    pub fn supabase_api_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}
