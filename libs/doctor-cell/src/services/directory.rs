use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::clinic::{Doctor, Patient, Specialty};
use shared_models::error::SchedulingError;

/// Read-only view of the clinic catalog owned by the patient, doctor and
/// specialty services.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, SchedulingError>;

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError>;

    async fn find_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, SchedulingError>;

    /// Specialty ids the doctor is credentialed for.
    async fn doctor_specialties(&self, doctor_id: Uuid) -> Result<Vec<Uuid>, SchedulingError>;

    /// Active doctors holding the specialty.
    async fn doctors_with_specialty(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, SchedulingError>;
}

/// Catalog snapshot used to seed the in-memory directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub specialties: Vec<Specialty>,
    #[serde(default)]
    pub doctor_specialties: Vec<DoctorSpecialtyLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSpecialtyLink {
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
}

#[derive(Debug, Default)]
struct Catalog {
    patients: HashMap<Uuid, Patient>,
    doctors: HashMap<Uuid, Doctor>,
    specialties: HashMap<Uuid, Specialty>,
    credentials: HashMap<Uuid, HashSet<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryClinicDirectory {
    catalog: Arc<RwLock<Catalog>>,
}

impl InMemoryClinicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed(seed: CatalogSeed) -> Self {
        let directory = Self::new();
        for patient in seed.patients {
            directory.add_patient(patient).await;
        }
        for doctor in seed.doctors {
            directory.add_doctor(doctor).await;
        }
        for specialty in seed.specialties {
            directory.add_specialty(specialty).await;
        }
        for link in seed.doctor_specialties {
            directory.assign_specialty(link.doctor_id, link.specialty_id).await;
        }
        directory
    }

    pub async fn add_patient(&self, patient: Patient) {
        self.catalog.write().await.patients.insert(patient.id, patient);
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.catalog.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn add_specialty(&self, specialty: Specialty) {
        self.catalog.write().await.specialties.insert(specialty.id, specialty);
    }

    pub async fn assign_specialty(&self, doctor_id: Uuid, specialty_id: Uuid) {
        self.catalog
            .write()
            .await
            .credentials
            .entry(doctor_id)
            .or_default()
            .insert(specialty_id);
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryClinicDirectory {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, SchedulingError> {
        Ok(self.catalog.read().await.patients.get(&patient_id).cloned())
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
        Ok(self.catalog.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn find_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, SchedulingError> {
        Ok(self.catalog.read().await.specialties.get(&specialty_id).cloned())
    }

    async fn doctor_specialties(&self, doctor_id: Uuid) -> Result<Vec<Uuid>, SchedulingError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .credentials
            .get(&doctor_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn doctors_with_specialty(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, SchedulingError> {
        let catalog = self.catalog.read().await;
        let mut doctors: Vec<Doctor> = catalog
            .credentials
            .iter()
            .filter(|(_, specialties)| specialties.contains(&specialty_id))
            .filter_map(|(doctor_id, _)| catalog.doctors.get(doctor_id))
            .filter(|doctor| doctor.is_active)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));
        Ok(doctors)
    }
}

/// Directory backed by the `patients`, `doctors`, `specialties` and
/// `doctor_specialties` tables.
pub struct SupabaseClinicDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseClinicDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn find_one<T>(&self, table: &str, id: Uuid) -> Result<Option<T>, SchedulingError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?id=eq.{}", table, id);
        let mut rows: Vec<T> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

#[derive(Debug, Deserialize)]
struct SpecialtyRef {
    specialty_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct DoctorRef {
    doctor_id: Uuid,
}

#[async_trait]
impl ClinicDirectory for SupabaseClinicDirectory {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, SchedulingError> {
        self.find_one("patients", patient_id).await
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
        self.find_one("doctors", doctor_id).await
    }

    async fn find_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, SchedulingError> {
        self.find_one("specialties", specialty_id).await
    }

    async fn doctor_specialties(&self, doctor_id: Uuid) -> Result<Vec<Uuid>, SchedulingError> {
        let path = format!("/rest/v1/doctor_specialties?doctor_id=eq.{}&select=specialty_id", doctor_id);
        let rows: Vec<SpecialtyRef> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|row| row.specialty_id).collect())
    }

    async fn doctors_with_specialty(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, SchedulingError> {
        let path = format!("/rest/v1/doctor_specialties?specialty_id=eq.{}&select=doctor_id", specialty_id);
        let links: Vec<DoctorRef> = self.supabase.request(Method::GET, &path, None).await?;

        if links.is_empty() {
            debug!("No doctors hold specialty {}", specialty_id);
            return Ok(Vec::new());
        }

        let ids = links
            .iter()
            .map(|link| link.doctor_id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/doctors?id=in.({})&is_active=eq.true&order=last_name.asc,first_name.asc",
            ids
        );
        let doctors: Vec<Doctor> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(doctors)
    }
}
