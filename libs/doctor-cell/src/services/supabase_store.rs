use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::error::SchedulingError;

use crate::models::{ScheduleDiff, SlotDraft, WeeklyAvailabilitySlot};
use crate::services::store::AvailabilityStore;

/// Store over the `doctor_availability` table. Reconciliation runs inside the
/// `reconcile_weekly_schedule` database function so it commits as one
/// transaction.
pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn reconcile(
        &self,
        doctor_id: Uuid,
        day_of_week: Option<i32>,
        drafts: Vec<SlotDraft>,
    ) -> Result<ScheduleDiff, SchedulingError> {
        let diff: ScheduleDiff = self
            .supabase
            .rpc(
                "reconcile_weekly_schedule",
                json!({
                    "p_doctor_id": doctor_id,
                    "p_day_of_week": day_of_week,
                    "p_slots": drafts,
                }),
            )
            .await?;

        info!(
            "Reconciled schedule for doctor {}: {} created, {} updated, {} removed",
            doctor_id, diff.created, diff.updated, diff.removed
        );
        Ok(diff)
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn list_for_day(&self, doctor_id: Uuid, day_of_week: i32) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}&order=time_block.asc,created_at.asc",
            doctor_id, day_of_week
        );
        let slots: Vec<WeeklyAvailabilitySlot> = self.supabase.request(Method::GET, &path, None).await?;
        debug!("Loaded {} slots for doctor {} on day {}", slots.len(), doctor_id, day_of_week);
        Ok(slots)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&order=day_of_week.asc,time_block.asc,created_at.asc",
            doctor_id
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<WeeklyAvailabilitySlot>, SchedulingError> {
        let path = format!("/rest/v1/doctor_availability?id=eq.{}", slot_id);
        let slots: Vec<WeeklyAvailabilitySlot> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(slots.into_iter().next())
    }

    async fn replace_weekly_schedule(&self, doctor_id: Uuid, drafts: Vec<SlotDraft>) -> Result<ScheduleDiff, SchedulingError> {
        self.reconcile(doctor_id, None, drafts).await
    }

    async fn upsert_day_schedule(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        drafts: Vec<SlotDraft>,
    ) -> Result<ScheduleDiff, SchedulingError> {
        self.reconcile(doctor_id, Some(day_of_week), drafts).await
    }

    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/doctor_availability?id=eq.{}", slot_id);
        let deleted: Vec<WeeklyAvailabilitySlot> = self
            .supabase
            .request_returning(Method::DELETE, &path, None)
            .await?;
        Ok(!deleted.is_empty())
    }
}
