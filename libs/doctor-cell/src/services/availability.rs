use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::auth::ActingUser;
use shared_models::clinic::Doctor;
use shared_models::error::{RuleViolation, SchedulingError};

use crate::models::{
    day_name, DayBlockRequest, DaySchedule, ScheduleDiff, ScheduleEntryRequest, SlotDraft, TimeBlock,
};
use crate::services::directory::ClinicDirectory;
use crate::services::store::AvailabilityStore;

/// Maintains doctors' recurring weekly availability.
pub struct WeeklyScheduleService {
    store: Arc<dyn AvailabilityStore>,
    directory: Arc<dyn ClinicDirectory>,
    config: SchedulingConfig,
}

impl WeeklyScheduleService {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        directory: Arc<dyn ClinicDirectory>,
        config: SchedulingConfig,
    ) -> Self {
        Self { store, directory, config }
    }

    /// Replace the doctor's whole week. Existing slots for a (weekday, block)
    /// that is still present are updated in place; the rest are removed.
    #[instrument(skip(self, entries), fields(actor = %actor, entries = entries.len()))]
    pub async fn set_weekly_schedule(
        &self,
        actor: &ActingUser,
        doctor_id: Uuid,
        entries: Vec<ScheduleEntryRequest>,
    ) -> Result<ScheduleDiff, SchedulingError> {
        self.require_doctor(doctor_id).await?;
        let drafts = validate_entries(&self.config, entries)?;

        let diff = self.store.replace_weekly_schedule(doctor_id, drafts).await?;
        info!(
            "Weekly schedule for doctor {} saved by {}: {} slots",
            doctor_id, actor.id, diff.slots.len()
        );
        Ok(diff)
    }

    #[instrument(skip(self, blocks), fields(actor = %actor))]
    pub async fn set_day_schedule(
        &self,
        actor: &ActingUser,
        doctor_id: Uuid,
        day_of_week: i32,
        blocks: Vec<DayBlockRequest>,
    ) -> Result<ScheduleDiff, SchedulingError> {
        self.require_doctor(doctor_id).await?;
        validate_weekday(day_of_week)?;

        let entries = blocks.into_iter().map(|block| block.for_day(day_of_week)).collect();
        let drafts = validate_entries(&self.config, entries)?;

        let diff = self.store.upsert_day_schedule(doctor_id, day_of_week, drafts).await?;
        info!(
            "{} schedule for doctor {} saved by {}",
            day_name(day_of_week), doctor_id, actor.id
        );
        Ok(diff)
    }

    /// The doctor's week grouped by weekday. Days without slots are omitted.
    pub async fn get_weekly_schedule(&self, doctor_id: Uuid) -> Result<Vec<DaySchedule>, SchedulingError> {
        let doctor = self.require_doctor(doctor_id).await?;
        let slots = self.store.list_for_doctor(doctor_id).await?;

        let mut by_day: BTreeMap<i32, Vec<_>> = BTreeMap::new();
        for slot in slots {
            by_day.entry(slot.day_of_week).or_default().push(slot);
        }

        let doctor_name = doctor.full_name();
        Ok(by_day
            .into_iter()
            .map(|(day_of_week, blocks)| DaySchedule {
                doctor_id,
                doctor_name: doctor_name.clone(),
                day_of_week,
                day_name: day_name(day_of_week).to_string(),
                blocks,
            })
            .collect())
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_slot(&self, actor: &ActingUser, slot_id: Uuid) -> Result<(), SchedulingError> {
        if !self.store.delete_slot(slot_id).await? {
            return Err(SchedulingError::not_found("Availability slot", slot_id));
        }
        info!("Availability slot {} deleted by {}", slot_id, actor.id);
        Ok(())
    }

    /// Whether the doctor has an active slot for the block on that weekday.
    pub async fn is_doctor_available_on(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        block: TimeBlock,
    ) -> Result<bool, SchedulingError> {
        validate_weekday(day_of_week)?;
        let slots = self.store.list_for_day(doctor_id, day_of_week).await?;
        Ok(slots.iter().any(|slot| slot.time_block == block && slot.is_active))
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, SchedulingError> {
        self.directory
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Doctor", doctor_id))
    }
}

fn validate_weekday(day_of_week: i32) -> Result<(), SchedulingError> {
    if (1..=7).contains(&day_of_week) {
        Ok(())
    } else {
        Err(SchedulingError::validation(format!(
            "Day of week must be between 1 (Monday) and 7 (Sunday), got {}",
            day_of_week
        )))
    }
}

/// Turn raw schedule entries into drafts, filling hours and capacity from
/// the block definition.
pub fn validate_entries(
    config: &SchedulingConfig,
    entries: Vec<ScheduleEntryRequest>,
) -> Result<Vec<SlotDraft>, SchedulingError> {
    let mut seen = HashSet::new();
    let mut drafts = Vec::with_capacity(entries.len());

    for entry in entries {
        validate_weekday(entry.day_of_week)?;

        let hours = entry.time_block.hours(config);
        let max_patients = entry.max_patients.unwrap_or(hours.default_capacity);
        if max_patients == 0 {
            return Err(SchedulingError::validation("Maximum patients must be greater than zero"));
        }

        let start_time = entry.start_time.unwrap_or(hours.start);
        let end_time = entry.end_time.unwrap_or(hours.end);
        if start_time >= end_time {
            return Err(SchedulingError::validation(format!(
                "Start time {} must be before end time {}",
                start_time, end_time
            )));
        }

        let minutes = (end_time - start_time).num_minutes();
        if minutes < config.min_slot_minutes {
            return Err(SchedulingError::validation(format!(
                "Slot of {} minutes is shorter than the {} minute minimum",
                minutes, config.min_slot_minutes
            )));
        }

        if !seen.insert((entry.day_of_week, entry.time_block)) {
            warn!(
                "Rejected schedule with two {} entries on {}",
                entry.time_block,
                day_name(entry.day_of_week)
            );
            return Err(RuleViolation::DuplicateBlock {
                day_of_week: entry.day_of_week,
                block: entry.time_block.to_string(),
            }
            .into());
        }

        drafts.push(SlotDraft {
            day_of_week: entry.day_of_week,
            time_block: entry.time_block,
            start_time,
            end_time,
            max_patients,
            is_active: entry.is_active.unwrap_or(true),
        });
    }

    debug!("Validated {} schedule entries", drafts.len());
    Ok(drafts)
}
