use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::error::SchedulingError;

use crate::models::{ScheduleDiff, SlotDraft, TimeBlock, WeeklyAvailabilitySlot};

/// Persistence port for doctors' recurring weekly availability.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn list_for_day(&self, doctor_id: Uuid, day_of_week: i32) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError>;

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<WeeklyAvailabilitySlot>, SchedulingError>;

    /// Reconcile the doctor's whole week against `drafts` in one atomic step.
    /// Slots keep their identity when their (weekday, block) survives.
    async fn replace_weekly_schedule(&self, doctor_id: Uuid, drafts: Vec<SlotDraft>) -> Result<ScheduleDiff, SchedulingError>;

    /// Same as `replace_weekly_schedule` but scoped to a single weekday.
    async fn upsert_day_schedule(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        drafts: Vec<SlotDraft>,
    ) -> Result<ScheduleDiff, SchedulingError>;

    /// Returns false when no slot had that id.
    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool, SchedulingError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub diff: ScheduleDiff,
    pub removed_ids: Vec<Uuid>,
}

/// Diff `existing` (already restricted to the scope being replaced) against
/// `drafts`. Extra rows sharing a (weekday, block) key are removed.
pub fn reconcile(
    doctor_id: Uuid,
    existing: Vec<WeeklyAvailabilitySlot>,
    drafts: Vec<SlotDraft>,
    now: DateTime<Utc>,
) -> Reconciliation {
    let mut by_key: HashMap<(i32, TimeBlock), WeeklyAvailabilitySlot> = HashMap::new();
    let mut removed_ids = Vec::new();

    for slot in existing {
        let key = (slot.day_of_week, slot.time_block);
        if by_key.contains_key(&key) {
            removed_ids.push(slot.id);
        } else {
            by_key.insert(key, slot);
        }
    }

    let mut diff = ScheduleDiff::default();

    for draft in drafts {
        match by_key.remove(&draft.key()) {
            Some(current) if draft.matches(&current) => {
                diff.unchanged += 1;
                diff.slots.push(current);
            }
            Some(current) => {
                diff.updated += 1;
                diff.slots.push(WeeklyAvailabilitySlot {
                    start_time: draft.start_time,
                    end_time: draft.end_time,
                    max_patients: draft.max_patients,
                    is_active: draft.is_active,
                    updated_at: now,
                    ..current
                });
            }
            None => {
                diff.created += 1;
                diff.slots.push(draft.into_slot(doctor_id, now));
            }
        }
    }

    removed_ids.extend(by_key.into_values().map(|slot| slot.id));
    diff.removed = removed_ids.len();
    diff.slots.sort_by_key(|slot| (slot.day_of_week, slot.time_block));

    Reconciliation { diff, removed_ids }
}

/// Process-local store. Every reconciliation runs under one write guard.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAvailabilityStore {
    slots: Arc<RwLock<HashMap<Uuid, WeeklyAvailabilitySlot>>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }

    async fn reconcile_scope(
        &self,
        doctor_id: Uuid,
        day_of_week: Option<i32>,
        drafts: Vec<SlotDraft>,
    ) -> ScheduleDiff {
        let mut slots = self.slots.write().await;

        let in_scope: Vec<WeeklyAvailabilitySlot> = slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .filter(|slot| day_of_week.map_or(true, |day| slot.day_of_week == day))
            .cloned()
            .collect();

        let Reconciliation { diff, removed_ids } = reconcile(doctor_id, in_scope, drafts, Utc::now());

        for id in &removed_ids {
            slots.remove(id);
        }
        for slot in &diff.slots {
            slots.insert(slot.id, slot.clone());
        }

        debug!(
            "Reconciled schedule for doctor {}: {} created, {} updated, {} removed",
            doctor_id, diff.created, diff.updated, diff.removed
        );

        diff
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn list_for_day(&self, doctor_id: Uuid, day_of_week: i32) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError> {
        let slots = self.slots.read().await;
        let mut matching: Vec<_> = slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id && slot.day_of_week == day_of_week)
            .cloned()
            .collect();
        matching.sort_by_key(|slot| (slot.time_block, slot.created_at));
        Ok(matching)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingError> {
        let slots = self.slots.read().await;
        let mut matching: Vec<_> = slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .cloned()
            .collect();
        matching.sort_by_key(|slot| (slot.day_of_week, slot.time_block, slot.created_at));
        Ok(matching)
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<WeeklyAvailabilitySlot>, SchedulingError> {
        Ok(self.slots.read().await.get(&slot_id).cloned())
    }

    async fn replace_weekly_schedule(&self, doctor_id: Uuid, drafts: Vec<SlotDraft>) -> Result<ScheduleDiff, SchedulingError> {
        Ok(self.reconcile_scope(doctor_id, None, drafts).await)
    }

    async fn upsert_day_schedule(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        drafts: Vec<SlotDraft>,
    ) -> Result<ScheduleDiff, SchedulingError> {
        Ok(self.reconcile_scope(doctor_id, Some(day_of_week), drafts).await)
    }

    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.slots.write().await.remove(&slot_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn draft(day: i32, block: TimeBlock, capacity: u32) -> SlotDraft {
        let (start, end) = match block {
            TimeBlock::Morning => ((7, 0), (13, 0)),
            TimeBlock::Afternoon => ((16, 0), (20, 0)),
            TimeBlock::FullDay => ((7, 0), (20, 0)),
        };
        SlotDraft {
            day_of_week: day,
            time_block: block,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            max_patients: capacity,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_replace_keeps_identity_of_surviving_slots() {
        let store = InMemoryAvailabilityStore::new();
        let doctor_id = Uuid::new_v4();

        let first = store
            .replace_weekly_schedule(doctor_id, vec![draft(1, TimeBlock::Morning, 10), draft(2, TimeBlock::Afternoon, 5)])
            .await
            .unwrap();
        assert_eq!(first.created, 2);

        let monday_id = first.slots[0].id;

        let second = store
            .replace_weekly_schedule(doctor_id, vec![draft(1, TimeBlock::Morning, 12), draft(3, TimeBlock::Morning, 4)])
            .await
            .unwrap();

        assert_eq!((second.created, second.updated, second.removed), (1, 1, 1));
        let monday = store.list_for_day(doctor_id, 1).await.unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].id, monday_id);
        assert_eq!(monday[0].max_patients, 12);
        assert!(store.list_for_day(doctor_id, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_day_upsert_leaves_other_days_alone() {
        let store = InMemoryAvailabilityStore::new();
        let doctor_id = Uuid::new_v4();
        let other_doctor = Uuid::new_v4();

        store
            .replace_weekly_schedule(doctor_id, vec![draft(1, TimeBlock::Morning, 10), draft(2, TimeBlock::Morning, 10)])
            .await
            .unwrap();
        store
            .replace_weekly_schedule(other_doctor, vec![draft(1, TimeBlock::Morning, 3)])
            .await
            .unwrap();

        let diff = store
            .upsert_day_schedule(doctor_id, 1, vec![draft(1, TimeBlock::Afternoon, 8)])
            .await
            .unwrap();

        assert_eq!((diff.created, diff.removed), (1, 1));
        assert_eq!(store.list_for_doctor(doctor_id).await.unwrap().len(), 2);
        assert_eq!(store.list_for_doctor(other_doctor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_slots_are_not_touched() {
        let store = InMemoryAvailabilityStore::new();
        let doctor_id = Uuid::new_v4();

        let first = store.replace_weekly_schedule(doctor_id, vec![draft(4, TimeBlock::Morning, 6)]).await.unwrap();
        let second = store.replace_weekly_schedule(doctor_id, vec![draft(4, TimeBlock::Morning, 6)]).await.unwrap();

        assert_eq!(second.unchanged, 1);
        assert_eq!(second.slots[0].updated_at, first.slots[0].updated_at);
    }

    #[tokio::test]
    async fn test_delete_slot() {
        let store = InMemoryAvailabilityStore::new();
        let doctor_id = Uuid::new_v4();
        let diff = store.replace_weekly_schedule(doctor_id, vec![draft(5, TimeBlock::Morning, 6)]).await.unwrap();

        assert!(store.delete_slot(diff.slots[0].id).await.unwrap());
        assert!(!store.delete_slot(diff.slots[0].id).await.unwrap());
        assert_eq!(store.slot_count().await, 0);
    }
}
