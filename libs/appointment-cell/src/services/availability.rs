use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use futures::future::try_join_all;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{TimeBlock, WeeklyAvailabilitySlot};
use doctor_cell::services::{AvailabilityStore, ClinicDirectory};
use shared_models::error::SchedulingError;

use crate::models::{BlockAvailability, DoctorBlockAvailability};
use crate::services::ledger::BookingLedger;

/// Remaining block capacity per doctor and date. Read-only.
pub struct AvailabilityCalculator {
    store: Arc<dyn AvailabilityStore>,
    ledger: Arc<dyn BookingLedger>,
    directory: Arc<dyn ClinicDirectory>,
}

impl AvailabilityCalculator {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        ledger: Arc<dyn BookingLedger>,
        directory: Arc<dyn ClinicDirectory>,
    ) -> Self {
        Self { store, ledger, directory }
    }

    /// MORNING and AFTERNOON, in that order. FULL_DAY slots are ignored.
    pub async fn get_available_blocks(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockAvailability>, SchedulingError> {
        if self.directory.find_doctor(doctor_id).await?.is_none() {
            return Err(SchedulingError::not_found("Doctor", doctor_id));
        }
        self.blocks_for(doctor_id, date).await
    }

    /// Available doctors per block for a specialty. Both bookable blocks are
    /// always present, possibly with an empty list.
    pub async fn get_availability_by_specialty(
        &self,
        specialty_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeMap<TimeBlock, Vec<DoctorBlockAvailability>>, SchedulingError> {
        if self.directory.find_specialty(specialty_id).await?.is_none() {
            return Err(SchedulingError::not_found("Specialty", specialty_id));
        }

        let doctors = self.directory.doctors_with_specialty(specialty_id).await?;
        debug!("Computing {} availability for {} doctors", date, doctors.len());

        let per_doctor = try_join_all(doctors.iter().map(|doctor| async move {
            self.blocks_for(doctor.id, date)
                .await
                .map(|blocks| (doctor, blocks))
        }))
        .await?;

        let mut grouped: BTreeMap<TimeBlock, Vec<DoctorBlockAvailability>> =
            TimeBlock::BOOKABLE.into_iter().map(|block| (block, Vec::new())).collect();

        for (doctor, blocks) in per_doctor {
            for availability in blocks.into_iter().filter(|b| b.is_available) {
                grouped.entry(availability.block).or_default().push(DoctorBlockAvailability {
                    doctor_id: doctor.id,
                    doctor_name: doctor.full_name(),
                    block: availability.block,
                    capacity: availability.capacity,
                    current_count: availability.current_count,
                    remaining_slots: availability.remaining_slots,
                });
            }
        }

        Ok(grouped)
    }

    pub async fn has_block_capacity(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
    ) -> Result<bool, SchedulingError> {
        Ok(self.block_availability(doctor_id, date, block, None).await?.is_available)
    }

    /// Availability of one block, not counting `exclude` (an appointment
    /// being rescheduled).
    pub async fn block_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
        exclude: Option<Uuid>,
    ) -> Result<BlockAvailability, SchedulingError> {
        let slots = self.store.list_for_day(doctor_id, weekday_number(date)).await?;
        self.evaluate(doctor_id, date, block, &slots, exclude).await
    }

    async fn blocks_for(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<BlockAvailability>, SchedulingError> {
        let slots = self.store.list_for_day(doctor_id, weekday_number(date)).await?;

        let mut blocks = Vec::with_capacity(TimeBlock::BOOKABLE.len());
        for block in TimeBlock::BOOKABLE {
            blocks.push(self.evaluate(doctor_id, date, block, &slots, None).await?);
        }
        Ok(blocks)
    }

    async fn evaluate(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        block: TimeBlock,
        slots: &[WeeklyAvailabilitySlot],
        exclude: Option<Uuid>,
    ) -> Result<BlockAvailability, SchedulingError> {
        let current_count = self.ledger.count_active_in_block(doctor_id, date, block, exclude).await?;

        let slot = match block {
            TimeBlock::FullDay => None,
            _ => slots.iter().find(|slot| slot.time_block == block && slot.is_active),
        };

        Ok(match slot {
            None => BlockAvailability {
                block,
                is_available: false,
                capacity: 0,
                current_count,
                remaining_slots: 0,
            },
            Some(slot) => {
                let remaining_slots = slot.max_patients.saturating_sub(current_count);
                BlockAvailability {
                    block,
                    is_available: remaining_slots > 0,
                    capacity: slot.max_patients,
                    current_count,
                    remaining_slots,
                }
            }
        })
    }
}

/// 1 = Monday .. 7 = Sunday, matching slot weekdays.
pub fn weekday_number(date: NaiveDate) -> i32 {
    date.weekday().number_from_monday() as i32
}
