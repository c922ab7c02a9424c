use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::{BlockHours, SchedulingConfig};

// ==============================================================================
// TIME BLOCKS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeBlock {
    Morning,
    Afternoon,
    /// Legacy tag. Accepted in schedules but never offered for booking.
    FullDay,
}

impl TimeBlock {
    /// Blocks that carry bookable capacity, in reporting order.
    pub const BOOKABLE: [TimeBlock; 2] = [TimeBlock::Morning, TimeBlock::Afternoon];

    pub fn hours(&self, config: &SchedulingConfig) -> BlockHours {
        match self {
            TimeBlock::Morning => config.morning,
            TimeBlock::Afternoon => config.afternoon,
            TimeBlock::FullDay => config.full_day,
        }
    }

    /// Block a start time belongs to. Only MORNING and AFTERNOON are
    /// considered; morning wins if the configured hours overlap.
    pub fn for_time(time: NaiveTime, config: &SchedulingConfig) -> Option<TimeBlock> {
        Self::BOOKABLE
            .into_iter()
            .find(|block| block.hours(config).contains(time))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBlock::Morning => "MORNING",
            TimeBlock::Afternoon => "AFTERNOON",
            TimeBlock::FullDay => "FULL_DAY",
        }
    }
}

impl fmt::Display for TimeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MORNING" => Ok(TimeBlock::Morning),
            "AFTERNOON" => Ok(TimeBlock::Afternoon),
            "FULL_DAY" => Ok(TimeBlock::FullDay),
            other => Err(format!("Unknown time block: {}", other)),
        }
    }
}

/// 1 = Monday .. 7 = Sunday.
pub fn day_name(day_of_week: i32) -> &'static str {
    match day_of_week {
        1 => "MONDAY",
        2 => "TUESDAY",
        3 => "WEDNESDAY",
        4 => "THURSDAY",
        5 => "FRIDAY",
        6 => "SATURDAY",
        7 => "SUNDAY",
        _ => "UNKNOWN",
    }
}

// ==============================================================================
// WEEKLY AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyAvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub time_block: TimeBlock,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated slot configuration waiting to be reconciled into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotDraft {
    pub day_of_week: i32,
    pub time_block: TimeBlock,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: u32,
    pub is_active: bool,
}

impl SlotDraft {
    pub fn key(&self) -> (i32, TimeBlock) {
        (self.day_of_week, self.time_block)
    }

    pub fn matches(&self, slot: &WeeklyAvailabilitySlot) -> bool {
        slot.start_time == self.start_time
            && slot.end_time == self.end_time
            && slot.max_patients == self.max_patients
            && slot.is_active == self.is_active
    }

    pub fn into_slot(self, doctor_id: Uuid, now: DateTime<Utc>) -> WeeklyAvailabilitySlot {
        WeeklyAvailabilitySlot {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: self.day_of_week,
            time_block: self.time_block,
            start_time: self.start_time,
            end_time: self.end_time,
            max_patients: self.max_patients,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of reconciling a doctor's schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDiff {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Resulting slots within the reconciled scope.
    pub slots: Vec<WeeklyAvailabilitySlot>,
}

// ==============================================================================
// REQUEST / RESPONSE DTOs
// ==============================================================================

/// One entry of a wholesale weekly schedule. Hours and capacity default to
/// the configured block definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryRequest {
    pub day_of_week: i32,
    pub time_block: TimeBlock,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_patients: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBlockRequest {
    pub time_block: TimeBlock,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_patients: Option<u32>,
    pub is_active: Option<bool>,
}

impl DayBlockRequest {
    pub fn for_day(self, day_of_week: i32) -> ScheduleEntryRequest {
        ScheduleEntryRequest {
            day_of_week,
            time_block: self.time_block,
            start_time: self.start_time,
            end_time: self.end_time,
            max_patients: self.max_patients,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleRequest {
    pub entries: Vec<ScheduleEntryRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayScheduleRequest {
    pub blocks: Vec<DayBlockRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub day_of_week: i32,
    pub day_name: String,
    pub blocks: Vec<WeeklyAvailabilitySlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_block_derivation_uses_half_open_hours() {
        let config = SchedulingConfig::default();

        assert_eq!(TimeBlock::for_time(at(7, 0), &config), Some(TimeBlock::Morning));
        assert_eq!(TimeBlock::for_time(at(12, 30), &config), Some(TimeBlock::Morning));
        assert_eq!(TimeBlock::for_time(at(13, 0), &config), None);
        assert_eq!(TimeBlock::for_time(at(16, 0), &config), Some(TimeBlock::Afternoon));
        assert_eq!(TimeBlock::for_time(at(20, 0), &config), None);
        assert_eq!(TimeBlock::for_time(at(6, 59), &config), None);
    }

    #[test]
    fn test_full_day_is_never_derived() {
        let config = SchedulingConfig::default();
        for hour in 0..24 {
            assert_ne!(TimeBlock::for_time(at(hour, 0), &config), Some(TimeBlock::FullDay));
        }
    }

    #[test]
    fn test_time_block_wire_format() {
        assert_eq!(serde_json::to_string(&TimeBlock::FullDay).unwrap(), "\"FULL_DAY\"");
        assert_eq!(serde_json::from_str::<TimeBlock>("\"MORNING\"").unwrap(), TimeBlock::Morning);
        assert_eq!("afternoon".parse::<TimeBlock>(), Ok(TimeBlock::Afternoon));
    }
}
