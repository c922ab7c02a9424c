// libs/shared/config/src/scheduling.rs
use std::env;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Clock hours and default capacity of one named time block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub default_capacity: u32,
}

impl BlockHours {
    pub fn new(start: (u32, u32), end: (u32, u32), default_capacity: u32) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or(NaiveTime::MIN),
            default_capacity,
        }
    }

    /// Half-open membership: `start <= time < end`.
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }
}

/// How strictly the exact-start-time conflict check treats freed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Any appointment at the exact timestamp blocks it, even cancelled ones.
    AnyStatus,
    /// Only appointments that still occupy capacity block the timestamp.
    ActiveOnly,
}

/// What to do when a doctor's specialty list cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialFallbackPolicy {
    Reject,
    AssumeQualified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub morning: BlockHours,
    pub afternoon: BlockHours,
    pub full_day: BlockHours,
    pub min_slot_minutes: i64,
    pub conflict_policy: ConflictPolicy,
    pub credential_fallback: CredentialFallbackPolicy,
    pub reject_past_bookings: bool,
    pub enforce_referral_requirement: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            morning: BlockHours::new((7, 0), (13, 0), 20),
            afternoon: BlockHours::new((16, 0), (20, 0), 25),
            full_day: BlockHours::new((7, 0), (20, 0), 45),
            min_slot_minutes: 30,
            conflict_policy: ConflictPolicy::AnyStatus,
            credential_fallback: CredentialFallbackPolicy::Reject,
            reject_past_bookings: true,
            enforce_referral_requirement: false,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            morning: block_from_env("SCHEDULING_MORNING", defaults.morning),
            afternoon: block_from_env("SCHEDULING_AFTERNOON", defaults.afternoon),
            full_day: defaults.full_day,
            min_slot_minutes: parse_var("SCHEDULING_MIN_SLOT_MINUTES", defaults.min_slot_minutes),
            conflict_policy: match env::var("SCHEDULING_CONFLICT_POLICY").as_deref() {
                Ok("active_only") => ConflictPolicy::ActiveOnly,
                Ok("any_status") | Err(_) => ConflictPolicy::AnyStatus,
                Ok(other) => {
                    warn!("Unknown SCHEDULING_CONFLICT_POLICY '{}', using any_status", other);
                    ConflictPolicy::AnyStatus
                }
            },
            credential_fallback: match env::var("SCHEDULING_CREDENTIAL_FALLBACK").as_deref() {
                Ok("assume_qualified") => {
                    warn!("Credential fallback set to assume_qualified: doctors are booked when their specialties cannot be loaded");
                    CredentialFallbackPolicy::AssumeQualified
                }
                Ok("reject") | Err(_) => CredentialFallbackPolicy::Reject,
                Ok(other) => {
                    warn!("Unknown SCHEDULING_CREDENTIAL_FALLBACK '{}', using reject", other);
                    CredentialFallbackPolicy::Reject
                }
            },
            reject_past_bookings: parse_var("SCHEDULING_REJECT_PAST_BOOKINGS", defaults.reject_past_bookings),
            enforce_referral_requirement: parse_var("SCHEDULING_ENFORCE_REFERRALS", defaults.enforce_referral_requirement),
        };

        if config.morning.end > config.afternoon.start {
            warn!(
                "Morning block ends at {} after afternoon starts at {}; block derivation prefers morning",
                config.morning.end, config.afternoon.start
            );
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => parse_clock_time(&raw).unwrap_or_else(|| {
            warn!("{} has invalid time '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn block_from_env(prefix: &str, default: BlockHours) -> BlockHours {
    let start = parse_time_var(&format!("{}_START", prefix), default.start);
    let end = parse_time_var(&format!("{}_END", prefix), default.end);
    let default_capacity = parse_var(&format!("{}_CAPACITY", prefix), default.default_capacity);

    if start >= end || default_capacity == 0 {
        warn!("{} block is invalid ({}-{}, capacity {}), using defaults", prefix, start, end, default_capacity);
        return default;
    }

    BlockHours { start, end, default_capacity }
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
