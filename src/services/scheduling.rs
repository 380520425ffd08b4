use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use tracing::debug;

/// No other meeting may start inside this window after a confirmed start.
pub const BUFFER_MINUTES: i64 = 30;

/// Bookings are blocked while the local hour is in [0, OFF_HOURS_END).
pub const OFF_HOURS_END: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    OffHours,
    BufferConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCheck {
    Open,
    Blocked(BlockReason),
}

/// Why a meeting request was refused, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRejection {
    MissingTime,
    PastTime,
    OffHours,
    BufferConflict,
    ScheduleUnavailable,
}

impl RequestRejection {
    pub fn message(self) -> &'static str {
        match self {
            RequestRejection::MissingTime => "Please select a date and time.",
            RequestRejection::PastTime => "Cannot schedule a meeting in the past.",
            RequestRejection::OffHours => "Booking is unavailable between 12 AM and 6 AM.",
            RequestRejection::BufferConflict => {
                "This time slot is too close to another confirmed meeting. \
                 Please choose a later time."
            }
            RequestRejection::ScheduleUnavailable => {
                "Could not verify schedule. Please try again."
            }
        }
    }
}

/// Parse a requested meeting time. Accepts RFC 3339, or a naive
/// `YYYY-MM-DDTHH:MM[:SS]` interpreted as civil time in the configured
/// booking offset.
pub fn parse_requested_time(raw: &str, booking_offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            if let Some(local) = booking_offset.from_local_datetime(&naive).single() {
                return Some(local.with_timezone(&Utc));
            }
        }
    }

    debug!("Failed to parse requested time: {}", raw);
    None
}

/// Rule 1: the candidate's hour-of-day in the booking timezone falls in the
/// blocked early-morning window.
pub fn is_off_hours(candidate: DateTime<Utc>, booking_offset: FixedOffset) -> bool {
    candidate.with_timezone(&booking_offset).hour() < OFF_HOURS_END
}

/// Rule 2: the candidate starts inside `[start, start + 30min)` of any
/// confirmed meeting. Lower bound inclusive, upper bound exclusive; the
/// confirmed list may be in any order.
pub fn buffer_conflict(candidate: DateTime<Utc>, confirmed: &[DateTime<Utc>]) -> bool {
    confirmed.iter().any(|start| {
        candidate >= *start && candidate < *start + Duration::minutes(BUFFER_MINUTES)
    })
}

/// Pure conflict checker: decides whether a candidate instant is bookable
/// against the given confirmed start times. Deterministic and side-effect
/// free, so it gives identical answers as a pre-check and at persistence
/// time for identical inputs.
pub fn check_slot(
    candidate: DateTime<Utc>,
    confirmed: &[DateTime<Utc>],
    booking_offset: FixedOffset,
) -> SlotCheck {
    if is_off_hours(candidate, booking_offset) {
        return SlotCheck::Blocked(BlockReason::OffHours);
    }
    if buffer_conflict(candidate, confirmed) {
        return SlotCheck::Blocked(BlockReason::BufferConflict);
    }
    SlotCheck::Open
}

/// Validate a raw requested time up to (but not including) the store fetch:
/// presence and parseability, then the past check, then the off-hours rule.
/// The buffer rule runs separately once the confirmed set has been fetched,
/// preserving the check order of the request flow.
pub fn validate_requested_time(
    raw: Option<&str>,
    now: DateTime<Utc>,
    booking_offset: FixedOffset,
) -> Result<DateTime<Utc>, RequestRejection> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(RequestRejection::MissingTime)?;

    let candidate =
        parse_requested_time(raw, booking_offset).ok_or(RequestRejection::MissingTime)?;

    // Strictly in the future: the exact current instant is rejected
    if candidate <= now {
        return Err(RequestRejection::PastTime);
    }

    if is_off_hours(candidate, booking_offset) {
        return Err(RequestRejection::OffHours);
    }

    Ok(candidate)
}
