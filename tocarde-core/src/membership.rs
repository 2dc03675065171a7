use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// An existing active membership period, as fetched for the overlap
/// check. Inactive periods must be filtered out by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ActivePeriod {
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Closed-interval overlap test: start1 <= end2 and end1 >= start2.
pub fn overlaps(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 <= end2 && end1 >= start2
}

/// Rejects a period whose end precedes its start.
pub fn validate_period(
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<(), DomainError> {
    if end_date < start_date {
        return Err(DomainError::invalid_state(
            "end_date",
            "end date must not precede start date",
        ));
    }
    Ok(())
}

/// Enforced on create and update; `excluding` skips the record being
/// updated so a membership can be edited in place.
pub fn ensure_no_overlap(
    existing: &[ActivePeriod],
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    excluding: Option<Uuid>,
) -> Result<(), DomainError> {
    validate_period(start_date, end_date)?;

    let conflicting = existing
        .iter()
        .filter(|p| Some(p.id) != excluding)
        .any(|p| overlaps(start_date, end_date, p.start_date, p.end_date));

    if conflicting {
        return Err(DomainError::conflict(
            "start_date",
            "this user already has an active membership during this period",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn period(start: DateTime<Utc>, end: DateTime<Utc>) -> ActivePeriod {
        ActivePeriod {
            id: Uuid::new_v4(),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_overlapping_period_rejected() {
        let existing = vec![period(date(2024, 1, 1), date(2024, 12, 31))];
        let err = ensure_no_overlap(&existing, date(2024, 6, 1), date(2025, 1, 1), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn test_adjacent_period_accepted() {
        let existing = vec![period(date(2024, 1, 1), date(2024, 12, 31))];
        ensure_no_overlap(&existing, date(2025, 1, 1), date(2025, 12, 31), None).unwrap();
    }

    #[test]
    fn test_shared_boundary_day_overlaps() {
        // start1 <= end2 and end1 >= start2 holds when the new period
        // starts exactly on the existing end date.
        assert!(overlaps(
            date(2024, 12, 31),
            date(2025, 12, 31),
            date(2024, 1, 1),
            date(2024, 12, 31),
        ));
    }

    #[test]
    fn test_excluding_skips_the_record_being_updated() {
        let current = period(date(2024, 1, 1), date(2024, 12, 31));
        let existing = vec![current];
        // Extending the same membership does not conflict with itself.
        ensure_no_overlap(&existing, date(2024, 1, 1), date(2025, 6, 30), Some(current.id))
            .unwrap();
    }

    #[test]
    fn test_inverted_period_rejected() {
        let err = ensure_no_overlap(&[], date(2025, 1, 1), date(2024, 1, 1), None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }
}
