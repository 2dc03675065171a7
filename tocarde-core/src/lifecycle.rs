use uuid::Uuid;

use crate::error::DomainError;
use crate::ledger::CapacityView;
use crate::models::{RequestAction, RequestStatus};

/// The state of a request an actor wants to act on, as read inside the
/// caller's transaction. `owner` is the trip driver or hosting host;
/// `units` is the seat count for carpool requests and 1 for hostings.
#[derive(Debug, Clone, Copy)]
pub struct RequestSnapshot {
    pub owner: Uuid,
    pub requester: Uuid,
    pub status: RequestStatus,
    pub units: i64,
}

/// Validates and applies a lifecycle action, returning the new status.
///
/// Accept and reject are owner-only transitions out of Pending; cancel is
/// requester-only and allowed from Pending or Accepted. Rejected and
/// Cancelled are terminal. Accepting additionally requires enough
/// remaining capacity for the request's units.
pub fn apply_action(
    snapshot: &RequestSnapshot,
    actor: Uuid,
    action: RequestAction,
    capacity: &CapacityView,
) -> Result<RequestStatus, DomainError> {
    match action {
        RequestAction::Accept | RequestAction::Reject => {
            if actor != snapshot.owner {
                return Err(DomainError::forbidden(
                    "action",
                    "only the owner can accept or reject a request",
                ));
            }
            if snapshot.status != RequestStatus::Pending {
                return Err(DomainError::invalid_state(
                    "action",
                    format!(
                        "this request is already {}",
                        snapshot.status.as_str().to_lowercase()
                    ),
                ));
            }
            if action == RequestAction::Accept {
                if capacity.remaining() < snapshot.units {
                    return Err(DomainError::capacity_exceeded(
                        "action",
                        format!(
                            "requested {} unit(s) but only {} remaining",
                            snapshot.units,
                            capacity.remaining().max(0)
                        ),
                    ));
                }
                Ok(RequestStatus::Accepted)
            } else {
                Ok(RequestStatus::Rejected)
            }
        }
        RequestAction::Cancel => {
            if actor != snapshot.requester {
                return Err(DomainError::forbidden(
                    "action",
                    "only the requester can cancel a request",
                ));
            }
            if snapshot.status.is_terminal() {
                return Err(DomainError::invalid_state(
                    "action",
                    format!(
                        "this request is already {}",
                        snapshot.status.as_str().to_lowercase()
                    ),
                ));
            }
            // Cancelling an accepted request frees its units immediately,
            // since remaining capacity is recomputed on every read.
            Ok(RequestStatus::Cancelled)
        }
    }
}

/// Validates the creation of a new request against a resource.
///
/// `existing_live` is the status of any live (Pending or Accepted)
/// request the requester already holds against the uniqueness key:
/// the trip for carpooling, the whole event for hosting.
pub fn validate_create(
    owner: Uuid,
    requester: Uuid,
    capacity: &CapacityView,
    units: i64,
    existing_live: Option<RequestStatus>,
) -> Result<(), DomainError> {
    if requester == owner {
        return Err(DomainError::forbidden(
            "requester",
            "you cannot request your own resource",
        ));
    }

    match existing_live {
        Some(RequestStatus::Pending) => {
            return Err(DomainError::conflict(
                "requester",
                "you already have a pending request for this resource",
            ));
        }
        Some(RequestStatus::Accepted) => {
            return Err(DomainError::conflict(
                "requester",
                "you already have an accepted request for this resource",
            ));
        }
        _ => {}
    }

    if capacity.remaining() < units {
        return Err(DomainError::capacity_exceeded(
            "units",
            format!(
                "requested {} unit(s) but only {} remaining",
                units,
                capacity.remaining().max(0)
            ),
        ));
    }

    Ok(())
}

/// Guard for capacity edits: a resource's total may not be reduced below
/// the units already accepted. Evaluated under the same lock as accepts.
pub fn validate_capacity_edit(
    new_total: i64,
    accepted_units: i64,
) -> Result<(), DomainError> {
    if new_total < accepted_units {
        return Err(DomainError::conflict(
            "total_units",
            format!(
                "{} unit(s) are already accepted; reduce or cancel requests first",
                accepted_units
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: RequestStatus, units: i64) -> (RequestSnapshot, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        (
            RequestSnapshot {
                owner,
                requester,
                status,
                units,
            },
            owner,
            requester,
        )
    }

    #[test]
    fn test_accept_happy_path() {
        let (snap, owner, _) = snapshot(RequestStatus::Pending, 2);
        let capacity = CapacityView::new(3, 0);
        let next = apply_action(&snap, owner, RequestAction::Accept, &capacity).unwrap();
        assert_eq!(next, RequestStatus::Accepted);
    }

    #[test]
    fn test_accept_requires_owner() {
        let (snap, _, requester) = snapshot(RequestStatus::Pending, 1);
        let capacity = CapacityView::new(3, 0);
        let err = apply_action(&snap, requester, RequestAction::Accept, &capacity).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[test]
    fn test_accept_requires_capacity() {
        let (snap, owner, _) = snapshot(RequestStatus::Pending, 2);
        let capacity = CapacityView::new(3, 2);
        let err = apply_action(&snap, owner, RequestAction::Accept, &capacity).unwrap_err();
        assert!(matches!(err, DomainError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_accept_only_from_pending() {
        for status in [
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            let (snap, owner, _) = snapshot(status, 1);
            let capacity = CapacityView::new(3, 0);
            let err = apply_action(&snap, owner, RequestAction::Accept, &capacity).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState { .. }));
        }
    }

    #[test]
    fn test_reject_only_from_pending() {
        let (snap, owner, _) = snapshot(RequestStatus::Pending, 1);
        let capacity = CapacityView::new(3, 3);
        // Rejecting needs no capacity.
        let next = apply_action(&snap, owner, RequestAction::Reject, &capacity).unwrap();
        assert_eq!(next, RequestStatus::Rejected);

        let (snap, owner, _) = snapshot(RequestStatus::Accepted, 1);
        let err = apply_action(&snap, owner, RequestAction::Reject, &capacity).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[test]
    fn test_cancel_from_pending_and_accepted() {
        let capacity = CapacityView::new(3, 3);
        for status in [RequestStatus::Pending, RequestStatus::Accepted] {
            let (snap, _, requester) = snapshot(status, 1);
            let next = apply_action(&snap, requester, RequestAction::Cancel, &capacity).unwrap();
            assert_eq!(next, RequestStatus::Cancelled);
        }
    }

    #[test]
    fn test_cancel_not_from_terminal() {
        let capacity = CapacityView::new(3, 0);
        for status in [RequestStatus::Rejected, RequestStatus::Cancelled] {
            let (snap, _, requester) = snapshot(status, 1);
            let err =
                apply_action(&snap, requester, RequestAction::Cancel, &capacity).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState { .. }));
        }
    }

    #[test]
    fn test_cancel_requires_requester() {
        let capacity = CapacityView::new(3, 0);
        let (snap, owner, _) = snapshot(RequestStatus::Pending, 1);
        let err = apply_action(&snap, owner, RequestAction::Cancel, &capacity).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[test]
    fn test_create_rejects_self_request() {
        let owner = Uuid::new_v4();
        let capacity = CapacityView::new(3, 0);
        let err = validate_create(owner, owner, &capacity, 1, None).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[test]
    fn test_create_conflict_messages_distinguish_state() {
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let capacity = CapacityView::new(3, 0);

        let err = validate_create(owner, requester, &capacity, 1, Some(RequestStatus::Pending))
            .unwrap_err();
        assert!(err.message().contains("pending"));

        let err = validate_create(owner, requester, &capacity, 1, Some(RequestStatus::Accepted))
            .unwrap_err();
        assert!(err.message().contains("accepted"));
    }

    #[test]
    fn test_create_checks_capacity() {
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let capacity = CapacityView::new(3, 2);
        let err = validate_create(owner, requester, &capacity, 2, None).unwrap_err();
        assert!(matches!(err, DomainError::CapacityExceeded { .. }));
        assert!(validate_create(owner, requester, &capacity, 1, None).is_ok());
    }

    // Scenario from the carpool rules: seats_total = 3.
    // A requests 2 and is accepted, B's 2-seat request is refused,
    // B's 1-seat request fills the trip, C is refused.
    #[test]
    fn test_three_seat_trip_scenario() {
        let driver = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        // A requests 2 seats and the driver accepts.
        let capacity = CapacityView::new(3, 0);
        validate_create(driver, a, &capacity, 2, None).unwrap();
        let snap = RequestSnapshot {
            owner: driver,
            requester: a,
            status: RequestStatus::Pending,
            units: 2,
        };
        assert_eq!(
            apply_action(&snap, driver, RequestAction::Accept, &capacity).unwrap(),
            RequestStatus::Accepted
        );

        // One seat left: B cannot request 2 but can request 1.
        let capacity = CapacityView::new(3, 2);
        assert!(validate_create(driver, b, &capacity, 2, None).is_err());
        validate_create(driver, b, &capacity, 1, None).unwrap();
        let snap = RequestSnapshot {
            owner: driver,
            requester: b,
            status: RequestStatus::Pending,
            units: 1,
        };
        assert_eq!(
            apply_action(&snap, driver, RequestAction::Accept, &capacity).unwrap(),
            RequestStatus::Accepted
        );

        // Trip full: C is refused.
        let capacity = CapacityView::new(3, 3);
        assert!(capacity.is_full());
        let err = validate_create(driver, c, &capacity, 1, None).unwrap_err();
        assert!(matches!(err, DomainError::CapacityExceeded { .. }));
    }

    // Cancelling an accepted request frees exactly its units: after A
    // cancels, the 2 seats are requestable again.
    #[test]
    fn test_cancel_releases_capacity() {
        let driver = Uuid::new_v4();
        let a = Uuid::new_v4();

        let snap = RequestSnapshot {
            owner: driver,
            requester: a,
            status: RequestStatus::Accepted,
            units: 2,
        };
        let capacity = CapacityView::new(3, 3);
        apply_action(&snap, a, RequestAction::Cancel, &capacity).unwrap();

        // The ledger recomputes from accepted rows, so the freed units
        // show up as soon as the cancel commits.
        let after = CapacityView::new(3, 3 - snap.units);
        assert_eq!(after.remaining(), 2);
    }

    #[test]
    fn test_capacity_edit_guard() {
        assert!(validate_capacity_edit(3, 3).is_ok());
        assert!(validate_capacity_edit(4, 3).is_ok());
        let err = validate_capacity_edit(2, 3).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }
}
