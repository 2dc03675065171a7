use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{CarpoolPayment, RequestStatus};

/// What the passenger owes: price per seat times seats requested.
pub fn expected_amount_cents(price_per_seat_cents: i64, seats_requested: i32) -> i64 {
    price_per_seat_cents * i64::from(seats_requested)
}

/// Sum of all recorded payment amounts, completed or not.
pub fn total_paid_cents(payments: &[CarpoolPayment]) -> i64 {
    payments.iter().map(|p| p.amount_cents).sum()
}

/// A request is paid as soon as one completed payment exists.
pub fn is_paid(payments: &[CarpoolPayment]) -> bool {
    payments.iter().any(|p| p.is_completed)
}

/// Recording a payment is driver-only and requires the request to be
/// accepted. Validation happens before any write.
pub fn validate_record(
    actor: Uuid,
    driver: Uuid,
    status: RequestStatus,
) -> Result<(), DomainError> {
    if actor != driver {
        return Err(DomainError::forbidden(
            "request",
            "only the driver can record payments",
        ));
    }
    if status != RequestStatus::Accepted {
        return Err(DomainError::invalid_state(
            "request",
            "only accepted requests can have payments",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethod;

    fn payment(amount_cents: i64, is_completed: bool) -> CarpoolPayment {
        let mut p = CarpoolPayment::new(Uuid::new_v4(), amount_cents, PaymentMethod::Cash);
        p.is_completed = is_completed;
        p
    }

    #[test]
    fn test_expected_amount() {
        assert_eq!(expected_amount_cents(750, 2), 1500);
        assert_eq!(expected_amount_cents(0, 3), 0);
    }

    #[test]
    fn test_total_counts_incomplete_payments() {
        let payments = vec![payment(500, false), payment(250, true)];
        assert_eq!(total_paid_cents(&payments), 750);
    }

    #[test]
    fn test_paid_iff_completed_payment_exists() {
        assert!(!is_paid(&[]));
        assert!(!is_paid(&[payment(500, false)]));
        assert!(is_paid(&[payment(500, false), payment(250, true)]));
    }

    #[test]
    fn test_record_requires_driver() {
        let driver = Uuid::new_v4();
        let err = validate_record(Uuid::new_v4(), driver, RequestStatus::Accepted).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
        assert!(validate_record(driver, driver, RequestStatus::Accepted).is_ok());
    }

    #[test]
    fn test_record_requires_accepted_request() {
        let driver = Uuid::new_v4();
        for status in [
            RequestStatus::Pending,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            let err = validate_record(driver, driver, status).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState { .. }));
        }
    }
}
