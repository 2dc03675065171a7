/// Remaining-capacity view of a resource (a trip's seats or a hosting's
/// beds), computed from counts read at evaluation time. Callers that go
/// on to write an accepted request must read these counts under the same
/// transaction that commits the write.
#[derive(Debug, Clone, Copy)]
pub struct CapacityView {
    pub total_units: i64,
    pub accepted_units: i64,
}

impl CapacityView {
    pub fn new(total_units: i64, accepted_units: i64) -> Self {
        Self {
            total_units,
            accepted_units,
        }
    }

    /// Units still available. Can go negative if capacity was edited
    /// concurrently; callers treat anything <= 0 as full.
    pub fn remaining(&self) -> i64 {
        self.total_units - self.accepted_units
    }

    pub fn is_full(&self) -> bool {
        self.remaining() <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_capacity() {
        let view = CapacityView::new(3, 2);
        assert_eq!(view.remaining(), 1);
        assert!(!view.is_full());
    }

    #[test]
    fn test_full_at_zero_remaining() {
        assert!(CapacityView::new(3, 3).is_full());
        assert!(CapacityView::new(3, 4).is_full());
        assert!(CapacityView::new(0, 0).is_full());
    }
}
