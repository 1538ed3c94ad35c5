//! Canonical lock ordering
//!
//! Pure helper, no storage access. The smaller account id is always locked
//! first; the signed deltas follow the accounts, not their lock position.

use rust_decimal::Decimal;

use super::types::Side;
use crate::account::AccountId;
use crate::money::Amount;

/// Lock order and balance deltas for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPlan {
    pub first: AccountId,
    pub second: AccountId,
    /// Signed change applied to `first`
    pub first_delta: Decimal,
    /// Signed change applied to `second`
    pub second_delta: Decimal,
    /// Role of `first` in the caller's request
    pub first_side: Side,
}

impl LockPlan {
    pub fn for_transfer(source: AccountId, destination: AccountId, amount: Amount) -> Self {
        let amount = amount.value();
        if source < destination {
            Self {
                first: source,
                second: destination,
                first_delta: -amount,
                second_delta: amount,
                first_side: Side::Source,
            }
        } else {
            Self {
                first: destination,
                second: source,
                first_delta: amount,
                second_delta: -amount,
                first_side: Side::Destination,
            }
        }
    }

    /// Role of `id` in the caller's request
    pub fn side_of(&self, id: AccountId) -> Side {
        match (id == self.first, self.first_side) {
            (true, side) => side,
            (false, Side::Source) => Side::Destination,
            (false, Side::Destination) => Side::Source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(v: i64) -> AccountId {
        AccountId::new(v)
    }

    #[test]
    fn test_source_smaller() {
        let plan = LockPlan::for_transfer(id(1), id(2), Amount::new(dec!(100)).unwrap());
        assert_eq!(plan.first, id(1));
        assert_eq!(plan.second, id(2));
        assert_eq!(plan.first_delta, dec!(-100));
        assert_eq!(plan.second_delta, dec!(100));
        assert_eq!(plan.first_side, Side::Source);
    }

    #[test]
    fn test_destination_smaller() {
        let plan = LockPlan::for_transfer(id(2), id(1), Amount::new(dec!(100)).unwrap());
        assert_eq!(plan.first, id(1));
        assert_eq!(plan.second, id(2));
        assert_eq!(plan.first_delta, dec!(100));
        assert_eq!(plan.second_delta, dec!(-100));
        assert_eq!(plan.first_side, Side::Destination);
    }

    #[test]
    fn test_all_pairs_invariants() {
        let ids = [-3_i64, -1, 0, 1, 2, 7, 1_000_000, i64::MAX];
        let amounts = [dec!(0.0001), dec!(1), dec!(250.5), dec!(99999999.9999)];

        for &a in &ids {
            for &b in &ids {
                if a == b {
                    continue;
                }
                for &amt in &amounts {
                    let amount = Amount::new(amt).unwrap();
                    let plan = LockPlan::for_transfer(id(a), id(b), amount);

                    // Total order: first < second regardless of roles
                    assert!(plan.first < plan.second, "pair ({a}, {b})");
                    assert_eq!(plan.first, id(a.min(b)));
                    assert_eq!(plan.second, id(a.max(b)));

                    // Money is conserved
                    assert_eq!(plan.first_delta + plan.second_delta, Decimal::ZERO);

                    // Source loses, destination gains
                    let source_delta = if plan.first == id(a) {
                        plan.first_delta
                    } else {
                        plan.second_delta
                    };
                    assert_eq!(source_delta, -amt);

                    assert_eq!(plan.side_of(id(a)), Side::Source);
                    assert_eq!(plan.side_of(id(b)), Side::Destination);
                }
            }
        }
    }

    #[test]
    fn test_reversed_requests_share_lock_order() {
        let amount = Amount::new(dec!(5)).unwrap();
        let forward = LockPlan::for_transfer(id(10), id(20), amount);
        let backward = LockPlan::for_transfer(id(20), id(10), amount);
        assert_eq!(forward.first, backward.first);
        assert_eq!(forward.second, backward.second);
        assert_eq!(forward.first_delta, -backward.first_delta);
    }
}
