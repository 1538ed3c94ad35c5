//! Transfer Core Types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::TransferError;
use crate::account::AccountId;
use crate::money::Amount;

/// Role of an account within a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated transfer request (not persisted)
///
/// Only [`TransferRequest::new`] builds one, so `source != destination`
/// always holds; [`Amount`] enforces > 0.
///
/// ```compile_fail
/// use pairledger::{AccountId, Amount, TransferRequest};
///
/// let id = AccountId::new(1);
/// let amount: Amount = "1".parse().unwrap();
/// let _ = TransferRequest { source: id, destination: id, amount };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    source: AccountId,
    destination: AccountId,
    amount: Amount,
}

impl TransferRequest {
    pub fn new(
        source: AccountId,
        destination: AccountId,
        amount: Amount,
    ) -> Result<Self, TransferError> {
        if source == destination {
            return Err(TransferError::SameAccount);
        }
        Ok(Self {
            source,
            destination,
            amount,
        })
    }

    #[inline]
    pub fn source(&self) -> AccountId {
        self.source
    }

    #[inline]
    pub fn destination(&self) -> AccountId {
        self.destination
    }

    #[inline]
    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Immutable transfer log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: i64,
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Signed effect of this record on `account`
    pub fn effect_on(&self, account: AccountId) -> rust_decimal::Decimal {
        if account == self.destination {
            self.amount.value()
        } else if account == self.source {
            -self.amount.value()
        } else {
            rust_decimal::Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(v: rust_decimal::Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn test_same_account_rejected() {
        let id = AccountId::new(1);
        let result = TransferRequest::new(id, id, amount(dec!(1)));
        assert_eq!(result, Err(TransferError::SameAccount));
    }

    #[test]
    fn test_request_keeps_caller_roles() {
        let req =
            TransferRequest::new(AccountId::new(5), AccountId::new(2), amount(dec!(10))).unwrap();
        assert_eq!(req.source(), AccountId::new(5));
        assert_eq!(req.destination(), AccountId::new(2));
        assert_eq!(req.amount().value(), dec!(10));
    }

    #[test]
    fn test_record_effect_on() {
        let record = TransferRecord {
            id: 1,
            source: AccountId::new(1),
            destination: AccountId::new(2),
            amount: amount(dec!(100)),
            created_at: Utc::now(),
        };
        assert_eq!(record.effect_on(AccountId::new(1)), dec!(-100));
        assert_eq!(record.effect_on(AccountId::new(2)), dec!(100));
        assert_eq!(record.effect_on(AccountId::new(3)), dec!(0));
    }
}
