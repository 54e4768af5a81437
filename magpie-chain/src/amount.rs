//! Satoshi-denominated amounts.

use crate::{SerializationError, WireDeserialize, WireSerialize};

/// One whole coin, in satoshis.
pub const COIN: i64 = 100_000_000;

/// A transaction amount in satoshis.
///
/// Wire-encoded as a little-endian `i64`. Negative amounts are
/// representable because the SIGHASH_SINGLE construction blanks outputs to
/// value −1; consensus checks reject them everywhere else.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const fn from_sat(satoshis: i64) -> Amount {
        Amount(satoshis)
    }

    pub const fn zero() -> Amount {
        Amount(0)
    }

    pub fn sat(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Checked sum of an amount iterator; `None` on overflow.
    pub fn sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::zero(), Amount::checked_add)
    }
}

impl WireSerialize for Amount {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Amount {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Amount(i64::wire_deserialize(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sum_overflows_to_none() {
        assert_eq!(
            Amount::sum(vec![Amount::from_sat(i64::MAX), Amount::from_sat(1)]),
            None
        );
        assert_eq!(
            Amount::sum(vec![Amount::from_sat(2), Amount::from_sat(3)]),
            Some(Amount::from_sat(5))
        );
    }
}
