//! Growth sequence of daily investment levels.

use rust_decimal::Decimal;

use crate::error::{Result, ScalerError};

/// Strictly increasing, positive daily investment per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthSequence {
    levels: Vec<Decimal>,
}

impl GrowthSequence {
    /// Validates and wraps a sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is empty, has a non-positive value,
    /// or is not strictly increasing.
    pub fn new(levels: Vec<Decimal>) -> Result<Self> {
        if levels.is_empty() {
            return Err(ScalerError::invalid_sequence("sequence is empty"));
        }
        if let Some(bad) = levels.iter().find(|v| **v <= Decimal::ZERO) {
            return Err(ScalerError::invalid_sequence(format!(
                "level amounts must be positive, found {bad}"
            )));
        }
        if let Some(pair) = levels.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ScalerError::invalid_sequence(format!(
                "sequence must be strictly increasing, found {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { levels })
    }

    /// Daily investment at `level`, if the level exists.
    #[must_use]
    pub fn amount(&self, level: usize) -> Option<Decimal> {
        self.levels.get(level).copied()
    }

    /// Daily investment at `level`, clamped to the top of the sequence.
    #[must_use]
    pub fn amount_clamped(&self, level: usize) -> Decimal {
        self.levels[self.clamp(level)]
    }

    #[must_use]
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    #[must_use]
    pub fn clamp(&self, level: usize) -> usize {
        level.min(self.max_level())
    }

    /// Profit that funds `level` for `days` days.
    #[must_use]
    pub fn funding_requirement(&self, level: usize, days: u32) -> Option<Decimal> {
        self.amount(level).map(|amount| amount * Decimal::from(days))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::config::DEFAULT_GROWTH_SEQUENCE;
    use rust_decimal_macros::dec;

    fn fibonacci() -> GrowthSequence {
        GrowthSequence::new(
            DEFAULT_GROWTH_SEQUENCE
                .iter()
                .map(|v| Decimal::from(*v))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_fibonacci_levels() {
        let seq = fibonacci();
        assert_eq!(seq.amount(0), Some(dec!(1)));
        assert_eq!(seq.amount(3), Some(dec!(5)));
        assert_eq!(seq.amount(4), Some(dec!(8)));
        assert_eq!(seq.max_level(), 11);
        assert_eq!(seq.amount(12), None);
        assert_eq!(seq.amount_clamped(40), dec!(233));
    }

    #[test]
    fn test_funding_requirement() {
        let seq = fibonacci();
        assert_eq!(seq.funding_requirement(4, 30), Some(dec!(240)));
        assert_eq!(seq.funding_requirement(12, 30), None);
    }

    #[test]
    fn test_rejects_invalid_sequences() {
        assert!(GrowthSequence::new(vec![]).is_err());
        assert!(GrowthSequence::new(vec![dec!(0), dec!(1)]).is_err());
        assert!(GrowthSequence::new(vec![dec!(1), dec!(1), dec!(2)]).is_err());
        assert!(GrowthSequence::new(vec![dec!(3), dec!(2)]).is_err());
    }
}
