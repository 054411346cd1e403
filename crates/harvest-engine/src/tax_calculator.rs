//! Tax Calculator
//!
//! Holding-period classification and the bracket to savings-rate mapping.

use chrono::NaiveDate;
use harvest_core::TaxBracket;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::harvester::ClassifiedPosition;

/// Days a position must be held to qualify for long-term treatment
pub const LONG_TERM_THRESHOLD_DAYS: i64 = 365;

/// Holding period classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    /// Classify a holding bought on `purchase_date` as of `as_of`
    pub fn classify(purchase_date: NaiveDate, as_of: NaiveDate) -> Self {
        if days_held(purchase_date, as_of) >= LONG_TERM_THRESHOLD_DAYS {
            HoldingPeriod::LongTerm
        } else {
            HoldingPeriod::ShortTerm
        }
    }

    pub fn is_long_term(&self) -> bool {
        matches!(self, HoldingPeriod::LongTerm)
    }
}

impl std::fmt::Display for HoldingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldingPeriod::ShortTerm => write!(f, "Short-term"),
            HoldingPeriod::LongTerm => write!(f, "Long-term"),
        }
    }
}

/// Calendar days between purchase and `as_of`
pub fn days_held(purchase_date: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of - purchase_date).num_days()
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateTableError {
    #[error("No long-term rate for the {0} bracket")]
    MissingBracket(TaxBracket),

    #[error("Long-term rate for the {0} bracket is lower than for a lower bracket")]
    NotMonotonic(TaxBracket),

    #[error("Long-term rate for the {0} bracket is outside 0..1")]
    OutOfRange(TaxBracket),
}

/// Long-term capital-gains savings rate per marginal bracket.
///
/// This is the single place the rates live; updating a tax year means
/// constructing a new table, never touching the calculation code.
/// Deserialized tables pass the same checks as [`RateTable::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRateTable")]
pub struct RateTable {
    version: String,
    long_term: BTreeMap<TaxBracket, Decimal>,
}

#[derive(Deserialize)]
struct RawRateTable {
    version: String,
    long_term: BTreeMap<TaxBracket, Decimal>,
}

impl TryFrom<RawRateTable> for RateTable {
    type Error = RateTableError;

    fn try_from(raw: RawRateTable) -> Result<Self, Self::Error> {
        RateTable::new(raw.version, raw.long_term)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        // 15% is used as a floor for every bracket up to 35%; 20% at the top.
        Self {
            version: "us-federal-simplified-v1".to_string(),
            long_term: BTreeMap::from([
                (TaxBracket::Ten, dec!(0.15)),
                (TaxBracket::Twelve, dec!(0.15)),
                (TaxBracket::TwentyTwo, dec!(0.15)),
                (TaxBracket::TwentyFour, dec!(0.15)),
                (TaxBracket::ThirtyTwo, dec!(0.15)),
                (TaxBracket::ThirtyFive, dec!(0.15)),
                (TaxBracket::ThirtySeven, dec!(0.20)),
            ]),
        }
    }
}

impl RateTable {
    /// Build a table, requiring a rate for every bracket and rates that never
    /// decrease as the bracket rises.
    pub fn new(
        version: impl Into<String>,
        entries: impl IntoIterator<Item = (TaxBracket, Decimal)>,
    ) -> Result<Self, RateTableError> {
        let long_term: BTreeMap<TaxBracket, Decimal> = entries.into_iter().collect();

        let mut previous: Option<Decimal> = None;
        for bracket in TaxBracket::ALL {
            let rate = *long_term
                .get(&bracket)
                .ok_or(RateTableError::MissingBracket(bracket))?;
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(RateTableError::OutOfRange(bracket));
            }
            if previous.is_some_and(|p| rate < p) {
                return Err(RateTableError::NotMonotonic(bracket));
            }
            previous = Some(rate);
        }

        Ok(Self {
            version: version.into(),
            long_term,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Raw table entry for a bracket
    pub fn long_term_rate(&self, bracket: TaxBracket) -> Decimal {
        self.long_term
            .get(&bracket)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Rate at which a harvested loss reduces tax.
    ///
    /// Short-term losses offset ordinary income at the marginal rate. Long-term
    /// losses use the table entry, capped at the marginal rate so a long-term
    /// loss is never worth more than a short-term one.
    pub fn effective_rate(&self, bracket: TaxBracket, period: HoldingPeriod) -> Decimal {
        match period {
            HoldingPeriod::ShortTerm => bracket.rate(),
            HoldingPeriod::LongTerm => self.long_term_rate(bracket).min(bracket.rate()),
        }
    }
}

/// Tax estimate for harvesting one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxEstimate {
    pub holding_period: HoldingPeriod,
    pub days_held: i64,
    pub effective_rate: Decimal,
    /// Savings rounded to whole currency units
    pub tax_savings: Decimal,
}

/// Applies a rate table to classified positions
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    table: Arc<RateTable>,
}

impl TaxCalculator {
    pub fn new(table: Arc<RateTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Estimate the savings of realizing a position's loss
    pub fn estimate(&self, position: &ClassifiedPosition, bracket: TaxBracket) -> TaxEstimate {
        let effective_rate = self.table.effective_rate(bracket, position.holding_period);
        TaxEstimate {
            holding_period: position.holding_period,
            days_held: position.days_held,
            effective_rate,
            tax_savings: tax_savings(position.unrealized_loss, effective_rate),
        }
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new(Arc::new(RateTable::default()))
    }
}

/// `loss * rate`, rounded half away from zero to whole units
pub fn tax_savings(loss: Decimal, rate: Decimal) -> Decimal {
    (loss * rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_holding_period_boundary() {
        let purchase = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        assert_eq!(
            HoldingPeriod::classify(purchase, purchase + Duration::days(364)),
            HoldingPeriod::ShortTerm
        );
        assert_eq!(
            HoldingPeriod::classify(purchase, purchase + Duration::days(365)),
            HoldingPeriod::LongTerm
        );
        assert_eq!(
            HoldingPeriod::classify(purchase, purchase + Duration::days(400)),
            HoldingPeriod::LongTerm
        );
    }

    #[test]
    fn test_short_term_uses_marginal_rate() {
        let table = RateTable::default();
        for bracket in TaxBracket::ALL {
            assert_eq!(table.effective_rate(bracket, HoldingPeriod::ShortTerm), bracket.rate());
        }
    }

    #[test]
    fn test_long_term_table() {
        let table = RateTable::default();
        assert_eq!(table.effective_rate(TaxBracket::ThirtyTwo, HoldingPeriod::LongTerm), dec!(0.15));
        assert_eq!(table.effective_rate(TaxBracket::ThirtyFive, HoldingPeriod::LongTerm), dec!(0.15));
        assert_eq!(table.effective_rate(TaxBracket::ThirtySeven, HoldingPeriod::LongTerm), dec!(0.20));
        assert_eq!(table.effective_rate(TaxBracket::TwentyFour, HoldingPeriod::LongTerm), dec!(0.15));
    }

    #[test]
    fn test_long_term_never_exceeds_short_term() {
        let table = RateTable::default();
        let mut previous = Decimal::ZERO;
        for bracket in TaxBracket::ALL {
            let long = table.effective_rate(bracket, HoldingPeriod::LongTerm);
            assert!(long <= table.effective_rate(bracket, HoldingPeriod::ShortTerm));
            assert!(long >= previous);
            previous = long;
        }
        assert_eq!(table.effective_rate(TaxBracket::Ten, HoldingPeriod::LongTerm), dec!(0.10));
    }

    #[test]
    fn test_table_rejects_gaps_and_inversions() {
        let mut entries: Vec<(TaxBracket, Decimal)> = TaxBracket::ALL
            .into_iter()
            .map(|b| (b, dec!(0.15)))
            .collect();
        entries.pop();
        assert_eq!(
            RateTable::new("partial", entries.clone()),
            Err(RateTableError::MissingBracket(TaxBracket::ThirtySeven))
        );

        entries.push((TaxBracket::ThirtySeven, dec!(0.10)));
        assert_eq!(
            RateTable::new("inverted", entries),
            Err(RateTableError::NotMonotonic(TaxBracket::ThirtySeven))
        );
    }

    #[test]
    fn test_deserialized_table_is_checked() {
        let mut value = serde_json::to_value(RateTable::default()).unwrap();
        let parsed: RateTable = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed, RateTable::default());

        let long_term = value["long_term"].as_object_mut().unwrap();
        let top = long_term.keys().last().unwrap().clone();
        long_term.remove(&top);

        let err = serde_json::from_value::<RateTable>(value).unwrap_err();
        assert!(err.to_string().contains("No long-term rate"));
    }

    #[test]
    fn test_tax_savings_rounds_to_whole_units() {
        assert_eq!(tax_savings(dec!(5000), dec!(0.15)), dec!(750));
        assert_eq!(tax_savings(dec!(1234.56), dec!(0.22)), dec!(272));
        assert_eq!(tax_savings(dec!(1050), dec!(0.15)), dec!(158)); // 157.5
    }
}
