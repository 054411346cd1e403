//! Tax-Loss Harvesting
//!
//! Turns a validated position and its market price into a loss
//! classification, and assembles eligible positions into opportunities.

use chrono::NaiveDate;
use harvest_core::{
    HarvestError, HarvestResult, Opportunity, Position, QuoteError, QuoteProvider, QuoteResult,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::substitutes::Selection;
use crate::tax_calculator::{days_held, HoldingPeriod, TaxEstimate};

/// Smallest unrealized loss worth harvesting
pub const ELIGIBILITY_THRESHOLD: Decimal = Decimal::ONE_THOUSAND;

/// A position priced against the market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPosition {
    pub position: Position,
    /// Per-share price used
    pub current_price: Decimal,
    /// `current_price * shares`, rounded to cents
    pub market_value: Decimal,
    /// `max(0, cost_basis - market_value)`
    pub unrealized_loss: Decimal,
    pub holding_period: HoldingPeriod,
    pub days_held: i64,
}

/// Prices positions and decides which ones are worth harvesting
#[derive(Debug, Clone)]
pub struct LossClassifier {
    quote_timeout: Duration,
}

impl LossClassifier {
    pub fn new(quote_timeout: Duration) -> Self {
        Self { quote_timeout }
    }

    /// Fetch a usable per-share price, bounded by the quote timeout
    pub async fn fetch_price(
        &self,
        quotes: &dyn QuoteProvider,
        ticker: &str,
    ) -> QuoteResult<Decimal> {
        let price = tokio::time::timeout(self.quote_timeout, quotes.latest_price(ticker))
            .await
            .map_err(|_| QuoteError::Timeout(ticker.to_string()))??;

        if price <= Decimal::ZERO {
            return Err(QuoteError::InvalidQuote(format!(
                "{} quoted at non-positive price {}",
                ticker, price
            )));
        }
        Ok(price)
    }

    /// Compute market value, unrealized loss and holding period as of `as_of`
    pub fn classify(
        &self,
        position: &Position,
        price: Decimal,
        as_of: NaiveDate,
    ) -> QuoteResult<ClassifiedPosition> {
        let market_value = price
            .checked_mul(position.shares)
            .ok_or_else(|| {
                QuoteError::InvalidQuote(format!("market value of {} overflows", position.ticker))
            })?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let unrealized_loss = (position.cost_basis - market_value).max(Decimal::ZERO);

        Ok(ClassifiedPosition {
            position: position.clone(),
            current_price: price,
            market_value,
            unrealized_loss,
            holding_period: HoldingPeriod::classify(position.purchase_date, as_of),
            days_held: days_held(position.purchase_date, as_of),
        })
    }

    pub fn is_eligible(&self, classified: &ClassifiedPosition) -> bool {
        classified.unrealized_loss >= ELIGIBILITY_THRESHOLD
    }
}

/// Assembles the immutable opportunity record for one eligible position
pub struct OpportunityBuilder;

impl OpportunityBuilder {
    pub fn build(
        classified: &ClassifiedPosition,
        estimate: &TaxEstimate,
        rebuy_date: NaiveDate,
        selection: &Selection,
    ) -> HarvestResult<Opportunity> {
        let ticker = &classified.position.ticker;

        if classified.unrealized_loss <= Decimal::ZERO {
            return Err(HarvestError::InvariantViolation(format!(
                "non-positive loss {} reached the opportunity builder for {}",
                classified.unrealized_loss, ticker
            )));
        }
        if estimate.tax_savings < Decimal::ZERO {
            return Err(HarvestError::InvariantViolation(format!(
                "negative tax savings {} computed for {}",
                estimate.tax_savings, ticker
            )));
        }
        if selection.ticker.eq_ignore_ascii_case(ticker) {
            return Err(HarvestError::InvariantViolation(format!(
                "{} was selected as its own replacement",
                ticker
            )));
        }

        let action_steps = match &selection.action_steps {
            Some(steps) => steps.clone(),
            None => Self::template_steps(classified, selection, rebuy_date),
        };

        Ok(Opportunity {
            ticker: ticker.clone(),
            shares: classified.position.shares,
            unrealized_loss: classified.unrealized_loss,
            is_long_term: estimate.holding_period.is_long_term(),
            tax_savings: estimate.tax_savings,
            replacement_ticker: selection.ticker.clone(),
            replacement_name: selection.name.clone(),
            rebuy_date,
            action_steps,
        })
    }

    /// Generic sell / replace / wait instructions
    pub fn template_steps(
        classified: &ClassifiedPosition,
        selection: &Selection,
        rebuy_date: NaiveDate,
    ) -> Vec<String> {
        let position = &classified.position;
        vec![
            format!(
                "Sell {} shares of {} (currently at {}/share) to realize a {} {} loss",
                position.shares.normalize(),
                position.ticker,
                format_currency(classified.current_price, 2),
                format_currency(classified.unrealized_loss, 0),
                classified.holding_period.to_string().to_lowercase(),
            ),
            format!(
                "Immediately buy about {} of {} ({}) to keep similar market exposure",
                format_currency(classified.market_value, 0),
                selection.ticker,
                selection.name,
            ),
            format!(
                "Set a calendar reminder for {}: you can rebuy {} on or after that date without triggering a wash sale",
                rebuy_date.format("%Y-%m-%d"),
                position.ticker,
            ),
        ]
    }
}

/// `$1,234.50` style formatting with `dp` decimals
pub(crate) fn format_currency(amount: Decimal, dp: u32) -> String {
    let rounded = amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", dp as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}${}.{}", sign, grouped, frac),
        None => format!("{}${}", sign, grouped),
    }
}
