use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A holding exactly as submitted by the caller.
///
/// Nothing here is trusted until it has passed through the validator; the
/// purchase date stays textual so a malformed date can be reported per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInput {
    pub ticker: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    /// Total amount paid for the whole position (not per share)
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_basis: Decimal,
    /// `YYYY-MM-DD`
    pub purchase_date: String,
}

/// Inbound analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub positions: Vec<PositionInput>,
    /// Federal marginal bracket, e.g. 0.32
    pub tax_bracket: f64,
}

/// A validated, normalized position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Upper-cased, trimmed symbol
    pub ticker: String,
    pub shares: Decimal,
    pub cost_basis: Decimal,
    pub purchase_date: NaiveDate,
}

/// Recognized US federal marginal brackets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaxBracket {
    Ten,
    Twelve,
    TwentyTwo,
    TwentyFour,
    ThirtyTwo,
    ThirtyFive,
    ThirtySeven,
}

impl TaxBracket {
    pub const ALL: [TaxBracket; 7] = [
        TaxBracket::Ten,
        TaxBracket::Twelve,
        TaxBracket::TwentyTwo,
        TaxBracket::TwentyFour,
        TaxBracket::ThirtyTwo,
        TaxBracket::ThirtyFive,
        TaxBracket::ThirtySeven,
    ];

    /// Marginal rate in whole percent
    pub fn percent(&self) -> u32 {
        match self {
            TaxBracket::Ten => 10,
            TaxBracket::Twelve => 12,
            TaxBracket::TwentyTwo => 22,
            TaxBracket::TwentyFour => 24,
            TaxBracket::ThirtyTwo => 32,
            TaxBracket::ThirtyFive => 35,
            TaxBracket::ThirtySeven => 37,
        }
    }

    /// Marginal (ordinary income) rate as an exact decimal fraction
    pub fn rate(&self) -> Decimal {
        Decimal::new(self.percent() as i64, 2)
    }

    /// Match a caller-supplied fraction such as `0.32` to a bracket.
    pub fn from_rate(rate: f64) -> Option<Self> {
        if !rate.is_finite() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|b| (b.percent() as f64 / 100.0 - rate).abs() < 1e-9)
    }
}

impl std::fmt::Display for TaxBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub positions: Vec<Position>,
    pub tax_bracket: TaxBracket,
}

/// One harvesting recommendation for a single position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub ticker: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_loss: Decimal,
    pub is_long_term: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_savings: Decimal,
    pub replacement_ticker: String,
    pub replacement_name: String,
    pub rebuy_date: NaiveDate,
    pub action_steps: Vec<String>,
}

/// Why a position was skipped or degraded during an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No market quote; the position was left out of the result
    QuoteUnavailable,
    /// Generative advisor unavailable or rejected; static table used
    ReplacementFallback,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::QuoteUnavailable => write!(f, "Quote Unavailable"),
            WarningKind::ReplacementFallback => write!(f, "Replacement Fallback"),
        }
    }
}

/// Non-fatal problem recorded while analyzing a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub ticker: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Complete response of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Ranked by tax savings, highest first
    pub opportunities: Vec<Opportunity>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tax_savings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub annual_projection: Decimal,
    pub summary: String,
    /// Assumption behind `annual_projection`
    pub projection_basis: String,
    pub reference_date: NaiveDate,
    #[serde(default)]
    pub warnings: Vec<AnalysisWarning>,
}

/// Context handed to the generative advisor for one eligible position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorContext {
    pub ticker: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_loss: Decimal,
    pub is_long_term: bool,
    pub rebuy_date: NaiveDate,
}

/// Replacement proposal returned by an advisor, not yet accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementSuggestion {
    pub replacement_ticker: String,
    pub replacement_name: String,
    #[serde(default)]
    pub action_steps: Vec<String>,
}
