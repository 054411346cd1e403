use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{AdvisorContext, AdvisorResult, QuoteResult, ReplacementSuggestion};

/// Source of current market prices
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Latest per-share price for `ticker`
    async fn latest_price(&self, ticker: &str) -> QuoteResult<Decimal>;

    fn provider_name(&self) -> &'static str;
}

/// Generative collaborator proposing a wash-sale-safe replacement and action steps.
///
/// Responses are untrusted: the engine validates every suggestion before use.
#[async_trait]
pub trait ReplacementAdvisor: Send + Sync {
    async fn suggest(&self, context: &AdvisorContext) -> AdvisorResult<ReplacementSuggestion>;

    fn backend_name(&self) -> &'static str;
}
