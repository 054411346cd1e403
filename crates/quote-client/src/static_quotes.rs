use async_trait::async_trait;
use harvest_core::{QuoteError, QuoteProvider, QuoteResult};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Fixed price sheet, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticQuotes {
    prices: HashMap<String, Decimal>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, ticker: &str, price: Decimal) -> Self {
        self.insert(ticker, price);
        self
    }

    pub fn insert(&mut self, ticker: &str, price: Decimal) {
        self.prices.insert(ticker.trim().to_uppercase(), price);
    }
}

impl FromIterator<(String, Decimal)> for StaticQuotes {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        let mut quotes = Self::new();
        for (ticker, price) in iter {
            quotes.insert(&ticker, price);
        }
        quotes
    }
}

#[async_trait]
impl QuoteProvider for StaticQuotes {
    async fn latest_price(&self, ticker: &str) -> QuoteResult<Decimal> {
        self.prices
            .get(&ticker.to_uppercase())
            .copied()
            .ok_or_else(|| QuoteError::Unavailable(ticker.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let quotes = StaticQuotes::new().with_price("aapl", dec!(150.25));

        assert_eq!(quotes.latest_price("AAPL").await.unwrap(), dec!(150.25));
        assert_eq!(quotes.latest_price("aapl").await.unwrap(), dec!(150.25));
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_unavailable() {
        let quotes: StaticQuotes = vec![("MSFT".to_string(), dec!(400))].into_iter().collect();

        let err = quotes.latest_price("ZZZZ").await.unwrap_err();
        assert!(matches!(err, QuoteError::Unavailable(t) if t == "ZZZZ"));
        assert_eq!(quotes.provider_name(), "static");
    }
}
