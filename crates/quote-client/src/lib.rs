mod rate_limiter;
mod static_quotes;

pub use static_quotes::StaticQuotes;

use async_trait::async_trait;
use harvest_core::{QuoteError, QuoteProvider, QuoteResult};
use rate_limiter::RateLimiter;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_URL: &str = "https://api.polygon.io";

/// Prices are kept to this many decimals
const PRICE_DP: u32 = 4;

/// Polygon.io quote provider.
///
/// Uses the single-ticker snapshot (last trade, then today's close, then the
/// previous close) and falls back to the previous-day aggregate when the
/// snapshot has no usable price.
#[derive(Clone)]
pub struct PolygonQuoteClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonQuoteClient {
    pub fn new(api_key: String) -> Self {
        // Starter plan allows 500 req/min; free tier users should set POLYGON_RATE_LIMIT=5
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Build from `POLYGON_API_KEY`; `None` when the key is not set
    pub fn from_env() -> Option<Self> {
        std::env::var("POLYGON_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> QuoteResult<reqwest::Response> {
        let request = builder.build().map_err(|e| QuoteError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| QuoteError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| QuoteError::ApiError(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(QuoteError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Get snapshot for a ticker (near-real-time last trade, today's OHLCV, prev day)
    pub async fn get_snapshot(&self, symbol: &str) -> QuoteResult<SnapshotTicker> {
        let url = format!(
            "{}/v2/snapshot/locale/us/markets/stocks/tickers/{}",
            self.base_url, symbol
        );

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(QuoteError::Unavailable(symbol.to_string()));
        }
        if !response.status().is_success() {
            return Err(QuoteError::ApiError(format!(
                "Snapshot HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let snap_response: SnapshotResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::ApiError(e.to_string()))?;

        Ok(snap_response.ticker)
    }

    /// Previous trading day's close
    pub async fn get_previous_close(&self, symbol: &str) -> QuoteResult<Option<f64>> {
        let url = format!("{}/v2/aggs/ticker/{}/prev", self.base_url, symbol);

        let response = self
            .send_request(
                self.client
                    .get(&url)
                    .query(&[("apiKey", self.api_key.as_str()), ("adjusted", "true")]),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(QuoteError::ApiError(format!(
                "Previous close HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg: PreviousCloseResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::ApiError(e.to_string()))?;

        Ok(agg.results.unwrap_or_default().first().and_then(|r| r.c))
    }
}

#[async_trait]
impl QuoteProvider for PolygonQuoteClient {
    async fn latest_price(&self, ticker: &str) -> QuoteResult<Decimal> {
        let from_snapshot = match self.get_snapshot(ticker).await {
            Ok(snapshot) => snapshot.best_price(),
            Err(QuoteError::Unavailable(_)) => None,
            Err(e) => {
                tracing::debug!("Snapshot failed for {}: {}", ticker, e);
                None
            }
        };

        let raw = match from_snapshot {
            Some(p) => p,
            None => self
                .get_previous_close(ticker)
                .await?
                .ok_or_else(|| QuoteError::Unavailable(ticker.to_string()))?,
        };

        price_to_decimal(ticker, raw)
    }

    fn provider_name(&self) -> &'static str {
        "polygon"
    }
}

/// Convert a wire price to a positive decimal
pub fn price_to_decimal(ticker: &str, raw: f64) -> QuoteResult<Decimal> {
    if !raw.is_finite() || raw <= 0.0 {
        return Err(QuoteError::InvalidQuote(format!("{} quoted at {}", ticker, raw)));
    }
    Decimal::try_from(raw)
        .map(|d| d.round_dp(PRICE_DP).normalize())
        .map_err(|e| QuoteError::InvalidQuote(format!("{}: {}", ticker, e)))
}

// Snapshot types
#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    ticker: SnapshotTicker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTicker {
    pub day: Option<SnapshotDay>,
    #[serde(rename = "lastTrade")]
    pub last_trade: Option<SnapshotLastTrade>,
    #[serde(rename = "prevDay")]
    pub prev_day: Option<SnapshotDay>,
}

impl SnapshotTicker {
    /// Last trade, then today's close, then the previous close; zeros are skipped
    pub fn best_price(&self) -> Option<f64> {
        let positive = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 0.0);

        positive(self.last_trade.as_ref().and_then(|t| t.p))
            .or_else(|| positive(self.day.as_ref().and_then(|d| d.c)))
            .or_else(|| positive(self.prev_day.as_ref().and_then(|d| d.c)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDay {
    pub o: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,
    pub c: Option<f64>,
    pub v: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLastTrade {
    pub p: Option<f64>,
    pub s: Option<i64>,
    pub t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PreviousCloseResponse {
    results: Option<Vec<PreviousCloseBar>>,
}

#[derive(Debug, Deserialize)]
struct PreviousCloseBar {
    c: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(raw: &str) -> SnapshotTicker {
        serde_json::from_str::<SnapshotResponse>(raw).unwrap().ticker
    }

    #[test]
    fn test_snapshot_prefers_last_trade() {
        let snap = snapshot(
            r#"{"status":"OK","ticker":{
                "ticker":"AAPL",
                "day":{"o":149.0,"h":151.2,"l":148.5,"c":150.1,"v":51234567.0},
                "lastTrade":{"p":150.25,"s":100,"t":1717245600000},
                "prevDay":{"o":147.0,"h":149.9,"l":146.8,"c":148.7,"v":48000000.0}
            }}"#,
        );

        assert_eq!(snap.best_price(), Some(150.25));
    }

    #[test]
    fn test_snapshot_falls_back_to_closes() {
        // Pre-market: today's bar is all zeros
        let snap = snapshot(
            r#"{"ticker":{
                "day":{"o":0,"h":0,"l":0,"c":0,"v":0},
                "prevDay":{"c":148.7}
            }}"#,
        );
        assert_eq!(snap.best_price(), Some(148.7));

        let empty = snapshot(r#"{"ticker":{}}"#);
        assert_eq!(empty.best_price(), None);
    }

    #[test]
    fn test_previous_close_parsing() {
        let agg: PreviousCloseResponse = serde_json::from_str(
            r#"{"ticker":"MSFT","resultsCount":1,"results":[{"T":"MSFT","c":402.5,"o":399.1}]}"#,
        )
        .unwrap();
        assert_eq!(agg.results.unwrap()[0].c, Some(402.5));
    }

    #[test]
    fn test_price_to_decimal() {
        assert_eq!(price_to_decimal("AAPL", 150.25).unwrap(), dec!(150.25));
        assert_eq!(price_to_decimal("AAPL", 12.345678).unwrap(), dec!(12.3457));
        assert!(matches!(
            price_to_decimal("AAPL", 0.0),
            Err(QuoteError::InvalidQuote(_))
        ));
        assert!(price_to_decimal("AAPL", f64::NAN).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = PolygonQuoteClient::new("key".to_string()).with_base_url("http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.provider_name(), "polygon");
    }
}
