//! Replacement Security Selection
//!
//! Picks a security that keeps similar market exposure after a harvesting sale
//! without being substantially identical to the one sold. A generative advisor
//! is asked first; its answers are checked and, when unusable, a static
//! sector-ETF table takes over.

use anyhow::Context;
use harvest_core::{
    AdvisorContext, AdvisorError, AdvisorResult, HarvestError, HarvestResult, ReplacementAdvisor,
    ReplacementSuggestion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::validator::normalize_ticker;

/// Advisor-written step lists longer than this are truncated
const MAX_ACTION_STEPS: usize = 8;

/// Coarse sector classification used to key the fallback table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Technology,
    Semiconductors,
    CommunicationServices,
    ConsumerDiscretionary,
    ConsumerStaples,
    Financials,
    Healthcare,
    Energy,
    Industrials,
    Materials,
    RealEstate,
    Utilities,
    /// Unknown tickers and broad index funds
    BroadMarket,
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Sector::Technology => "Technology",
            Sector::Semiconductors => "Semiconductors",
            Sector::CommunicationServices => "Communication Services",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::Financials => "Financials",
            Sector::Healthcare => "Healthcare",
            Sector::Energy => "Energy",
            Sector::Industrials => "Industrials",
            Sector::Materials => "Materials",
            Sector::RealEstate => "Real Estate",
            Sector::Utilities => "Utilities",
            Sector::BroadMarket => "Broad Market",
        };
        write!(f, "{}", name)
    }
}

/// A replacement security from the static table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementCandidate {
    pub ticker: String,
    pub name: String,
}

impl ReplacementCandidate {
    fn new(ticker: &str, name: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
        }
    }
}

/// Static replacement data: curated per-ticker picks, a ticker to sector
/// map, sector ETFs and groups of substantially identical securities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementTable {
    #[serde(default)]
    curated: BTreeMap<String, Vec<ReplacementCandidate>>,
    #[serde(default)]
    ticker_sectors: BTreeMap<String, Sector>,
    sector_etfs: BTreeMap<Sector, Vec<ReplacementCandidate>>,
    #[serde(default)]
    identical_groups: Vec<Vec<String>>,
}

impl Default for ReplacementTable {
    fn default() -> Self {
        let c = ReplacementCandidate::new;

        let sector_etfs = BTreeMap::from([
            (Sector::Technology, vec![
                c("XLK", "Technology Select Sector SPDR Fund"),
                c("VGT", "Vanguard Information Technology ETF"),
            ]),
            (Sector::Semiconductors, vec![
                c("SMH", "VanEck Semiconductor ETF"),
                c("SOXX", "iShares Semiconductor ETF"),
            ]),
            (Sector::CommunicationServices, vec![
                c("XLC", "Communication Services Select Sector SPDR Fund"),
                c("VOX", "Vanguard Communication Services ETF"),
            ]),
            (Sector::ConsumerDiscretionary, vec![
                c("XLY", "Consumer Discretionary Select Sector SPDR Fund"),
                c("VCR", "Vanguard Consumer Discretionary ETF"),
            ]),
            (Sector::ConsumerStaples, vec![
                c("XLP", "Consumer Staples Select Sector SPDR Fund"),
                c("VDC", "Vanguard Consumer Staples ETF"),
            ]),
            (Sector::Financials, vec![
                c("XLF", "Financial Select Sector SPDR Fund"),
                c("VFH", "Vanguard Financials ETF"),
            ]),
            (Sector::Healthcare, vec![
                c("XLV", "Health Care Select Sector SPDR Fund"),
                c("VHT", "Vanguard Health Care ETF"),
            ]),
            (Sector::Energy, vec![
                c("XLE", "Energy Select Sector SPDR Fund"),
                c("VDE", "Vanguard Energy ETF"),
            ]),
            (Sector::Industrials, vec![
                c("XLI", "Industrial Select Sector SPDR Fund"),
                c("VIS", "Vanguard Industrials ETF"),
            ]),
            (Sector::Materials, vec![
                c("XLB", "Materials Select Sector SPDR Fund"),
                c("VAW", "Vanguard Materials ETF"),
            ]),
            (Sector::RealEstate, vec![
                c("XLRE", "Real Estate Select Sector SPDR Fund"),
                c("VNQ", "Vanguard Real Estate ETF"),
            ]),
            (Sector::Utilities, vec![
                c("XLU", "Utilities Select Sector SPDR Fund"),
                c("VPU", "Vanguard Utilities ETF"),
            ]),
            (Sector::BroadMarket, vec![
                c("VTI", "Vanguard Total Stock Market ETF"),
                c("SCHB", "Schwab U.S. Broad Market ETF"),
            ]),
        ]);

        let ticker_sectors: BTreeMap<String, Sector> = [
            // Tech
            ("AAPL", Sector::Technology),
            ("MSFT", Sector::Technology),
            ("ORCL", Sector::Technology),
            ("CRM", Sector::Technology),
            ("ADBE", Sector::Technology),
            ("CSCO", Sector::Technology),
            ("IBM", Sector::Technology),
            ("NOW", Sector::Technology),
            ("XLK", Sector::Technology),
            ("VGT", Sector::Technology),
            // Chips
            ("NVDA", Sector::Semiconductors),
            ("AMD", Sector::Semiconductors),
            ("INTC", Sector::Semiconductors),
            ("QCOM", Sector::Semiconductors),
            ("AVGO", Sector::Semiconductors),
            ("SMH", Sector::Semiconductors),
            ("SOXX", Sector::Semiconductors),
            // Communication
            ("GOOGL", Sector::CommunicationServices),
            ("GOOG", Sector::CommunicationServices),
            ("META", Sector::CommunicationServices),
            ("NFLX", Sector::CommunicationServices),
            ("DIS", Sector::CommunicationServices),
            ("VZ", Sector::CommunicationServices),
            ("T", Sector::CommunicationServices),
            ("XLC", Sector::CommunicationServices),
            // Consumer
            ("AMZN", Sector::ConsumerDiscretionary),
            ("TSLA", Sector::ConsumerDiscretionary),
            ("HD", Sector::ConsumerDiscretionary),
            ("NKE", Sector::ConsumerDiscretionary),
            ("MCD", Sector::ConsumerDiscretionary),
            ("XLY", Sector::ConsumerDiscretionary),
            ("PG", Sector::ConsumerStaples),
            ("KO", Sector::ConsumerStaples),
            ("PEP", Sector::ConsumerStaples),
            ("WMT", Sector::ConsumerStaples),
            ("COST", Sector::ConsumerStaples),
            ("XLP", Sector::ConsumerStaples),
            // Finance
            ("JPM", Sector::Financials),
            ("BAC", Sector::Financials),
            ("GS", Sector::Financials),
            ("MS", Sector::Financials),
            ("V", Sector::Financials),
            ("MA", Sector::Financials),
            ("PYPL", Sector::Financials),
            ("BRK.B", Sector::Financials),
            ("XLF", Sector::Financials),
            // Healthcare
            ("JNJ", Sector::Healthcare),
            ("PFE", Sector::Healthcare),
            ("UNH", Sector::Healthcare),
            ("MRK", Sector::Healthcare),
            ("ABBV", Sector::Healthcare),
            ("TMO", Sector::Healthcare),
            ("XLV", Sector::Healthcare),
            // Energy
            ("XOM", Sector::Energy),
            ("CVX", Sector::Energy),
            ("XLE", Sector::Energy),
            // Everything else with a known sector
            ("CAT", Sector::Industrials),
            ("BA", Sector::Industrials),
            ("XLI", Sector::Industrials),
            ("LIN", Sector::Materials),
            ("XLB", Sector::Materials),
            ("PLD", Sector::RealEstate),
            ("XLRE", Sector::RealEstate),
            ("NEE", Sector::Utilities),
            ("XLU", Sector::Utilities),
            ("VTI", Sector::BroadMarket),
            ("SPY", Sector::BroadMarket),
            ("VOO", Sector::BroadMarket),
            ("IVV", Sector::BroadMarket),
        ]
        .into_iter()
        .map(|(t, s)| (t.to_string(), s))
        .collect();

        let curated = BTreeMap::from([
            ("AAPL".to_string(), vec![c("SCHG", "Schwab U.S. Large-Cap Growth ETF")]),
            ("MSFT".to_string(), vec![c("VGT", "Vanguard Information Technology ETF")]),
            ("TSLA".to_string(), vec![c("ARKK", "ARK Innovation ETF")]),
            ("NVDA".to_string(), vec![c("SMH", "VanEck Semiconductor ETF")]),
            ("AMZN".to_string(), vec![c("XLY", "Consumer Discretionary Select Sector SPDR Fund")]),
            ("GOOGL".to_string(), vec![c("XLC", "Communication Services Select Sector SPDR Fund")]),
            ("META".to_string(), vec![c("XLC", "Communication Services Select Sector SPDR Fund")]),
            ("SPY".to_string(), vec![c("VTI", "Vanguard Total Stock Market ETF")]),
        ]);

        let identical_groups = vec![
            vec!["SPY".to_string(), "VOO".to_string(), "IVV".to_string(), "SPLG".to_string()],
            vec!["QQQ".to_string(), "QQQM".to_string()],
            vec!["GOOGL".to_string(), "GOOG".to_string()],
            vec!["BRK.A".to_string(), "BRK.B".to_string()],
        ];

        Self {
            curated,
            ticker_sectors,
            sector_etfs,
            identical_groups,
        }
    }
}

impl ReplacementTable {
    /// Load a table from a JSON file, e.g. a refreshed replacement list.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replacement table {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Invalid replacement table {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let table: Self = serde_json::from_str(raw)?;
        let table = table.normalized();
        table.check()?;
        Ok(table)
    }

    fn normalized(self) -> Self {
        let upper = |s: String| s.trim().to_uppercase();
        let fix = |list: Vec<ReplacementCandidate>| {
            list.into_iter()
                .map(|c| ReplacementCandidate {
                    ticker: upper(c.ticker),
                    name: c.name.trim().to_string(),
                })
                .collect::<Vec<_>>()
        };

        Self {
            curated: self.curated.into_iter().map(|(k, v)| (upper(k), fix(v))).collect(),
            ticker_sectors: self
                .ticker_sectors
                .into_iter()
                .map(|(k, v)| (upper(k), v))
                .collect(),
            sector_etfs: self.sector_etfs.into_iter().map(|(k, v)| (k, fix(v))).collect(),
            identical_groups: self
                .identical_groups
                .into_iter()
                .map(|g| g.into_iter().map(upper).collect())
                .collect(),
        }
    }

    /// The broad-market list backs every lookup, so it must offer at least two
    /// securities that are not substantially identical to each other.
    fn check(&self) -> anyhow::Result<()> {
        let all = self
            .curated
            .values()
            .chain(self.sector_etfs.values())
            .flatten();
        for candidate in all {
            normalize_ticker(&candidate.ticker)
                .map_err(|e| anyhow::anyhow!("replacement ticker {}", e))?;
            if candidate.name.is_empty() {
                anyhow::bail!("replacement {} has no name", candidate.ticker);
            }
        }

        let broad = self
            .sector_etfs
            .get(&Sector::BroadMarket)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let distinct = broad.iter().any(|a| {
            broad
                .iter()
                .any(|b| !self.is_substantially_identical(&a.ticker, &b.ticker))
        });
        if !distinct {
            anyhow::bail!("broad_market needs two replacements that are not substantially identical");
        }
        Ok(())
    }

    /// Coarse sector of a ticker; unknown tickers are treated as broad market
    pub fn sector_of(&self, ticker: &str) -> Sector {
        self.ticker_sectors
            .get(&ticker.to_uppercase())
            .copied()
            .unwrap_or(Sector::BroadMarket)
    }

    /// Check if two symbols are substantially identical (would trigger wash sale)
    pub fn is_substantially_identical(&self, symbol1: &str, symbol2: &str) -> bool {
        let a = symbol1.trim().to_uppercase();
        let b = symbol2.trim().to_uppercase();
        if a == b {
            return true;
        }

        self.identical_groups
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
    }

    /// First table entry usable as a replacement for `ticker`: curated picks,
    /// then the sector ETFs, then the broad market.
    pub fn fallback_for(&self, ticker: &str) -> Option<&ReplacementCandidate> {
        let ticker = ticker.trim().to_uppercase();
        let sector = self.sector_of(&ticker);

        self.curated
            .get(&ticker)
            .into_iter()
            .flatten()
            .chain(self.sector_etfs.get(&sector).into_iter().flatten())
            .chain(self.sector_etfs.get(&Sector::BroadMarket).into_iter().flatten())
            .find(|c| !self.is_substantially_identical(&ticker, &c.ticker))
    }
}

/// Where a replacement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionSource {
    Advisor,
    Fallback,
}

/// An accepted replacement for one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ticker: String,
    pub name: String,
    /// Advisor-written steps; `None` means the builder writes them from its template
    pub action_steps: Option<Vec<String>>,
    pub source: SelectionSource,
    /// Set when an advisor was configured but its answer could not be used
    pub fallback_reason: Option<String>,
}

/// Boundary to the generative advisor with a deterministic fallback
#[derive(Clone)]
pub struct ReplacementSelector {
    advisor: Option<Arc<dyn ReplacementAdvisor>>,
    table: Arc<ReplacementTable>,
    timeout: Duration,
}

impl ReplacementSelector {
    pub fn new(
        advisor: Option<Arc<dyn ReplacementAdvisor>>,
        table: Arc<ReplacementTable>,
        timeout: Duration,
    ) -> Self {
        Self {
            advisor,
            table,
            timeout,
        }
    }

    /// Choose a replacement for the position described by `context`.
    ///
    /// Only fails when the static table has nothing to offer, which means the
    /// table itself is broken.
    pub async fn select(&self, context: &AdvisorContext) -> HarvestResult<Selection> {
        let fallback_reason = match &self.advisor {
            None => None,
            Some(advisor) => {
                match tokio::time::timeout(self.timeout, advisor.suggest(context)).await {
                    Ok(Ok(suggestion)) => match self.accept(&context.ticker, suggestion) {
                        Ok(selection) => return Ok(selection),
                        Err(e) => Some(e.to_string()),
                    },
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some(AdvisorError::Timeout.to_string()),
                }
            }
        };

        if let Some(reason) = &fallback_reason {
            tracing::warn!(
                "Replacement advisor unusable for {}, using fallback table: {}",
                context.ticker,
                reason
            );
        }

        let candidate = self.table.fallback_for(&context.ticker).ok_or_else(|| {
            HarvestError::InvariantViolation(format!(
                "replacement table has no usable entry for {}",
                context.ticker
            ))
        })?;

        Ok(Selection {
            ticker: candidate.ticker.clone(),
            name: candidate.name.clone(),
            action_steps: None,
            source: SelectionSource::Fallback,
            fallback_reason,
        })
    }

    /// Check an advisor suggestion before it can reach an opportunity
    fn accept(&self, ticker: &str, suggestion: ReplacementSuggestion) -> AdvisorResult<Selection> {
        let replacement = normalize_ticker(&suggestion.replacement_ticker)
            .map_err(|e| AdvisorError::InvalidResponse(format!("replacement ticker {}", e)))?;

        if self.table.is_substantially_identical(ticker, &replacement) {
            return Err(AdvisorError::Rejected(format!(
                "{} is substantially identical to {}",
                replacement, ticker
            )));
        }

        let name = suggestion.replacement_name.trim().to_string();
        if name.is_empty() {
            return Err(AdvisorError::InvalidResponse("missing replacement name".to_string()));
        }

        let steps: Vec<String> = suggestion
            .action_steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(MAX_ACTION_STEPS)
            .collect();
        if steps.is_empty() {
            return Err(AdvisorError::InvalidResponse("no action steps".to_string()));
        }

        Ok(Selection {
            ticker: replacement,
            name,
            action_steps: Some(steps),
            source: SelectionSource::Advisor,
            fallback_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct FixedAdvisor(ReplacementSuggestion);

    #[async_trait]
    impl ReplacementAdvisor for FixedAdvisor {
        async fn suggest(&self, _context: &AdvisorContext) -> AdvisorResult<ReplacementSuggestion> {
            Ok(self.0.clone())
        }

        fn backend_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FailingAdvisor;

    #[async_trait]
    impl ReplacementAdvisor for FailingAdvisor {
        async fn suggest(&self, _context: &AdvisorContext) -> AdvisorResult<ReplacementSuggestion> {
            Err(AdvisorError::ServiceUnavailable("Status: 503".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    struct SlowAdvisor;

    #[async_trait]
    impl ReplacementAdvisor for SlowAdvisor {
        async fn suggest(&self, _context: &AdvisorContext) -> AdvisorResult<ReplacementSuggestion> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(AdvisorError::Timeout)
        }

        fn backend_name(&self) -> &'static str {
            "slow"
        }
    }

    fn context(ticker: &str) -> AdvisorContext {
        AdvisorContext {
            ticker: ticker.to_string(),
            shares: dec!(100),
            unrealized_loss: dec!(5000),
            is_long_term: true,
            rebuy_date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
        }
    }

    fn suggestion(ticker: &str, steps: &[&str]) -> ReplacementSuggestion {
        ReplacementSuggestion {
            replacement_ticker: ticker.to_string(),
            replacement_name: "Some Fund".to_string(),
            action_steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn selector(advisor: Option<Arc<dyn ReplacementAdvisor>>) -> ReplacementSelector {
        ReplacementSelector::new(
            advisor,
            Arc::new(ReplacementTable::default()),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_sector_classification() {
        let table = ReplacementTable::default();
        assert_eq!(table.sector_of("aapl"), Sector::Technology);
        assert_eq!(table.sector_of("JPM"), Sector::Financials);
        assert_eq!(table.sector_of("ZZZZ"), Sector::BroadMarket);
    }

    #[test]
    fn test_substantially_identical() {
        let table = ReplacementTable::default();

        assert!(table.is_substantially_identical("SPY", "spy"));
        assert!(table.is_substantially_identical("SPY", "VOO"));
        assert!(table.is_substantially_identical("GOOGL", "GOOG"));
        assert!(!table.is_substantially_identical("AAPL", "MSFT"));
    }

    #[test]
    fn test_fallback_prefers_curated_then_sector() {
        let table = ReplacementTable::default();

        assert_eq!(table.fallback_for("AAPL").unwrap().ticker, "SCHG");
        assert_eq!(table.fallback_for("JPM").unwrap().ticker, "XLF");
        assert_eq!(table.fallback_for("UNKNOWN").unwrap().ticker, "VTI");
    }

    #[test]
    fn test_fallback_never_returns_the_same_security() {
        let table = ReplacementTable::default();

        // Sector ETFs held directly skip themselves
        assert_eq!(table.fallback_for("XLK").unwrap().ticker, "VGT");
        assert_eq!(table.fallback_for("VTI").unwrap().ticker, "SCHB");
        // VOO is identical to SPY's group, not to VTI
        assert_eq!(table.fallback_for("VOO").unwrap().ticker, "VTI");
        for ticker in ["SMH", "XLC", "SCHB", "GOOG", "BRK.B"] {
            let pick = table.fallback_for(ticker).unwrap();
            assert!(!table.is_substantially_identical(ticker, &pick.ticker));
        }
    }

    #[test]
    fn test_table_json_roundtrip_and_checks() {
        let json = serde_json::to_string(&ReplacementTable::default()).unwrap();
        let loaded = ReplacementTable::from_json_str(&json).unwrap();
        assert_eq!(loaded, ReplacementTable::default());

        let broken = r#"{"sector_etfs": {"broad_market": [{"ticker": "VTI", "name": "Total"}]}}"#;
        assert!(ReplacementTable::from_json_str(broken).is_err());
    }

    #[tokio::test]
    async fn test_accepts_valid_advisor_suggestion() {
        let advisor = FixedAdvisor(suggestion(" qqq ", &["Sell AAPL", "", "Buy QQQ"]));
        let selection = selector(Some(Arc::new(advisor))).select(&context("AAPL")).await.unwrap();

        assert_eq!(selection.source, SelectionSource::Advisor);
        assert_eq!(selection.ticker, "QQQ");
        assert_eq!(
            selection.action_steps,
            Some(vec!["Sell AAPL".to_string(), "Buy QQQ".to_string()])
        );
    }

    #[tokio::test]
    async fn test_rejects_identical_replacement() {
        let advisor = FixedAdvisor(suggestion("aapl", &["Sell", "Buy"]));
        let selection = selector(Some(Arc::new(advisor))).select(&context("AAPL")).await.unwrap();

        assert_eq!(selection.source, SelectionSource::Fallback);
        assert_eq!(selection.ticker, "SCHG");
        assert!(selection.fallback_reason.unwrap().contains("substantially identical"));
    }

    #[tokio::test]
    async fn test_rejects_share_class_twin() {
        let advisor = FixedAdvisor(suggestion("GOOG", &["Sell", "Buy"]));
        let selection = selector(Some(Arc::new(advisor))).select(&context("GOOGL")).await.unwrap();

        assert_eq!(selection.source, SelectionSource::Fallback);
        assert_eq!(selection.ticker, "XLC");
    }

    #[tokio::test]
    async fn test_rejects_empty_steps() {
        let advisor = FixedAdvisor(suggestion("VGT", &[]));
        let selection = selector(Some(Arc::new(advisor))).select(&context("MSFT")).await.unwrap();

        assert_eq!(selection.source, SelectionSource::Fallback);
        assert!(selection.action_steps.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_on_advisor_error() {
        let selection = selector(Some(Arc::new(FailingAdvisor)))
            .select(&context("NVDA"))
            .await
            .unwrap();

        assert_eq!(selection.source, SelectionSource::Fallback);
        assert_eq!(selection.ticker, "SMH");
        assert!(selection.fallback_reason.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_falls_back_on_timeout() {
        let selection = selector(Some(Arc::new(SlowAdvisor)))
            .select(&context("TSLA"))
            .await
            .unwrap();

        assert_eq!(selection.source, SelectionSource::Fallback);
        assert_eq!(selection.ticker, "ARKK");
        assert_eq!(selection.fallback_reason.as_deref(), Some("Timeout"));
    }

    #[tokio::test]
    async fn test_no_advisor_is_not_a_failure() {
        let selection = selector(None).select(&context("XOM")).await.unwrap();

        assert_eq!(selection.ticker, "XLE");
        assert!(selection.fallback_reason.is_none());
    }
}
