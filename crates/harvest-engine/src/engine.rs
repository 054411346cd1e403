//! Analysis pipeline
//!
//! Validates a request, fans positions out to bounded concurrent tasks
//! (price, classify, rate, rebuy date, replacement, build) and joins them
//! at a single barrier before ranking.

use chrono::{NaiveDate, Utc};
use harvest_core::{
    AdvisorContext, AnalysisRequest, AnalysisResult, AnalysisWarning, HarvestError, HarvestResult,
    Opportunity, Position, QuoteProvider, ReplacementAdvisor, TaxBracket, WarningKind,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::harvester::{LossClassifier, OpportunityBuilder};
use crate::ranker::{assemble_result, rank_opportunities};
use crate::substitutes::{ReplacementSelector, ReplacementTable, SelectionSource};
use crate::tax_calculator::{RateTable, TaxCalculator};
use crate::validator;
use crate::wash_sale::WashSalePolicy;

/// What became of a single position
#[derive(Debug)]
enum PositionOutcome {
    /// No usable quote; left out of the result
    Skipped(AnalysisWarning),
    /// Gain, or a loss under the eligibility threshold
    BelowThreshold,
    Harvestable {
        opportunity: Opportunity,
        warning: Option<AnalysisWarning>,
    },
}

/// Everything a per-position task needs, shared read-only across tasks
struct EngineShared {
    quotes: Arc<dyn QuoteProvider>,
    selector: ReplacementSelector,
    classifier: LossClassifier,
    calculator: TaxCalculator,
    wash_sale: WashSalePolicy,
    config: EngineConfig,
}

impl EngineShared {
    async fn process_position(
        &self,
        position: &Position,
        bracket: TaxBracket,
        reference_date: NaiveDate,
    ) -> HarvestResult<PositionOutcome> {
        let ticker = position.ticker.as_str();

        let classified = match self.classifier.fetch_price(self.quotes.as_ref(), ticker).await {
            Ok(price) => self.classifier.classify(position, price, reference_date),
            Err(e) => Err(e),
        };
        let classified = match classified {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", ticker, e);
                return Ok(PositionOutcome::Skipped(AnalysisWarning {
                    ticker: ticker.to_string(),
                    kind: WarningKind::QuoteUnavailable,
                    message: e.to_string(),
                }));
            }
        };

        if !self.classifier.is_eligible(&classified) {
            tracing::debug!(
                "{}: loss {} below harvesting threshold",
                ticker,
                classified.unrealized_loss
            );
            return Ok(PositionOutcome::BelowThreshold);
        }

        let estimate = self.calculator.estimate(&classified, bracket);

        let rebuy_date = self.wash_sale.rebuy_date(reference_date);
        if self.wash_sale.window(ticker, reference_date).contains(rebuy_date) {
            return Err(HarvestError::InvariantViolation(format!(
                "rebuy date {} for {} falls inside the wash sale window",
                rebuy_date, ticker
            )));
        }

        let context = AdvisorContext {
            ticker: ticker.to_string(),
            shares: position.shares,
            unrealized_loss: classified.unrealized_loss,
            is_long_term: estimate.holding_period.is_long_term(),
            rebuy_date,
        };
        let selection = self.selector.select(&context).await?;

        let warning = match (&selection.source, &selection.fallback_reason) {
            (SelectionSource::Fallback, Some(reason)) => Some(AnalysisWarning {
                ticker: ticker.to_string(),
                kind: WarningKind::ReplacementFallback,
                message: format!(
                    "Replacement advisor unavailable ({}); used {} from the static table",
                    reason, selection.ticker
                ),
            }),
            _ => None,
        };

        let opportunity = OpportunityBuilder::build(&classified, &estimate, rebuy_date, &selection)?;
        tracing::debug!(
            "{}: loss {} ({}), savings {} at {}, replace with {}",
            ticker,
            opportunity.unrealized_loss,
            estimate.holding_period,
            opportunity.tax_savings,
            estimate.effective_rate,
            opportunity.replacement_ticker
        );

        Ok(PositionOutcome::Harvestable {
            opportunity,
            warning,
        })
    }
}

/// Engine for finding tax-loss harvesting opportunities.
///
/// Cheap to clone; clones share the same collaborators and static tables.
#[derive(Clone)]
pub struct HarvestingEngine {
    shared: Arc<EngineShared>,
}

impl HarvestingEngine {
    pub fn builder(quotes: Arc<dyn QuoteProvider>) -> HarvestingEngineBuilder {
        HarvestingEngineBuilder::new(quotes)
    }

    pub fn rate_table(&self) -> &RateTable {
        self.shared.calculator.table()
    }

    /// Analyze a request as of today (UTC)
    pub async fn analyze(&self, request: &AnalysisRequest) -> HarvestResult<AnalysisResult> {
        self.analyze_as_of(request, Utc::now().date_naive()).await
    }

    /// Analyze a request against an explicit reference date.
    ///
    /// Dropping the returned future aborts every in-flight position task.
    pub async fn analyze_as_of(
        &self,
        request: &AnalysisRequest,
        reference_date: NaiveDate,
    ) -> HarvestResult<AnalysisResult> {
        let validated = validator::validate(request, reference_date)?;
        let bracket = validated.tax_bracket;
        let total = validated.positions.len();

        tracing::info!(
            "Analyzing {} positions at the {} bracket as of {}",
            total,
            bracket,
            reference_date
        );

        let semaphore = Arc::new(Semaphore::new(self.shared.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, position) in validated.positions.into_iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let sem = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| HarvestError::TaskFailed(e.to_string()))?;
                let outcome = shared
                    .process_position(&position, bracket, reference_date)
                    .await?;
                Ok::<_, HarvestError>((index, outcome))
            });
        }

        // Barrier: every task finishes (or the first fatal error aborts the rest)
        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| {
                tracing::error!("Position task failed: {}", e);
                HarvestError::TaskFailed(e.to_string())
            })?;
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Analysis aborted: {}", e);
                    return Err(e);
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                PositionOutcome::Skipped(warning) => warnings.push(warning),
                PositionOutcome::BelowThreshold => {}
                PositionOutcome::Harvestable {
                    opportunity,
                    warning,
                } => {
                    warnings.extend(warning);
                    entries.push((index, opportunity));
                }
            }
        }

        let ranked = rank_opportunities(entries)?;
        tracing::info!(
            "Found {} opportunities out of {} positions, total savings {} ({} warnings)",
            ranked.opportunities.len(),
            total,
            ranked.total_tax_savings,
            warnings.len()
        );

        Ok(assemble_result(ranked, warnings, reference_date))
    }
}

/// Builder for [`HarvestingEngine`]; the quote provider is the only required part.
pub struct HarvestingEngineBuilder {
    quotes: Arc<dyn QuoteProvider>,
    advisor: Option<Arc<dyn ReplacementAdvisor>>,
    rate_table: Arc<RateTable>,
    replacements: Arc<ReplacementTable>,
    wash_sale: WashSalePolicy,
    config: EngineConfig,
}

impl HarvestingEngineBuilder {
    pub fn new(quotes: Arc<dyn QuoteProvider>) -> Self {
        Self {
            quotes,
            advisor: None,
            rate_table: Arc::new(RateTable::default()),
            replacements: Arc::new(ReplacementTable::default()),
            wash_sale: WashSalePolicy::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn advisor(mut self, advisor: Arc<dyn ReplacementAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn rate_table(mut self, table: RateTable) -> Self {
        self.rate_table = Arc::new(table);
        self
    }

    pub fn replacements(mut self, table: ReplacementTable) -> Self {
        self.replacements = Arc::new(table);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> HarvestingEngine {
        let selector = ReplacementSelector::new(
            self.advisor,
            self.replacements,
            self.config.advisor_timeout,
        );

        HarvestingEngine {
            shared: Arc::new(EngineShared {
                quotes: self.quotes,
                selector,
                classifier: LossClassifier::new(self.config.quote_timeout),
                calculator: TaxCalculator::new(self.rate_table),
                wash_sale: self.wash_sale,
                config: self.config,
            }),
        }
    }
}
