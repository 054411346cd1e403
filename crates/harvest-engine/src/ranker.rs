//! Ranking, totals and the final response.

use chrono::NaiveDate;
use harvest_core::{
    AnalysisResult, AnalysisWarning, HarvestError, HarvestResult, Opportunity, WarningKind,
};
use rust_decimal::Decimal;

use crate::harvester::{format_currency, ELIGIBILITY_THRESHOLD};

/// Harvesting passes assumed per year when projecting annual savings
pub const HARVEST_PASSES_PER_YEAR: u32 = 1;

/// Stated to callers alongside every projection
pub const PROJECTION_BASIS: &str = "Annual projection assumes one harvesting pass per year, \
so it equals the immediate tax savings of this analysis.";

/// Opportunities in final order plus their totals
#[derive(Debug, Clone, PartialEq)]
pub struct RankedOpportunities {
    pub opportunities: Vec<Opportunity>,
    pub total_tax_savings: Decimal,
    pub annual_projection: Decimal,
}

/// Order by tax savings, highest first; ties keep input order.
///
/// `entries` carry the original position index so the result does not depend
/// on the order in which concurrent tasks finished. Totals that do not fit a
/// `Decimal` are an invariant violation rather than a panic.
pub fn rank_opportunities(
    mut entries: Vec<(usize, Opportunity)>,
) -> HarvestResult<RankedOpportunities> {
    entries.sort_by_key(|(index, _)| *index);
    let mut opportunities: Vec<Opportunity> = entries.into_iter().map(|(_, o)| o).collect();
    // Vec::sort_by is stable
    opportunities.sort_by(|a, b| b.tax_savings.cmp(&a.tax_savings));

    let overflow = || HarvestError::InvariantViolation("total tax savings overflow".to_string());
    let total_tax_savings = opportunities
        .iter()
        .try_fold(Decimal::ZERO, |acc, o| acc.checked_add(o.tax_savings))
        .ok_or_else(overflow)?;
    let annual_projection = total_tax_savings
        .checked_mul(Decimal::from(HARVEST_PASSES_PER_YEAR))
        .ok_or_else(overflow)?;

    Ok(RankedOpportunities {
        opportunities,
        total_tax_savings,
        annual_projection,
    })
}

/// Build the response, including the summary text for the empty case.
pub fn assemble_result(
    ranked: RankedOpportunities,
    warnings: Vec<AnalysisWarning>,
    reference_date: NaiveDate,
) -> AnalysisResult {
    let skipped = warnings
        .iter()
        .filter(|w| w.kind == WarningKind::QuoteUnavailable)
        .count();

    let mut summary = if ranked.opportunities.is_empty() {
        format!(
            "No tax-loss harvesting opportunities found. No position has an unrealized loss of at least {}.",
            format_currency(ELIGIBILITY_THRESHOLD, 0)
        )
    } else {
        let count = ranked.opportunities.len();
        format!(
            "Found {} tax-loss harvesting {} with total immediate savings of {}.",
            count,
            if count == 1 { "opportunity" } else { "opportunities" },
            format_currency(ranked.total_tax_savings, 0)
        )
    };

    if skipped > 0 {
        summary.push_str(&format!(
            " {} {} skipped because no market quote was available.",
            skipped,
            if skipped == 1 { "position was" } else { "positions were" }
        ));
    }

    AnalysisResult {
        opportunities: ranked.opportunities,
        total_tax_savings: ranked.total_tax_savings,
        annual_projection: ranked.annual_projection,
        summary,
        projection_basis: PROJECTION_BASIS.to_string(),
        reference_date,
        warnings,
    }
}
