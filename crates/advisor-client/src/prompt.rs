//! Prompt construction and reply parsing for the replacement advisor

use harvest_core::{AdvisorContext, AdvisorError, AdvisorResult, ReplacementSuggestion};
use serde::Deserialize;

pub const SYSTEM_PROMPT: &str = "You are an ETF research specialist who knows the IRS wash sale rules. \
Securities that are substantially identical to the one being sold (the same company, another share \
class of it, or a fund tracking the same index) trigger a wash sale. Recommend low-cost, liquid ETFs \
that keep similar market exposure while tracking a different index or methodology. \
Reply with a single JSON object and nothing else.";

/// User message for one harvesting candidate
pub fn build_prompt(context: &AdvisorContext) -> String {
    format!(
        "A client will sell {shares} shares of {ticker} to realize a {term} loss of ${loss}.\n\
         They cannot buy {ticker} back before {rebuy}.\n\n\
         Pick the single best replacement security for the waiting period. It must not be {ticker} \
         or substantially identical to it.\n\n\
         Respond with JSON in exactly this shape:\n\
         {{\"replacement_ticker\": \"XLK\", \"replacement_name\": \"Technology Select Sector SPDR Fund\", \
         \"action_steps\": [\"Sell ...\", \"Buy ...\", \"On {rebuy} ...\"]}}\n\n\
         Use two to five short, concrete action steps that mention the share count, the replacement \
         and the rebuy date.",
        shares = context.shares.normalize(),
        ticker = context.ticker,
        term = if context.is_long_term { "long-term" } else { "short-term" },
        loss = context.unrealized_loss.round_dp(2),
        rebuy = context.rebuy_date.format("%Y-%m-%d"),
    )
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(alias = "ticker", alias = "replacement")]
    replacement_ticker: String,
    #[serde(alias = "name")]
    replacement_name: String,
    #[serde(default, alias = "steps")]
    action_steps: Vec<String>,
}

/// Pull the suggestion out of free-form model text.
///
/// The model is asked for bare JSON but often wraps it in prose or a code
/// fence, so the outermost `{ ... }` span is parsed.
pub fn parse_suggestion(text: &str) -> AdvisorResult<ReplacementSuggestion> {
    let json = extract_json_object(text)
        .ok_or_else(|| AdvisorError::InvalidResponse("no JSON object in advisor reply".to_string()))?;

    let raw: RawSuggestion = serde_json::from_str(json)
        .map_err(|e| AdvisorError::InvalidResponse(format!("malformed suggestion: {}", e)))?;

    Ok(ReplacementSuggestion {
        replacement_ticker: raw.replacement_ticker.trim().to_string(),
        replacement_name: raw.replacement_name.trim().to_string(),
        action_steps: raw.action_steps,
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
