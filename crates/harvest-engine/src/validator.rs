//! Request validation
//!
//! Collects every field-level problem of a request instead of stopping at the
//! first one, so the caller can fix a form in a single round trip.

use chrono::NaiveDate;
use harvest_core::{
    AnalysisRequest, FieldError, Position, PositionInput, TaxBracket, ValidatedRequest,
    ValidationError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MAX_TICKER_LEN: usize = 12;

/// Upper bound on `shares` and `cost_basis`; keeps every derived total inside `Decimal`
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

/// Validate and normalize a request against the analysis reference date.
pub fn validate(
    request: &AnalysisRequest,
    reference_date: NaiveDate,
) -> Result<ValidatedRequest, ValidationError> {
    let mut errors = Vec::new();

    if request.positions.is_empty() {
        errors.push(FieldError::new("positions", "at least one position is required"));
    }

    let mut positions = Vec::with_capacity(request.positions.len());
    for (i, input) in request.positions.iter().enumerate() {
        if let Some(position) = validate_position(i, input, reference_date, &mut errors) {
            positions.push(position);
        }
    }

    let tax_bracket = TaxBracket::from_rate(request.tax_bracket);
    if tax_bracket.is_none() {
        let recognized: Vec<String> = TaxBracket::ALL
            .iter()
            .map(|b| format!("{:.2}", b.percent() as f64 / 100.0))
            .collect();
        errors.push(FieldError::new(
            "tax_bracket",
            format!(
                "{} is not a recognized bracket (expected one of {})",
                request.tax_bracket,
                recognized.join(", ")
            ),
        ));
    }

    match tax_bracket {
        Some(tax_bracket) if errors.is_empty() => Ok(ValidatedRequest {
            positions,
            tax_bracket,
        }),
        _ => Err(ValidationError { errors }),
    }
}

fn validate_position(
    index: usize,
    input: &PositionInput,
    reference_date: NaiveDate,
    errors: &mut Vec<FieldError>,
) -> Option<Position> {
    let field = |name: &str| format!("positions[{}].{}", index, name);
    let before = errors.len();

    let ticker = normalize_ticker(&input.ticker);
    match &ticker {
        Ok(_) => {}
        Err(message) => errors.push(FieldError::new(field("ticker"), message.clone())),
    }

    if let Some(message) = amount_problem(input.shares) {
        errors.push(FieldError::new(field("shares"), message));
    }

    if let Some(message) = amount_problem(input.cost_basis) {
        errors.push(FieldError::new(field("cost_basis"), message));
    }

    let purchase_date = match NaiveDate::parse_from_str(input.purchase_date.trim(), "%Y-%m-%d") {
        Ok(date) if date > reference_date => {
            errors.push(FieldError::new(
                field("purchase_date"),
                format!("{} is in the future (reference date {})", date, reference_date),
            ));
            None
        }
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(FieldError::new(
                field("purchase_date"),
                format!("'{}' is not a YYYY-MM-DD date", input.purchase_date),
            ));
            None
        }
    };

    if errors.len() > before {
        return None;
    }

    Some(Position {
        ticker: ticker.ok()?,
        shares: input.shares,
        cost_basis: input.cost_basis,
        purchase_date: purchase_date?,
    })
}

fn amount_problem(value: Decimal) -> Option<String> {
    if value <= Decimal::ZERO {
        Some(format!("must be greater than zero (got {})", value))
    } else if value > MAX_AMOUNT {
        Some(format!("must not exceed {} (got {})", MAX_AMOUNT, value))
    } else {
        None
    }
}

/// Trim and upper-case a ticker, rejecting anything that cannot be a listed symbol.
pub fn normalize_ticker(raw: &str) -> Result<String, String> {
    let ticker = raw.trim().to_uppercase();

    if ticker.is_empty() {
        return Err("must not be empty".to_string());
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(format!("'{}' is longer than {} characters", raw.trim(), MAX_TICKER_LEN));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(format!("'{}' contains characters not allowed in a symbol", raw.trim()));
    }
    if !ticker.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(format!("'{}' has no letters", raw.trim()));
    }

    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn input(ticker: &str, shares: Decimal, cost_basis: Decimal, date: &str) -> PositionInput {
        PositionInput {
            ticker: ticker.to_string(),
            shares,
            cost_basis,
            purchase_date: date.to_string(),
        }
    }

    #[test]
    fn test_valid_request_is_normalized() {
        let request = AnalysisRequest {
            positions: vec![input(" aapl ", dec!(100), dec!(20000), "2024-01-15")],
            tax_bracket: 0.32,
        };

        let validated = validate(&request, reference()).unwrap();
        assert_eq!(validated.tax_bracket, TaxBracket::ThirtyTwo);
        assert_eq!(validated.positions[0].ticker, "AAPL");
        assert_eq!(
            validated.positions[0].purchase_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_negative_shares_names_field() {
        let request = AnalysisRequest {
            positions: vec![input("AAPL", dec!(-5), dec!(20000), "2024-01-15")],
            tax_bracket: 0.32,
        };

        let err = validate(&request, reference()).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "positions[0].shares");
        assert!(err.names_field("shares"));
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let huge = Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0);
        let request = AnalysisRequest {
            positions: vec![
                input("AAPL", dec!(10), huge, "2024-01-15"),
                input("MSFT", huge, dec!(20000), "2024-01-15"),
                input("VTI", dec!(10), MAX_AMOUNT, "2024-01-15"),
            ],
            tax_bracket: 0.37,
        };

        let err = validate(&request, reference()).unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["positions[0].cost_basis", "positions[1].shares"]);
    }

    #[test]
    fn test_empty_positions_rejected() {
        let request = AnalysisRequest {
            positions: Vec::new(),
            tax_bracket: 0.24,
        };

        let err = validate(&request, reference()).unwrap_err();
        assert!(err.names_field("positions"));
    }

    #[test]
    fn test_every_violation_is_reported() {
        let request = AnalysisRequest {
            positions: vec![
                input("", dec!(0), dec!(-1), "2024/01/15"),
                input("MSFT", dec!(10), dec!(3000), "2030-01-01"),
            ],
            tax_bracket: 0.30,
        };

        let err = validate(&request, reference()).unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "positions[0].ticker",
                "positions[0].shares",
                "positions[0].cost_basis",
                "positions[0].purchase_date",
                "positions[1].purchase_date",
                "tax_bracket",
            ]
        );
    }

    #[test]
    fn test_purchase_on_reference_date_allowed() {
        let request = AnalysisRequest {
            positions: vec![input("VTI", dec!(1), dec!(250), "2025-06-01")],
            tax_bracket: 0.10,
        };
        assert!(validate(&request, reference()).is_ok());
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("brk.b").unwrap(), "BRK.B");
        assert!(normalize_ticker("   ").is_err());
        assert!(normalize_ticker("AA PL").is_err());
        assert!(normalize_ticker("1234").is_err());
    }
}
