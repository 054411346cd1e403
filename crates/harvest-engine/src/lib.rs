//! Harvest Engine
//!
//! Finds tax-loss harvesting opportunities in a portfolio while keeping every
//! recommendation clear of the US wash-sale rule.

pub mod config;
pub mod engine;
pub mod harvester;
pub mod ranker;
pub mod substitutes;
pub mod tax_calculator;
pub mod validator;
pub mod wash_sale;


pub use config::EngineConfig;
pub use engine::{HarvestingEngine, HarvestingEngineBuilder};
pub use harvester::{ClassifiedPosition, LossClassifier, OpportunityBuilder, ELIGIBILITY_THRESHOLD};
pub use ranker::{assemble_result, rank_opportunities, RankedOpportunities, PROJECTION_BASIS};
pub use substitutes::{
    ReplacementCandidate, ReplacementSelector, ReplacementTable, Sector, Selection, SelectionSource,
};
pub use tax_calculator::{
    HoldingPeriod, RateTable, RateTableError, TaxCalculator, TaxEstimate,
    LONG_TERM_THRESHOLD_DAYS,
};
pub use validator::validate;
pub use wash_sale::{WashSalePolicy, WashSaleWindow};
