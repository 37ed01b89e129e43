//! Fee resolvers.
//!
//! Each resolver answers one question about a quote:
//! - Government: which jurisdiction fees does this scenario trigger?
//! - Dealer: which dealer package applies, and what does it charge?
//!
//! Resolvers are independent and read the same immutable request.

mod dealer;
mod government;

pub use dealer::DealerFeeResolver;
pub use government::GovernmentFeeResolver;

use chrono::NaiveDate;

use crate::catalog::{DealerConfig, JurisdictionRule, RateWindow};
use crate::context::ScenarioContext;
use crate::types::{DetectedScenario, FeeCategory, LineItem, ScenarioInput};
use crate::QuoteError;

/// Everything a resolver may read while pricing one quote.
#[derive(Debug, Clone, Copy)]
pub struct QuoteRequest<'a> {
    pub input: &'a ScenarioInput,
    pub scenario: &'a DetectedScenario,
    pub context: &'a ScenarioContext,
    pub rules: &'a [JurisdictionRule],
    pub rates: &'a [RateWindow],
    pub dealer: &'a DealerConfig,
}

impl QuoteRequest<'_> {
    /// The evaluation date for every effective-dated record.
    pub fn quote_date(&self) -> NaiveDate {
        self.input.quote_date
    }
}

/// Line items produced by one resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeOutcome {
    pub items: Vec<LineItem>,
    pub applied_rule_ids: Vec<String>,
    pub explanations: Vec<String>,
}

/// Trait implemented by each fee resolver.
pub trait FeeResolver {
    /// Which line item category this resolver produces.
    fn category(&self) -> FeeCategory;

    /// Resolve the fees for a quote.
    fn resolve(&self, request: &QuoteRequest<'_>) -> Result<FeeOutcome, QuoteError>;
}
