//! # otd-core
//!
//! Deterministic out-the-door quoting engine for vehicle purchases.
//!
//! Given one proposed deal, the engine answers:
//! - Which government fees does this scenario trigger?
//! - Which dealer fees apply?
//! - How much sales tax is owed, after trade-in credit and county caps?
//! - What is financed, and what does it cost per month?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input, catalogs, and quote date always produce
//!    the same result. Nothing reads the clock.
//! 2. **Explainable**: Every fired rule is reported by id, and conditional
//!    fees carry a human-readable explanation.
//! 3. **Fail closed**: Conditions over missing fields never match; missing
//!    rate data resolves to zero with a warning.
//! 4. **Stateless**: Catalogs are passed in; there is no shared state.
//!
//! ## Example
//!
//! ```rust,ignore
//! use otd_core::{calculate, DealerConfig, RateTable, RuleCatalog, ScenarioInput};
//!
//! let rules = RuleCatalog::from_yaml_file("florida_rules.yaml")?;
//! let rates = RateTable::from_yaml_file("rates.yaml")?;
//! let dealer = DealerConfig::from_yaml_file("dealer.yaml")?;
//! let input = ScenarioInput::from_json(&request_body)?;
//!
//! let result = calculate(&input, rules.rules(), rates.windows(), &dealer)?;
//! println!("Out the door: {}", result.totals.out_the_door_price);
//! ```

pub mod assembler;
pub mod catalog;
pub mod classifier;
pub mod condition;
pub mod context;
pub mod fees;
pub mod financing;
pub mod money;
pub mod normalize;
pub mod rates;
pub mod tax;
pub mod types;

// Re-export main types at crate root
pub use assembler::{QuoteParts, ResultAssembler};
pub use catalog::{
    CatalogError, ComponentLabel, DealerConfig, DealerFee, DealerPackage, JurisdictionRule,
    RateTable, RateWindow, RuleCatalog, RuleType, TaxScope,
};
pub use classifier::ScenarioClassifier;
pub use condition::{Condition, ConditionError, Fields, Scalar};
pub use context::ScenarioContext;
pub use fees::{DealerFeeResolver, FeeOutcome, FeeResolver, GovernmentFeeResolver, QuoteRequest};
pub use financing::{FinancingError, FinancingSummary};
pub use rates::{resolve as resolve_rate, resolve_detailed as resolve_rate_detailed, RateResolution};
pub use tax::{TaxCalculator, TaxOutcome};
pub use types::{
    DealTerms, DealType, DetectedScenario, FeeCategory, LineItem, PlateScenario, RateSource,
    ScenarioInput, ScenarioResult, ScenarioType, TaxBreakdown, Totals, TradeIn, VehicleCondition,
};

use thiserror::Error;
use tracing::debug;

/// Catalog problems that make a deal unquotable.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Dealer {dealer_id} has no package '{package_id}'")]
    UnknownDealerPackage {
        dealer_id: String,
        package_id: String,
    },

    #[error("Dealer {dealer_id} has no default package")]
    NoDefaultPackage { dealer_id: String },

    #[error("Dealer {dealer_id} marks {count} packages as default")]
    AmbiguousDefaultPackage { dealer_id: String, count: usize },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Errors that can occur while quoting.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Financing error: {0}")]
    Financing(#[from] FinancingError),
}

impl QuoteError {
    /// Configuration errors mean "unable to quote this deal" until the
    /// catalogs are fixed; input errors can be corrected by the caller.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, QuoteError::Configuration(_))
    }
}

impl From<CatalogError> for QuoteError {
    fn from(err: CatalogError) -> Self {
        QuoteError::Configuration(ConfigurationError::Catalog(err))
    }
}

/// Quote a deal.
///
/// This is the main entry point. `rules` may hold rules for any number of
/// jurisdictions; only those scoped to the input's state and county apply.
///
/// # Arguments
///
/// * `input` - The proposed deal
/// * `rules` - Jurisdiction fee and tax rules
/// * `rates` - Effective-dated county rate windows
/// * `dealer` - The selling dealer's fee packages
///
/// # Returns
///
/// A `ScenarioResult` containing:
/// - `detected_scenario`: the classification and its flags
/// - `line_items`: government fees, then dealer fees
/// - `tax_breakdown` and `totals`
/// - `applied_rule_ids` and ordered `explanations`
pub fn calculate(
    input: &ScenarioInput,
    rules: &[JurisdictionRule],
    rates: &[RateWindow],
    dealer: &DealerConfig,
) -> Result<ScenarioResult, QuoteError> {
    input.validate().map_err(QuoteError::InvalidInput)?;

    // Classify once; every rule sees the same scenario.
    let classifier = ScenarioClassifier::new();
    let scenario = classifier.classify(input);
    let context = ScenarioContext::build(input, &scenario);

    let request = QuoteRequest {
        input,
        scenario: &scenario,
        context: &context,
        rules,
        rates,
        dealer,
    };

    let government = GovernmentFeeResolver::new().resolve(&request)?;
    let dealer_fees = DealerFeeResolver::new().resolve(&request)?;

    let fee_items: Vec<LineItem> = government
        .items
        .iter()
        .chain(dealer_fees.items.iter())
        .cloned()
        .collect();
    let tax = TaxCalculator::new().calculate(&request, &fee_items);

    let parts = QuoteParts {
        scenario_summary: classifier.summarize(&scenario),
        scenario: scenario.clone(),
        government,
        dealer: dealer_fees,
        tax,
    };
    let result = ResultAssembler::new().assemble(input, parts)?;

    debug!(
        scenario = scenario.scenario_type.as_str(),
        line_items = result.line_items.len(),
        total_fees = %result.totals.total_fees,
        sales_tax = %result.totals.sales_tax,
        out_the_door = %result.totals.out_the_door_price,
        "Quote computed"
    );

    Ok(result)
}

/// Quote a deal against loaded catalogs.
pub fn calculate_with_catalogs(
    input: &ScenarioInput,
    rules: &RuleCatalog,
    rates: &RateTable,
    dealer: &DealerConfig,
) -> Result<ScenarioResult, QuoteError> {
    calculate(input, rules.rules(), rates.windows(), dealer)
}
