//! Request and result types exchanged with the caller.
//!
//! Field names serialize in camelCase to match the record shapes the
//! surrounding application already stores and renders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::financing::{FinancingSummary, MAX_APR, MAX_TERM_MONTHS};
use crate::normalize;

/// Deal structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Cash,
    Finance,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Cash => "cash",
            DealType::Finance => "finance",
        }
    }
}

/// New or used vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCondition {
    New,
    Used,
}

impl VehicleCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCondition::New => "new",
            VehicleCondition::Used => "used",
        }
    }
}

/// What happens with the license plate on this deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateScenario {
    NewPlate,
    TransferExistingPlate,
    TempTag,
}

impl PlateScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlateScenario::NewPlate => "new_plate",
            PlateScenario::TransferExistingPlate => "transfer_existing_plate",
            PlateScenario::TempTag => "temp_tag",
        }
    }
}

/// Price and financing terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealTerms {
    #[serde(rename = "type")]
    pub deal_type: DealType,

    pub selling_price: Decimal,

    #[serde(default)]
    pub cash_down: Decimal,

    /// Loan term; zero for cash deals.
    #[serde(default)]
    pub term_months: u32,

    /// Annual percentage rate, in percent (5.99 = 5.99%).
    #[serde(default)]
    pub apr: Decimal,

    #[serde(default)]
    pub lender_type: Option<String>,
}

/// The vehicle being purchased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub year: i32,
    pub condition: VehicleCondition,
    #[serde(default)]
    pub vin: Option<String>,
}

/// A vehicle traded in against the purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeIn {
    pub estimated_value: Decimal,
    #[serde(default)]
    pub payoff_amount: Decimal,
}

impl TradeIn {
    /// Positive equity only; an upside-down trade contributes zero.
    pub fn equity(&self) -> Decimal {
        (self.estimated_value - self.payoff_amount).max(Decimal::ZERO)
    }
}

/// Registration situation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub plate_scenario: PlateScenario,
    #[serde(default)]
    pub first_time_in_state: bool,
}

/// Where the vehicle is titled and registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jurisdiction {
    pub state_code: String,
    pub county_name: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Purchaser details relevant to fees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub residency_state: Option<String>,
}

/// One quote request. Built once by the caller and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInput {
    /// Date every effective-dated rule and rate is evaluated on.
    pub quote_date: NaiveDate,

    pub deal: DealTerms,

    pub vehicle: Vehicle,

    #[serde(default)]
    pub trade_ins: Vec<TradeIn>,

    pub registration: Registration,

    pub jurisdiction: Jurisdiction,

    #[serde(default)]
    pub customer: Customer,

    /// Dealer fee package; the dealer's default when absent.
    #[serde(default)]
    pub dealer_package_id: Option<String>,

    /// Optional government fees the customer opted into.
    #[serde(default)]
    pub opt_in_fee_codes: Vec<String>,
}

impl ScenarioInput {
    /// Parse a scenario from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sum of per-vehicle positive equity.
    pub fn trade_in_equity(&self) -> Decimal {
        self.trade_ins.iter().map(TradeIn::equity).sum()
    }

    /// Reject inputs no quote can be built from.
    pub fn validate(&self) -> Result<(), String> {
        if self.deal.selling_price.is_sign_negative() {
            return Err("deal.sellingPrice must not be negative".to_string());
        }
        if self.deal.cash_down.is_sign_negative() {
            return Err("deal.cashDown must not be negative".to_string());
        }
        if self.deal.apr.is_sign_negative() {
            return Err("deal.apr must not be negative".to_string());
        }
        if self.deal.apr > MAX_APR {
            return Err(format!("deal.apr must not exceed {}", MAX_APR));
        }
        if self.deal.term_months > MAX_TERM_MONTHS {
            return Err(format!(
                "deal.termMonths must not exceed {}",
                MAX_TERM_MONTHS
            ));
        }
        for (idx, trade) in self.trade_ins.iter().enumerate() {
            if trade.estimated_value.is_sign_negative() || trade.payoff_amount.is_sign_negative() {
                return Err(format!("tradeIns[{}] values must not be negative", idx));
            }
        }
        if let Some(vin) = &self.vehicle.vin {
            if !normalize::is_valid_vin(vin) {
                return Err(format!("vehicle.vin '{}' is not a valid VIN", vin));
            }
        }
        if !normalize::is_state_code(&self.jurisdiction.state_code) {
            return Err(format!(
                "jurisdiction.stateCode '{}' is not a two-letter code",
                self.jurisdiction.state_code
            ));
        }
        Ok(())
    }
}

/// Canonical scenario label, chosen by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    FirstTimeRegistration,
    TagTransfer,
    NewFinanced,
    NewCash,
    UsedFinanced,
    UsedCash,
}

impl ScenarioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioType::FirstTimeRegistration => "first_time_registration",
            ScenarioType::TagTransfer => "tag_transfer",
            ScenarioType::NewFinanced => "new_financed",
            ScenarioType::NewCash => "new_cash",
            ScenarioType::UsedFinanced => "used_financed",
            ScenarioType::UsedCash => "used_cash",
        }
    }

    /// Human-readable label for explanations.
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioType::FirstTimeRegistration => "first-time in-state registration",
            ScenarioType::TagTransfer => "existing plate transfer",
            ScenarioType::NewFinanced => "new vehicle, financed",
            ScenarioType::NewCash => "new vehicle, cash",
            ScenarioType::UsedFinanced => "used vehicle, financed",
            ScenarioType::UsedCash => "used vehicle, cash",
        }
    }
}

/// Classifier output: one label plus orthogonal flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedScenario {
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub has_trade_in: bool,
    pub is_financed: bool,
    pub is_tag_transfer: bool,
    pub is_first_time_registration: bool,
    pub is_new_vehicle: bool,
    pub is_in_state_resident: bool,
}

/// Line item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    Government,
    Dealer,
}

/// One priced entry in the quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub category: FeeCategory,
    pub code: String,
    pub description: String,
    /// `None` for variable fees determined outside the quote.
    pub amount: Option<Decimal>,
    pub taxable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Where the county rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// A single combined window.
    Total,
    /// The sum of component windows.
    Components,
    /// No window matched; the rate is zero.
    None,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Total => "total",
            RateSource::Components => "components",
            RateSource::None => "none",
        }
    }
}

/// Sales tax detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub trade_in_equity: Decimal,
    pub taxable_fees: Decimal,
    pub taxable_base: Decimal,
    pub state_rate: Decimal,
    pub state_tax: Decimal,
    pub county_rate: Decimal,
    pub county_taxable_amount: Decimal,
    pub county_cap: Option<Decimal>,
    pub county_tax: Decimal,
    pub county_tax_capped: bool,
    pub rate_source: RateSource,
    /// Rounded from the unrounded state and county tax, so it can differ
    /// from `state_tax + county_tax` by a cent.
    pub total_tax: Decimal,
}

/// Quote totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub government_fees: Decimal,
    pub dealer_fees: Decimal,
    pub total_fees: Decimal,
    /// Same as `TaxBreakdown::total_tax`.
    pub sales_tax: Decimal,
    pub out_the_door_price: Decimal,
    /// `None` for cash deals.
    pub amount_financed: Option<Decimal>,
}

/// The full, itemized quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub detected_scenario: DetectedScenario,
    pub line_items: Vec<LineItem>,
    pub tax_breakdown: TaxBreakdown,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingSummary>,
    pub applied_rule_ids: Vec<String>,
    pub explanations: Vec<String>,
}

impl ScenarioResult {
    /// Find a line item by code.
    pub fn line_item(&self, code: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.code == code)
    }

    /// Check if a line item with this code is present.
    pub fn has_line_item(&self, code: &str) -> bool {
        self.line_item(code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const SCENARIO_JSON: &str = r#"{
        "quoteDate": "2025-03-01",
        "deal": {"type": "finance", "sellingPrice": 25000, "termMonths": 60, "apr": 6.49},
        "vehicle": {"year": 2022, "condition": "used", "vin": "1HGCM82633A004352"},
        "tradeIns": [
            {"estimatedValue": 8000, "payoffAmount": 5000},
            {"estimatedValue": 2000, "payoffAmount": 4500}
        ],
        "registration": {"plateScenario": "transfer_existing_plate"},
        "jurisdiction": {"stateCode": "FL", "countyName": "Orange"}
    }"#;

    #[test]
    fn test_parse_scenario() {
        let input = ScenarioInput::from_json(SCENARIO_JSON).unwrap();
        assert_eq!(input.deal.deal_type, DealType::Finance);
        assert_eq!(input.deal.cash_down, Decimal::ZERO);
        assert_eq!(input.registration.plate_scenario, PlateScenario::TransferExistingPlate);
        assert!(!input.registration.first_time_in_state);
        assert!(input.opt_in_fee_codes.is_empty());
    }

    #[test]
    fn test_negative_equity_never_offsets() {
        let input = ScenarioInput::from_json(SCENARIO_JSON).unwrap();
        assert_eq!(input.trade_ins[1].equity(), Decimal::ZERO);
        assert_eq!(input.trade_in_equity(), dec("3000"));
    }

    #[test]
    fn test_validate() {
        let mut input = ScenarioInput::from_json(SCENARIO_JSON).unwrap();
        assert!(input.validate().is_ok());

        input.vehicle.vin = Some("NOT-A-VIN".to_string());
        assert!(input.validate().is_err());

        input.vehicle.vin = None;
        input.deal.selling_price = dec("-1");
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_financing_terms() {
        let mut input = ScenarioInput::from_json(SCENARIO_JSON).unwrap();
        input.deal.apr = dec("100");
        input.deal.term_months = 120;
        assert!(input.validate().is_ok());

        input.deal.apr = dec("100.01");
        assert_eq!(
            input.validate(),
            Err("deal.apr must not exceed 100".to_string())
        );

        input.deal.apr = dec("30");
        input.deal.term_months = 3000;
        assert_eq!(
            input.validate(),
            Err("deal.termMonths must not exceed 120".to_string())
        );
    }
}
