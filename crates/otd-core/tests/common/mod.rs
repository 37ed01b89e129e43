//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use otd_core::types::{Customer, Jurisdiction, Registration, Vehicle};
use otd_core::{
    calculate_with_catalogs, DealTerms, DealType, DealerConfig, PlateScenario, RateTable, RuleCatalog,
    ScenarioInput, ScenarioResult, TradeIn, VehicleCondition,
};
use rust_decimal::Decimal;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn rules() -> RuleCatalog {
    RuleCatalog::from_yaml_file(fixture("florida_rules.yaml")).unwrap()
}

pub fn rates() -> RateTable {
    RateTable::from_yaml_file(fixture("rates.yaml")).unwrap()
}

pub fn dealer() -> DealerConfig {
    DealerConfig::from_yaml_file(fixture("dealer.yaml")).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Builder for scenario inputs, defaulting to a used cash deal in Orange
/// County, FL, quoted on 2025-03-01.
#[derive(Debug, Clone)]
pub struct Scenario {
    input: ScenarioInput,
}

impl Scenario {
    pub fn new() -> Self {
        Self {
            input: ScenarioInput {
                quote_date: date(2025, 3, 1),
                deal: DealTerms {
                    deal_type: DealType::Cash,
                    selling_price: dec("20000"),
                    cash_down: Decimal::ZERO,
                    term_months: 0,
                    apr: Decimal::ZERO,
                    lender_type: None,
                },
                vehicle: Vehicle {
                    year: 2021,
                    condition: VehicleCondition::Used,
                    vin: None,
                },
                trade_ins: Vec::new(),
                registration: Registration {
                    plate_scenario: PlateScenario::NewPlate,
                    first_time_in_state: false,
                },
                jurisdiction: Jurisdiction {
                    state_code: "FL".to_string(),
                    county_name: "Orange".to_string(),
                    postal_code: None,
                },
                customer: Customer::default(),
                dealer_package_id: None,
                opt_in_fee_codes: Vec::new(),
            },
        }
    }

    pub fn price(mut self, amount: &str) -> Self {
        self.input.deal.selling_price = dec(amount);
        self
    }

    pub fn cash_down(mut self, amount: &str) -> Self {
        self.input.deal.cash_down = dec(amount);
        self
    }

    pub fn financed(mut self, term_months: u32, apr: &str) -> Self {
        self.input.deal.deal_type = DealType::Finance;
        self.input.deal.term_months = term_months;
        self.input.deal.apr = dec(apr);
        self
    }

    pub fn trade_in(mut self, estimated_value: &str, payoff_amount: &str) -> Self {
        self.input.trade_ins.push(TradeIn {
            estimated_value: dec(estimated_value),
            payoff_amount: dec(payoff_amount),
        });
        self
    }

    pub fn new_vehicle(mut self) -> Self {
        self.input.vehicle.condition = VehicleCondition::New;
        self
    }

    pub fn plate(mut self, plate: PlateScenario) -> Self {
        self.input.registration.plate_scenario = plate;
        self
    }

    pub fn first_time_in_state(mut self) -> Self {
        self.input.registration.first_time_in_state = true;
        self
    }

    pub fn county(mut self, county: &str) -> Self {
        self.input.jurisdiction.county_name = county.to_string();
        self
    }

    pub fn quoted_on(mut self, on: NaiveDate) -> Self {
        self.input.quote_date = on;
        self
    }

    pub fn package(mut self, id: &str) -> Self {
        self.input.dealer_package_id = Some(id.to_string());
        self
    }

    pub fn opt_in(mut self, fee_code: &str) -> Self {
        self.input.opt_in_fee_codes.push(fee_code.to_string());
        self
    }

    pub fn build(self) -> ScenarioInput {
        self.input
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote against the Florida fixtures.
pub fn quote(input: &ScenarioInput) -> ScenarioResult {
    calculate_with_catalogs(input, &rules(), &rates(), &dealer()).unwrap()
}
