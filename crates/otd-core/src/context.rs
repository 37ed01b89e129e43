//! Flattened, dot-addressable view of a scenario.
//!
//! Built once per quote from the input and the classifier output, then
//! shared by every rule evaluated in that quote. Optional inputs that are
//! absent (no VIN, no lender type) are left out of the map so conditions
//! over them fail closed.

use std::collections::BTreeMap;

use crate::condition::{Fields, Scalar};
use crate::normalize;
use crate::types::{DetectedScenario, ScenarioInput};

/// Field values addressable by path, e.g. `registration.plateScenario`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioContext {
    fields: BTreeMap<String, Scalar>,
}

impl ScenarioContext {
    /// Build the context for one quote.
    pub fn build(input: &ScenarioInput, scenario: &DetectedScenario) -> Self {
        let mut ctx = Self::default();

        let deal = &input.deal;
        ctx.set("deal.type", deal.deal_type.as_str());
        ctx.set("deal.sellingPrice", deal.selling_price);
        ctx.set("deal.cashDown", deal.cash_down);
        ctx.set("deal.termMonths", deal.term_months);
        ctx.set("deal.apr", deal.apr);
        if let Some(lender) = &deal.lender_type {
            ctx.set("deal.lenderType", lender.as_str());
        }

        let vehicle = &input.vehicle;
        ctx.set("vehicle.year", vehicle.year);
        ctx.set("vehicle.condition", vehicle.condition.as_str());
        if let Some(vin) = &vehicle.vin {
            ctx.set("vehicle.vin", vin.trim().to_ascii_uppercase());
        }

        ctx.set("tradeIns.length", input.trade_ins.len());
        ctx.set("tradeIns.totalEquity", input.trade_in_equity());
        for (idx, trade) in input.trade_ins.iter().enumerate() {
            ctx.set(format!("tradeIns.{}.estimatedValue", idx), trade.estimated_value);
            ctx.set(format!("tradeIns.{}.payoffAmount", idx), trade.payoff_amount);
            ctx.set(format!("tradeIns.{}.equity", idx), trade.equity());
        }

        let registration = &input.registration;
        ctx.set(
            "registration.plateScenario",
            registration.plate_scenario.as_str(),
        );
        ctx.set(
            "registration.firstTimeInState",
            registration.first_time_in_state,
        );

        let jurisdiction = &input.jurisdiction;
        ctx.set(
            "jurisdiction.stateCode",
            normalize::normalize_state_code(&jurisdiction.state_code),
        );
        ctx.set(
            "jurisdiction.countyName",
            normalize::normalize_county_name(&jurisdiction.county_name),
        );
        if let Some(postal) = &jurisdiction.postal_code {
            ctx.set("jurisdiction.postalCode", postal.trim());
        }

        if let Some(state) = &input.customer.residency_state {
            ctx.set(
                "customer.residencyState",
                normalize::normalize_state_code(state),
            );
        }
        ctx.set("customer.isInStateResident", scenario.is_in_state_resident);

        ctx.set("scenario.type", scenario.scenario_type.as_str());
        ctx.set("scenario.hasTradeIn", scenario.has_trade_in);
        ctx.set("scenario.isFinanced", scenario.is_financed);
        ctx.set("scenario.isTagTransfer", scenario.is_tag_transfer);
        ctx.set(
            "scenario.isFirstTimeRegistration",
            scenario.is_first_time_registration,
        );
        ctx.set("scenario.isNewVehicle", scenario.is_new_vehicle);

        ctx
    }

    fn set(&mut self, path: impl Into<String>, value: impl Into<Scalar>) {
        self.fields.insert(path.into(), value.into());
    }

    /// Look up a field.
    pub fn get(&self, path: &str) -> Option<&Scalar> {
        self.fields.get(path)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Fields for ScenarioContext {
    fn field(&self, path: &str) -> Option<&Scalar> {
        self.get(path)
    }
}
