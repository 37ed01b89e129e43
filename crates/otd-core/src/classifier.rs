//! Scenario classification.
//!
//! Classification runs once per quote. Its flags feed both the condition
//! context and the explanation text, so every rule in a quote sees the
//! same narrative.
//!
//! Label priority:
//! 1. First-time in-state registration
//! 2. Existing plate transfer
//! 3. New/used × financed/cash

use crate::normalize;
use crate::types::{
    DetectedScenario, PlateScenario, ScenarioInput, ScenarioType, VehicleCondition,
};

/// Derives the canonical scenario for a quote request.
pub struct ScenarioClassifier;

impl ScenarioClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a scenario input.
    pub fn classify(&self, input: &ScenarioInput) -> DetectedScenario {
        let has_trade_in = !input.trade_ins.is_empty();
        let is_financed = input.deal.term_months > 0;
        let is_tag_transfer =
            input.registration.plate_scenario == PlateScenario::TransferExistingPlate;
        let is_first_time_registration = input.registration.first_time_in_state;
        let is_new_vehicle = input.vehicle.condition == VehicleCondition::New;

        // Residency defaults to in-state when the caller does not say otherwise.
        let is_in_state_resident = input
            .customer
            .residency_state
            .as_deref()
            .map_or(true, |state| {
                normalize::keys_match(state, &input.jurisdiction.state_code)
            });

        let scenario_type = if is_first_time_registration {
            ScenarioType::FirstTimeRegistration
        } else if is_tag_transfer {
            ScenarioType::TagTransfer
        } else {
            match (is_new_vehicle, is_financed) {
                (true, true) => ScenarioType::NewFinanced,
                (true, false) => ScenarioType::NewCash,
                (false, true) => ScenarioType::UsedFinanced,
                (false, false) => ScenarioType::UsedCash,
            }
        };

        DetectedScenario {
            scenario_type,
            has_trade_in,
            is_financed,
            is_tag_transfer,
            is_first_time_registration,
            is_new_vehicle,
            is_in_state_resident,
        }
    }

    /// One-sentence summary of a detected scenario.
    pub fn summarize(&self, scenario: &DetectedScenario) -> String {
        let mut traits = Vec::new();
        if matches!(
            scenario.scenario_type,
            ScenarioType::FirstTimeRegistration | ScenarioType::TagTransfer
        ) {
            traits.push(if scenario.is_new_vehicle { "new vehicle" } else { "used vehicle" });
            traits.push(if scenario.is_financed { "financed" } else { "cash" });
        }
        if scenario.has_trade_in {
            traits.push("with trade-in");
        }
        if scenario.is_tag_transfer && scenario.scenario_type != ScenarioType::TagTransfer {
            traits.push("plate transfer");
        }
        if !scenario.is_in_state_resident {
            traits.push("out-of-state purchaser");
        }

        if traits.is_empty() {
            format!("Scenario: {}.", scenario.scenario_type.label())
        } else {
            format!(
                "Scenario: {} ({}).",
                scenario.scenario_type.label(),
                traits.join(", ")
            )
        }
    }
}

impl Default for ScenarioClassifier {
    fn default() -> Self {
        Self::new()
    }
}
