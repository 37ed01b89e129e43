//! Government fee selection.
//!
//! Rules are filtered to the quote's jurisdiction and date, reduced to one
//! version per fee code, then fired when their conditions hold. Mutually
//! exclusive fees (title vs. title transfer) are expressed purely through
//! complementary conditions; nothing here special-cases them.

use tracing::{debug, warn};

use super::{FeeOutcome, FeeResolver, QuoteRequest};
use crate::catalog::{latest_versions, JurisdictionRule, RuleType};
use crate::normalize;
use crate::types::{FeeCategory, LineItem};
use crate::QuoteError;

/// Selects the jurisdiction fees a scenario triggers.
pub struct GovernmentFeeResolver;

impl GovernmentFeeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Rules in scope for the quote's jurisdiction and in effect on its date.
    fn candidates<'a>(&self, request: &QuoteRequest<'a>) -> Vec<&'a JurisdictionRule> {
        let jurisdiction = &request.input.jurisdiction;
        let state = normalize::normalize_state_code(&jurisdiction.state_code);
        let county = normalize::normalize_county_name(&jurisdiction.county_name);
        let on = request.quote_date();

        request
            .rules
            .iter()
            .filter(|rule| rule.rule_type == RuleType::GovernmentFee)
            .filter(|rule| rule.applies_to(&state, &county))
            .filter(|rule| rule.is_in_effect(on))
            .collect()
    }
}

impl Default for GovernmentFeeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeResolver for GovernmentFeeResolver {
    fn category(&self) -> FeeCategory {
        FeeCategory::Government
    }

    fn resolve(&self, request: &QuoteRequest<'_>) -> Result<FeeOutcome, QuoteError> {
        let opted_in = &request.input.opt_in_fee_codes;
        let mut outcome = FeeOutcome::default();
        let mut fired: Vec<&JurisdictionRule> = Vec::new();

        for rule in latest_versions(self.candidates(request)) {
            if rule.amount.is_some_and(|amount| amount.is_sign_negative()) {
                warn!(rule_id = %rule.id, "Skipping rule with negative amount");
                outcome.explanations.push(format!(
                    "Warning: rule {} ({}) skipped: negative amount",
                    rule.id, rule.fee_code
                ));
                continue;
            }

            if rule.optional && !opted_in.iter().any(|code| code == &rule.fee_code) {
                debug!(fee_code = %rule.fee_code, "Optional fee not requested");
                continue;
            }

            if !rule.matches(request.context) {
                debug!(fee_code = %rule.fee_code, "Conditions not met");
                continue;
            }

            debug!(fee_code = %rule.fee_code, rule_id = %rule.id, "Rule fired");
            fired.push(rule);
        }

        fired.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.fee_code.cmp(&b.fee_code))
        });

        for rule in fired {
            let explained = rule.is_conditional() || rule.amount.is_none();
            let explanation = explained.then(|| rule.explain());

            if let Some(text) = &explanation {
                outcome.explanations.push(text.clone());
            }
            outcome.applied_rule_ids.push(rule.id.clone());
            outcome.items.push(LineItem {
                category: self.category(),
                code: rule.fee_code.clone(),
                description: rule.description.clone(),
                amount: rule.amount,
                taxable: rule.taxable,
                rule_id: Some(rule.id.clone()),
                explanation,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DealerConfig, RuleCatalog};
    use crate::classifier::ScenarioClassifier;
    use crate::context::ScenarioContext;
    use crate::types::ScenarioInput;
    use rust_decimal::Decimal;

    const RULES: &str = r#"
rules:
  - id: FL-TITLE-ELEC-1
    ruleType: government_fee
    stateCode: FL
    feeCode: TITLE_FEE_ELECTRONIC
    description: "Title fee (electronic)"
    amount: 77.25
    conditions: {"==": [{"var": "tradeIns.length"}, 0]}
    priority: 90
    optional: false
    effectiveDate: "2024-01-01"
  - id: FL-TITLE-XFER-1
    ruleType: government_fee
    stateCode: FL
    feeCode: TITLE_TRANSFER_FEE
    description: "Title transfer fee"
    amount: 75.25
    conditions: {">": [{"var": "tradeIns.length"}, 0]}
    priority: 90
    optional: false
    effectiveDate: "2024-01-01"
  - id: FL-REG-1
    ruleType: government_fee
    stateCode: FL
    feeCode: REGISTRATION_FEE
    description: "Registration fee"
    amount: 45.60
    priority: 50
    optional: false
    effectiveDate: "2024-01-01"
  - id: FL-REG-2
    version: 2
    ruleType: government_fee
    stateCode: FL
    feeCode: REGISTRATION_FEE
    description: "Registration fee"
    amount: 46.15
    priority: 50
    optional: false
    effectiveDate: "2025-01-01"
  - id: FL-SPECIALTY-1
    ruleType: government_fee
    stateCode: FL
    feeCode: SPECIALTY_PLATE_FEE
    description: "Specialty plate"
    amount: 25
    priority: 10
    optional: true
    effectiveDate: "2024-01-01"
  - id: FL-LIEN-1
    ruleType: government_fee
    stateCode: FL
    feeCode: LIEN_FILING_FEE
    description: "Lien filing fee"
    amount: 2
    conditions: {">": [{"var": "deal.termMonths"}, 0]}
    priority: 60
    optional: false
    effectiveDate: "2024-01-01"
  - id: GA-TAVT-1
    ruleType: government_fee
    stateCode: GA
    feeCode: TITLE_FEE_ELECTRONIC
    description: "Georgia title"
    amount: 18
    optional: false
    effectiveDate: "2024-01-01"
"#;

    const DEALER: &str = r#"
dealerId: test
packages:
  - id: base
    name: Base
    isDefault: true
"#;

    fn input(json_trades: &str, term: u32, quote_date: &str, opt_in: &str) -> ScenarioInput {
        ScenarioInput::from_json(&format!(
            r#"{{
                "quoteDate": "{quote_date}",
                "deal": {{"type": "finance", "sellingPrice": 20000, "termMonths": {term}}},
                "vehicle": {{"year": 2022, "condition": "used"}},
                "tradeIns": {json_trades},
                "registration": {{"plateScenario": "new_plate"}},
                "jurisdiction": {{"stateCode": "FL", "countyName": "Orange"}},
                "optInFeeCodes": {opt_in}
            }}"#
        ))
        .unwrap()
    }

    fn resolve(input: &ScenarioInput) -> FeeOutcome {
        let catalog = RuleCatalog::from_yaml(RULES).unwrap();
        resolve_with(input, catalog.rules())
    }

    fn resolve_with(input: &ScenarioInput, rules: &[JurisdictionRule]) -> FeeOutcome {
        let dealer = DealerConfig::from_yaml(DEALER).unwrap();
        let scenario = ScenarioClassifier::new().classify(input);
        let context = ScenarioContext::build(input, &scenario);
        let request = QuoteRequest {
            input,
            scenario: &scenario,
            context: &context,
            rules,
            rates: &[],
            dealer: &dealer,
        };
        let resolver = GovernmentFeeResolver::new();
        let outcome = resolver.resolve(&request).unwrap();
        assert!(outcome.items.iter().all(|i| i.category == resolver.category()));
        outcome
    }

    fn codes(outcome: &FeeOutcome) -> Vec<&str> {
        outcome.items.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn test_title_fees_exclusive() {
        let none = resolve(&input("[]", 0, "2025-03-01", "[]"));
        assert!(codes(&none).contains(&"TITLE_FEE_ELECTRONIC"));
        assert!(!codes(&none).contains(&"TITLE_TRANSFER_FEE"));

        let trade = resolve(&input(
            r#"[{"estimatedValue": 1000, "payoffAmount": 0}]"#,
            0,
            "2025-03-01",
            "[]",
        ));
        assert!(codes(&trade).contains(&"TITLE_TRANSFER_FEE"));
        assert!(!codes(&trade).contains(&"TITLE_FEE_ELECTRONIC"));
    }

    #[test]
    fn test_ordering_priority_then_code() {
        let outcome = resolve(&input("[]", 60, "2025-03-01", "[]"));
        assert_eq!(
            codes(&outcome),
            vec!["TITLE_FEE_ELECTRONIC", "LIEN_FILING_FEE", "REGISTRATION_FEE"]
        );
    }

    #[test]
    fn test_highest_version_in_effect_wins() {
        let current = resolve(&input("[]", 0, "2025-03-01", "[]"));
        let reg = current.items.iter().find(|i| i.code == "REGISTRATION_FEE").unwrap();
        assert_eq!(reg.rule_id.as_deref(), Some("FL-REG-2"));
        assert_eq!(reg.amount, Some(Decimal::new(4615, 2)));

        let earlier = resolve(&input("[]", 0, "2024-06-01", "[]"));
        let reg = earlier.items.iter().find(|i| i.code == "REGISTRATION_FEE").unwrap();
        assert_eq!(reg.rule_id.as_deref(), Some("FL-REG-1"));
    }

    #[test]
    fn test_optional_requires_opt_in() {
        let without = resolve(&input("[]", 0, "2025-03-01", "[]"));
        assert!(!codes(&without).contains(&"SPECIALTY_PLATE_FEE"));

        let with = resolve(&input("[]", 0, "2025-03-01", r#"["SPECIALTY_PLATE_FEE"]"#));
        assert!(codes(&with).contains(&"SPECIALTY_PLATE_FEE"));
    }

    #[test]
    fn test_other_states_ignored() {
        let outcome = resolve(&input("[]", 0, "2025-03-01", "[]"));
        assert!(!outcome.applied_rule_ids.contains(&"GA-TAVT-1".to_string()));
    }

    #[test]
    fn test_explanations_only_for_conditional_rules() {
        let outcome = resolve(&input("[]", 60, "2025-03-01", "[]"));
        assert_eq!(outcome.applied_rule_ids.len(), 3);
        assert_eq!(
            outcome.explanations,
            vec![
                "Title fee (electronic): $77.25".to_string(),
                "Lien filing fee: $2.00".to_string(),
            ]
        );
    }

    #[test]
    fn test_negative_amount_skipped_with_warning() {
        let mut rules = RuleCatalog::from_yaml(RULES).unwrap().rules().to_vec();
        let title = rules.iter_mut().find(|r| r.id == "FL-TITLE-ELEC-1").unwrap();
        title.amount = Some(Decimal::new(-7725, 2));

        let outcome = resolve_with(&input("[]", 0, "2025-03-01", "[]"), &rules);
        assert!(!outcome.applied_rule_ids.contains(&"FL-TITLE-ELEC-1".to_string()));
        assert!(!codes(&outcome).contains(&"TITLE_FEE_ELECTRONIC"));
        assert!(outcome.explanations.contains(
            &"Warning: rule FL-TITLE-ELEC-1 (TITLE_FEE_ELECTRONIC) skipped: negative amount"
                .to_string()
        ));
    }
}
