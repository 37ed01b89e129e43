//! Sales tax calculation.
//!
//! The taxable base is the selling price less trade-in equity (floored at
//! zero) plus every taxable fee. The state rate applies to the whole base;
//! the county rate applies to the base up to the county cap. Values stay at
//! full precision until the breakdown is produced.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::catalog::{latest_versions, JurisdictionRule, RuleType, TaxScope};
use crate::fees::QuoteRequest;
use crate::money::{self, round_currency};
use crate::normalize;
use crate::rates;
use crate::types::{LineItem, TaxBreakdown};

/// Result of the tax step.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxOutcome {
    pub breakdown: TaxBreakdown,
    /// Unrounded state + county tax, carried into the financed amount.
    pub raw_total: Decimal,
    pub applied_rule_ids: Vec<String>,
    pub explanations: Vec<String>,
}

/// Computes the tax breakdown for a quote.
pub struct TaxCalculator;

impl TaxCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Taxable base before rates: price less equity, plus taxable fees.
    pub fn taxable_base(selling_price: Decimal, trade_in_equity: Decimal, taxable_fees: Decimal) -> Decimal {
        (selling_price - trade_in_equity).max(Decimal::ZERO) + taxable_fees
    }

    /// Calculate tax for a quote given the fee line items already resolved.
    pub fn calculate(&self, request: &QuoteRequest<'_>, fees: &[LineItem]) -> TaxOutcome {
        let input = request.input;
        let mut explanations = Vec::new();
        let mut applied_rule_ids = Vec::new();

        let trade_in_equity = input.trade_in_equity();
        let taxable_fees: Decimal = fees
            .iter()
            .filter(|item| item.taxable)
            .filter_map(|item| item.amount)
            .sum();
        let taxable_base =
            Self::taxable_base(input.deal.selling_price, trade_in_equity, taxable_fees);

        if trade_in_equity > Decimal::ZERO {
            explanations.push(format!(
                "Trade-in equity of {} reduces the taxable amount.",
                money::format_usd(trade_in_equity)
            ));
        }

        // State and county tax rules that apply to this scenario.
        let mut state_rate = Decimal::ZERO;
        let mut county_cap: Option<Decimal> = None;

        for rule in self.firing_rules(request, &mut explanations) {
            match rule.tax_scope {
                Some(TaxScope::State) => match rule.rate {
                    Some(rate) => {
                        state_rate += rate;
                        applied_rule_ids.push(rule.id.clone());
                    }
                    None => {
                        warn!(rule_id = %rule.id, "State tax rule without a rate");
                        explanations.push(format!(
                            "Warning: state tax rule {} has no rate and was skipped.",
                            rule.id
                        ));
                    }
                },
                Some(TaxScope::County) => {
                    if let Some(cap) = rule.cap_amount {
                        county_cap = Some(county_cap.map_or(cap, |current| current.min(cap)));
                    }
                    applied_rule_ids.push(rule.id.clone());
                }
                // Filtered out by firing_rules.
                None => {}
            }
        }

        let jurisdiction = &input.jurisdiction;
        let county = normalize::normalize_county_name(&jurisdiction.county_name);
        let resolution = rates::resolve_detailed(
            request.rates,
            &jurisdiction.state_code,
            &county,
            request.quote_date(),
        );
        if resolution.is_gap() {
            warn!(
                state = %jurisdiction.state_code,
                county = %county,
                date = %request.quote_date(),
                "No county rate window; using zero"
            );
            explanations.push(format!(
                "Warning: no county tax rate found for {}, {} on {}; county tax set to $0.00.",
                county,
                normalize::normalize_state_code(&jurisdiction.state_code),
                request.quote_date()
            ));
        }
        let county_rate = resolution.rate;

        let county_taxable_amount = match county_cap {
            Some(cap) => taxable_base.min(cap),
            None => taxable_base,
        };
        let county_tax_capped = county_cap.is_some_and(|cap| taxable_base > cap);

        let raw_state = taxable_base * state_rate;
        let raw_county = county_taxable_amount * county_rate;
        let raw_total = raw_state + raw_county;

        if state_rate > Decimal::ZERO {
            explanations.push(format!(
                "State sales tax: {} of {} = {}.",
                money::format_rate(state_rate),
                money::format_usd(taxable_base),
                money::format_usd(raw_state)
            ));
        }
        if county_rate > Decimal::ZERO {
            let capped = if county_tax_capped {
                format!(" (capped at {})", money::format_usd(county_taxable_amount))
            } else {
                String::new()
            };
            explanations.push(format!(
                "County tax: {} of {}{} = {}.",
                money::format_rate(county_rate),
                money::format_usd(county_taxable_amount),
                capped,
                money::format_usd(raw_county)
            ));
        }

        debug!(
            taxable_base = %taxable_base,
            state_rate = %state_rate,
            county_rate = %county_rate,
            capped = county_tax_capped,
            "Tax calculated"
        );

        TaxOutcome {
            breakdown: TaxBreakdown {
                trade_in_equity: round_currency(trade_in_equity),
                taxable_fees: round_currency(taxable_fees),
                taxable_base: round_currency(taxable_base),
                state_rate,
                state_tax: round_currency(raw_state),
                county_rate,
                county_taxable_amount: round_currency(county_taxable_amount),
                county_cap: county_cap.map(round_currency),
                county_tax: round_currency(raw_county),
                county_tax_capped,
                rate_source: resolution.source,
                total_tax: round_currency(raw_total),
            },
            raw_total,
            applied_rule_ids,
            explanations,
        }
    }

    /// Tax rules in scope, in effect, and matching, one per fee code.
    fn firing_rules<'a>(
        &self,
        request: &QuoteRequest<'a>,
        explanations: &mut Vec<String>,
    ) -> Vec<&'a JurisdictionRule> {
        let jurisdiction = &request.input.jurisdiction;
        let state = normalize::normalize_state_code(&jurisdiction.state_code);
        let county = normalize::normalize_county_name(&jurisdiction.county_name);
        let on = request.quote_date();
        let opted_in = &request.input.opt_in_fee_codes;

        let candidates = request.rules.iter().filter(|rule| {
            rule.rule_type == RuleType::TaxCalculation
                && rule.applies_to(&state, &county)
                && rule.is_in_effect(on)
        });

        latest_versions(candidates)
            .into_iter()
            .filter(|rule| {
                if rule.tax_scope.is_none() {
                    warn!(rule_id = %rule.id, "Tax rule without a scope");
                    explanations.push(format!(
                        "Warning: tax rule {} has no tax scope and was skipped.",
                        rule.id
                    ));
                    return false;
                }
                if rule.optional && !opted_in.iter().any(|code| code == &rule.fee_code) {
                    return false;
                }
                rule.matches(request.context)
            })
            .collect()
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DealerConfig, RateTable, RuleCatalog};
    use crate::classifier::ScenarioClassifier;
    use crate::context::ScenarioContext;
    use crate::types::{FeeCategory, RateSource, ScenarioInput};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const RULES: &str = r#"
rules:
  - id: FL-STATE-TAX-1
    ruleType: tax_calculation
    stateCode: FL
    feeCode: STATE_SALES_TAX
    description: "Florida sales tax"
    taxScope: state
    rate: 0.06
    optional: false
    effectiveDate: "2024-01-01"
  - id: FL-COUNTY-SURTAX-1
    ruleType: tax_calculation
    stateCode: FL
    feeCode: COUNTY_SURTAX
    description: "County discretionary surtax"
    taxScope: county
    capAmount: 5000
    optional: false
    effectiveDate: "2024-01-01"
"#;

    const RATES: &str = r#"
windows:
  - stateCode: FL
    countyName: Orange
    componentLabel: total
    rateDecimal: 0.005
    effectiveDate: "2024-01-01"
"#;

    const DEALER: &str = r#"
dealerId: test
packages:
  - id: base
    name: Base
    isDefault: true
"#;

    fn input(price: u32, trades: &str, county: &str) -> ScenarioInput {
        ScenarioInput::from_json(&format!(
            r#"{{
                "quoteDate": "2025-03-01",
                "deal": {{"type": "cash", "sellingPrice": {price}}},
                "vehicle": {{"year": 2022, "condition": "used"}},
                "tradeIns": {trades},
                "registration": {{"plateScenario": "new_plate"}},
                "jurisdiction": {{"stateCode": "FL", "countyName": "{county}"}}
            }}"#
        ))
        .unwrap()
    }

    fn calculate(input: &ScenarioInput, fees: &[LineItem]) -> TaxOutcome {
        let catalog = RuleCatalog::from_yaml(RULES).unwrap();
        calculate_with(input, fees, catalog.rules())
    }

    fn calculate_with(
        input: &ScenarioInput,
        fees: &[LineItem],
        rules: &[JurisdictionRule],
    ) -> TaxOutcome {
        let rates = RateTable::from_yaml(RATES).unwrap();
        let dealer = DealerConfig::from_yaml(DEALER).unwrap();
        let scenario = ScenarioClassifier::new().classify(input);
        let context = ScenarioContext::build(input, &scenario);
        let request = QuoteRequest {
            input,
            scenario: &scenario,
            context: &context,
            rules,
            rates: rates.windows(),
            dealer: &dealer,
        };
        TaxCalculator::new().calculate(&request, fees)
    }

    fn fee(code: &str, amount: &str, taxable: bool) -> LineItem {
        LineItem {
            category: FeeCategory::Dealer,
            code: code.to_string(),
            description: code.to_string(),
            amount: Some(dec(amount)),
            taxable,
            rule_id: None,
            explanation: None,
        }
    }

    #[test]
    fn test_trade_in_reduces_base() {
        let outcome = calculate(
            &input(25000, r#"[{"estimatedValue": 8000, "payoffAmount": 5000}]"#, "Orange"),
            &[],
        );
        let b = &outcome.breakdown;
        assert_eq!(b.trade_in_equity, dec("3000"));
        assert_eq!(b.taxable_base, dec("22000"));
        assert_eq!(b.state_tax, dec("1320"));
        assert_eq!(b.county_tax, dec("25"));
        assert!(b.county_tax_capped);
        assert_eq!(b.total_tax, dec("1345"));
        assert_eq!(
            outcome.applied_rule_ids,
            vec!["FL-COUNTY-SURTAX-1".to_string(), "FL-STATE-TAX-1".to_string()]
        );
    }

    #[test]
    fn test_under_cap_not_capped() {
        let outcome = calculate(&input(4000, "[]", "Orange"), &[]);
        let b = &outcome.breakdown;
        assert!(!b.county_tax_capped);
        assert_eq!(b.county_taxable_amount, dec("4000"));
        assert_eq!(b.county_tax, dec("20"));
    }

    #[test]
    fn test_negative_equity_floors_base() {
        let outcome = calculate(
            &input(
                5000,
                r#"[{"estimatedValue": 9000, "payoffAmount": 2000}, {"estimatedValue": 100, "payoffAmount": 9000}]"#,
                "Orange",
            ),
            &[],
        );
        assert_eq!(outcome.breakdown.trade_in_equity, dec("7000"));
        assert_eq!(outcome.breakdown.taxable_base, Decimal::ZERO);
        assert_eq!(outcome.breakdown.total_tax, Decimal::ZERO);
    }

    #[test]
    fn test_taxable_fees_added_to_base() {
        let outcome = calculate(
            &input(10000, "[]", "Orange"),
            &[fee("DOC_FEE", "999", true), fee("TAG", "50", false)],
        );
        assert_eq!(outcome.breakdown.taxable_fees, dec("999"));
        assert_eq!(outcome.breakdown.taxable_base, dec("10999"));
        assert_eq!(outcome.breakdown.state_tax, dec("659.94"));
    }

    #[test]
    fn test_rate_gap_warns_and_uses_zero() {
        let outcome = calculate(&input(10000, "[]", "Nowhere"), &[]);
        assert_eq!(outcome.breakdown.county_rate, Decimal::ZERO);
        assert_eq!(outcome.breakdown.county_tax, Decimal::ZERO);
        assert_eq!(outcome.breakdown.rate_source, RateSource::None);
        assert!(outcome
            .explanations
            .iter()
            .any(|e| e.starts_with("Warning: no county tax rate")));
    }

    #[test]
    fn test_round_once_at_end() {
        // 0.005 * 1234.37 = 6.17185 and 0.06 * 1234.37 = 74.0622
        let outcome = calculate(&input(0, "[]", "Orange"), &[fee("X", "1234.37", true)]);
        let b = &outcome.breakdown;
        assert_eq!(b.county_tax, dec("6.17"));
        assert_eq!(b.state_tax, dec("74.06"));
        assert_eq!(b.total_tax, dec("80.23"));
        assert_eq!(outcome.raw_total, dec("80.23405"));
    }

    fn rules_with(edit: impl FnOnce(&mut JurisdictionRule), id: &str) -> Vec<JurisdictionRule> {
        let mut rules = RuleCatalog::from_yaml(RULES).unwrap().rules().to_vec();
        edit(rules.iter_mut().find(|r| r.id == id).unwrap());
        rules
    }

    #[test]
    fn test_state_rule_without_rate_warns() {
        let rules = rules_with(|r| r.rate = None, "FL-STATE-TAX-1");
        let outcome = calculate_with(&input(10000, "[]", "Orange"), &[], &rules);

        assert_eq!(outcome.breakdown.state_rate, Decimal::ZERO);
        assert_eq!(outcome.breakdown.state_tax, Decimal::ZERO);
        assert_eq!(outcome.applied_rule_ids, vec!["FL-COUNTY-SURTAX-1".to_string()]);
        assert!(outcome.explanations.contains(
            &"Warning: state tax rule FL-STATE-TAX-1 has no rate and was skipped.".to_string()
        ));
    }

    #[test]
    fn test_rule_without_scope_warns() {
        let rules = rules_with(|r| r.tax_scope = None, "FL-COUNTY-SURTAX-1");
        let outcome = calculate_with(&input(10000, "[]", "Orange"), &[], &rules);

        // Without the county rule there is no cap.
        assert_eq!(outcome.breakdown.county_cap, None);
        assert_eq!(outcome.breakdown.county_tax, dec("50"));
        assert_eq!(outcome.applied_rule_ids, vec!["FL-STATE-TAX-1".to_string()]);
        assert!(outcome.explanations.contains(
            &"Warning: tax rule FL-COUNTY-SURTAX-1 has no tax scope and was skipped.".to_string()
        ));
    }

    #[test]
    fn test_total_rounds_from_unrounded_parts() {
        // 0.06 * 1000.08 = 60.0048 and 0.01 * 1000.08 = 10.0008; the sum
        // 70.0056 rounds up while each part rounds down.
        let rates = RATES.replace("rateDecimal: 0.005", "rateDecimal: 0.01");
        let rates = RateTable::from_yaml(&rates).unwrap();
        let catalog = RuleCatalog::from_yaml(RULES).unwrap();
        let input = input(0, "[]", "Orange");
        let scenario = ScenarioClassifier::new().classify(&input);
        let context = ScenarioContext::build(&input, &scenario);
        let dealer = DealerConfig::from_yaml(DEALER).unwrap();
        let request = QuoteRequest {
            input: &input,
            scenario: &scenario,
            context: &context,
            rules: catalog.rules(),
            rates: rates.windows(),
            dealer: &dealer,
        };
        let outcome = TaxCalculator::new().calculate(&request, &[fee("X", "1000.08", true)]);

        let b = &outcome.breakdown;
        assert_eq!(b.state_tax, dec("60.00"));
        assert_eq!(b.county_tax, dec("10.00"));
        assert_eq!(b.total_tax, dec("70.01"));
        assert_eq!(b.total_tax - (b.state_tax + b.county_tax), dec("0.01"));
    }
}
