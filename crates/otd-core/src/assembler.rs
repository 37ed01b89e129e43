//! Result assembly: merges resolver outputs into the final quote.
//!
//! Assembly is fixed policy:
//! 1. Line items: government fees, then dealer fees
//! 2. Explanations: government, tax, dealer, scenario summary
//! 3. Variable fees are listed but never totaled
//! 4. Amount financed only exists for financed scenarios

use rust_decimal::Decimal;

use crate::fees::FeeOutcome;
use crate::financing::{FinancingError, FinancingSummary};
use crate::money::round_currency;
use crate::tax::TaxOutcome;
use crate::types::{DetectedScenario, LineItem, ScenarioInput, ScenarioResult, Totals};

/// The pieces of a quote, as produced by each step.
#[derive(Debug, Clone)]
pub struct QuoteParts {
    pub scenario: DetectedScenario,
    pub scenario_summary: String,
    pub government: FeeOutcome,
    pub dealer: FeeOutcome,
    pub tax: TaxOutcome,
}

/// Merges fees and tax into a `ScenarioResult`.
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the final result.
    pub fn assemble(
        &self,
        input: &ScenarioInput,
        parts: QuoteParts,
    ) -> Result<ScenarioResult, FinancingError> {
        let QuoteParts {
            scenario,
            scenario_summary,
            government,
            dealer,
            tax,
        } = parts;

        let government_fees = sum_amounts(&government.items);
        let dealer_fees = sum_amounts(&dealer.items);
        let total_fees = government_fees + dealer_fees;
        let deal = &input.deal;

        let out_the_door = deal.selling_price + total_fees + tax.raw_total;

        let financed_raw = scenario.is_financed.then(|| {
            (deal.selling_price - deal.cash_down - input.trade_in_equity()
                + total_fees
                + tax.raw_total)
                .max(Decimal::ZERO)
        });
        let financing = financed_raw
            .map(|amount| FinancingSummary::new(amount, deal.apr, deal.term_months))
            .transpose()?;

        let totals = Totals {
            government_fees: round_currency(government_fees),
            dealer_fees: round_currency(dealer_fees),
            total_fees: round_currency(total_fees),
            sales_tax: tax.breakdown.total_tax,
            out_the_door_price: round_currency(out_the_door),
            amount_financed: financed_raw.map(round_currency),
        };

        let mut applied_rule_ids = government.applied_rule_ids;
        applied_rule_ids.extend(tax.applied_rule_ids);
        applied_rule_ids.extend(dealer.applied_rule_ids);

        let mut explanations = government.explanations;
        explanations.extend(tax.explanations);
        explanations.extend(dealer.explanations);
        explanations.push(scenario_summary);

        let mut line_items = government.items;
        line_items.extend(dealer.items);

        Ok(ScenarioResult {
            detected_scenario: scenario,
            line_items,
            tax_breakdown: tax.breakdown,
            totals,
            financing,
            applied_rule_ids,
            explanations,
        })
    }
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum priced items; variable fees (no amount) contribute nothing.
fn sum_amounts(items: &[LineItem]) -> Decimal {
    items.iter().filter_map(|item| item.amount).sum()
}
