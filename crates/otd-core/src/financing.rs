//! Loan term normalization and payment math.
//!
//! Lenders publish rates against a handful of standard terms. Odd terms
//! (66, 75 months) are mapped onto the nearest standard term so a quote
//! can be matched against published rate sheets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::round_currency;

/// Industry-standard auto loan terms, in months.
pub const STANDARD_TERMS: [u32; 5] = [36, 48, 60, 72, 84];

/// Longest loan term a quote accepts.
pub const MAX_TERM_MONTHS: u32 = 120;

/// Highest APR a quote accepts, in percent.
pub const MAX_APR: Decimal = Decimal::ONE_HUNDRED;

/// Errors from term normalization and payment math.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinancingError {
    #[error("Invalid term range: min ({min}) > max ({max})")]
    InvalidRange { min: u32, max: u32 },

    #[error("Payment overflows at {apr}% APR over {term_months} months")]
    PaymentOverflow { apr: Decimal, term_months: u32 },
}

/// Map a term to the nearest standard term. Ties prefer the shorter term;
/// zero maps to the shortest.
pub fn normalize_term(months: u32) -> u32 {
    let mut nearest = STANDARD_TERMS[0];
    if months == 0 {
        return nearest;
    }

    for standard in STANDARD_TERMS {
        // Strict comparison keeps the earlier (shorter) term on a tie.
        if months.abs_diff(standard) < months.abs_diff(nearest) {
            nearest = standard;
        }
    }
    nearest
}

/// Normalize both ends of a term range.
pub fn normalize_term_range(min: u32, max: u32) -> Result<(u32, u32), FinancingError> {
    if min > max {
        return Err(FinancingError::InvalidRange { min, max });
    }
    Ok((normalize_term(min), normalize_term(max)))
}

pub fn is_standard_term(months: u32) -> bool {
    STANDARD_TERMS.contains(&months)
}

/// How a term was normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermNormalization {
    pub original: u32,
    pub normalized: u32,
    pub distance: u32,
    pub was_modified: bool,
}

impl TermNormalization {
    pub fn of(months: u32) -> Self {
        let normalized = normalize_term(months);
        Self {
            original: months,
            normalized,
            distance: months.abs_diff(normalized),
            was_modified: months != normalized,
        }
    }
}

/// Level monthly payment for a fully amortizing loan, unrounded.
///
/// `apr` is in percent. A zero APR divides the principal evenly.
pub fn monthly_payment(
    principal: Decimal,
    apr: Decimal,
    term_months: u32,
) -> Result<Decimal, FinancingError> {
    if term_months == 0 || principal <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let overflow = || FinancingError::PaymentOverflow { apr, term_months };
    let months = Decimal::from(term_months);
    let monthly_rate = apr / Decimal::ONE_HUNDRED / Decimal::from(12);

    let mut growth = Decimal::ONE;
    for _ in 0..term_months {
        growth = growth
            .checked_mul(Decimal::ONE + monthly_rate)
            .ok_or_else(overflow)?;
    }

    // Rates too small to register at 28 digits amortize like zero APR.
    let interest = growth - Decimal::ONE;
    if interest.is_zero() {
        return Ok(principal / months);
    }

    principal
        .checked_mul(monthly_rate)
        .and_then(|amount| amount.checked_mul(growth))
        .and_then(|amount| amount.checked_div(interest))
        .ok_or_else(overflow)
}

/// Payment terms for a financed quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingSummary {
    pub term_months: u32,
    /// Nearest standard term, for rate sheet lookup.
    pub standard_term_months: u32,
    pub apr: Decimal,
    pub amount_financed: Decimal,
    pub monthly_payment: Decimal,
    pub total_of_payments: Decimal,
    pub finance_charge: Decimal,
}

impl FinancingSummary {
    /// Build the summary from the unrounded amount financed.
    pub fn new(
        amount_financed: Decimal,
        apr: Decimal,
        term_months: u32,
    ) -> Result<Self, FinancingError> {
        let payment = round_currency(monthly_payment(amount_financed, apr, term_months)?);
        let amount_financed = round_currency(amount_financed);
        let total_of_payments = round_currency(payment * Decimal::from(term_months));
        let finance_charge = (total_of_payments - amount_financed).max(Decimal::ZERO);

        Ok(Self {
            term_months,
            standard_term_months: normalize_term(term_months),
            apr,
            amount_financed,
            monthly_payment: payment,
            total_of_payments,
            finance_charge: round_currency(finance_charge),
        })
    }
}
