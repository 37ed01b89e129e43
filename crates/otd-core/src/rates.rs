//! Effective-dated rate resolution.
//!
//! A county either publishes one combined (`total`) rate or several
//! `component` rates whose sum stands in for it. A matching `total` always
//! wins, so the two representations are never added together.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{ComponentLabel, RateWindow};
use crate::normalize;
use crate::types::RateSource;

/// A resolved rate and the windows it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RateResolution {
    pub rate: Decimal,
    pub source: RateSource,
    /// Windows that contributed to `rate`.
    pub matched: Vec<RateWindow>,
}

impl RateResolution {
    fn none() -> Self {
        Self {
            rate: Decimal::ZERO,
            source: RateSource::None,
            matched: Vec::new(),
        }
    }

    /// No window covered the county on the date.
    pub fn is_gap(&self) -> bool {
        self.source == RateSource::None
    }
}

/// Resolve the applicable rate for a county on a date.
///
/// Returns zero when nothing matches.
pub fn resolve(windows: &[RateWindow], state_code: &str, county_name: &str, on: NaiveDate) -> Decimal {
    resolve_detailed(windows, state_code, county_name, on).rate
}

/// Resolve the applicable rate, reporting which windows produced it.
pub fn resolve_detailed(
    windows: &[RateWindow],
    state_code: &str,
    county_name: &str,
    on: NaiveDate,
) -> RateResolution {
    let state = normalize::normalize_state_code(state_code);
    let county = normalize::normalize_county_name(county_name);

    let in_effect = || {
        windows
            .iter()
            .filter(|w| w.covers(&state, &county) && w.is_in_effect(on))
    };

    // Latest effective date wins; overlapping windows fall back to the
    // later expiry, then the higher rate.
    let total = in_effect()
        .filter(|w| w.component_label == ComponentLabel::Total)
        .max_by(|a, b| compare_windows(a, b));

    if let Some(window) = total {
        debug!(
            state = %state,
            county = %county,
            rate = %window.rate_decimal,
            "Resolved total rate"
        );
        return RateResolution {
            rate: window.rate_decimal,
            source: RateSource::Total,
            matched: vec![window.clone()],
        };
    }

    let components: Vec<RateWindow> = in_effect()
        .filter(|w| w.component_label == ComponentLabel::Component)
        .cloned()
        .collect();

    if components.is_empty() {
        debug!(state = %state, county = %county, date = %on, "No rate window in effect");
        return RateResolution::none();
    }

    let rate = components.iter().map(|w| w.rate_decimal).sum();
    debug!(
        state = %state,
        county = %county,
        rate = %rate,
        components = components.len(),
        "Resolved rate from components"
    );

    RateResolution {
        rate,
        source: RateSource::Components,
        matched: components,
    }
}

fn compare_windows(a: &RateWindow, b: &RateWindow) -> Ordering {
    a.effective_date
        .cmp(&b.effective_date)
        .then_with(|| {
            a.expiration_date
                .unwrap_or(NaiveDate::MAX)
                .cmp(&b.expiration_date.unwrap_or(NaiveDate::MAX))
        })
        .then_with(|| a.rate_decimal.cmp(&b.rate_decimal))
}
