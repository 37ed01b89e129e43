//! Effective-dated tax rate records.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::parser::{parse_json, parse_yaml, CatalogError};
use crate::normalize;
use crate::rates::{self, RateResolution};

/// Whether a window is a combined rate or one part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentLabel {
    Total,
    Component,
}

/// A time-bounded rate for a state + county pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindow {
    pub state_code: String,
    pub county_name: String,
    pub component_label: ComponentLabel,
    /// Which component this is (e.g. "school surtax"); informational
    #[serde(default)]
    pub component_name: Option<String>,
    pub rate_decimal: Decimal,
    pub effective_date: NaiveDate,
    /// `None` is open-ended
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

impl RateWindow {
    /// Check if the window covers a date (inclusive on both ends).
    pub fn is_in_effect(&self, on: NaiveDate) -> bool {
        self.effective_date <= on && self.expiration_date.map_or(true, |exp| on <= exp)
    }

    /// Check if the window belongs to a state/county (keys already normalized).
    pub fn covers(&self, state_code: &str, county_name: &str) -> bool {
        normalize::keys_match(&self.state_code, state_code)
            && normalize::keys_match(&self.county_name, county_name)
    }
}

/// A loaded set of rate windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub windows: Vec<RateWindow>,
}

impl RateTable {
    /// Wrap rate windows, normalizing their keys and validating them.
    pub fn new(windows: Vec<RateWindow>) -> Result<Self, CatalogError> {
        let mut table = Self { windows };
        table.normalize();
        table.validate()?;
        Ok(table)
    }

    /// Parse a rate table from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let table: RateTable = parse_yaml(yaml)?;
        Self::new(table.windows)
    }

    /// Parse a rate table from JSON string.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let table: RateTable = parse_json(json)?;
        Self::new(table.windows)
    }

    /// Parse a rate table from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a rate table from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn windows(&self) -> &[RateWindow] {
        &self.windows
    }

    /// Resolve the applicable rate for a county on a date.
    pub fn resolve(&self, state_code: &str, county_name: &str, on: NaiveDate) -> Decimal {
        rates::resolve(&self.windows, state_code, county_name, on)
    }

    /// Resolve with the source of the rate.
    pub fn resolve_detailed(
        &self,
        state_code: &str,
        county_name: &str,
        on: NaiveDate,
    ) -> RateResolution {
        rates::resolve_detailed(&self.windows, state_code, county_name, on)
    }

    fn normalize(&mut self) {
        for window in &mut self.windows {
            window.state_code = normalize::normalize_state_code(&window.state_code);
            window.county_name = normalize::normalize_county_name(&window.county_name);
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for (idx, window) in self.windows.iter().enumerate() {
            if window.county_name.is_empty() {
                return Err(CatalogError::MissingField(format!(
                    "windows[{}].countyName",
                    idx
                )));
            }
            if window.rate_decimal.is_sign_negative() {
                return Err(CatalogError::ValidationError(format!(
                    "Rate window {} for {} has a negative rate",
                    idx, window.county_name
                )));
            }
            if window
                .expiration_date
                .is_some_and(|exp| exp < window.effective_date)
            {
                return Err(CatalogError::ValidationError(format!(
                    "Rate window {} for {} expires before it takes effect",
                    idx, window.county_name
                )));
            }
        }
        Ok(())
    }
}
