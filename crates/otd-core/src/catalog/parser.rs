//! Jurisdiction rule catalog parsing from YAML/JSON.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::schema::validate_catalog_schema;
use crate::condition::{Condition, Fields};
use crate::money;
use crate::normalize;

/// Errors that can occur when loading catalogs.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Catalog does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Catalog validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// What a rule computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    GovernmentFee,
    TaxCalculation,
}

/// Which tax a `tax_calculation` rule configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxScope {
    State,
    County,
}

fn default_version() -> u32 {
    1
}

/// A government fee or tax rule scoped to a state (and optionally a county).
///
/// Rules are immutable once published; corrections ship as a new
/// `version` or a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionRule {
    /// Stable identifier reported in `appliedRuleIds`
    pub id: String,

    #[serde(default = "default_version")]
    pub version: u32,

    pub rule_type: RuleType,

    pub state_code: String,

    /// County scope; `None` applies statewide
    #[serde(default)]
    pub county_name: Option<String>,

    /// Human-readable unique code (e.g. `TITLE_FEE_ELECTRONIC`)
    pub fee_code: String,

    pub description: String,

    /// Explanation template; `{amount}` and `{description}` are substituted
    #[serde(default)]
    pub explanation: Option<String>,

    /// Flat amount; `None` for variable fees
    #[serde(default)]
    pub amount: Option<Decimal>,

    /// `None` means the rule always applies
    #[serde(default)]
    pub conditions: Option<Condition>,

    #[serde(default)]
    pub taxable: bool,

    /// Higher priority sorts first
    #[serde(default)]
    pub priority: i32,

    /// Optional fees only apply when the customer opts in
    pub optional: bool,

    #[serde(default)]
    pub tax_scope: Option<TaxScope>,

    /// Flat tax rate (state scope)
    #[serde(default)]
    pub rate: Option<Decimal>,

    /// Ceiling on the amount subject to this tax (county scope)
    #[serde(default)]
    pub cap_amount: Option<Decimal>,

    pub effective_date: NaiveDate,

    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

impl JurisdictionRule {
    /// Mandatory rules apply without customer opt-in.
    pub fn auto_apply(&self) -> bool {
        !self.optional
    }

    /// Check if the rule is in effect on a date (inclusive on both ends).
    pub fn is_in_effect(&self, on: NaiveDate) -> bool {
        self.effective_date <= on && self.expiration_date.map_or(true, |exp| on <= exp)
    }

    /// Check if the rule is scoped to this state and county.
    pub fn applies_to(&self, state_code: &str, county_name: &str) -> bool {
        normalize::keys_match(&self.state_code, state_code)
            && self
                .county_name
                .as_deref()
                .map_or(true, |county| normalize::keys_match(county, county_name))
    }

    /// Rules with a condition get an explanation line when they fire.
    pub fn is_conditional(&self) -> bool {
        self.conditions.is_some()
    }

    /// Evaluate the rule's condition; unconditional rules always match.
    pub fn matches(&self, fields: &impl Fields) -> bool {
        self.conditions
            .as_ref()
            .map_or(true, |condition| condition.evaluate(fields))
    }

    /// Ordering used to pick one rule per fee code: county-scoped over
    /// statewide, then the highest version, then the latest effective date.
    pub fn precedence(&self) -> (bool, u32, NaiveDate, &str) {
        (
            self.county_name.is_some(),
            self.version,
            self.effective_date,
            self.id.as_str(),
        )
    }

    /// Render the explanation for a fired rule.
    pub fn explain(&self) -> String {
        let amount = match self.amount {
            Some(amount) => money::format_usd(amount),
            None => "amount determined at registration".to_string(),
        };

        match &self.explanation {
            Some(template) => template
                .replace("{amount}", &amount)
                .replace("{description}", &self.description),
            None => format!("{}: {}", self.description, amount),
        }
    }
}

/// A set of jurisdiction rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub rules: Vec<JurisdictionRule>,
}

impl RuleCatalog {
    /// Wrap already-loaded rules, normalizing and validating them.
    pub fn new(rules: Vec<JurisdictionRule>) -> Result<Self, CatalogError> {
        let mut catalog = Self { rules };
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a catalog from JSON string.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a catalog from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, CatalogError> {
        validate_catalog_schema(&value).map_err(CatalogError::SchemaError)?;
        let catalog: RuleCatalog = serde_json::from_value(value)?;
        Self::new(catalog.rules)
    }

    pub fn rules(&self) -> &[JurisdictionRule] {
        &self.rules
    }

    fn normalize(&mut self) {
        for rule in &mut self.rules {
            rule.state_code = normalize::normalize_state_code(&rule.state_code);
            rule.county_name = rule
                .county_name
                .as_deref()
                .map(normalize::normalize_county_name)
                .filter(|county| !county.is_empty());
        }
    }

    /// Validate catalog invariants the schema cannot express.
    fn validate(&self) -> Result<(), CatalogError> {
        let mut ids = HashSet::new();
        let mut versions = HashSet::new();

        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(CatalogError::MissingField("id".to_string()));
            }
            if rule.fee_code.trim().is_empty() {
                return Err(CatalogError::MissingField(format!("{}.feeCode", rule.id)));
            }
            if !ids.insert(rule.id.as_str()) {
                return Err(CatalogError::ValidationError(format!(
                    "Duplicate rule ID: {}",
                    rule.id
                )));
            }
            if !versions.insert((
                rule.state_code.as_str(),
                rule.county_name.as_deref(),
                rule.fee_code.as_str(),
                rule.version,
            )) {
                return Err(CatalogError::ValidationError(format!(
                    "Duplicate version {} of {} for {}",
                    rule.version, rule.fee_code, rule.state_code
                )));
            }
            for (field, value) in [
                ("amount", rule.amount),
                ("rate", rule.rate),
                ("capAmount", rule.cap_amount),
            ] {
                if value.is_some_and(|v| v.is_sign_negative()) {
                    return Err(CatalogError::ValidationError(format!(
                        "Rule {} has a negative {}",
                        rule.id, field
                    )));
                }
            }
            if rule.expiration_date.is_some_and(|exp| exp < rule.effective_date) {
                return Err(CatalogError::ValidationError(format!(
                    "Rule {} expires before it takes effect",
                    rule.id
                )));
            }
            if rule.rule_type == RuleType::TaxCalculation && rule.tax_scope.is_none() {
                return Err(CatalogError::MissingField(format!("{}.taxScope", rule.id)));
            }
        }

        Ok(())
    }
}

/// Reduce rules to one per fee code, keeping the highest precedence.
///
/// Output is ordered by fee code.
pub fn latest_versions<'a>(
    rules: impl IntoIterator<Item = &'a JurisdictionRule>,
) -> Vec<&'a JurisdictionRule> {
    let mut by_code: BTreeMap<&str, &'a JurisdictionRule> = BTreeMap::new();

    for rule in rules {
        match by_code.get(rule.fee_code.as_str()) {
            Some(current) if current.precedence() >= rule.precedence() => {
                debug!(
                    fee_code = %rule.fee_code,
                    rule_id = %rule.id,
                    kept = %current.id,
                    "Rule superseded"
                );
            }
            _ => {
                by_code.insert(rule.fee_code.as_str(), rule);
            }
        }
    }

    by_code.into_values().collect()
}

/// Deserialize a YAML document into `T`.
pub(crate) fn parse_yaml<T: DeserializeOwned>(yaml: &str) -> Result<T, CatalogError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Deserialize a JSON document into `T`.
pub(crate) fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T, CatalogError> {
    Ok(serde_json::from_str(json)?)
}
