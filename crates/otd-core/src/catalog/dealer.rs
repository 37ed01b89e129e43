//! Dealer fee package configuration.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::parser::{parse_json, parse_yaml, CatalogError};

/// A flat dealer fee. Dealer fees carry no conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerFee {
    pub code: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub taxable: bool,
}

/// An ordered list of dealer fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerPackage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub fees: Vec<DealerFee>,
}

/// One dealer's fee package catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerConfig {
    pub dealer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub packages: Vec<DealerPackage>,
}

impl DealerConfig {
    /// Parse a dealer config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let config: DealerConfig = parse_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a dealer config from JSON string.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let config: DealerConfig = parse_json(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a dealer config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a dealer config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Look up a package by id.
    pub fn package(&self, id: &str) -> Option<&DealerPackage> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// All packages marked default (a valid config has exactly one).
    pub fn default_packages(&self) -> impl Iterator<Item = &DealerPackage> {
        self.packages.iter().filter(|p| p.is_default)
    }

    /// Validate package structure.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.dealer_id.trim().is_empty() {
            return Err(CatalogError::MissingField("dealerId".to_string()));
        }

        let defaults = self.default_packages().count();
        if defaults != 1 {
            return Err(CatalogError::ValidationError(format!(
                "Dealer {} must mark exactly one default package, found {}",
                self.dealer_id, defaults
            )));
        }

        let mut ids = HashSet::new();
        for package in &self.packages {
            if !ids.insert(package.id.as_str()) {
                return Err(CatalogError::ValidationError(format!(
                    "Duplicate package ID: {}",
                    package.id
                )));
            }

            let mut codes = HashSet::new();
            for fee in &package.fees {
                if !codes.insert(fee.code.as_str()) {
                    return Err(CatalogError::ValidationError(format!(
                        "Duplicate fee code {} in package {}",
                        fee.code, package.id
                    )));
                }
                if fee.amount.is_sign_negative() {
                    return Err(CatalogError::ValidationError(format!(
                        "Fee {} in package {} has a negative amount",
                        fee.code, package.id
                    )));
                }
            }
        }

        Ok(())
    }
}
