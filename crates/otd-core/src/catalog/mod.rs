//! Catalog loading and validation.
//!
//! Jurisdiction rules, rate windows, and dealer packages are structured
//! data supplied by the caller. This module parses them from YAML/JSON,
//! normalizes their jurisdiction keys, and rejects malformed records.

mod dealer;
mod parser;
mod rate_window;
mod schema;

pub use dealer::{DealerConfig, DealerFee, DealerPackage};
pub use parser::{latest_versions, CatalogError, JurisdictionRule, RuleCatalog, RuleType, TaxScope};
pub use rate_window::{ComponentLabel, RateTable, RateWindow};
pub use schema::{validate_catalog_schema, SchemaError};
