//! Shared normalization patterns.
//!
//! Catalog loading and scenario validation both need to agree on how
//! county names, state codes and VINs look, so the patterns live here
//! rather than being repeated per call site.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Trailing county-equivalent qualifiers ("Orange County", "Orleans Parish").
    static ref COUNTY_QUALIFIER_PATTERN: Regex = Regex::new(
        r"(?i)\s+(county|parish|borough|census area|municipality|city and borough)$"
    ).unwrap();

    /// Runs of whitespace, collapsed to a single space.
    static ref WHITESPACE_PATTERN: Regex = Regex::new(r"\s+").unwrap();

    /// Two-letter postal state code.
    static ref STATE_CODE_PATTERN: Regex = Regex::new(r"^[A-Za-z]{2}$").unwrap();

    /// 17-character VIN (letters I, O and Q are never used).
    static ref VIN_PATTERN: Regex = Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").unwrap();
}

/// Normalize a county name to the key used by rate windows and rules.
///
/// Trims, collapses whitespace and strips a trailing qualifier such as
/// "County" or "Parish". Case is preserved; lookups compare keys
/// case-insensitively.
pub fn normalize_county_name(name: &str) -> String {
    let collapsed = WHITESPACE_PATTERN.replace_all(name.trim(), " ");
    COUNTY_QUALIFIER_PATTERN
        .replace(&collapsed, "")
        .trim()
        .to_string()
}

/// Normalize a state code to upper case.
pub fn normalize_state_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Check if a (trimmed) string is a two-letter state code.
pub fn is_state_code(code: &str) -> bool {
    STATE_CODE_PATTERN.is_match(code.trim())
}

/// Check if a VIN is structurally valid (length and alphabet only).
pub fn is_valid_vin(vin: &str) -> bool {
    VIN_PATTERN.is_match(&vin.trim().to_ascii_uppercase())
}

/// Case-insensitive comparison of two already-normalized keys.
pub fn keys_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
