//! Dealer fee package selection.

use tracing::debug;

use super::{FeeOutcome, FeeResolver, QuoteRequest};
use crate::catalog::{DealerConfig, DealerPackage};
use crate::money;
use crate::types::{FeeCategory, LineItem};
use crate::{ConfigurationError, QuoteError};

/// Applies the selected dealer package verbatim.
pub struct DealerFeeResolver;

impl DealerFeeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Pick the requested package, else the dealer's single default.
    pub fn select<'a>(
        &self,
        dealer: &'a DealerConfig,
        package_id: Option<&str>,
    ) -> Result<&'a DealerPackage, ConfigurationError> {
        if let Some(id) = package_id {
            return dealer
                .package(id)
                .ok_or_else(|| ConfigurationError::UnknownDealerPackage {
                    dealer_id: dealer.dealer_id.clone(),
                    package_id: id.to_string(),
                });
        }

        let mut defaults = dealer.default_packages();
        match (defaults.next(), defaults.count()) {
            (Some(package), 0) => Ok(package),
            (Some(_), extra) => Err(ConfigurationError::AmbiguousDefaultPackage {
                dealer_id: dealer.dealer_id.clone(),
                count: extra + 1,
            }),
            (None, _) => Err(ConfigurationError::NoDefaultPackage {
                dealer_id: dealer.dealer_id.clone(),
            }),
        }
    }
}

impl Default for DealerFeeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeResolver for DealerFeeResolver {
    fn category(&self) -> FeeCategory {
        FeeCategory::Dealer
    }

    fn resolve(&self, request: &QuoteRequest<'_>) -> Result<FeeOutcome, QuoteError> {
        let package = self.select(request.dealer, request.input.dealer_package_id.as_deref())?;
        debug!(
            dealer_id = %request.dealer.dealer_id,
            package_id = %package.id,
            fees = package.fees.len(),
            "Dealer package selected"
        );

        let items: Vec<LineItem> = package
            .fees
            .iter()
            .map(|fee| LineItem {
                category: self.category(),
                code: fee.code.clone(),
                description: fee.description.clone(),
                amount: Some(fee.amount),
                taxable: fee.taxable,
                rule_id: None,
                explanation: None,
            })
            .collect();

        let listed = if package.fees.is_empty() {
            "no dealer fees".to_string()
        } else {
            package
                .fees
                .iter()
                .map(|fee| format!("{} ({})", fee.description, money::format_usd(fee.amount)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Ok(FeeOutcome {
            items,
            applied_rule_ids: Vec::new(),
            explanations: vec![format!(
                "Dealer fee package '{}' applied: {}",
                package.name, listed
            )],
        })
    }
}
