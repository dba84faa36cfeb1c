#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod client;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod pricing;
pub mod types;

use std::sync::Arc;

use genline_config::{BillingConfig, LedgerKind};

pub use client::HttpLedger;
pub use error::BillingError;
pub use ledger::SubscriptionLedger;
pub use memory::MemoryLedger;
pub use pricing::{Pricing, RatePricing};
pub use types::{BalanceCheck, Transaction, WriteOff, WriteOffMeta};

/// Build the ledger selected in configuration
pub fn from_config(config: &BillingConfig) -> Result<Arc<dyn SubscriptionLedger>, BillingError> {
    match config.ledger {
        LedgerKind::Memory => Ok(Arc::new(MemoryLedger::new(config.initial_balance))),
        LedgerKind::Http => {
            let url = config.url.clone().ok_or(BillingError::NotConfigured)?;
            Ok(Arc::new(HttpLedger::new(url, config.api_key.clone())?))
        }
    }
}
