use async_trait::async_trait;

use crate::error::BillingError;
use crate::types::{BalanceCheck, WriteOff, WriteOffMeta};

/// Prepaid caps balance of a subscription
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    /// Check whether `subscription_id` can afford `estimate` caps
    async fn check_balance(&self, subscription_id: &str, estimate: u64) -> Result<BalanceCheck, BillingError>;

    /// Debit `amount` caps and record a transaction
    ///
    /// Debits are not refused for lack of funds: usage already happened,
    /// so the balance is allowed to go negative.
    async fn write_off(&self, subscription_id: &str, amount: u64, meta: &WriteOffMeta) -> Result<WriteOff, BillingError>;
}
