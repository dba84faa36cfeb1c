//! In-process ledger for single-node deployments and tests

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;

use crate::error::BillingError;
use crate::ledger::SubscriptionLedger;
use crate::types::{BalanceCheck, Transaction, WriteOff, WriteOffMeta};

/// Ledger holding balances in memory
///
/// Subscriptions seen for the first time start at `initial_balance`.
pub struct MemoryLedger {
    initial_balance: i64,
    balances: DashMap<String, i64>,
    transactions: Mutex<Vec<Transaction>>,
}

impl MemoryLedger {
    pub fn new(initial_balance: u64) -> Self {
        Self {
            initial_balance: i64::try_from(initial_balance).unwrap_or(i64::MAX),
            balances: DashMap::new(),
            transactions: Mutex::new(Vec::new()),
        }
    }

    /// Set a subscription's balance
    pub fn set_balance(&self, subscription_id: &str, balance: i64) {
        self.balances.insert(subscription_id.to_owned(), balance);
    }

    /// Current balance of a subscription
    pub fn balance(&self, subscription_id: &str) -> i64 {
        self.balances
            .get(subscription_id)
            .map_or(self.initial_balance, |b| *b)
    }

    /// Transactions recorded against a subscription, oldest first
    pub fn transactions(&self, subscription_id: &str) -> Vec<Transaction> {
        self.transactions
            .lock()
            .map(|txs| {
                txs.iter()
                    .filter(|tx| tx.subscription_id == subscription_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of write-offs recorded across all subscriptions
    pub fn write_off_count(&self) -> usize {
        self.transactions.lock().map(|txs| txs.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SubscriptionLedger for MemoryLedger {
    async fn check_balance(&self, subscription_id: &str, estimate: u64) -> Result<BalanceCheck, BillingError> {
        let balance = self.balance(subscription_id);
        let sufficient = u64::try_from(balance).is_ok_and(|b| b >= estimate);

        Ok(BalanceCheck { sufficient, balance })
    }

    async fn write_off(&self, subscription_id: &str, amount: u64, meta: &WriteOffMeta) -> Result<WriteOff, BillingError> {
        let debit = i64::try_from(amount).unwrap_or(i64::MAX);

        let new_balance = {
            let mut entry = self
                .balances
                .entry(subscription_id.to_owned())
                .or_insert(self.initial_balance);
            *entry = entry.saturating_sub(debit);
            *entry
        };

        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id: subscription_id.to_owned(),
            amount,
            created_at: Timestamp::now(),
            meta: meta.clone(),
        };

        if let Ok(mut txs) = self.transactions.lock() {
            txs.push(transaction.clone());
        }

        tracing::debug!(
            subscription_id,
            amount,
            new_balance,
            job_id = %meta.job_id,
            "caps written off"
        );

        Ok(WriteOff {
            transaction,
            new_balance,
        })
    }
}
