use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Subscription ledger configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Which ledger implementation debits caps
    #[serde(default)]
    pub ledger: LedgerKind,
    /// Base URL of the ledger service (`http` ledger)
    #[serde(default)]
    pub url: Option<Url>,
    /// Service key for the ledger service (`http` ledger)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Starting balance of unseen subscriptions (`memory` ledger)
    #[serde(default)]
    pub initial_balance: u64,
}

/// Ledger implementations
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// In-process balances, lost on restart
    #[default]
    Memory,
    /// Remote subscription service over HTTP
    Http,
}
