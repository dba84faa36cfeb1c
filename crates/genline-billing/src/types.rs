use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result of checking a balance against an estimated cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// Whether the balance covers the estimate
    pub sufficient: bool,
    /// Current balance in caps
    pub balance: i64,
}

/// What a write-off is charging for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffMeta {
    /// Generation job being billed, also the idempotency key
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub model_id: String,
    /// Provider that completed the generation, when one did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub prompt_units: u32,
    pub completion_units: u32,
    /// Terminal status of the job (`done`, `error` or `stopped`)
    pub status: String,
}

/// A recorded debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub subscription_id: String,
    /// Caps debited, possibly zero
    pub amount: u64,
    pub created_at: Timestamp,
    pub meta: WriteOffMeta,
}

/// Outcome of a write-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOff {
    pub transaction: Transaction,
    /// Balance after the debit; may go negative when actual usage
    /// exceeded the pre-dispatch estimate
    pub new_balance: i64,
}
