//! Token estimates for pre-dispatch balance checks and stopped jobs

use std::sync::LazyLock;

use genline_llm::{ChatMessage, Usage};
use tiktoken_rs::{CoreBPE, o200k_base};

/// Per-message framing tokens added by chat formats
const MESSAGE_OVERHEAD: u32 = 4;

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| {
    o200k_base()
        .map_err(|e| tracing::warn!(error = %e, "tokenizer unavailable, estimating by length"))
        .ok()
});

/// Estimate the token count of a text
pub fn count_text(text: &str) -> u32 {
    let count = BPE.as_ref().map_or_else(
        || text.len().div_ceil(4),
        |bpe| bpe.encode_with_special_tokens(text).len(),
    );
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Estimate the prompt tokens of a conversation
pub fn count_messages(messages: &[ChatMessage]) -> u32 {
    messages
        .iter()
        .map(|m| count_text(&m.content).saturating_add(MESSAGE_OVERHEAD))
        .fold(0, u32::saturating_add)
}

/// Usage estimate for a generation that never reported its own
pub fn estimate_usage(messages: &[ChatMessage], completion: &str) -> Usage {
    Usage {
        prompt_units: count_messages(messages),
        completion_units: count_text(completion),
    }
}
