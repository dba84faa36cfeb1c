use std::collections::HashMap;

use genline_config::{Config, ModelPricing};

/// Converts token usage into caps
pub trait Pricing: Send + Sync {
    /// Caps owed for the given usage of `model_id`
    fn caps(&self, model_id: &str, prompt_units: u32, completion_units: u32) -> u64;
}

/// Per-model rates in caps per thousand units, rounded up
#[derive(Debug, Clone, Default)]
pub struct RatePricing {
    rates: HashMap<String, ModelPricing>,
    fallback: ModelPricing,
}

impl RatePricing {
    pub fn new(rates: HashMap<String, ModelPricing>) -> Self {
        Self {
            rates,
            fallback: ModelPricing::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .models
                .iter()
                .map(|(id, model)| (id.clone(), model.pricing))
                .collect(),
        )
    }
}

impl Pricing for RatePricing {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn caps(&self, model_id: &str, prompt_units: u32, completion_units: u32) -> u64 {
        let rate = self.rates.get(model_id).unwrap_or(&self.fallback);
        let cost = (f64::from(prompt_units) * rate.prompt_per_1k
            + f64::from(completion_units) * rate.completion_per_1k)
            / 1000.0;

        cost.max(0.0).ceil() as u64
    }
}
