use std::sync::Arc;

use genline_billing::RatePricing;
use genline_config::Config;
use genline_generation::{
    BatchRunner, BroadcastChatEvents, GenerationSettings, Generator, MemoryMessageStore, ProgressBus,
};
use genline_llm::FallbackDispatcher;
use genline_queue::PromptQueueRegistry;

/// Shared state for route handlers
#[derive(Clone)]
pub struct AppState {
    generator: Generator,
    batches: BatchRunner,
    events: Arc<BroadcastChatEvents>,
}

impl AppState {
    pub const fn new(generator: Generator, batches: BatchRunner, events: Arc<BroadcastChatEvents>) -> Self {
        Self {
            generator,
            batches,
            events,
        }
    }

    /// Wire the generation pipeline from configuration
    ///
    /// Messages are kept in memory and chat events are broadcast to
    /// in-process subscribers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let dispatcher = FallbackDispatcher::from_config(config)?;
        let pricing = Arc::new(RatePricing::from_config(config));
        let ledger = genline_billing::from_config(&config.billing)?;
        let registry = PromptQueueRegistry::from_config(&config.queue).await?;
        let settings = GenerationSettings::from_config(&config.generation)?;

        let events = Arc::new(BroadcastChatEvents::new());
        let generator = Generator::new(
            dispatcher,
            pricing,
            ledger,
            Arc::new(MemoryMessageStore::new()),
            Arc::clone(&events) as _,
            settings,
        );
        let batches = BatchRunner::new(generator.clone(), registry, ProgressBus::new());

        tracing::debug!(
            providers = config.providers.len(),
            models = config.models.len(),
            "generation pipeline ready"
        );

        Ok(Self::new(generator, batches, events))
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub const fn batches(&self) -> &BatchRunner {
        &self.batches
    }

    pub const fn events(&self) -> &Arc<BroadcastChatEvents> {
        &self.events
    }
}
