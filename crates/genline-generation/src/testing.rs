use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use genline_billing::{MemoryLedger, RatePricing};
use genline_config::{ModelPricing, ProviderKind};
use genline_llm::{
    ChunkStream, DispatchPayload, DispatchSettings, FallbackDispatcher, LlmError, ModelEntry, ProviderGraph,
    ProviderNode, StreamAdapter, StreamChunk, Usage,
};

use crate::generator::{GenerationSettings, Generator};
use crate::store::{BroadcastChatEvents, MemoryMessageStore};

#[derive(Debug, Clone)]
pub enum Step {
    Delta(&'static str),
    Done(Option<Usage>),
    Fail(&'static str),
    /// Never yields again
    Hang,
}

/// Provider replaying scripted streams, one script per open
pub struct FakeProvider {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    default_script: Vec<Step>,
    opens: AtomicUsize,
}

impl FakeProvider {
    pub fn new(scripts: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            default_script: vec![Step::Delta("ok"), Step::Done(Some(usage(10, 5)))],
            opens: AtomicUsize::new(0),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamAdapter for FakeProvider {
    fn provider_id(&self) -> &str {
        "primary"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenaiCompatible
    }

    async fn open(&self, _payload: &DispatchPayload) -> Result<ChunkStream, LlmError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());

        Ok(Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Delta(text) => yield Ok(StreamChunk::Pending { content_delta: text.to_owned() }),
                    Step::Done(usage) => yield Ok(StreamChunk::Done { usage }),
                    Step::Fail(message) => yield Err(LlmError::Streaming(message.to_owned())),
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        }))
    }
}

pub const fn usage(prompt_units: u32, completion_units: u32) -> Usage {
    Usage {
        prompt_units,
        completion_units,
    }
}

pub struct Harness {
    pub generator: Generator,
    pub provider: Arc<FakeProvider>,
    pub ledger: Arc<MemoryLedger>,
    pub messages: Arc<MemoryMessageStore>,
    pub events: Arc<BroadcastChatEvents>,
}

/// Generator over one fake provider serving `gpt-x` at 1000 caps per 1k units
pub fn harness(scripts: Vec<Vec<Step>>, settings: GenerationSettings) -> Harness {
    let provider = FakeProvider::new(scripts);
    let graph = ProviderGraph::new(
        [ProviderNode::new("primary", ProviderKind::OpenaiCompatible)],
        [ModelEntry::new("gpt-x", &["primary"])],
    );
    let adapters: HashMap<String, Arc<dyn StreamAdapter>> =
        HashMap::from([("primary".to_owned(), Arc::clone(&provider) as Arc<dyn StreamAdapter>)]);
    let dispatcher = FallbackDispatcher::new(Arc::new(graph), adapters, DispatchSettings::default());

    let pricing = RatePricing::new(HashMap::from([(
        "gpt-x".to_owned(),
        ModelPricing {
            prompt_per_1k: 1000.0,
            completion_per_1k: 1000.0,
        },
    )]));

    let ledger = Arc::new(MemoryLedger::new(1_000_000));
    let messages = Arc::new(MemoryMessageStore::new());
    let events = Arc::new(BroadcastChatEvents::new());

    let generator = Generator::new(
        dispatcher,
        Arc::new(pricing),
        Arc::clone(&ledger) as _,
        Arc::clone(&messages) as _,
        Arc::clone(&events) as _,
        settings,
    );

    Harness {
        generator,
        provider,
        ledger,
        messages,
        events,
    }
}

/// Settings with short intervals for tests
pub fn fast_settings() -> GenerationSettings {
    GenerationSettings {
        max_stream_duration: Duration::from_secs(5),
        persist_interval: Duration::from_millis(0),
        ..GenerationSettings::default()
    }
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
