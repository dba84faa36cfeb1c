//! Generation lifecycle for Genline
//!
//! A [`Generator`] turns a request into a background job that streams
//! deltas to its caller and settles billing exactly once when it reaches
//! a terminal status. [`BatchRunner`] runs prompt
//! batches sequentially under a cancellable queue and reports progress
//! on a [`ProgressBus`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod batch;
pub mod error;
pub mod generator;
mod job;
pub mod progress;
pub mod state;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod testing;

pub use batch::{BatchHandle, BatchRunner, PromptBatch};
pub use error::GenerationError;
pub use generator::{GenerationSettings, Generator, JobHandle, StartedJob};
pub use job::{JobFailure, JobOutcome, JobUpdate};
pub use progress::{BatchSummary, ProgressBus, ProgressEvent, ProgressSubscription, PromptProgress};
pub use state::{JobState, JobStatus};
pub use store::{
    BroadcastChatEvents, ChatEvent, ChatEventStream, MemoryMessageStore, MessageRecord, MessageStore, StoreError,
};
