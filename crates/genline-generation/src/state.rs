//! Write-once job status

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum JobStatus {
    Pending = 0,
    Streaming = 1,
    Done = 2,
    Error = 3,
    Stopped = 4,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Stopped)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Streaming,
            2 => Self::Done,
            3 => Self::Error,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic job status with a single terminal transition
///
/// Whoever wins [`try_finish`](Self::try_finish) owns billing for the job.
#[derive(Debug)]
pub struct JobState(AtomicU8);

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(JobStatus::Pending as u8))
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Pending -> Streaming`; false if the job already moved on
    pub fn begin_streaming(&self) -> bool {
        self.0
            .compare_exchange(
                JobStatus::Pending as u8,
                JobStatus::Streaming as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to a terminal status unless one was already reached
    pub fn try_finish(&self, terminal: JobStatus) -> bool {
        debug_assert!(terminal.is_terminal());

        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (!JobStatus::from_u8(current).is_terminal()).then_some(terminal as u8)
            })
            .is_ok()
    }
}
