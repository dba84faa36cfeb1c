//! Types shared by every Genline crate

#![allow(clippy::must_use_candidate)]

mod context;
mod error;

pub use context::{CallerRole, RequestContext};
pub use error::HttpError;
