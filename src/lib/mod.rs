#![deny(unsafe_code)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # encpipe - a device-like block-transform pipeline
//!
//! This library implements a single-client, block-oriented processing
//! pipeline exposed as a device-like byte stream. Callers write
//! variable-length byte ranges, which are split into fixed-capacity blocks,
//! queued, transformed by a dedicated background worker, and made available
//! for sequential read-back.
//!
//! ## Overview
//!
//! - **[`queue`]** - bounded FIFO block storage ([`queue::BlockQueue`]),
//!   synchronized externally by the pipeline lock
//! - **[`pipeline`]** - the pipeline context: shared lock, wait conditions,
//!   client read/write, admission control, and shutdown ordering
//! - **[`worker`]** - the background worker and the pluggable
//!   [`worker::BlockTransform`]
//! - **[`errors`]** - error types shared across the crate
//! - **[`stats`]** - pipeline counters for the shutdown summary
//! - **[`logging`]** - formatting helpers for log output
//!
//! ## Data flow
//!
//! ```text
//! write → Block → input queue → worker (transform) → output queue → read
//! ```
//!
//! Both queues are strictly FIFO with one producer and one consumer each, so
//! the Nth block written is the Nth block read back.

pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod stats;
pub mod worker;

pub use errors::{PipelineError, Result};
pub use pipeline::{CancelToken, Pipeline, PipelineConfig, Session};
pub use queue::{Block, BlockQueue};
pub use stats::{PipelineStats, StatsSnapshot};
pub use worker::{BlockTransform, XorTransform};
