//! The pipeline context: configuration, shared lock and wait conditions,
//! client-facing read/write, admission control, and shutdown.
//!
//! # Synchronization protocol
//!
//! One `parking_lot::Mutex` protects both queues and the in-flight marker.
//! Four condvars signal the queue edges: `input-not-full`, `input-not-empty`,
//! `output-not-full`, `output-not-empty`. Every mutation follows the same
//! discipline under the lock:
//!
//! - after a push, wake the matching "not-empty" condition;
//! - after a pop, wake the matching "not-full" condition;
//! - every wait re-checks its predicate after waking, so spurious and lost
//!   wakeups cannot break the protocol.
//!
//! Blocking calls additionally watch the stop flag and their session's
//! cancellation flag, and return [`PipelineError::Interrupted`] without
//! mutating queue state when either fires. The cancel and stop paths take
//! the shared lock before raising their flag and broadcasting, so a waiter
//! can never park after missing the wakeup.
//!
//! No code path holds the lock across the transform or a caller copy; the
//! lock covers only counter updates and queue mutations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::errors::{PipelineError, Result};
use crate::queue::{Block, BlockQueue};
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::worker::{self, BlockTransform};

/// Default queue capacity per direction.
pub const DEFAULT_MAX_BLOCKS: usize = 8;
/// Default truncation threshold for writes, in bytes.
pub const DEFAULT_MAX_BLOCK_LEN: usize = 64;
/// Default number of concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1;

/// Configuration fixed at pipeline construction.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Queue capacity per direction.
    pub max_blocks: usize,
    /// Maximum block payload length; longer writes are truncated.
    pub max_block_len: usize,
    /// Number of sessions admission control allows at once.
    ///
    /// This is an explicit bound rather than a hard-coded "one user at a
    /// time" counter; the default is a genuinely single-client device.
    pub max_sessions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_blocks: DEFAULT_MAX_BLOCKS,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl PipelineConfig {
    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<()> {
        if self.max_blocks == 0 {
            return Err(PipelineError::InvalidConfig {
                parameter: "max_blocks",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.max_block_len == 0 {
            return Err(PipelineError::InvalidConfig {
                parameter: "max_block_len",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.max_sessions == 0 {
            return Err(PipelineError::InvalidConfig {
                parameter: "max_sessions",
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// State guarded by the shared lock.
pub(crate) struct State {
    /// Blocks submitted by writers, waiting for the worker.
    pub(crate) input: BlockQueue,
    /// Transformed blocks waiting for readers.
    pub(crate) output: BlockQueue,
    /// True while the worker holds a block between input-pop and
    /// output-push. Lets the read path distinguish "nothing in flight"
    /// from "data still being transformed".
    pub(crate) in_flight: bool,
    /// Shutdown requested.
    pub(crate) stop: bool,
}

/// Everything the worker thread and the client paths share.
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) input_not_full: Condvar,
    pub(crate) input_not_empty: Condvar,
    pub(crate) output_not_full: Condvar,
    pub(crate) output_not_empty: Condvar,
    pub(crate) transform: Box<dyn BlockTransform>,
    pub(crate) stats: PipelineStats,
}

impl Shared {
    /// Wake every wait point at once, for cancel and stop broadcasts.
    pub(crate) fn notify_all_conditions(&self) {
        self.input_not_full.notify_all();
        self.input_not_empty.notify_all();
        self.output_not_full.notify_all();
        self.output_not_empty.notify_all();
    }
}

/// A block-oriented processing pipeline exposed as a device-like byte
/// stream.
///
/// Writers submit variable-length byte ranges which are truncated to
/// fixed-capacity blocks and queued; a background worker transforms each
/// block; readers drain the transformed blocks in submission order.
///
/// # Example
///
/// ```
/// use encpipe_lib::pipeline::{Pipeline, PipelineConfig};
/// use encpipe_lib::worker::XorTransform;
///
/// let pipeline =
///     Pipeline::start(PipelineConfig::default(), Box::new(XorTransform::new(b'k'))).unwrap();
/// let session = pipeline.open().unwrap();
///
/// let accepted = session.write(b"hello").unwrap();
/// assert_eq!(accepted, 5);
///
/// let mut buf = [0u8; 64];
/// let delivered = session.read(&mut buf).unwrap();
/// assert_eq!(&buf[..delivered], b"hello".iter().map(|b| b ^ b'k').collect::<Vec<_>>().as_slice());
///
/// drop(session);
/// pipeline.shutdown();
/// ```
pub struct Pipeline {
    shared: Arc<Shared>,
    config: PipelineConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
    open_sessions: AtomicUsize,
}

impl Pipeline {
    /// Validate the configuration, build both queues, and start the worker.
    pub fn start(config: PipelineConfig, transform: Box<dyn BlockTransform>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                input: BlockQueue::new(config.max_blocks, config.max_block_len),
                output: BlockQueue::new(config.max_blocks, config.max_block_len),
                in_flight: false,
                stop: false,
            }),
            input_not_full: Condvar::new(),
            input_not_empty: Condvar::new(),
            output_not_full: Condvar::new(),
            output_not_empty: Condvar::new(),
            transform,
            stats: PipelineStats::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("encpipe-worker".to_string())
            .spawn(move || worker::run(&worker_shared))?;

        info!(
            "pipeline started: {} blocks of up to {} bytes per direction, {} session(s)",
            config.max_blocks, config.max_block_len, config.max_sessions
        );

        Ok(Self { shared, config, worker: Mutex::new(Some(handle)), open_sessions: AtomicUsize::new(0) })
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open a client session, subject to admission control.
    ///
    /// Fails immediately with [`PipelineError::Busy`] (no blocking) once
    /// `max_sessions` sessions are open. Dropping the returned [`Session`]
    /// frees the slot.
    pub fn open(&self) -> Result<Session<'_>> {
        let mut open = self.open_sessions.load(Ordering::Relaxed);
        loop {
            if open >= self.config.max_sessions {
                return Err(PipelineError::Busy { open, max: self.config.max_sessions });
            }
            match self.open_sessions.compare_exchange_weak(
                open,
                open + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => open = actual,
            }
        }
        debug!("session opened ({} now active)", open + 1);
        Ok(Session { pipeline: self, cancelled: Arc::new(AtomicBool::new(false)) })
    }

    /// Number of sessions currently open.
    #[must_use]
    pub fn open_session_count(&self) -> usize {
        self.open_sessions.load(Ordering::Relaxed)
    }

    /// Snapshot of the pipeline counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop the worker and wake every blocked caller.
    ///
    /// Destruction order is fixed: raise the stop flag and broadcast all
    /// four conditions, join the worker, and only then (when the pipeline
    /// itself is dropped) release the queues — so no reader of a queue can
    /// outlive the queue. Blocked read/write calls receive
    /// [`PipelineError::Interrupted`]. A second call is a no-op.
    pub fn shutdown(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            state.stop = true;
            self.shared.notify_all_conditions();
            drop(state);
        }

        if handle.join().is_err() {
            warn!("worker thread panicked before shutdown");
        }

        let snap = self.shared.stats.snapshot();
        info!(
            "pipeline stopped: {} blocks in / {} transformed / {} out ({} bytes in, {} bytes out)",
            snap.blocks_submitted,
            snap.blocks_transformed,
            snap.blocks_delivered,
            snap.bytes_submitted,
            snap.bytes_delivered,
        );
        if snap.transform_failures > 0 {
            warn!("pipeline dropped {} block(s) on transform failures", snap.transform_failures);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // The worker must never outlive the queues it reads.
        self.shutdown();
    }
}

/// An open client session.
///
/// Holds one admission-control slot; the slot is released on drop. All
/// methods take `&self`, so a single session can be shared by a writer
/// thread and a reader thread the way a device file descriptor would be.
pub struct Session<'a> {
    pipeline: &'a Pipeline,
    cancelled: Arc<AtomicBool>,
}

impl Session<'_> {
    /// Submit a byte range for transformation.
    ///
    /// Zero-length input is a no-op returning 0. Longer input is truncated
    /// to `max_block_len` bytes, copied into a fresh block *before* the
    /// shared lock is taken, and queued once the input queue has room;
    /// the accepted (truncated) length is returned. Blocks while the input
    /// queue is full; an interrupting cancel or shutdown returns
    /// [`PipelineError::Interrupted`] with no queue state mutated.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let shared = &self.pipeline.shared;
        let len_cut = data.len().min(self.pipeline.config.max_block_len);
        let block = Block::copy_from(&data[..len_cut])?;

        let mut state = shared.state.lock();
        loop {
            if state.stop || self.cancelled.load(Ordering::Acquire) {
                return Err(PipelineError::Interrupted { operation: "write" });
            }
            if !state.input.is_full() {
                break;
            }
            shared.input_not_full.wait(&mut state);
        }

        let pushed = state.input.push(block);
        assert!(pushed.is_ok(), "input queue refused a push after the capacity wait");
        shared.stats.record_submitted(len_cut as u64);
        shared.stats.note_input_depth(state.input.len());
        shared.input_not_empty.notify_one();

        Ok(len_cut)
    }

    /// Read back the next transformed block.
    ///
    /// Zero-length buffers are a no-op returning 0. If the output queue is
    /// empty, the input queue is empty, and no block is being transformed,
    /// returns 0 immediately instead of parking a reader that could never
    /// be woken by data. Otherwise blocks until a transformed block is
    /// available, copies up to `buf.len()` bytes of it to the caller, and
    /// discards any remainder of that block. An interrupting cancel or
    /// shutdown returns [`PipelineError::Interrupted`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let shared = &self.pipeline.shared;
        let block = {
            let mut state = shared.state.lock();
            loop {
                if state.stop || self.cancelled.load(Ordering::Acquire) {
                    return Err(PipelineError::Interrupted { operation: "read" });
                }
                if let Some(block) = state.output.pop() {
                    shared.output_not_full.notify_one();
                    break block;
                }
                if state.input.is_empty() && !state.in_flight {
                    // Nothing submitted and nothing in flight: report
                    // end-of-stream rather than parking forever.
                    return Ok(0);
                }
                shared.output_not_empty.wait(&mut state);
            }
        };

        // Copy outside the lock; the block is released either way.
        let len_cut = buf.len().min(block.len());
        buf[..len_cut].copy_from_slice(&block.as_ref()[..len_cut]);
        shared.stats.record_delivered(len_cut as u64);

        Ok(len_cut)
    }

    /// A handle that can interrupt this session's blocking calls from
    /// another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::clone(&self.cancelled),
            shared: Arc::clone(&self.pipeline.shared),
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let before = self.pipeline.open_sessions.fetch_sub(1, Ordering::AcqRel);
        debug!("session closed ({} now active)", before - 1);
    }
}

/// Interrupts a session's in-flight blocking calls.
///
/// Cloneable and sendable; the device layer hands one to whatever delivers
/// its cancellation notifications.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl CancelToken {
    /// Interrupt the session's blocking calls.
    ///
    /// Raises the flag under the shared lock and broadcasts every wait
    /// condition, so a call already parked wakes up and a call about to
    /// park sees the flag first. Queue state is left untouched.
    pub fn cancel(&self) {
        let state = self.shared.state.lock();
        self.flag.store(true, Ordering::Release);
        self.shared.notify_all_conditions();
        drop(state);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Re-arm the session after a cancellation, allowing calls to be
    /// re-issued.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
