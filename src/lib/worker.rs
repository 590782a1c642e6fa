//! The background worker and the block transform it applies.
//!
//! The worker is the sole consumer of the input queue and the sole producer
//! of the output queue. It runs on its own thread, waits for submitted
//! blocks, applies the configured [`BlockTransform`] outside any lock, and
//! hands the transformed block to the output queue. Both of its wait points
//! also wake on a stop request so shutdown can never hang behind an empty
//! input queue or a full output queue.

use log::{debug, error};

use crate::pipeline::Shared;
use crate::queue::Block;

/// A pure, length-preserving function applied to each block by the worker.
///
/// Implementations must not block, must produce exactly `input.len()` output
/// bytes, and are always called without any pipeline lock held. The pipeline
/// does not depend on what the transform computes, only on these timing and
/// length guarantees.
pub trait BlockTransform: Send + Sync {
    /// Fill `output` with the transform of `input`.
    ///
    /// `output` is always exactly `input.len()` bytes.
    fn apply(&self, input: &[u8], output: &mut [u8]);
}

/// The reference transform: a per-byte XOR with a single-byte key.
///
/// XOR is symmetric, so running a block through the pipeline twice with the
/// same key restores the original bytes.
#[derive(Debug, Clone, Copy)]
pub struct XorTransform {
    key: u8,
}

impl XorTransform {
    /// Create a transform with the given single-byte key.
    #[must_use]
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    /// The configured key.
    #[must_use]
    pub fn key(&self) -> u8 {
        self.key
    }
}

impl BlockTransform for XorTransform {
    fn apply(&self, input: &[u8], output: &mut [u8]) {
        for (out, byte) in output.iter_mut().zip(input) {
            *out = byte ^ self.key;
        }
    }
}

/// Worker thread body. Returns only once a stop request has been observed.
pub(crate) fn run(shared: &Shared) {
    debug!("worker: started");
    loop {
        // Wait for input data or a stop request. Popping and raising the
        // in-flight marker happen in the same critical section so readers
        // never see the block vanish from both queues at once.
        let block_in = {
            let mut state = shared.state.lock();
            loop {
                if state.stop {
                    debug!("worker: stop observed while idle");
                    return;
                }
                if let Some(block) = state.input.pop() {
                    state.in_flight = true;
                    shared.input_not_full.notify_one();
                    break block;
                }
                shared.input_not_empty.wait(&mut state);
            }
        };

        // Allocate the output block before transforming. An allocation
        // failure is fatal for this block only: the input block is released
        // and the pipeline keeps accepting new writes.
        let mut block_out = match Block::zeroed(block_in.len()) {
            Ok(block) => block,
            Err(err) => {
                error!("worker: dropping block: {err}");
                shared.stats.record_transform_failure();
                let mut state = shared.state.lock();
                state.in_flight = false;
                // A reader parked on output-not-empty must re-evaluate the
                // early-EOF predicate now that this block is gone.
                shared.output_not_empty.notify_all();
                continue;
            }
        };

        // Transform outside the lock so a slow transform cannot starve
        // readers and writers of the lock.
        shared.transform.apply(block_in.as_ref(), block_out.as_mut_slice());
        shared.stats.record_transformed(block_out.len() as u64);
        drop(block_in);

        // Hand the transformed block to the output queue. The wait also
        // wakes on stop: exiting here (dropping the block) beats deadlocking
        // shutdown behind a full output queue.
        let mut state = shared.state.lock();
        loop {
            if state.stop {
                state.in_flight = false;
                debug!("worker: stop observed while waiting for output space");
                return;
            }
            if !state.output.is_full() {
                break;
            }
            shared.output_not_full.wait(&mut state);
        }
        let pushed = state.output.push(block_out);
        assert!(pushed.is_ok(), "output queue refused a push after the capacity wait");
        state.in_flight = false;
        shared.stats.note_output_depth(state.output.len());
        shared.output_not_empty.notify_one();
    }
}
