//! Shared CLI options and the byte pump that drives a pipeline session.
//!
//! The pump plays the role of the external client: a writer thread chunks
//! the source into block-sized writes while the calling thread drains
//! transformed blocks to the sink, the same split a client process would
//! use against a device file.

use std::io::{self, Read, Write};

use clap::Args;
use crossbeam_channel::unbounded;
use encpipe_lib::errors::{PipelineError, Result};
use encpipe_lib::pipeline::{
    DEFAULT_MAX_BLOCKS, DEFAULT_MAX_BLOCK_LEN, Pipeline, PipelineConfig, Session,
};
use encpipe_lib::worker::XorTransform;

/// Default single-byte XOR key.
pub const DEFAULT_KEY: &str = "k";

/// Pipeline flags shared by every command.
#[derive(Debug, Args)]
pub struct PipelineOptions {
    /// Queue capacity per direction, in blocks
    #[arg(long = "max-blocks", default_value_t = DEFAULT_MAX_BLOCKS)]
    pub max_blocks: usize,

    /// Block payload size in bytes; longer writes are split at this boundary
    #[arg(long = "block-len", default_value_t = DEFAULT_MAX_BLOCK_LEN)]
    pub block_len: usize,

    /// Single-byte XOR key: one ASCII character, a decimal value, or 0x-prefixed hex
    #[arg(short = 'k', long = "key", default_value = DEFAULT_KEY, value_parser = parse_key)]
    pub key: u8,
}

impl PipelineOptions {
    /// Build the pipeline configuration from the flags.
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_blocks: self.max_blocks,
            max_block_len: self.block_len,
            max_sessions: 1,
        }
    }

    /// Start a pipeline with the reference XOR transform.
    pub fn start_pipeline(&self) -> Result<Pipeline> {
        Pipeline::start(self.to_config(), Box::new(XorTransform::new(self.key)))
    }
}

/// Parse a `--key` flag value into a single byte.
///
/// Accepts `0x`-prefixed hex (`0x6B`), a decimal value (`107`), or a single
/// ASCII character (`k`). Digits parse as numbers, so pass `0x37` for the
/// character `7`.
pub fn parse_key(raw: &str) -> std::result::Result<u8, String> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u8::from_str_radix(hex, 16).map_err(|e| format!("invalid hex key '{raw}': {e}"));
    }
    if let Ok(value) = raw.parse::<u8>() {
        return Ok(value);
    }
    if raw.len() == 1 && raw.is_ascii() {
        return Ok(raw.as_bytes()[0]);
    }
    Err(format!("invalid key '{raw}': expected one ASCII character, a decimal byte, or 0x-hex"))
}

/// Totals from one pump run.
#[derive(Debug, Clone, Copy)]
pub struct PumpSummary {
    /// Bytes accepted by the write path.
    pub bytes_in: u64,
    /// Bytes delivered to the sink.
    pub bytes_out: u64,
    /// Blocks that moved through the pipeline.
    pub blocks: u64,
}

/// Stream `source` through `session` into `sink`.
///
/// A scoped writer thread reads block-sized chunks from the source and
/// submits them; the calling thread reads each transformed block back and
/// writes it to the sink. The channel between them carries the accepted
/// length of every submitted block, so the reader knows exactly how many
/// blocks to expect and never races into the early-EOF return. If the sink
/// fails, the session is cancelled so a writer parked on a full input queue
/// is not left waiting forever.
pub fn pump(
    session: &Session<'_>,
    source: &mut (impl Read + Send),
    sink: &mut (impl Write + Send),
    block_len: usize,
) -> Result<PumpSummary> {
    let (block_tx, block_rx) = unbounded::<usize>();
    let token = session.cancel_token();

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || -> Result<(u64, u64)> {
            let mut chunk = vec![0u8; block_len];
            let mut bytes_in = 0u64;
            let mut blocks = 0u64;
            loop {
                let n = match source.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(PipelineError::Transfer(e)),
                };
                let mut offset = 0;
                while offset < n {
                    let accepted = session.write(&chunk[offset..n])?;
                    offset += accepted;
                    bytes_in += accepted as u64;
                    blocks += 1;
                    if block_tx.send(accepted).is_err() {
                        // The reader bailed out; its error takes precedence.
                        return Ok((bytes_in, blocks));
                    }
                }
            }
            Ok((bytes_in, blocks))
        });

        let read_result: Result<u64> = (|| {
            let mut buf = vec![0u8; block_len];
            let mut bytes_out = 0u64;
            for expected in &block_rx {
                let delivered = session.read(&mut buf)?;
                if delivered != expected {
                    return Err(PipelineError::Transfer(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("expected a {expected}-byte block, got {delivered} bytes"),
                    )));
                }
                sink.write_all(&buf[..delivered]).map_err(PipelineError::Transfer)?;
                bytes_out += delivered as u64;
            }
            sink.flush().map_err(PipelineError::Transfer)?;
            Ok(bytes_out)
        })();

        if read_result.is_err() {
            token.cancel();
        }
        drop(block_rx);

        let write_result = writer.join().expect("pump writer thread panicked");
        let bytes_out = read_result?;
        let (bytes_in, blocks) = write_result?;
        Ok(PumpSummary { bytes_in, bytes_out, blocks })
    })
}
