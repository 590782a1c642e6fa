//! Formatting helpers for log output.
//!
//! Small, dependency-free helpers used by the CLI summaries: thousands
//! separators, byte quantities, and transfer timing.

use std::time::{Duration, Instant};

/// Formats an integer with thousands separators.
///
/// # Examples
///
/// ```
/// use encpipe_lib::logging::format_count;
///
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a byte count in human-readable binary units.
///
/// # Examples
///
/// ```
/// use encpipe_lib::logging::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(2048), "2.0 KiB");
/// assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a byte rate for a transfer of `bytes` over `duration`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_throughput(bytes: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return format!("{}/s", format_bytes(bytes));
    }
    format!("{}/s", format_bytes((bytes as f64 / secs) as u64))
}

/// Times a transfer and logs a one-line summary when finished.
///
/// # Examples
///
/// ```no_run
/// use encpipe_lib::logging::TransferTimer;
///
/// let timer = TransferTimer::new("Encoding");
/// // ... pump bytes ...
/// timer.log_completion(1_048_576, 16);
/// ```
pub struct TransferTimer {
    operation: String,
    start_time: Instant,
}

impl TransferTimer {
    /// Start timing and log the operation start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Log bytes moved, block count, and throughput.
    pub fn log_completion(&self, bytes: u64, blocks: u64) {
        let elapsed = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} block(s) at {}",
            self.operation,
            format_bytes(bytes),
            format_count(blocks),
            format_throughput(bytes, elapsed)
        );
    }
}
