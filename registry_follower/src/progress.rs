use chrono::{DateTime, Duration, Utc};
use std::io::{self, Write};

// Erase the current terminal line and return to column 0.
const REDRAW: &str = "\x1b[2K\r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub processed: u64,
    pub stored: u64,
    pub started_at: DateTime<Utc>,
}

impl PumpStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        PumpStats {
            processed: 0,
            stored: 0,
            started_at,
        }
    }
}

/// `HH:MM:SS`; hours keep counting past 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Events per second over whole elapsed seconds, truncated to two decimals.
/// Zero until the first full second has passed.
pub fn rate_per_sec(processed: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.num_seconds();
    if secs <= 0 {
        return 0.0;
    }
    (processed * 100 / secs as u64) as f64 / 100.0
}

pub fn status_line(stats: &PumpStats, now: DateTime<Utc>) -> String {
    let elapsed = now - stats.started_at;
    format!(
        "Processed ({}), Stored ({}), Time spent ({}), {:.2}/s.",
        stats.processed,
        stats.stored,
        format_elapsed(elapsed),
        rate_per_sec(stats.processed, elapsed)
    )
}

/// Redraws a single status line on the operator stream every `stride` processed events.
pub struct ProgressReporter<W: Write> {
    out: W,
    stride: u64,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, stride: u64) -> Self {
        ProgressReporter {
            out,
            stride: stride.max(1),
        }
    }

    /// Returns whether a line was written.
    pub fn tick(&mut self, stats: &PumpStats) -> io::Result<bool> {
        self.tick_at(stats, Utc::now())
    }

    pub fn tick_at(&mut self, stats: &PumpStats, now: DateTime<Utc>) -> io::Result<bool> {
        if stats.processed == 0 || !stats.processed.is_multiple_of(self.stride) {
            return Ok(false);
        }
        write!(self.out, "{}{}", REDRAW, status_line(stats, now))?;
        self.out.flush()?;
        Ok(true)
    }

    pub fn finish(&mut self, stats: &PumpStats) -> io::Result<()> {
        writeln!(
            self.out,
            "{}Done! Processed ({}), Stored ({}).",
            REDRAW, stats.processed, stats.stored
        )?;
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}
