//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! 🚀 Keeps the run's one piece of state: how many rows have made it, chunk by chunk.
//! Logs a line after every chunk, and at the end hands back a [`RunSummary`] that
//! renders as a table so comfy it has lumbar support.
//!
//! ⚠️ Only the transfer loop touches this, and only after a chunk fully resolves.
//! No concurrent writers, no atomics, no drama. 🦆

use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use tracing::info;

/// 🔢 Formats a number with commas. "1000000" → "1,000,000" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🧮 The running tally for one run.
#[derive(Debug)]
pub struct TransferProgress {
    rows_transferred: u64,
    chunks_completed: u64,
    start_time: Instant,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    pub fn new() -> Self {
        Self {
            rows_transferred: 0,
            chunks_completed: 0,
            start_time: Instant::now(),
        }
    }

    pub fn rows_transferred(&self) -> u64 {
        self.rows_transferred
    }

    pub fn chunks_completed(&self) -> u64 {
        self.chunks_completed
    }

    /// ✅ A chunk fully resolved. Count it and say so.
    pub fn record_chunk(&mut self, rows: usize) {
        self.rows_transferred += rows as u64;
        self.chunks_completed += 1;
        info!("{} items transferred", self.rows_transferred);
    }

    /// 🏁 Freeze the tally into a summary.
    pub fn finish(self) -> RunSummary {
        RunSummary {
            rows_transferred: self.rows_transferred,
            chunks: self.chunks_completed,
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// 📜 What a successful run has to show for itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows_transferred: u64,
    pub chunks: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn rows_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rows_transferred as f64 / secs
        } else {
            0.0
        }
    }

    /// 🍽️ Render the summary as a borderless two-column table.
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic);
        let rows = [
            ("📄 Rows transferred", format_number(self.rows_transferred)),
            ("📦 Chunks", format_number(self.chunks)),
            ("⏱️ Elapsed", format_duration(self.elapsed)),
            ("🚀 Rows/sec", format!("{:.1}", self.rows_per_sec())),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table.to_string()
    }
}
