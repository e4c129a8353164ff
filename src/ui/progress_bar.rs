//! Terminal progress bar for the CLI driver. Adapted from the block-
//! character ANSI bar this engine's ancestor drew in its own `ui`
//! module — kept the bar and the speed/ETA readout, dropped the cat.

use std::io::{self, Write};
use std::time::Instant;

pub struct ProgressBar {
    width: usize,
    start: Instant,
    first_render: bool,
}

impl ProgressBar {
    /// `width` is the number of bar character slots, not counting brackets.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            start: Instant::now(),
            first_render: true,
        }
    }

    /// `progress` is 0.0..=100.0. `bytes_done`/`bytes_total` drive the
    /// speed and ETA readout when both are present.
    pub fn render(&mut self, progress: f64, bytes_done: Option<u64>, bytes_total: Option<u64>, message: &str) {
        let pct = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };

        let filled = ((pct / 100.0) * self.width as f64).round() as usize;
        let empty = self.width.saturating_sub(filled);

        let green = "\x1b[38;5;82m";
        let gray = "\x1b[38;5;240m";
        let cyan = "\x1b[38;5;51m";
        let bold = "\x1b[1m";
        let reset = "\x1b[0m";

        let bar_filled = "█".repeat(filled);
        let bar_empty = "░".repeat(empty);
        let bar = format!("{bold}{green}{bar_filled}{reset}{gray}{bar_empty}{reset}");

        let info = if let (Some(done), Some(total)) = (bytes_done, bytes_total) {
            let elapsed = self.start.elapsed().as_secs_f64().max(0.0001);
            let speed = done as f64 / elapsed;
            let remaining = total.saturating_sub(done);
            let eta_secs = if speed > 0.0 {
                (remaining as f64 / speed).round() as u64
            } else {
                0
            };
            format!(
                "{bold}{pct:.1}%{reset}  {cyan}{}/s{reset}  ETA {}  {message}",
                human_bytes(speed),
                format_duration(eta_secs)
            )
        } else {
            format!("{bold}{pct:.1}%{reset}  {cyan}{message}{reset}")
        };

        if self.first_render {
            print!("[{bar}] {info}\n");
            self.first_render = false;
        } else {
            print!("\x1b[1A\x1b[2K\r[{bar}] {info}\n");
        }
        io::stdout().flush().ok();
    }

    pub fn finish(&mut self, message: &str) {
        if !self.first_render {
            print!("\x1b[1A\x1b[2K\r");
        }
        println!("{message}");
        io::stdout().flush().ok();
    }
}

pub fn human_bytes(bps: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if bps <= 0.0 {
        return "0B".to_string();
    }
    let mut val = bps;
    let mut i = 0usize;
    while val >= 1024.0 && i + 1 < units.len() {
        val /= 1024.0;
        i += 1;
    }
    format!("{:.2}{}", val, units[i])
}

pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
