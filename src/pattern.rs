//! Pattern Writer (C3): streams a `PassPlan` into an exclusively-held
//! device, sector-aligned, honoring cancellation and emitting throttled
//! progress events.

use crate::error::{EngineError, EngineResult};
use crate::model::{Phase, ProgressEvent};
use crate::progress::{CancellationToken, ProgressSink};
use crate::volume::WipeHandle;
use log::warn;
use rand::{RngCore, SeedableRng};
use rand::rngs::{OsRng, StdRng};
use std::thread;
use std::time::Duration;

const RETRY_BACKOFFS_MS: [u64; 3] = [10, 40, 160];

pub struct PatternWriter {
    buffer_size: usize,
    test_mode: bool,
}

impl PatternWriter {
    pub fn new(buffer_size: usize, test_mode: bool) -> Self {
        Self { buffer_size, test_mode }
    }

    /// Executes one pass over the whole device. Returns `Ok(true)` if the
    /// pass completed, `Ok(false)` if cancellation was observed before
    /// completion.
    #[allow(clippy::too_many_arguments)]
    pub fn write_pass(
        &self,
        handle: &mut WipeHandle,
        pass: &crate::model::PassSpec,
        pass_index: u32,
        pass_total: u32,
        cancel: &CancellationToken,
        sink: &ProgressSink,
        bytes_before: u64,
        bytes_total_all_passes: u64,
    ) -> EngineResult<bool> {
        let size_bytes = handle.size_bytes();
        let sector_size = handle.sector_size() as u64;
        let mut buffer = vec![0u8; self.buffer_size];
        self.fill_buffer(&mut buffer, pass);

        let mut bytes_done: u64 = 0;
        let mut last_emitted_pct: f64 = -1.0;

        while bytes_done < size_bytes {
            if cancel.is_cancelled() {
                sink.emit(ProgressEvent {
                    pass_index,
                    pass_total,
                    bytes_done: bytes_before + bytes_done,
                    bytes_total: bytes_total_all_passes,
                    phase: Phase::Writing,
                    message: "cancelled".to_string(),
                });
                return Ok(false);
            }

            let remaining = size_bytes - bytes_done;
            let mut chunk_len = remaining.min(self.buffer_size as u64);
            // keep the final, short write sector-aligned by rounding up to
            // the next sector boundary (may write up to one sector past
            // logical end, which is permitted).
            if chunk_len < sector_size {
                chunk_len = sector_size;
            } else if chunk_len % sector_size != 0 {
                chunk_len = (chunk_len / sector_size + 1) * sector_size;
            }
            let chunk_len = chunk_len.min(buffer.len() as u64) as usize;

            self.write_with_retry(handle, bytes_done, &buffer[..chunk_len])?;

            bytes_done += chunk_len as u64;

            let plan_bytes_done = bytes_before + bytes_done.min(size_bytes);
            let pct = (plan_bytes_done as f64 / bytes_total_all_passes.max(1) as f64) * 100.0;
            if pct - last_emitted_pct >= 1.0 || bytes_done >= size_bytes {
                sink.emit(ProgressEvent {
                    pass_index,
                    pass_total,
                    bytes_done: plan_bytes_done,
                    bytes_total: bytes_total_all_passes,
                    phase: Phase::Writing,
                    message: format!("pass {pass_index}/{pass_total}"),
                });
                last_emitted_pct = pct;
            }
        }

        handle.raw.sync().map_err(EngineError::Io)?;
        Ok(true)
    }

    fn fill_buffer(&self, buffer: &mut [u8], pass: &crate::model::PassSpec) {
        match pass {
            crate::model::PassSpec::Zeros => buffer.fill(0x00),
            crate::model::PassSpec::Ones => buffer.fill(0xFF),
            crate::model::PassSpec::RandomStream(seed) => {
                if self.test_mode {
                    let mut rng = StdRng::seed_from_u64(*seed);
                    rng.fill_bytes(buffer);
                } else {
                    OsRng.fill_bytes(buffer);
                }
            }
            crate::model::PassSpec::FixedPattern(pattern) => {
                if pattern.is_empty() {
                    buffer.fill(0);
                } else {
                    for (i, byte) in buffer.iter_mut().enumerate() {
                        *byte = pattern[i % pattern.len()];
                    }
                }
            }
        }
    }

    fn write_with_retry(&self, handle: &mut WipeHandle, offset: u64, buf: &[u8]) -> EngineResult<()> {
        let mut attempt = 0usize;
        loop {
            match handle.raw.write_at(offset, buf) {
                Ok(()) => return Ok(()),
                Err(e) if is_transient(&e) && attempt < RETRY_BACKOFFS_MS.len() => {
                    warn!(
                        "transient write error at offset {offset} (attempt {}): {e}",
                        attempt + 1
                    );
                    thread::sleep(Duration::from_millis(RETRY_BACKOFFS_MS[attempt]));
                    attempt += 1;
                }
                Err(e) => {
                    return Err(EngineError::WriteFailed {
                        offset,
                        underlying: e.to_string(),
                    })
                }
            }
        }
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
    )
}
