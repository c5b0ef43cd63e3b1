use crate::backend::{fetch_snapshot, TrackingBackend};
use crate::buffer::SampleBuffer;
use crate::error::SampleAbort;
use crate::types::{SlotIndex, TrackingUniverse};
use crate::TrackerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on the samples reserved before a run starts. Longer runs grow
/// the buffer as they go.
const MAX_PREALLOCATED_SAMPLES: usize = 4096;

/// Cooperative stop signal for a sampling run.
///
/// Clones share the same flag, so one can be handed to a signal handler or
/// another thread while the run holds the other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Time between samples for `rate_hz`, rejecting rates that are not
/// positive or not representable.
fn sample_interval(rate_hz: f64) -> Result<Duration, TrackerError> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return Err(TrackerError::InvalidSampleRate(rate_hz));
    }
    Duration::try_from_secs_f64(1.0 / rate_hz).map_err(|_| TrackerError::InvalidSampleRate(rate_hz))
}

/// Sample one slot `num_samples` times at `rate_hz`.
///
/// Each iteration fetches a fresh snapshot, appends the slot's matrix with
/// the time since the run began, then sleeps off whatever is left of the
/// interval. Only per-iteration cost is compensated, so long runs drift
/// below the target rate.
///
/// Cancellation is checked between iterations and returns the samples taken
/// so far. A backend fault aborts the run with the partial buffer attached.
pub(crate) fn sample_slot(
    backend: &dyn TrackingBackend,
    universe: TrackingUniverse,
    slot: SlotIndex,
    num_samples: usize,
    rate_hz: f64,
    cancel: Option<&CancelToken>,
) -> Result<SampleBuffer, SampleAbort> {
    let mut buffer = SampleBuffer::with_capacity(num_samples.min(MAX_PREALLOCATED_SAMPLES));
    let interval = match sample_interval(rate_hz) {
        Ok(interval) => interval,
        Err(error) => return Err(SampleAbort { buffer, error }),
    };

    log::debug!(
        "Sampling slot {}: {} samples at {} Hz",
        slot,
        num_samples,
        rate_hz
    );

    let run_start = Instant::now();
    for i in 0..num_samples {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            log::info!("Sampling slot {} cancelled after {} samples", slot, i);
            break;
        }

        let start = Instant::now();
        let snapshot = match fetch_snapshot(backend, universe) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::warn!("Sampling slot {} aborted at sample {}: {}", slot, i, error);
                return Err(SampleAbort { buffer, error });
            }
        };
        let pose = match snapshot.get(slot) {
            Some(pose) => pose,
            None => {
                let error =
                    TrackerError::Backend(format!("slot {} missing from pose snapshot", slot));
                return Err(SampleAbort { buffer, error });
            }
        };
        buffer.append(&pose.device_to_world, run_start.elapsed().as_secs_f64());
        log::trace!("slot {} sample {} pose_valid={}", slot, i, pose.pose_valid);

        if let Some(remaining) = interval.checked_sub(start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    Ok(buffer)
}
