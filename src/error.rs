use crate::buffer::SampleBuffer;
use crate::types::{DeviceClass, DeviceProperty, PropertyError, SlotIndex};

/// Errors that can occur when talking to the tracking system.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Tracking backend failed to initialize: {0}")]
    BackendInit(String),

    #[error("Tracked device index {0} not valid")]
    InvalidDeviceIndex(SlotIndex),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Property {property:?} unavailable on slot {slot}: {reason}")]
    PropertyUnavailable {
        slot: SlotIndex,
        property: DeviceProperty,
        reason: PropertyError,
    },

    #[error("Controller state unavailable on slot {0}")]
    ControllerStateUnavailable(SlotIndex),

    #[error("Operation not supported for {0} devices")]
    UnsupportedForClass(DeviceClass),

    #[error("Device name already in use: {0}")]
    NameInUse(String),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to read config: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// A sampling run that stopped on a backend fault.
///
/// Samples appended before the fault are kept in `buffer`.
#[derive(Debug, thiserror::Error)]
#[error("Sampling aborted after {} samples: {}", .buffer.len(), .error)]
pub struct SampleAbort {
    pub buffer: SampleBuffer,
    #[source]
    pub error: TrackerError,
}

impl SampleAbort {
    /// Discard the partial buffer and keep only the fault.
    pub fn into_error(self) -> TrackerError {
        self.error
    }
}
