//! # vrtrack - tracked device registry for room-scale VR systems
//!
//! Wraps a tracking runtime behind the [`TrackingBackend`] trait. Provides:
//! - Discovery of HMDs, controllers, trackers and tracking references, with
//!   stable per-class names (`controller_1`, `tracker_2`, ...) or names
//!   assigned by serial in a JSON config
//! - Hot-plug handling through the backend event queue
//! - Pose queries as matrices, Euler angles or quaternions
//! - Fixed-rate pose sampling into a column-oriented [`SampleBuffer`]
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use vrtrack::mock::{MockBackend, MockDevice};
//! use vrtrack::{DeviceClass, Registry};
//!
//! let backend = MockBackend::new()
//!     .with_device(0, MockDevice::new(DeviceClass::Controller, "LHR-00000001"));
//! let registry = Registry::new(Arc::new(backend), None).unwrap();
//!
//! let controller = registry.device("controller_1").unwrap();
//! if let Some(pose) = controller.get_pose_euler(None).unwrap() {
//!     println!("pos: {:?} yaw: {:.1}", pose.position(), pose.yaw);
//! }
//! let samples = controller.sample(250, 250.0).unwrap();
//! println!("{} samples", samples.len());
//! ```

pub mod error;
pub mod types;
pub mod transform;
pub mod backend;
pub mod mock;
pub mod buffer;
pub mod sampler;
pub mod device;
pub mod config;
pub mod registry;

pub use backend::TrackingBackend;
pub use buffer::SampleBuffer;
pub use config::{DeviceAssignment, TrackerConfig};
pub use device::TrackedDevice;
pub use error::{SampleAbort, TrackerError};
pub use registry::{Registry, RegistryChange};
pub use sampler::CancelToken;
pub use transform::{convert_to_euler, convert_to_quaternion, EulerPose, QuaternionPose};
pub use types::*;

/// Result type alias for vrtrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
