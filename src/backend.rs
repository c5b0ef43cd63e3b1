use crate::types::{
    ControllerState, DeviceClass, DeviceProperty, PoseSnapshot, PropertyError, SlotIndex,
    TrackedPose, TrackingEvent, TrackingUniverse, MAX_TRACKED_DEVICE_COUNT,
};
use crate::{Result, TrackerError};

/// Connection to the tracking runtime.
///
/// Implementations own the hardware session and use interior mutability,
/// so one backend can be shared by the registry and every device handle.
pub trait TrackingBackend: Send + Sync {
    /// Start the session. Called once by the registry before any query.
    fn initialize(&self) -> std::result::Result<(), String>;

    /// End the session. Called once when the registry is dropped.
    fn shutdown(&self);

    /// Class of the device in `slot`, or `None` for empty slots and
    /// device kinds that are not tracked.
    fn device_class(&self, slot: SlotIndex) -> Option<DeviceClass>;

    fn get_string_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<String, PropertyError>;

    fn get_float_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<f32, PropertyError>;

    fn get_bool_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<bool, PropertyError>;

    /// Device-to-world poses for slots `0..slot_count`.
    fn get_poses(
        &self,
        universe: TrackingUniverse,
        slot_count: u32,
    ) -> std::result::Result<Vec<TrackedPose>, String>;

    /// Next pending hot-plug event, if any.
    fn poll_event(&self) -> Option<TrackingEvent>;

    /// Controller input state. The flag is false when the slot has no
    /// controller state to report.
    fn get_controller_state(&self, slot: SlotIndex) -> (bool, ControllerState);

    fn trigger_haptic_pulse(&self, slot: SlotIndex, axis: u32, duration_micros: u16);
}

/// Fetch poses for every slot as one snapshot.
pub fn fetch_snapshot(
    backend: &dyn TrackingBackend,
    universe: TrackingUniverse,
) -> Result<PoseSnapshot> {
    let poses = backend
        .get_poses(universe, MAX_TRACKED_DEVICE_COUNT)
        .map_err(TrackerError::Backend)?;
    Ok(PoseSnapshot::new(poses))
}
