use crate::backend::{fetch_snapshot, TrackingBackend};
use crate::buffer::SampleBuffer;
use crate::error::SampleAbort;
use crate::sampler::{self, CancelToken};
use crate::transform::{convert_to_euler, convert_to_quaternion, EulerPose, QuaternionPose};
use crate::types::{
    ControllerInputs, DeviceClass, DeviceProperty, Matrix34, PoseSnapshot, SlotIndex,
    TrackedPose, TrackingUniverse,
};
use crate::{Result, TrackerError};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Default haptic pulse length in microseconds.
pub const DEFAULT_HAPTIC_DURATION_MICROS: u16 = 1000;

/// A tracked device in one backend slot.
///
/// Property accessors pass straight through to the backend, except the
/// serial number which is cached for the lifetime of the handle.
pub struct TrackedDevice {
    backend: Arc<dyn TrackingBackend>,
    slot: SlotIndex,
    class: DeviceClass,
    universe: TrackingUniverse,
    serial: OnceLock<String>,
}

impl TrackedDevice {
    pub(crate) fn new(
        backend: Arc<dyn TrackingBackend>,
        slot: SlotIndex,
        class: DeviceClass,
        universe: TrackingUniverse,
    ) -> Self {
        Self {
            backend,
            slot,
            class,
            universe,
            serial: OnceLock::new(),
        }
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Base stations and other fixed references.
    pub fn is_tracking_reference(&self) -> bool {
        self.class == DeviceClass::TrackingReference
    }

    fn string_property(&self, property: DeviceProperty) -> Result<String> {
        self.backend
            .get_string_property(self.slot, property)
            .map_err(|reason| TrackerError::PropertyUnavailable {
                slot: self.slot,
                property,
                reason,
            })
    }

    /// Serial number. Queried once, then served from the cache.
    pub fn get_serial(&self) -> Result<String> {
        if let Some(serial) = self.serial.get() {
            return Ok(serial.clone());
        }
        let serial = self.string_property(DeviceProperty::SerialNumber)?;
        Ok(self.serial.get_or_init(|| serial).clone())
    }

    pub fn get_model(&self) -> Result<String> {
        self.string_property(DeviceProperty::ModelNumber)
    }

    /// Mode label of a tracking reference, upper-cased.
    pub fn get_mode(&self) -> Result<String> {
        if !self.is_tracking_reference() {
            return Err(TrackerError::UnsupportedForClass(self.class));
        }
        Ok(self.string_property(DeviceProperty::ModeLabel)?.to_uppercase())
    }

    /// Battery charge in the range 0.0..=1.0.
    pub fn get_battery_percent(&self) -> Result<f32> {
        let property = DeviceProperty::BatteryPercentage;
        self.backend
            .get_float_property(self.slot, property)
            .map_err(|reason| TrackerError::PropertyUnavailable {
                slot: self.slot,
                property,
                reason,
            })
    }

    pub fn is_charging(&self) -> Result<bool> {
        let property = DeviceProperty::IsCharging;
        self.backend
            .get_bool_property(self.slot, property)
            .map_err(|reason| TrackerError::PropertyUnavailable {
                slot: self.slot,
                property,
                reason,
            })
    }

    /// Apply `f` to this slot's pose from `snapshot`, fetching a fresh
    /// snapshot when none is given. `Ok(None)` when the pose is not valid.
    fn with_valid_pose<T>(
        &self,
        snapshot: Option<&PoseSnapshot>,
        f: impl FnOnce(&TrackedPose) -> T,
    ) -> Result<Option<T>> {
        let fetched;
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                fetched = fetch_snapshot(self.backend.as_ref(), self.universe)?;
                &fetched
            }
        };
        Ok(snapshot.valid_pose(self.slot).map(f))
    }

    /// `[x, y, z]` in meters and yaw/pitch/roll in degrees.
    pub fn get_pose_euler(&self, snapshot: Option<&PoseSnapshot>) -> Result<Option<EulerPose>> {
        self.with_valid_pose(snapshot, |p| convert_to_euler(&p.device_to_world))
    }

    pub fn get_pose_matrix(&self, snapshot: Option<&PoseSnapshot>) -> Result<Option<Matrix34>> {
        self.with_valid_pose(snapshot, |p| p.device_to_world)
    }

    pub fn get_velocity(&self, snapshot: Option<&PoseSnapshot>) -> Result<Option<[f64; 3]>> {
        self.with_valid_pose(snapshot, |p| p.velocity)
    }

    pub fn get_angular_velocity(
        &self,
        snapshot: Option<&PoseSnapshot>,
    ) -> Result<Option<[f64; 3]>> {
        self.with_valid_pose(snapshot, |p| p.angular_velocity)
    }

    pub fn get_pose_quaternion(
        &self,
        snapshot: Option<&PoseSnapshot>,
    ) -> Result<Option<QuaternionPose>> {
        self.with_valid_pose(snapshot, |p| convert_to_quaternion(&p.device_to_world))
    }

    /// Trigger, trackpad and button state of a controller.
    pub fn get_controller_inputs(&self) -> Result<ControllerInputs> {
        let (ok, state) = self.backend.get_controller_state(self.slot);
        if !ok {
            return Err(TrackerError::ControllerStateUnavailable(self.slot));
        }
        Ok(ControllerInputs::from(&state))
    }

    /// Vibrate for `duration_micros` on haptic axis `axis`.
    pub fn trigger_haptic_pulse(&self, duration_micros: u16, axis: u32) {
        self.backend.trigger_haptic_pulse(self.slot, axis, duration_micros);
    }

    /// Sample this device's pose `num_samples` times at `rate_hz`.
    pub fn sample(
        &self,
        num_samples: usize,
        rate_hz: f64,
    ) -> std::result::Result<SampleBuffer, SampleAbort> {
        self.run_sampling(num_samples, rate_hz, None)
    }

    /// Like [`sample`](Self::sample), stopping early once `cancel` fires.
    pub fn sample_until(
        &self,
        num_samples: usize,
        rate_hz: f64,
        cancel: &CancelToken,
    ) -> std::result::Result<SampleBuffer, SampleAbort> {
        self.run_sampling(num_samples, rate_hz, Some(cancel))
    }

    fn run_sampling(
        &self,
        num_samples: usize,
        rate_hz: f64,
        cancel: Option<&CancelToken>,
    ) -> std::result::Result<SampleBuffer, SampleAbort> {
        if self.is_tracking_reference() {
            log::warn!(
                "Slot {} is a tracking reference; references do not move, sampling is pointless",
                self.slot
            );
        }
        sampler::sample_slot(
            self.backend.as_ref(),
            self.universe,
            self.slot,
            num_samples,
            rate_hz,
            cancel,
        )
    }
}

impl fmt::Debug for TrackedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedDevice")
            .field("slot", &self.slot)
            .field("class", &self.class)
            .field("universe", &self.universe)
            .field("serial", &self.serial.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockDevice};
    use crate::transform::tests::rotation;
    use crate::types::{ButtonMask, ControllerState, PropertyError};

    fn handle(backend: &Arc<MockBackend>, slot: SlotIndex, class: DeviceClass) -> TrackedDevice {
        TrackedDevice::new(backend.clone(), slot, class, TrackingUniverse::Standing)
    }

    #[test]
    fn test_serial_is_cached() {
        let backend = Arc::new(
            MockBackend::new().with_device(3, MockDevice::new(DeviceClass::Tracker, "LHR-1")),
        );
        let device = handle(&backend, 3, DeviceClass::Tracker);
        assert_eq!(device.get_serial().unwrap(), "LHR-1");
        assert_eq!(device.get_serial().unwrap(), "LHR-1");
        assert_eq!(backend.string_queries(3, DeviceProperty::SerialNumber), 1);
    }

    #[test]
    fn test_serial_failure_is_not_cached() {
        let backend = Arc::new(MockBackend::new());
        let device = handle(&backend, 1, DeviceClass::Controller);
        assert!(device.get_serial().is_err());
        backend.connect_device(1, MockDevice::new(DeviceClass::Controller, "LHR-2"));
        assert_eq!(device.get_serial().unwrap(), "LHR-2");
    }

    #[test]
    fn test_uncached_properties() {
        let backend = Arc::new(MockBackend::new().with_device(
            0,
            MockDevice::new(DeviceClass::Controller, "C-1")
                .with_model("Knuckles")
                .with_battery(0.42, true),
        ));
        let device = handle(&backend, 0, DeviceClass::Controller);
        assert_eq!(device.get_model().unwrap(), "Knuckles");
        assert_eq!(device.get_battery_percent().unwrap(), 0.42);
        assert!(device.is_charging().unwrap());
        device.get_model().unwrap();
        assert_eq!(backend.string_queries(0, DeviceProperty::ModelNumber), 2);
    }

    #[test]
    fn test_property_unavailable_after_disconnect() {
        let backend = Arc::new(
            MockBackend::new().with_device(0, MockDevice::new(DeviceClass::Hmd, "H-1")),
        );
        let device = handle(&backend, 0, DeviceClass::Hmd);
        backend.disconnect_device(0);
        match device.get_battery_percent() {
            Err(TrackerError::PropertyUnavailable { slot, property, reason }) => {
                assert_eq!(slot, 0);
                assert_eq!(property, DeviceProperty::BatteryPercentage);
                assert_eq!(reason, PropertyError::InvalidDevice);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mode_only_for_references() {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(0, MockDevice::new(DeviceClass::TrackingReference, "LHB-1"))
                .with_device(1, MockDevice::new(DeviceClass::Tracker, "T-1")),
        );
        assert_eq!(handle(&backend, 0, DeviceClass::TrackingReference).get_mode().unwrap(), "B");
        assert!(matches!(
            handle(&backend, 1, DeviceClass::Tracker).get_mode(),
            Err(TrackerError::UnsupportedForClass(DeviceClass::Tracker))
        ));
    }

    #[test]
    fn test_pose_accessors() {
        let m = rotation(0.5, 0.0, 0.0, [1.0, 2.0, 3.0]);
        let backend = Arc::new(MockBackend::new().with_device(
            2,
            MockDevice::new(DeviceClass::Tracker, "T-1").with_matrix(m),
        ));
        backend.set_velocity(2, [0.1, 0.2, 0.3], [0.0, 0.0, 1.0]);
        let device = handle(&backend, 2, DeviceClass::Tracker);

        let euler = device.get_pose_euler(None).unwrap().unwrap();
        assert_eq!(euler.position(), [1.0, 2.0, 3.0]);
        assert!((euler.yaw - 0.5f64.to_degrees()).abs() < 1e-9);
        assert_eq!(device.get_pose_matrix(None).unwrap(), Some(m));
        assert_eq!(device.get_velocity(None).unwrap(), Some([0.1, 0.2, 0.3]));
        assert_eq!(device.get_angular_velocity(None).unwrap(), Some([0.0, 0.0, 1.0]));
        let q = device.get_pose_quaternion(None).unwrap().unwrap();
        assert!((q.qz - 0.25f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_shared_snapshot_avoids_fetch() {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(0, MockDevice::new(DeviceClass::Hmd, "H-1"))
                .with_device(1, MockDevice::new(DeviceClass::Controller, "C-1")),
        );
        let snapshot = fetch_snapshot(backend.as_ref(), TrackingUniverse::Standing).unwrap();
        let hmd = handle(&backend, 0, DeviceClass::Hmd);
        let controller = handle(&backend, 1, DeviceClass::Controller);
        assert!(hmd.get_pose_euler(Some(&snapshot)).unwrap().is_some());
        assert!(controller.get_pose_quaternion(Some(&snapshot)).unwrap().is_some());
        assert_eq!(backend.pose_fetches(), 1);
    }

    #[test]
    fn test_invalid_pose_is_no_data() {
        let backend = Arc::new(
            MockBackend::new().with_device(0, MockDevice::new(DeviceClass::Controller, "C-1")),
        );
        backend.set_pose_valid(0, false);
        let device = handle(&backend, 0, DeviceClass::Controller);
        assert!(device.get_pose_euler(None).unwrap().is_none());
        assert!(device.get_pose_matrix(None).unwrap().is_none());
        assert!(device.get_velocity(None).unwrap().is_none());
        assert!(device.get_angular_velocity(None).unwrap().is_none());
        assert!(device.get_pose_quaternion(None).unwrap().is_none());
    }

    #[test]
    fn test_pose_fetch_fault_is_error() {
        let backend =
            Arc::new(MockBackend::new().with_device(0, MockDevice::new(DeviceClass::Hmd, "H-1")));
        backend.fail_poses_after(0);
        let device = handle(&backend, 0, DeviceClass::Hmd);
        assert!(matches!(device.get_pose_euler(None), Err(TrackerError::Backend(_))));
    }

    #[test]
    fn test_controller_inputs_and_haptics() {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(0, MockDevice::new(DeviceClass::Controller, "C-1"))
                .with_device(1, MockDevice::new(DeviceClass::Tracker, "T-1")),
        );
        backend.set_controller_state(
            0,
            Some(ControllerState {
                buttons_pressed: ButtonMask::GRIP,
                ..Default::default()
            }),
        );
        let controller = handle(&backend, 0, DeviceClass::Controller);
        assert!(controller.get_controller_inputs().unwrap().grip_button);
        assert!(matches!(
            handle(&backend, 1, DeviceClass::Tracker).get_controller_inputs(),
            Err(TrackerError::ControllerStateUnavailable(1))
        ));

        controller.trigger_haptic_pulse(DEFAULT_HAPTIC_DURATION_MICROS, 0);
        assert_eq!(backend.haptic_pulses(), vec![(0, 0, 1000)]);
    }

    #[test]
    fn test_reference_sampling_still_samples() {
        let backend = Arc::new(
            MockBackend::new()
                .with_device(0, MockDevice::new(DeviceClass::TrackingReference, "LHB-1")),
        );
        let device = handle(&backend, 0, DeviceClass::TrackingReference);
        let buffer = device.sample(3, 1000.0).unwrap();
        assert_eq!(buffer.len(), 3);
    }
}
