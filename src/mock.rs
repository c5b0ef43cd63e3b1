//! In-memory tracking backend.
//!
//! Devices are scripted per slot. Hot-plug events queue up on a channel and
//! are delivered through [`TrackingBackend::poll_event`]; faults can be
//! injected into initialization and pose fetches.

use crate::backend::TrackingBackend;
use crate::types::{
    ControllerState, DeviceClass, DeviceProperty, EventKind, Matrix34, PropertyError, SlotIndex,
    TrackedPose, TrackingEvent, TrackingUniverse,
};
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A scripted device occupying one slot.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub class: DeviceClass,
    pub serial: String,
    pub model: String,
    pub mode_label: Option<String>,
    pub battery: Option<f32>,
    pub charging: Option<bool>,
    pub pose: TrackedPose,
    pub controller: Option<ControllerState>,
}

impl MockDevice {
    /// Connected device with a valid identity pose.
    pub fn new(class: DeviceClass, serial: impl Into<String>) -> Self {
        let pose = TrackedPose {
            connected: true,
            pose_valid: true,
            ..TrackedPose::default()
        };
        let (mode_label, battery, charging, controller) = match class {
            DeviceClass::TrackingReference => (Some("b".to_string()), None, None, None),
            DeviceClass::Controller => (
                None,
                Some(1.0),
                Some(false),
                Some(ControllerState::default()),
            ),
            DeviceClass::Hmd | DeviceClass::Tracker => (None, Some(1.0), Some(false), None),
        };
        Self {
            class,
            serial: serial.into(),
            model: format!("Mock {}", class),
            mode_label,
            battery,
            charging,
            pose,
            controller,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_matrix(mut self, matrix: Matrix34) -> Self {
        self.pose.device_to_world = matrix;
        self
    }

    pub fn with_battery(mut self, percent: f32, charging: bool) -> Self {
        self.battery = Some(percent);
        self.charging = Some(charging);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    slots: BTreeMap<SlotIndex, MockDevice>,
    fail_initialize: Option<String>,
    /// Pose fetches left before every further fetch fails.
    pose_fetches_before_fault: Option<usize>,
    initialize_calls: usize,
    shutdown_calls: usize,
    pose_fetches: usize,
    string_queries: BTreeMap<(SlotIndex, DeviceProperty), usize>,
    haptic_pulses: Vec<(SlotIndex, u32, u16)>,
}

/// Scriptable [`TrackingBackend`] for tests and demos.
pub struct MockBackend {
    state: Mutex<MockState>,
    event_tx: Sender<TrackingEvent>,
    event_rx: Receiver<TrackingEvent>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Self {
            state: Mutex::new(MockState::default()),
            event_tx,
            event_rx,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Place a device in `slot` without raising a hot-plug event.
    pub fn with_device(self, slot: SlotIndex, device: MockDevice) -> Self {
        self.state().slots.insert(slot, device);
        self
    }

    /// Make the next `initialize` call fail with `message`.
    pub fn fail_initialize(self, message: impl Into<String>) -> Self {
        self.state().fail_initialize = Some(message.into());
        self
    }

    /// Let `count` more pose fetches succeed, then fail all later ones.
    pub fn fail_poses_after(&self, count: usize) {
        self.state().pose_fetches_before_fault = Some(count);
    }

    /// Plug a device into `slot` and queue a connect event.
    pub fn connect_device(&self, slot: SlotIndex, device: MockDevice) {
        self.state().slots.insert(slot, device);
        self.push_event(EventKind::Connected, slot);
    }

    /// Unplug the device in `slot` and queue a disconnect event.
    pub fn disconnect_device(&self, slot: SlotIndex) {
        self.state().slots.remove(&slot);
        self.push_event(EventKind::Disconnected, slot);
    }

    pub fn push_event(&self, kind: EventKind, slot: SlotIndex) {
        // The receiver lives in `self`, so the channel cannot be disconnected.
        let _ = self.event_tx.send(TrackingEvent { kind, slot });
    }

    pub fn set_matrix(&self, slot: SlotIndex, matrix: Matrix34) {
        if let Some(device) = self.state().slots.get_mut(&slot) {
            device.pose.device_to_world = matrix;
        }
    }

    pub fn set_pose_valid(&self, slot: SlotIndex, valid: bool) {
        if let Some(device) = self.state().slots.get_mut(&slot) {
            device.pose.pose_valid = valid;
        }
    }

    pub fn set_velocity(&self, slot: SlotIndex, linear: [f64; 3], angular: [f64; 3]) {
        if let Some(device) = self.state().slots.get_mut(&slot) {
            device.pose.velocity = linear;
            device.pose.angular_velocity = angular;
        }
    }

    pub fn set_controller_state(&self, slot: SlotIndex, state: Option<ControllerState>) {
        if let Some(device) = self.state().slots.get_mut(&slot) {
            device.controller = state;
        }
    }

    pub fn initialize_calls(&self) -> usize {
        self.state().initialize_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state().shutdown_calls
    }

    pub fn pose_fetches(&self) -> usize {
        self.state().pose_fetches
    }

    /// Number of backend queries made for a string property.
    pub fn string_queries(&self, slot: SlotIndex, property: DeviceProperty) -> usize {
        self.state()
            .string_queries
            .get(&(slot, property))
            .copied()
            .unwrap_or(0)
    }

    /// Haptic pulses fired so far as `(slot, axis, duration_micros)`.
    pub fn haptic_pulses(&self) -> Vec<(SlotIndex, u32, u16)> {
        self.state().haptic_pulses.clone()
    }
}

impl TrackingBackend for MockBackend {
    fn initialize(&self) -> std::result::Result<(), String> {
        let mut state = self.state();
        state.initialize_calls += 1;
        match state.fail_initialize.take() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    fn shutdown(&self) {
        self.state().shutdown_calls += 1;
    }

    fn device_class(&self, slot: SlotIndex) -> Option<DeviceClass> {
        self.state().slots.get(&slot).map(|d| d.class)
    }

    fn get_string_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<String, PropertyError> {
        let mut state = self.state();
        *state.string_queries.entry((slot, property)).or_insert(0) += 1;
        let device = state.slots.get(&slot).ok_or(PropertyError::InvalidDevice)?;
        match property {
            DeviceProperty::SerialNumber => Ok(device.serial.clone()),
            DeviceProperty::ModelNumber => Ok(device.model.clone()),
            DeviceProperty::ManufacturerName => Ok("MockVR".to_string()),
            DeviceProperty::ModeLabel => device
                .mode_label
                .clone()
                .ok_or(PropertyError::UnknownProperty),
            DeviceProperty::BatteryPercentage | DeviceProperty::IsCharging => {
                Err(PropertyError::WrongDataType)
            }
        }
    }

    fn get_float_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<f32, PropertyError> {
        let state = self.state();
        let device = state.slots.get(&slot).ok_or(PropertyError::InvalidDevice)?;
        match property {
            DeviceProperty::BatteryPercentage => {
                device.battery.ok_or(PropertyError::UnknownProperty)
            }
            _ => Err(PropertyError::WrongDataType),
        }
    }

    fn get_bool_property(
        &self,
        slot: SlotIndex,
        property: DeviceProperty,
    ) -> std::result::Result<bool, PropertyError> {
        let state = self.state();
        let device = state.slots.get(&slot).ok_or(PropertyError::InvalidDevice)?;
        match property {
            DeviceProperty::IsCharging => device.charging.ok_or(PropertyError::UnknownProperty),
            _ => Err(PropertyError::WrongDataType),
        }
    }

    fn get_poses(
        &self,
        _universe: TrackingUniverse,
        slot_count: u32,
    ) -> std::result::Result<Vec<TrackedPose>, String> {
        let mut state = self.state();
        if let Some(remaining) = state.pose_fetches_before_fault.as_mut() {
            if *remaining == 0 {
                return Err("tracking runtime stopped responding".to_string());
            }
            *remaining -= 1;
        }
        state.pose_fetches += 1;

        let mut poses = vec![TrackedPose::default(); slot_count as usize];
        for (&slot, device) in &state.slots {
            if let Some(pose) = poses.get_mut(slot as usize) {
                *pose = device.pose;
            }
        }
        Ok(poses)
    }

    fn poll_event(&self) -> Option<TrackingEvent> {
        self.event_rx.try_recv().ok()
    }

    fn get_controller_state(&self, slot: SlotIndex) -> (bool, ControllerState) {
        match self.state().slots.get(&slot).and_then(|d| d.controller) {
            Some(controller) => (true, controller),
            None => (false, ControllerState::default()),
        }
    }

    fn trigger_haptic_pulse(&self, slot: SlotIndex, axis: u32, duration_micros: u16) {
        self.state().haptic_pulses.push((slot, axis, duration_micros));
    }
}
