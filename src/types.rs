use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Backend-assigned data channel of a tracked device. Reused across reconnects.
pub type SlotIndex = u32;

/// Number of device slots reported in every pose snapshot.
pub const MAX_TRACKED_DEVICE_COUNT: u32 = 64;

/// 3x4 device-to-world transform: row-major 3x3 rotation with the
/// translation in column 3.
pub type Matrix34 = [[f64; 4]; 3];

pub const IDENTITY_MATRIX: Matrix34 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Functional category of a tracked unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceClass {
    #[serde(rename = "HMD", alias = "Hmd")]
    Hmd,
    Controller,
    Tracker,
    #[serde(rename = "Tracking Reference", alias = "TrackingReference")]
    TrackingReference,
}

impl DeviceClass {
    /// All classes, in the order discovery reports them.
    pub const ALL: [DeviceClass; 4] = [
        DeviceClass::TrackingReference,
        DeviceClass::Hmd,
        DeviceClass::Controller,
        DeviceClass::Tracker,
    ];

    /// Prefix used for auto-generated device names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            DeviceClass::Hmd => "hmd",
            DeviceClass::Controller => "controller",
            DeviceClass::Tracker => "tracker",
            DeviceClass::TrackingReference => "tracking_reference",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceClass::Hmd => "HMD",
            DeviceClass::Controller => "Controller",
            DeviceClass::Tracker => "Tracker",
            DeviceClass::TrackingReference => "Tracking Reference",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unrecognized device class label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown device class: {0}")]
pub struct UnknownDeviceClass(pub String);

impl FromStr for DeviceClass {
    type Err = UnknownDeviceClass;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "HMD" | "Hmd" => Ok(DeviceClass::Hmd),
            "Controller" => Ok(DeviceClass::Controller),
            "Tracker" => Ok(DeviceClass::Tracker),
            "Tracking Reference" | "TrackingReference" => Ok(DeviceClass::TrackingReference),
            other => Err(UnknownDeviceClass(other.to_string())),
        }
    }
}

/// Coordinate space poses are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingUniverse {
    /// Origin relative to the seated zero pose.
    Seated,
    /// World-anchored origin on the floor of the play area.
    #[default]
    Standing,
    /// Uncalibrated driver space.
    RawAndUncalibrated,
}

/// Pose of one slot at the instant a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPose {
    pub connected: bool,
    pub pose_valid: bool,
    pub device_to_world: Matrix34,
    /// Linear velocity [x, y, z] in m/s.
    pub velocity: [f64; 3],
    /// Angular velocity [x, y, z] in rad/s.
    pub angular_velocity: [f64; 3],
}

impl Default for TrackedPose {
    fn default() -> Self {
        Self {
            connected: false,
            pose_valid: false,
            device_to_world: IDENTITY_MATRIX,
            velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
        }
    }
}

/// Poses of every slot, captured by a single backend call.
#[derive(Debug, Clone)]
pub struct PoseSnapshot {
    pub poses: Vec<TrackedPose>,
    pub captured_at: Instant,
}

impl PoseSnapshot {
    pub fn new(poses: Vec<TrackedPose>) -> Self {
        Self {
            poses,
            captured_at: Instant::now(),
        }
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&TrackedPose> {
        self.poses.get(slot as usize)
    }

    /// Pose for `slot` only if the backend marked it valid.
    pub fn valid_pose(&self, slot: SlotIndex) -> Option<&TrackedPose> {
        self.get(slot).filter(|p| p.pose_valid)
    }

    /// Slots whose device is currently connected, in slot order.
    pub fn connected_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.poses
            .iter()
            .enumerate()
            .filter(|(_, p)| p.connected)
            .map(|(i, _)| i as SlotIndex)
    }
}

/// Per-device properties the backend can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceProperty {
    SerialNumber,
    ModelNumber,
    ManufacturerName,
    /// Tracking reference mode label ("B", "C", ...).
    ModeLabel,
    BatteryPercentage,
    IsCharging,
}

/// Why the backend could not answer a property query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("invalid device")]
    InvalidDevice,
    #[error("unknown property")]
    UnknownProperty,
    #[error("wrong data type")]
    WrongDataType,
    #[error("not yet available")]
    NotYetAvailable,
    #[error("backend not initialized")]
    NotInitialized,
}

/// Hot-plug notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connected,
    Disconnected,
    /// Any other backend event type, passed through untouched.
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingEvent {
    pub kind: EventKind,
    pub slot: SlotIndex,
}

bitflags::bitflags! {
    /// Controller button bitfield (pressed or touched word).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ButtonMask: u64 {
        const SYSTEM           = 1 << 0;
        const APPLICATION_MENU = 1 << 1;
        const GRIP             = 1 << 2;
        const DPAD_LEFT        = 1 << 3;
        const DPAD_UP          = 1 << 4;
        const DPAD_RIGHT       = 1 << 5;
        const DPAD_DOWN        = 1 << 6;
        const A                = 1 << 7;
        const PROXIMITY_SENSOR = 1 << 31;
        /// Axis 0, the trackpad on wand controllers.
        const TOUCHPAD         = 1 << 32;
        /// Axis 1, the analog trigger.
        const TRIGGER          = 1 << 33;
        const AXIS2            = 1 << 34;
        const AXIS3            = 1 << 35;
        const AXIS4            = 1 << 36;
    }
}

impl Default for ButtonMask {
    fn default() -> Self {
        ButtonMask::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerAxis {
    pub x: f32,
    pub y: f32,
}

/// Raw controller input state as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub packet_num: u32,
    pub buttons_pressed: ButtonMask,
    pub buttons_touched: ButtonMask,
    pub axes: [ControllerAxis; 5],
}

/// Decoded controller inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerInputs {
    pub packet_num: u32,
    /// 0.0 is fully released. Only the x component of axis 1 is meaningful.
    pub trigger: f32,
    /// -1.0..1.0 on trackpads and joysticks.
    pub trackpad_x: f32,
    pub trackpad_y: f32,
    pub buttons_pressed: u64,
    pub buttons_touched: u64,
    pub menu_button: bool,
    pub trackpad_pressed: bool,
    pub trackpad_touched: bool,
    pub grip_button: bool,
}

impl From<&ControllerState> for ControllerInputs {
    fn from(state: &ControllerState) -> Self {
        // The system button is never reported: pressing it suspends the controller stream.
        Self {
            packet_num: state.packet_num,
            trigger: state.axes[1].x,
            trackpad_x: state.axes[0].x,
            trackpad_y: state.axes[0].y,
            buttons_pressed: state.buttons_pressed.bits(),
            buttons_touched: state.buttons_touched.bits(),
            menu_button: state.buttons_pressed.contains(ButtonMask::APPLICATION_MENU),
            trackpad_pressed: state.buttons_pressed.contains(ButtonMask::TOUCHPAD),
            trackpad_touched: state.buttons_touched.contains(ButtonMask::TOUCHPAD),
            grip_button: state.buttons_pressed.contains(ButtonMask::GRIP),
        }
    }
}
