use crate::backend::{fetch_snapshot, TrackingBackend};
use crate::config::TrackerConfig;
use crate::device::TrackedDevice;
use crate::types::{
    DeviceClass, DeviceProperty, EventKind, PoseSnapshot, SlotIndex, TrackingUniverse,
};
use crate::{Result, TrackerError};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// A change applied to the registry while processing hot-plug events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added {
        slot: SlotIndex,
        name: String,
        class: DeviceClass,
    },
    Removed {
        slot: SlotIndex,
        name: String,
        class: DeviceClass,
    },
}

/// Named view over every tracked device.
///
/// Three indexes are kept in step: slot to name, name to handle, and the
/// per-class name lists in assignment order. The registry owns the backend
/// session and shuts it down when dropped.
pub struct Registry {
    backend: Arc<dyn TrackingBackend>,
    universe: TrackingUniverse,
    devices: HashMap<String, TrackedDevice>,
    names_by_class: BTreeMap<DeviceClass, Vec<String>>,
    slot_names: BTreeMap<SlotIndex, String>,
}

impl Registry {
    /// Initialize `backend` and register every connected device.
    ///
    /// Devices whose serial appears in `config` get the configured name and
    /// class; all others are named `<class>_<n>` in slot order.
    pub fn new(backend: Arc<dyn TrackingBackend>, config: Option<&TrackerConfig>) -> Result<Self> {
        backend.initialize().map_err(TrackerError::BackendInit)?;
        log::info!("Tracking backend initialized");

        let mut registry = Registry {
            backend,
            universe: config.map(|c| c.universe).unwrap_or_default(),
            devices: HashMap::new(),
            names_by_class: DeviceClass::ALL.iter().map(|&c| (c, Vec::new())).collect(),
            slot_names: BTreeMap::new(),
        };

        let snapshot = registry.get_pose()?;
        for slot in snapshot.connected_slots() {
            let assigned = config.and_then(|c| registry.configured_assignment(slot, c));
            match assigned {
                Some((name, class)) => {
                    registry.insert(slot, name, class);
                }
                None => {
                    registry.add_tracked_device(slot);
                }
            }
        }

        log::info!("Registry ready with {} device(s)", registry.len());
        Ok(registry)
    }

    /// Load the JSON config at `path`, then build the registry with it.
    pub fn from_config_file(
        backend: Arc<dyn TrackingBackend>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let config = TrackerConfig::load(path)?;
        Self::new(backend, Some(&config))
    }

    /// Build the registry with the config named by `VRTRACK_CONFIG`, if any.
    pub fn from_env(backend: Arc<dyn TrackingBackend>) -> Result<Self> {
        let config = TrackerConfig::from_env()?;
        Self::new(backend, config.as_ref())
    }

    /// Configured name and class for the device in `slot`, if its serial is
    /// listed and the name is still free.
    fn configured_assignment(
        &self,
        slot: SlotIndex,
        config: &TrackerConfig,
    ) -> Option<(String, DeviceClass)> {
        let serial = match self.backend.get_string_property(slot, DeviceProperty::SerialNumber) {
            Ok(serial) => serial,
            Err(e) => {
                log::warn!("Cannot read serial of slot {}: {}; auto-naming it", slot, e);
                return None;
            }
        };
        let assignment = config.assignment_for_serial(&serial)?;
        if self.devices.contains_key(&assignment.name) {
            log::warn!(
                "Configured name {} for serial {} already in use; auto-naming slot {}",
                assignment.name,
                serial,
                slot
            );
            return None;
        }
        if let Some(reported) = self.backend.device_class(slot) {
            if reported != assignment.class {
                log::warn!(
                    "Serial {} configured as {} but backend reports {}",
                    serial,
                    assignment.class,
                    reported
                );
            }
        }
        Some((assignment.name.clone(), assignment.class))
    }

    /// First free `<prefix>_<n>` name, starting from one past the class count.
    fn next_auto_name(&self, class: DeviceClass) -> String {
        let mut n = self.device_names(class).len() + 1;
        loop {
            let name = format!("{}_{}", class.name_prefix(), n);
            if !self.devices.contains_key(&name) {
                return name;
            }
            n += 1;
        }
    }

    fn insert(&mut self, slot: SlotIndex, name: String, class: DeviceClass) -> RegistryChange {
        log::info!("Tracking {} ({}) on slot {}", name, class, slot);
        let device = TrackedDevice::new(self.backend.clone(), slot, class, self.universe);
        self.names_by_class.entry(class).or_default().push(name.clone());
        self.slot_names.insert(slot, name.clone());
        self.devices.insert(name.clone(), device);
        RegistryChange::Added { slot, name, class }
    }

    /// Auto-name and register the device in `slot`.
    ///
    /// Returns `None` if the slot is already tracked or holds a device class
    /// that is not tracked.
    pub fn add_tracked_device(&mut self, slot: SlotIndex) -> Option<RegistryChange> {
        if let Some(name) = self.slot_names.get(&slot) {
            log::debug!("Slot {} already tracked as {}", slot, name);
            return None;
        }
        let Some(class) = self.backend.device_class(slot) else {
            log::debug!("Slot {} has no trackable device class", slot);
            return None;
        };
        let name = self.next_auto_name(class);
        Some(self.insert(slot, name, class))
    }

    fn take_slot(&mut self, slot: SlotIndex) -> Option<(String, TrackedDevice)> {
        let name = self.slot_names.remove(&slot)?;
        let device = self.devices.remove(&name)?;
        if let Some(names) = self.names_by_class.get_mut(&device.class()) {
            names.retain(|n| n != &name);
        }
        log::info!("Stopped tracking {} on slot {}", name, slot);
        Some((name, device))
    }

    /// Stop tracking the device in `slot` and hand back its handle.
    pub fn remove_device(&mut self, slot: SlotIndex) -> Result<TrackedDevice> {
        self.take_slot(slot)
            .map(|(_, device)| device)
            .ok_or(TrackerError::InvalidDeviceIndex(slot))
    }

    /// Stop tracking the device registered as `name` and hand back its handle.
    pub fn remove_device_by_name(&mut self, name: &str) -> Result<TrackedDevice> {
        let slot = self
            .devices
            .get(name)
            .map(TrackedDevice::slot)
            .ok_or_else(|| TrackerError::DeviceNotFound(name.to_string()))?;
        self.remove_device(slot)
    }

    /// Give a device a new name, keeping its position in its class list.
    ///
    /// Returns `Ok(false)` without changing anything if `old` is not a
    /// registered name.
    pub fn rename_device(&mut self, old: &str, new: &str) -> Result<bool> {
        if !self.devices.contains_key(old) {
            log::debug!("Rename of unknown device {} ignored", old);
            return Ok(false);
        }
        if old == new {
            return Ok(true);
        }
        if self.devices.contains_key(new) {
            return Err(TrackerError::NameInUse(new.to_string()));
        }
        let Some(device) = self.devices.remove(old) else {
            return Ok(false);
        };

        if let Some(names) = self.names_by_class.get_mut(&device.class()) {
            for name in names.iter_mut().filter(|n| n.as_str() == old) {
                *name = new.to_string();
            }
        }
        self.slot_names.insert(device.slot(), new.to_string());
        self.devices.insert(new.to_string(), device);
        log::info!("Renamed {} to {}", old, new);
        Ok(true)
    }

    /// Drain pending hot-plug events and apply them.
    pub fn poll_events(&mut self) -> Vec<RegistryChange> {
        let mut changes = Vec::new();
        while let Some(event) = self.backend.poll_event() {
            match event.kind {
                EventKind::Connected => {
                    if let Some(change) = self.add_tracked_device(event.slot) {
                        changes.push(change);
                    }
                }
                EventKind::Disconnected => match self.take_slot(event.slot) {
                    Some((name, device)) => changes.push(RegistryChange::Removed {
                        slot: event.slot,
                        name,
                        class: device.class(),
                    }),
                    None => log::debug!("Ignoring disconnect of untracked slot {}", event.slot),
                },
                EventKind::Other(code) => {
                    log::trace!("Ignoring event {} on slot {}", code, event.slot);
                }
            }
        }
        changes
    }

    /// Fresh pose snapshot for every slot, for batching pose queries.
    pub fn get_pose(&self) -> Result<PoseSnapshot> {
        fetch_snapshot(self.backend.as_ref(), self.universe)
    }

    pub fn universe(&self) -> TrackingUniverse {
        self.universe
    }

    pub fn device(&self, name: &str) -> Option<&TrackedDevice> {
        self.devices.get(name)
    }

    /// `(name, handle)` pairs in slot order.
    pub fn devices(&self) -> impl Iterator<Item = (&str, &TrackedDevice)> + '_ {
        self.slot_names
            .values()
            .filter_map(|name| self.devices.get(name).map(|d| (name.as_str(), d)))
    }

    pub fn name_of_slot(&self, slot: SlotIndex) -> Option<&str> {
        self.slot_names.get(&slot).map(String::as_str)
    }

    /// First device, in slot order, whose serial equals `serial`.
    pub fn get_device_by_serial(&self, serial: &str) -> Option<&TrackedDevice> {
        self.devices()
            .map(|(_, device)| device)
            .find(|device| device.get_serial().is_ok_and(|s| s == serial))
    }

    /// Handles of one class in assignment order.
    pub fn get_devices_by_type(&self, class: DeviceClass) -> Vec<&TrackedDevice> {
        self.device_names(class)
            .iter()
            .filter_map(|name| self.devices.get(name))
            .collect()
    }

    pub fn device_names(&self, class: DeviceClass) -> &[String] {
        self.names_by_class
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_device_connected(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Human-readable list of discovered devices grouped by class.
    pub fn describe_devices(&self) -> String {
        let mut out = String::new();
        for class in DeviceClass::ALL {
            let names = self.device_names(class);
            let plural = if names.len() == 1 { "" } else { "s" };
            let _ = writeln!(out, "Found {} {}{}", names.len(), class, plural);
            for name in names {
                let Some(device) = self.devices.get(name) else {
                    continue;
                };
                let serial = device.get_serial().unwrap_or_else(|_| "unknown".into());
                let model = device.get_model().unwrap_or_else(|_| "unknown".into());
                if device.is_tracking_reference() {
                    let mode = device.get_mode().unwrap_or_else(|_| "?".into());
                    let _ = writeln!(out, "  {} ({}, Mode {}, {})", name, serial, mode, model);
                } else {
                    let _ = writeln!(out, "  {} ({}, {})", name, serial, model);
                }
            }
        }
        out
    }

    pub fn log_discovered_devices(&self) {
        for line in self.describe_devices().lines() {
            log::info!("{}", line);
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.backend.shutdown();
        log::info!("Tracking backend shut down");
    }
}
