//! List the devices of a simulated tracking setup, then hot-plug a tracker.
//!
//! Usage: RUST_LOG=info cargo run --example discover
//! Set VRTRACK_CONFIG to a JSON config to assign static names by serial.

use std::sync::Arc;
use vrtrack::mock::{MockBackend, MockDevice};
use vrtrack::{DeviceClass, Registry, RegistryChange};

fn main() {
    env_logger::init();

    let left = MockDevice::new(DeviceClass::Controller, "LHR-C0000001").with_model("Knuckles Left");
    let right =
        MockDevice::new(DeviceClass::Controller, "LHR-C0000002").with_model("Knuckles Right");
    let backend = Arc::new(
        MockBackend::new()
            .with_device(0, MockDevice::new(DeviceClass::Hmd, "LHR-HMD00001").with_model("Index"))
            .with_device(1, MockDevice::new(DeviceClass::TrackingReference, "LHB-4A1C2E01"))
            .with_device(2, MockDevice::new(DeviceClass::TrackingReference, "LHB-4A1C2E02"))
            .with_device(3, left)
            .with_device(4, right),
    );

    let mut registry = match Registry::from_env(backend.clone()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start tracking: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", registry.describe_devices());
    println!();

    backend.connect_device(5, MockDevice::new(DeviceClass::Tracker, "LHR-T0000001"));
    for change in registry.poll_events() {
        match change {
            RegistryChange::Added { slot, name, class } => {
                println!("+ {} ({}) on slot {}", name, class, slot)
            }
            RegistryChange::Removed { slot, name, class } => {
                println!("- {} ({}) from slot {}", name, class, slot)
            }
        }
    }

    let snapshot = match registry.get_pose() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read poses: {}", e);
            std::process::exit(1);
        }
    };
    for (name, device) in registry.devices() {
        match device.get_pose_euler(Some(&snapshot)) {
            Ok(Some(p)) => println!(
                "{:<22} pos=[{:+.3}, {:+.3}, {:+.3}]  ypr=[{:+.1}, {:+.1}, {:+.1}]",
                name, p.x, p.y, p.z, p.yaw, p.pitch, p.roll
            ),
            Ok(None) => println!("{:<22} (no pose)", name),
            Err(e) => println!("{:<22} error: {}", name, e),
        }
    }
}
