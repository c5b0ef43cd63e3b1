//! Sample a simulated tracker spinning about the vertical axis and print the
//! buffer as JSON.
//!
//! Usage: cargo run --example sample -- [num_samples] [rate_hz]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vrtrack::mock::{MockBackend, MockDevice};
use vrtrack::{CancelToken, DeviceClass, Registry};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let num_samples: usize = args.next().and_then(|a| a.parse().ok()).unwrap_or(200);
    let rate_hz: f64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(100.0);

    let backend = Arc::new(
        MockBackend::new().with_device(0, MockDevice::new(DeviceClass::Tracker, "LHR-T0000001")),
    );
    let registry = match Registry::new(backend.clone(), None) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start tracking: {}", e);
            std::process::exit(1);
        }
    };

    // Drive the simulated tracker around a 1 m circle at 0.5 rev/s.
    let stop = CancelToken::new();
    let mover = {
        let backend = backend.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let start = Instant::now();
            while !stop.is_cancelled() {
                let angle = start.elapsed().as_secs_f64() * std::f64::consts::PI;
                let (s, c) = angle.sin_cos();
                backend.set_matrix(
                    0,
                    [[c, -s, 0.0, c], [s, c, 0.0, s], [0.0, 0.0, 1.0, 1.2]],
                );
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let Some(tracker) = registry.device("tracker_1") else {
        eprintln!("tracker_1 not found");
        std::process::exit(1);
    };

    let started = Instant::now();
    let result = tracker.sample(num_samples, rate_hz);
    let elapsed = started.elapsed().as_secs_f64();
    stop.cancel();
    let _ = mover.join();

    let buffer = match result {
        Ok(b) => b,
        Err(abort) => {
            eprintln!("{}", abort);
            abort.buffer
        }
    };

    eprintln!(
        "{} samples in {:.2}s ({:.1} Hz achieved, {:.1} Hz requested)",
        buffer.len(),
        elapsed,
        buffer.len() as f64 / elapsed,
        rate_hz
    );
    match buffer.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode samples: {}", e),
    }
}
