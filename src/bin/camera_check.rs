// src/bin/camera_check.rs - Checks that the camera opens and a frame can be captured
use moodsync_client::capture::{CameraStatus, CaptureSession, NokhwaCamera};

fn main() {
    tracing_subscriber::fmt::init();
    println!("Testing camera access...\n");

    match NokhwaCamera::list_devices() {
        Ok(devices) if devices.is_empty() => println!("✗ No cameras found"),
        Ok(devices) => {
            for (i, name) in devices.iter().enumerate() {
                println!("  [{}] {}", i, name);
            }
        }
        Err(e) => println!("✗ Failed to query cameras: {}", e),
    }

    let index = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);
    let mut session = CaptureSession::new(NokhwaCamera::new(index), 92);

    if let Err(e) = session.start() {
        println!("✗ Failed to open camera {}: {}", index, e);
        println!("\nPossible causes:");
        println!("1. Camera is being used by another app");
        println!("2. Camera permissions not granted");
        println!("3. No camera connected");
        return;
    }
    println!("✓ Stream opened - CAMERA ACCESS WORKING!");

    session.refresh();
    match session.capture() {
        Ok(true) => {
            let bytes = session.frame_image().map(|i| i.as_str().len()).unwrap_or(0);
            println!("✓ Frame captured successfully ({} bytes as data URI)", bytes);
        }
        Ok(false) => println!("✗ Stream is not active, nothing captured"),
        Err(e) => println!("✗ Failed to capture frame: {}", e),
    }

    session.teardown();
    if *session.status() == CameraStatus::Released {
        println!("✓ Camera released");
    }
}
