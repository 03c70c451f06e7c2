//! Control a DTrack controller: start a measurement, stream a while,
//! drain the event log, stop.
//!
//! Usage: cargo run --example control -- <host>:<port>

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let conn = match std::env::args().nth(1) {
        Some(conn) => conn,
        None => {
            eprintln!("Usage: control <host>:<port>");
            std::process::exit(1);
        }
    };

    let mut dt = match dtrack::DTrack::open(&conn) {
        Ok(dt) => dt,
        Err(e) => {
            eprintln!("Failed to open session: {}", e);
            std::process::exit(1);
        }
    };

    if !dt.is_command_interface_valid() {
        eprintln!("No command session; use the <host>:<port> connection form");
        std::process::exit(1);
    }

    match dt.has_full_access() {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Controller is in monitor mode; close its front-end dialogs first");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Access query failed: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = dt.start_measurement() {
        eprintln!("Failed to start measurement: {}", e);
        std::process::exit(1);
    }

    println!("Measurement running, streaming for 5 seconds...");
    let start = Instant::now();
    let mut frames: u64 = 0;

    while start.elapsed() < Duration::from_secs(5) {
        match dt.receive() {
            Ok(snapshot) => {
                frames += 1;
                if frames % 60 == 1 {
                    println!(
                        "frame {}  bodies={}  latency={}us",
                        snapshot.frame,
                        snapshot.bodies.len(),
                        snapshot.latency_us
                    );
                }
            }
            Err(e) => eprintln!("no frame: {}", e),
        }
    }

    println!("--- {} frames in {:.1}s ---", frames, start.elapsed().as_secs_f64());

    // Drain the controller's event log.
    loop {
        match dt.get_message() {
            Ok(Some(msg)) => println!(
                "[{}] {} frame {} 0x{:08x}: {}",
                msg.origin, msg.status, msg.frame, msg.error_id, msg.message
            ),
            Ok(None) => break,
            Err(e) => {
                eprintln!("getmsg failed: {}", e);
                break;
            }
        }
    }

    if let Err(e) = dt.stop_measurement() {
        eprintln!("Failed to stop measurement: {}", e);
        std::process::exit(1);
    }
    println!("Measurement stopped.");
}
