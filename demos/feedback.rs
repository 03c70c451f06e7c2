//! Exercise the feedback channel: Flystick beep and vibration, then a
//! tactile pulse on a fingertracking hand.
//!
//! Usage: cargo run --example feedback -- <host>:<port> [flystick-id] [hand-id]

use std::time::Duration;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let conn = match args.next() {
        Some(conn) => conn,
        None => {
            eprintln!("Usage: feedback <host>:<port> [flystick-id] [hand-id]");
            std::process::exit(1);
        }
    };
    let flystick_id: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(0);
    let hand_id: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(0);

    let mut dt = match dtrack::DTrack::open(&conn) {
        Ok(dt) => dt,
        Err(e) => {
            eprintln!("Failed to open session: {}", e);
            std::process::exit(1);
        }
    };

    println!("Beep on Flystick {}...", flystick_id);
    if let Err(e) = dt.flystick_beep(flystick_id, 500, 4400) {
        eprintln!("beep failed: {}", e);
    }
    std::thread::sleep(Duration::from_millis(800));

    println!("Vibration pattern 2 on Flystick {}...", flystick_id);
    if let Err(e) = dt.flystick_vibration(flystick_id, 2) {
        eprintln!("vibration failed: {}", e);
    }
    std::thread::sleep(Duration::from_millis(800));

    println!("Tactile pulse on hand {}...", hand_id);
    for finger in 0..3 {
        if let Err(e) = dt.tactile_finger(hand_id, finger, 0.5) {
            eprintln!("tactile failed: {}", e);
        }
        std::thread::sleep(Duration::from_millis(300));
    }
    if let Err(e) = dt.tactile_hand_off(hand_id, 3) {
        eprintln!("tactile off failed: {}", e);
    }

    println!("Done.");
}
