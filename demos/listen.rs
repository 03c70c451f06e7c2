//! Listen for DTrack measurement data and print tracked bodies.
//!
//! Usage: cargo run --example listen -- <port>
//! Press Ctrl+C to stop.

fn main() {
    env_logger::init();

    let conn = std::env::args().nth(1).unwrap_or_else(|| "5000".into());

    let mut dt = match dtrack::DTrack::open(&conn) {
        Ok(dt) => dt,
        Err(e) => {
            eprintln!("Failed to open session: {}", e);
            std::process::exit(1);
        }
    };

    println!("Listening on UDP port {} (Ctrl+C to stop)...", dt.local_data_port());

    loop {
        match dt.receive() {
            Ok(snapshot) => {
                println!(
                    "frame {:<8} ts={:<12?} bodies={} flysticks={} markers={} hands={}",
                    snapshot.frame,
                    snapshot.timestamp,
                    snapshot.bodies.len(),
                    snapshot.flysticks.len(),
                    snapshot.markers.len(),
                    snapshot.hands.len(),
                );
                for body in &snapshot.bodies {
                    if body.is_tracked() {
                        println!(
                            "  body {}  qu={:.2}  loc=[{:+8.1} {:+8.1} {:+8.1}]",
                            body.id, body.quality, body.loc[0], body.loc[1], body.loc[2]
                        );
                    }
                }
            }
            Err(e) => eprintln!("no frame: {}", e),
        }
    }
}
