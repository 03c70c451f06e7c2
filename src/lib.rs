//! # dtrack - Rust SDK for ART DTrack optical motion-capture controllers
//!
//! Connects to a DTrack2/DTRACK3 controller and exposes:
//! - The measurement stream: per-frame tracking data (rigid bodies,
//!   Flysticks, fingertracking hands, single markers, hybrid bodies,
//!   system status) parsed from UDP datagrams into typed [`Snapshot`]s
//! - The command channel: `dtrack2` request/response over TCP
//!   (parameters, tracking start/stop, event messages)
//! - Feedback: tactile fingertracking and Flystick beep/vibration
//!
//! ## Quick Start
//! ```no_run
//! use dtrack::DTrack;
//!
//! // Controller "atc-301", measurement data on local UDP port 5000.
//! let mut dt = DTrack::open("atc-301:5000").unwrap();
//! dt.start_measurement().unwrap();
//! for _ in 0..100 {
//!     match dt.receive() {
//!         Ok(snapshot) => {
//!             println!("frame {}: {} bodies", snapshot.frame, snapshot.bodies.len());
//!         }
//!         Err(e) => eprintln!("no frame: {}", e),
//!     }
//! }
//! dt.stop_measurement().unwrap();
//! ```

pub mod device;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod types;

mod net;
mod stream;

pub use device::{Config, DTrack};
pub use error::{DTrackError, Dtrack2Error, Fault};
pub use protocol::{EventMessage, Response};
pub use types::*;

/// Result type alias for dtrack operations.
pub type Result<T> = std::result::Result<T, DTrackError>;
