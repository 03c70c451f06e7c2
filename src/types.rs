//! Typed view of one measurement frame.
//!
//! A [`Snapshot`] is built by the parser from a single UDP datagram and is
//! never mutated afterwards; the session replaces its current snapshot
//! wholesale, so a reader always sees one consistent frame.

/// Column-major 3x3 identity, the rotation of every untracked body.
pub const ROT_IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Extended frame timestamp: seconds since the epoch plus microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimes {
    pub seconds: i64,
    pub microseconds: u32,
}

/// A tracked rigid body (also used for measurement references).
///
/// `rot` holds the 3x3 rotation matrix in column-major order exactly as
/// received from the controller; it is not renormalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: u32,
    /// Tracking quality, `-1.0` when the body is not tracked this frame.
    pub quality: f64,
    /// Location in mm.
    pub loc: [f64; 3],
    pub rot: [f64; 9],
}

impl Body {
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub(crate) fn untracked(id: u32) -> Body {
        Body {
            id,
            quality: -1.0,
            loc: [0.0; 3],
            rot: ROT_IDENTITY,
        }
    }
}

/// A Flystick: a rigid body with buttons and joystick axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Flystick {
    pub id: u32,
    pub quality: f64,
    pub loc: [f64; 3],
    pub rot: [f64; 9],
    /// One entry per button, `true` = pressed.
    pub buttons: Vec<bool>,
    /// Joystick axis values in [-1, 1].
    pub joysticks: Vec<f64>,
}

impl Flystick {
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    /// State of button `i`; out-of-range indices read as released.
    pub fn button(&self, i: usize) -> bool {
        self.buttons.get(i).copied().unwrap_or(false)
    }

    /// Value of joystick axis `i`, 0.0 when out of range.
    pub fn joystick(&self, i: usize) -> f64 {
        self.joysticks.get(i).copied().unwrap_or(0.0)
    }
}

/// A measurement tool: a rigid body with buttons and an optional tip radius.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTool {
    pub id: u32,
    pub quality: f64,
    pub loc: [f64; 3],
    pub rot: [f64; 9],
    /// Tip radius in mm, when the controller reports one.
    pub tip_radius: Option<f64>,
    pub buttons: Vec<bool>,
}

impl MeasurementTool {
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }

    pub fn button(&self, i: usize) -> bool {
        self.buttons.get(i).copied().unwrap_or(false)
    }
}

/// Which hand a fingertracking record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// One finger of a fingertracking hand.
#[derive(Debug, Clone, PartialEq)]
pub struct Finger {
    /// Fingertip location in mm.
    pub loc: [f64; 3],
    pub rot: [f64; 9],
    /// Fingertip radius in mm.
    pub tip_radius: f64,
    /// Lengths of the three phalanxes, outermost first, in mm.
    pub phalanx_lengths: [f64; 3],
    /// Angles between consecutive phalanxes, in degrees.
    pub phalanx_angles: [f64; 2],
}

/// A fingertracking hand: back-of-hand pose plus per-finger geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub id: u32,
    pub quality: f64,
    pub handedness: Handedness,
    pub loc: [f64; 3],
    pub rot: [f64; 9],
    pub fingers: Vec<Finger>,
}

impl Hand {
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }
}

/// A single 3DOF marker. Ids may be sparse.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: u32,
    pub quality: f64,
    pub loc: [f64; 3],
}

/// One joint of a human model.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub id: u32,
    pub quality: f64,
    pub loc: [f64; 3],
    pub rot: [f64; 9],
    /// Euler angles in degrees, when the controller reports them.
    pub angles: Option<[f64; 3]>,
}

impl Joint {
    pub fn is_tracked(&self) -> bool {
        self.quality >= 0.0
    }
}

/// A human model: an id and its joints.
#[derive(Debug, Clone, PartialEq)]
pub struct Human {
    pub id: u32,
    pub joints: Vec<Joint>,
}

/// Tracking state of a hybrid (optical + inertial) body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InertialState {
    NotTracked,
    /// Inertial measurement only, no optical correction.
    InertialOnly,
    /// Hybrid tracking, drift correction still converging.
    HybridDrift,
    /// Hybrid tracking, fully corrected.
    Hybrid,
}

impl InertialState {
    pub(crate) fn from_wire(v: i64) -> Option<InertialState> {
        match v {
            0 => Some(InertialState::NotTracked),
            1 => Some(InertialState::InertialOnly),
            2 => Some(InertialState::HybridDrift),
            3 => Some(InertialState::Hybrid),
            _ => None,
        }
    }
}

/// A hybrid/inertial body. Ids may be sparse.
#[derive(Debug, Clone, PartialEq)]
pub struct InertialBody {
    pub id: u32,
    pub state: InertialState,
    /// Drift error estimate in degrees.
    pub error: f64,
    pub loc: [f64; 3],
    pub rot: [f64; 9],
}

impl InertialBody {
    pub fn is_tracked(&self) -> bool {
        self.state != InertialState::NotTracked
    }
}

/// Per-camera status counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStatus {
    pub id: u32,
    /// Reflections seen by this camera.
    pub num_reflections: u32,
    /// Reflections used for tracking.
    pub num_reflections_used: u32,
    /// Maximum pixel intensity, 0..10.
    pub max_intensity: u32,
}

/// System status record: global counters plus per-camera detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    pub num_cameras: u32,
    pub num_tracked_bodies: u32,
    pub num_tracked_markers: u32,
    pub num_camera_errors: u32,
    pub num_camera_warnings: u32,
    pub num_other_errors: u32,
    pub num_other_warnings: u32,
    pub num_infos: u32,
    pub cameras: Vec<CameraStatus>,
}

/// The parsed content of one measurement datagram.
///
/// All sequences preserve the order declared on the wire. Body-like kinds
/// (`bodies`, `flysticks`, `tools`, `references`) are dense and indexed by
/// position; `markers` and `inertial_bodies` may carry sparse ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Frame counter from the `fr` record.
    pub frame: u32,
    /// Frame timestamp in seconds, when the controller sends one.
    pub timestamp: Option<f64>,
    /// Extended timestamp (seconds + microseconds), when sent.
    pub times: Option<FrameTimes>,
    /// Pipeline latency in microseconds, 0 when not reported.
    pub latency_us: u32,
    /// Number of calibrated bodies the controller knows, when reported.
    pub num_calibrated_bodies: Option<u32>,
    pub bodies: Vec<Body>,
    pub flysticks: Vec<Flystick>,
    pub tools: Vec<MeasurementTool>,
    pub references: Vec<Body>,
    pub hands: Vec<Hand>,
    pub markers: Vec<Marker>,
    pub humans: Vec<Human>,
    pub inertial_bodies: Vec<InertialBody>,
    pub status: Option<SystemStatus>,
}
