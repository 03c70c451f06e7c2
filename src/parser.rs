//! Parser for the line-oriented ASCII measurement datagrams.
//!
//! One datagram holds a sequence of records. Each record starts with a
//! lowercase tag (`fr`, `6d`, `3d`, ...) followed by whitespace-separated
//! numbers and bracket groups `[ ... ]`. Records are usually one per line
//! but may also follow each other on the same line. Unknown tags are
//! skipped so that newer controllers keep working with this SDK.

use crate::types::{
    Body, CameraStatus, Finger, Flystick, FrameTimes, Hand, Handedness, Human, InertialBody,
    InertialState, Joint, Marker, MeasurementTool, Snapshot, SystemStatus, ROT_IDENTITY,
};

/// Why a datagram was rejected.
///
/// A rejected datagram never replaces the session's current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty datagram")]
    Empty,

    #[error("datagram is not ASCII text")]
    NotText,

    #[error("{tag}: bad number {token:?}")]
    BadNumber { tag: &'static str, token: String },

    #[error("{tag}: truncated record")]
    Truncated { tag: &'static str },

    #[error("{tag}: declared {declared} entries, group holds {actual}")]
    CountMismatch {
        tag: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("{tag}: unexpected {token:?}")]
    UnexpectedToken { tag: &'static str, token: String },
}

/// Cursor over the remainder of one record line.
struct Fields<'a> {
    tag: &'static str,
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(tag: &'static str, rest: &'a str) -> Fields<'a> {
        Fields { tag, rest }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn is_empty(&mut self) -> bool {
        self.skip_ws();
        self.rest.is_empty()
    }

    /// Next whitespace-delimited token; brackets terminate a token.
    fn word(&mut self) -> Result<&'a str, ParseError> {
        self.skip_ws();
        if self.rest.is_empty() {
            return Err(ParseError::Truncated { tag: self.tag });
        }
        let end = self
            .rest
            .find(|c: char| c.is_ascii_whitespace() || c == '[' || c == ']')
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(ParseError::UnexpectedToken {
                tag: self.tag,
                token: self.rest[..1].to_string(),
            });
        }
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(word)
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let token = self.word()?;
        token.parse().map_err(|_| ParseError::BadNumber {
            tag: self.tag,
            token: token.to_string(),
        })
    }

    fn i64(&mut self) -> Result<i64, ParseError> {
        let token = self.word()?;
        token.parse().map_err(|_| ParseError::BadNumber {
            tag: self.tag,
            token: token.to_string(),
        })
    }

    /// Parses with `str::parse::<f64>`, which always uses `.` as the
    /// decimal separator regardless of the process locale.
    fn f64(&mut self) -> Result<f64, ParseError> {
        let token = self.word()?;
        token.parse().map_err(|_| ParseError::BadNumber {
            tag: self.tag,
            token: token.to_string(),
        })
    }

    /// Consume the next `[ ... ]` group and return a cursor over its content.
    fn group(&mut self) -> Result<Fields<'a>, ParseError> {
        self.skip_ws();
        if !self.rest.starts_with('[') {
            return Err(if self.rest.is_empty() {
                ParseError::Truncated { tag: self.tag }
            } else {
                ParseError::UnexpectedToken {
                    tag: self.tag,
                    token: self.rest.chars().take(8).collect(),
                }
            });
        }
        match self.rest.find(']') {
            Some(end) => {
                let inner = &self.rest[1..end];
                self.rest = &self.rest[end + 1..];
                Ok(Fields::new(self.tag, inner))
            }
            None => Err(ParseError::Truncated { tag: self.tag }),
        }
    }

    /// Token count of the next group, without consuming it. `None` when the
    /// next item is not a complete group.
    fn peek_group_len(&self) -> Option<usize> {
        let rest = self.rest.trim_start();
        if !rest.starts_with('[') {
            return None;
        }
        let end = rest.find(']')?;
        Some(rest[1..end].split_ascii_whitespace().count())
    }

    /// The group must hold no further tokens.
    fn finish(mut self) -> Result<(), ParseError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                tag: self.tag,
                token: self.rest.chars().take(8).collect(),
            })
        }
    }
}

/// Read an exactly-N-element numeric group.
fn fixed_group<const N: usize>(f: &mut Fields) -> Result<[f64; N], ParseError> {
    let mut g = f.group()?;
    let mut out = [0.0; N];
    for v in out.iter_mut() {
        *v = g.f64()?;
    }
    g.finish()?;
    Ok(out)
}

/// Read the `[x y z][r0..r8]` pose groups common to all body-like records.
fn pose(f: &mut Fields) -> Result<([f64; 3], [f64; 9]), ParseError> {
    let loc = fixed_group::<3>(f)?;
    let rot = fixed_group::<9>(f)?;
    Ok((loc, rot))
}

/// Read all remaining tokens of a group as f64, optionally checking the
/// count against a header-declared value.
fn numeric_group(f: &mut Fields, declared: Option<usize>) -> Result<Vec<f64>, ParseError> {
    let mut g = f.group()?;
    let mut out = Vec::new();
    while !g.is_empty() {
        out.push(g.f64()?);
    }
    if let Some(declared) = declared {
        if declared != out.len() {
            return Err(ParseError::CountMismatch {
                tag: f.tag,
                declared,
                actual: out.len(),
            });
        }
    }
    Ok(out)
}

fn parse_bodies(f: &mut Fields) -> Result<Vec<Body>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let quality = head.f64()?;
        head.finish()?;
        let (loc, rot) = pose(f)?;
        out.push(if quality < 0.0 {
            Body {
                quality,
                ..Body::untracked(id)
            }
        } else {
            Body { id, quality, loc, rot }
        });
    }
    Ok(out)
}

/// `6df2` carries button/joystick counts in the header group; legacy `6df`
/// does not, so the counts are inferred from the group lengths.
fn parse_flysticks(f: &mut Fields, with_counts: bool) -> Result<Vec<Flystick>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let quality = head.f64()?;
        let counts = if with_counts {
            let buttons = head.u32()? as usize;
            let joysticks = head.u32()? as usize;
            Some((buttons, joysticks))
        } else {
            None
        };
        head.finish()?;
        let (loc, rot) = pose(f)?;
        let buttons = numeric_group(f, counts.map(|c| c.0))?
            .into_iter()
            .map(|v| v != 0.0)
            .collect();
        let joysticks = numeric_group(f, counts.map(|c| c.1))?;
        let tracked = quality >= 0.0;
        out.push(Flystick {
            id,
            quality,
            loc: if tracked { loc } else { [0.0; 3] },
            rot: if tracked { rot } else { ROT_IDENTITY },
            buttons,
            joysticks,
        });
    }
    Ok(out)
}

#[derive(Clone, Copy)]
enum ToolVariant {
    /// `6dmt`: no tip radius.
    Plain,
    /// `6dmt2`: tip radius in the header group.
    Radius,
    /// `6dmt3`: tip radius plus an explicit button count.
    RadiusCount,
}

fn parse_tools(f: &mut Fields, variant: ToolVariant) -> Result<Vec<MeasurementTool>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let quality = head.f64()?;
        let tip_radius = match variant {
            ToolVariant::Plain => None,
            ToolVariant::Radius | ToolVariant::RadiusCount => Some(head.f64()?),
        };
        let declared = match variant {
            ToolVariant::RadiusCount => Some(head.u32()? as usize),
            _ => None,
        };
        head.finish()?;
        let (loc, rot) = pose(f)?;
        let buttons = numeric_group(f, declared)?
            .into_iter()
            .map(|v| v != 0.0)
            .collect();
        let tracked = quality >= 0.0;
        out.push(MeasurementTool {
            id,
            quality,
            loc: if tracked { loc } else { [0.0; 3] },
            rot: if tracked { rot } else { ROT_IDENTITY },
            tip_radius,
            buttons,
        });
    }
    Ok(out)
}

fn parse_hands(f: &mut Fields) -> Result<Vec<Hand>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let quality = head.f64()?;
        let lr = head.i64()?;
        let nfinger = head.u32()? as usize;
        head.finish()?;
        let handedness = match lr {
            0 => Handedness::Left,
            1 => Handedness::Right,
            _ => {
                return Err(ParseError::UnexpectedToken {
                    tag: f.tag,
                    token: lr.to_string(),
                })
            }
        };
        let (loc, rot) = pose(f)?;
        let mut fingers = Vec::with_capacity(nfinger);
        for _ in 0..nfinger {
            let (floc, frot) = pose(f)?;
            let geo = fixed_group::<6>(f)?;
            fingers.push(Finger {
                loc: floc,
                rot: frot,
                tip_radius: geo[0],
                phalanx_lengths: [geo[1], geo[2], geo[3]],
                phalanx_angles: [geo[4], geo[5]],
            });
        }
        let tracked = quality >= 0.0;
        out.push(Hand {
            id,
            quality,
            handedness,
            loc: if tracked { loc } else { [0.0; 3] },
            rot: if tracked { rot } else { ROT_IDENTITY },
            fingers,
        });
    }
    Ok(out)
}

fn parse_markers(f: &mut Fields) -> Result<Vec<Marker>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let quality = head.f64()?;
        head.finish()?;
        let loc = fixed_group::<3>(f)?;
        out.push(Marker { id, quality, loc });
    }
    Ok(out)
}

fn parse_humans(f: &mut Fields) -> Result<Vec<Human>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let njoint = head.u32()? as usize;
        head.finish()?;
        let mut joints = Vec::with_capacity(njoint);
        for _ in 0..njoint {
            let mut jhead = f.group()?;
            let jid = jhead.u32()?;
            let quality = jhead.f64()?;
            jhead.finish()?;
            let (loc, rot) = pose(f)?;
            // A three-element group after the rotation is the optional
            // Euler-angle record; the next joint header has two elements.
            let angles = if f.peek_group_len() == Some(3) {
                Some(fixed_group::<3>(f)?)
            } else {
                None
            };
            let tracked = quality >= 0.0;
            joints.push(Joint {
                id: jid,
                quality,
                loc: if tracked { loc } else { [0.0; 3] },
                rot: if tracked { rot } else { ROT_IDENTITY },
                angles,
            });
        }
        out.push(Human { id, joints });
    }
    Ok(out)
}

fn parse_inertial(f: &mut Fields) -> Result<Vec<InertialBody>, ParseError> {
    let n = f.u32()? as usize;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut head = f.group()?;
        let id = head.u32()?;
        let state_raw = head.i64()?;
        let error = head.f64()?;
        head.finish()?;
        let state =
            InertialState::from_wire(state_raw).ok_or_else(|| ParseError::UnexpectedToken {
                tag: f.tag,
                token: state_raw.to_string(),
            })?;
        let (loc, rot) = pose(f)?;
        let tracked = state != InertialState::NotTracked;
        out.push(InertialBody {
            id,
            state,
            error,
            loc: if tracked { loc } else { [0.0; 3] },
            rot: if tracked { rot } else { ROT_IDENTITY },
        });
    }
    Ok(out)
}

fn parse_status(f: &mut Fields) -> Result<SystemStatus, ParseError> {
    let mut general = f.group()?;
    let num_cameras = general.u32()?;
    let num_tracked_bodies = general.u32()?;
    let num_tracked_markers = general.u32()?;
    general.finish()?;

    let mut messages = f.group()?;
    let num_camera_errors = messages.u32()?;
    let num_camera_warnings = messages.u32()?;
    let num_other_errors = messages.u32()?;
    let num_other_warnings = messages.u32()?;
    let num_infos = messages.u32()?;
    messages.finish()?;

    let mut cameras = Vec::with_capacity(num_cameras as usize);
    for _ in 0..num_cameras {
        let mut cam = f.group()?;
        let camera = CameraStatus {
            id: cam.u32()?,
            num_reflections: cam.u32()?,
            num_reflections_used: cam.u32()?,
            max_intensity: cam.u32()?,
        };
        cam.finish()?;
        cameras.push(camera);
    }

    Ok(SystemStatus {
        num_cameras,
        num_tracked_bodies,
        num_tracked_markers,
        num_camera_errors,
        num_camera_warnings,
        num_other_errors,
        num_other_warnings,
        num_infos,
        cameras,
    })
}

/// Parse one measurement datagram into a fresh [`Snapshot`].
///
/// Unknown record tags never fail the frame; malformed `ts`/`ts2`/`lat`/
/// `6dcal`/`status` records are dropped rather than rejected, per the
/// controller's compatibility rules. Every other malformation rejects the
/// whole datagram.
pub fn parse_frame(data: &[u8]) -> Result<Snapshot, ParseError> {
    let end = data
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    if end == 0 {
        return Err(ParseError::Empty);
    }
    let text = std::str::from_utf8(&data[..end]).map_err(|_| ParseError::NotText)?;

    let mut snap = Snapshot::default();
    for line in text.split('\n') {
        let mut f = Fields::new("", line);
        // Records may share a line; keep dispatching until the line is
        // exhausted or an unknown tag hands the remainder to the skipper.
        loop {
            if f.is_empty() {
                break;
            }
            let tag = match f.word() {
                Ok(word) => word,
                // Not a tag word (stray bracket or similar); skip the line.
                Err(_) => break,
            };
            match tag {
                "fr" => {
                    f.tag = "fr";
                    snap.frame = f.u32()?;
                }
                // The scalar records are tolerated when malformed: the bad
                // token is already consumed, so parsing resumes at the
                // next tag and sibling records on the line survive.
                "ts" => {
                    f.tag = "ts";
                    match f.f64() {
                        Ok(v) => snap.timestamp = Some(v),
                        Err(_) => continue,
                    }
                }
                "ts2" => {
                    f.tag = "ts2";
                    match (f.i64(), f.u32()) {
                        (Ok(seconds), Ok(microseconds)) => {
                            snap.times = Some(FrameTimes {
                                seconds,
                                microseconds,
                            })
                        }
                        _ => continue,
                    }
                }
                "lat" => {
                    f.tag = "lat";
                    match f.u32() {
                        Ok(v) => snap.latency_us = v,
                        Err(_) => continue,
                    }
                }
                "6dcal" => {
                    f.tag = "6dcal";
                    match f.u32() {
                        Ok(v) => snap.num_calibrated_bodies = Some(v),
                        Err(_) => continue,
                    }
                }
                "6d" => {
                    f.tag = "6d";
                    snap.bodies = parse_bodies(&mut f)?;
                }
                "6dmtr" => {
                    f.tag = "6dmtr";
                    snap.references = parse_bodies(&mut f)?;
                }
                "6df" => {
                    f.tag = "6df";
                    snap.flysticks = parse_flysticks(&mut f, false)?;
                }
                "6df2" => {
                    f.tag = "6df2";
                    snap.flysticks = parse_flysticks(&mut f, true)?;
                }
                "6dmt" => {
                    f.tag = "6dmt";
                    snap.tools = parse_tools(&mut f, ToolVariant::Plain)?;
                }
                "6dmt2" => {
                    f.tag = "6dmt2";
                    snap.tools = parse_tools(&mut f, ToolVariant::Radius)?;
                }
                "6dmt3" => {
                    f.tag = "6dmt3";
                    snap.tools = parse_tools(&mut f, ToolVariant::RadiusCount)?;
                }
                "gl" => {
                    f.tag = "gl";
                    snap.hands = parse_hands(&mut f)?;
                }
                "3d" => {
                    f.tag = "3d";
                    snap.markers = parse_markers(&mut f)?;
                }
                "human" => {
                    f.tag = "human";
                    snap.humans = parse_humans(&mut f)?;
                }
                "6di" => {
                    f.tag = "6di";
                    snap.inertial_bodies = parse_inertial(&mut f)?;
                }
                "status" => {
                    f.tag = "status";
                    match parse_status(&mut f) {
                        Ok(status) => snap.status = Some(status),
                        // A mid-group failure leaves the cursor at an
                        // unpredictable offset; drop the rest of the line.
                        Err(_) => break,
                    }
                }
                other => {
                    log::trace!("skipping unknown record {:?}", other);
                    break;
                }
            }
        }
    }

    Ok(snap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Snapshot {
        parse_frame(text.as_bytes()).unwrap()
    }

    #[test]
    fn standard_body() {
        let snap = frame(
            "fr 42\nts 12.345678\n6d 1 [0 0.950][100.0 200.0 -50.5][1 0 0 0 1 0 0 0 1]\n",
        );
        assert_eq!(snap.frame, 42);
        assert_eq!(snap.timestamp, Some(12.345678));
        assert_eq!(snap.bodies.len(), 1);
        let body = &snap.bodies[0];
        assert_eq!(body.id, 0);
        assert!((body.quality - 0.95).abs() < 1e-12);
        assert_eq!(body.loc, [100.0, 200.0, -50.5]);
        assert_eq!(body.rot, ROT_IDENTITY);
        assert!(body.is_tracked());
    }

    #[test]
    fn untracked_body_gets_defaults() {
        let snap = frame("6d 1 [0 -1.000][7 8 9][0 0 0 0 0 0 0 0 0]\n");
        let body = &snap.bodies[0];
        assert!(!body.is_tracked());
        assert!(body.quality < 0.0);
        assert_eq!(body.loc, [0.0; 3]);
        assert_eq!(body.rot, ROT_IDENTITY);
    }

    #[test]
    fn flystick_buttons_and_joysticks() {
        let snap = frame(
            "6df2 1 [0 0.8 8 2][0 0 0][1 0 0 0 1 0 0 0 1][1 0 0 0 0 0 0 0][0.50 -0.25]\n",
        );
        let fly = &snap.flysticks[0];
        assert_eq!(fly.buttons.len(), 8);
        assert!(fly.button(0));
        assert!(!fly.button(1));
        assert!(!fly.button(7));
        assert_eq!(fly.joysticks, vec![0.5, -0.25]);
        assert_eq!(fly.joystick(0), 0.5);
        assert_eq!(fly.joystick(1), -0.25);
    }

    #[test]
    fn flystick_count_mismatch_fails() {
        let err = parse_frame(
            b"6df2 1 [0 0.8 8 2][0 0 0][1 0 0 0 1 0 0 0 1][1 0 0][0.50 -0.25]\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::CountMismatch {
                tag: "6df2",
                declared: 8,
                actual: 3
            }
        );
    }

    #[test]
    fn legacy_flystick_infers_counts() {
        let snap =
            frame("6df 1 [2 0.9][1 2 3][1 0 0 0 1 0 0 0 1][0 1 0 0][0.1 -0.1]\n");
        let fly = &snap.flysticks[0];
        assert_eq!(fly.id, 2);
        assert_eq!(fly.buttons.len(), 4);
        assert!(fly.button(1));
        assert_eq!(fly.joysticks.len(), 2);
    }

    #[test]
    fn measurement_tool_variants() {
        let snap = frame("6dmt 1 [0 0.7][1 2 3][1 0 0 0 1 0 0 0 1][1 0]\n");
        assert_eq!(snap.tools[0].tip_radius, None);
        assert_eq!(snap.tools[0].buttons, vec![true, false]);

        let snap = frame("6dmt2 1 [0 0.7 1.5][1 2 3][1 0 0 0 1 0 0 0 1][0 1]\n");
        assert_eq!(snap.tools[0].tip_radius, Some(1.5));
        assert!(snap.tools[0].button(1));

        let snap = frame("6dmt3 1 [0 0.7 1.5 2][1 2 3][1 0 0 0 1 0 0 0 1][0 1]\n");
        assert_eq!(snap.tools[0].buttons.len(), 2);

        let err =
            parse_frame(b"6dmt3 1 [0 0.7 1.5 3][1 2 3][1 0 0 0 1 0 0 0 1][0 1]\n").unwrap_err();
        assert!(matches!(err, ParseError::CountMismatch { tag: "6dmt3", .. }));
    }

    #[test]
    fn measurement_references() {
        let snap = frame("6dmtr 2 [0 0.5][1 2 3][1 0 0 0 1 0 0 0 1][1 -1][4 5 6][1 0 0 0 1 0 0 0 1]\n");
        assert_eq!(snap.references.len(), 2);
        assert_eq!(snap.references[1].id, 1);
        assert!(!snap.references[1].is_tracked());
    }

    #[test]
    fn fingertracking_hand() {
        let snap = frame(concat!(
            "gl 1 [0 0.9 1 2][10 20 30][1 0 0 0 1 0 0 0 1]",
            "[11 21 31][1 0 0 0 1 0 0 0 1][8.0 40 30 20 10 15]",
            "[12 22 32][1 0 0 0 1 0 0 0 1][7.5 42 31 21 11 16]\n",
        ));
        let hand = &snap.hands[0];
        assert_eq!(hand.handedness, Handedness::Right);
        assert_eq!(hand.fingers.len(), 2);
        let finger = &hand.fingers[0];
        assert_eq!(finger.loc, [11.0, 21.0, 31.0]);
        assert_eq!(finger.tip_radius, 8.0);
        assert_eq!(finger.phalanx_lengths, [40.0, 30.0, 20.0]);
        assert_eq!(finger.phalanx_angles, [10.0, 15.0]);
    }

    #[test]
    fn single_markers_keep_sparse_ids() {
        let snap = frame("3d 2 [7 0.9][1 2 3][42 0.8][4 5 6]\n");
        assert_eq!(snap.markers.len(), 2);
        assert_eq!(snap.markers[0].id, 7);
        assert_eq!(snap.markers[1].id, 42);
        assert_eq!(snap.markers[1].loc, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn human_joints_with_and_without_angles() {
        let snap = frame(concat!(
            "human 1 [3 2]",
            "[0 0.9][1 2 3][1 0 0 0 1 0 0 0 1][10 20 30]",
            "[1 0.8][4 5 6][1 0 0 0 1 0 0 0 1]\n",
        ));
        let human = &snap.humans[0];
        assert_eq!(human.id, 3);
        assert_eq!(human.joints.len(), 2);
        assert_eq!(human.joints[0].angles, Some([10.0, 20.0, 30.0]));
        assert_eq!(human.joints[1].angles, None);
        assert_eq!(human.joints[1].loc, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn inertial_bodies() {
        let snap = frame(concat!(
            "6di 2 [0 3 0.2][1 2 3][1 0 0 0 1 0 0 0 1]",
            "[5 0 0.0][9 9 9][1 0 0 0 1 0 0 0 1]\n",
        ));
        assert_eq!(snap.inertial_bodies[0].state, InertialState::Hybrid);
        assert!(snap.inertial_bodies[0].is_tracked());
        assert_eq!(snap.inertial_bodies[1].id, 5);
        assert_eq!(snap.inertial_bodies[1].state, InertialState::NotTracked);
        assert_eq!(snap.inertial_bodies[1].loc, [0.0; 3]);

        let err = parse_frame(b"6di 1 [0 9 0.2][1 2 3][1 0 0 0 1 0 0 0 1]\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { tag: "6di", .. }));
    }

    #[test]
    fn system_status() {
        let snap = frame(concat!(
            "status [2 5 12][1 0 0 2 3]",
            "[0 30 25 8][1 28 27 9]\n",
        ));
        let status = snap.status.unwrap();
        assert_eq!(status.num_cameras, 2);
        assert_eq!(status.num_tracked_bodies, 5);
        assert_eq!(status.num_tracked_markers, 12);
        assert_eq!(status.num_camera_errors, 1);
        assert_eq!(status.num_infos, 3);
        assert_eq!(status.cameras.len(), 2);
        assert_eq!(status.cameras[1].id, 1);
        assert_eq!(status.cameras[1].max_intensity, 9);
    }

    #[test]
    fn malformed_status_is_absent_not_fatal() {
        let snap = frame("fr 9\nstatus [2 x][1 0 0 2 3]\n");
        assert_eq!(snap.frame, 9);
        assert!(snap.status.is_none());
    }

    #[test]
    fn malformed_timestamp_and_latency_are_absent() {
        let snap = frame("fr 9\nts abc\nlat xyz\n");
        assert_eq!(snap.frame, 9);
        assert_eq!(snap.timestamp, None);
        assert_eq!(snap.latency_us, 0);
    }

    #[test]
    fn malformed_scalar_keeps_sibling_records_on_the_line() {
        let snap = frame("fr 42 ts abc 3d 1 [0 1.0][1 2 3]\n");
        assert_eq!(snap.frame, 42);
        assert_eq!(snap.timestamp, None);
        assert_eq!(snap.markers.len(), 1);
        assert_eq!(snap.markers[0].loc, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn extended_timestamp_and_latency() {
        let snap = frame("fr 1\nts2 1700000000 250000\nlat 1800\n6dcal 4\n");
        assert_eq!(
            snap.times,
            Some(FrameTimes {
                seconds: 1700000000,
                microseconds: 250000
            })
        );
        assert_eq!(snap.latency_us, 1800);
        assert_eq!(snap.num_calibrated_bodies, Some(4));
    }

    #[test]
    fn unknown_tags_yield_valid_empty_snapshot() {
        let snap = frame("glcal 5\nnewfangled 1 [1 2 3]\n");
        assert_eq!(snap, Snapshot::default());
    }

    #[test]
    fn records_may_share_a_line() {
        let snap = frame("fr 42 ts 12.5 3d 1 [0 1.0][1 2 3]\n");
        assert_eq!(snap.frame, 42);
        assert_eq!(snap.timestamp, Some(12.5));
        assert_eq!(snap.markers.len(), 1);
    }

    #[test]
    fn declared_count_must_match_structure() {
        let err = parse_frame(b"6d 2 [0 0.9][1 2 3][1 0 0 0 1 0 0 0 1]\n").unwrap_err();
        assert_eq!(err, ParseError::Truncated { tag: "6d" });
    }

    #[test]
    fn truncated_group_fails() {
        let err = parse_frame(b"6d 1 [0 0.9][1 2 3][1 0 0 0 1\n").unwrap_err();
        assert_eq!(err, ParseError::Truncated { tag: "6d" });
    }

    #[test]
    fn non_numeric_required_field_fails() {
        let err = parse_frame(b"6d 1 [zero 0.9][1 2 3][1 0 0 0 1 0 0 0 1]\n").unwrap_err();
        assert!(matches!(err, ParseError::BadNumber { tag: "6d", .. }));
    }

    #[test]
    fn empty_datagram_is_rejected() {
        assert_eq!(parse_frame(b"").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_frame(b"\0\0").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn counts_match_sequence_lengths() {
        let snap = frame(concat!(
            "fr 7\n",
            "6d 2 [0 0.9][1 2 3][1 0 0 0 1 0 0 0 1][1 0.8][4 5 6][1 0 0 0 1 0 0 0 1]\n",
            "3d 3 [0 1][1 1 1][1 1][2 2 2][2 1][3 3 3]\n",
        ));
        assert_eq!(snap.bodies.len(), 2);
        assert_eq!(snap.markers.len(), 3);
    }
}
