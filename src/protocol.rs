//! Command/response grammar and feedback datagram formats.
//!
//! Everything here is pure string work: the session layer does the I/O and
//! hands bodies (already stripped of their terminating NUL) to these
//! functions.

use crate::error::Dtrack2Error;

// -- Well-known controller ports --

/// TCP command port on the controller.
pub const COMMAND_PORT: u16 = 50105;
/// UDP port the controller sends measurement data from; the firewall
/// priming datagram is addressed here.
pub const SENDER_PORT: u16 = 50107;
/// UDP port the controller receives feedback datagrams on.
pub const FEEDBACK_PORT: u16 = 50110;

/// Maximum command length in bytes (without the terminating NUL); replies
/// are bounded by the same figure including their NUL.
pub const MAX_COMMAND_LEN: usize = 200;

/// Payload of the stateful-firewall priming datagram.
pub const FIREWALL_PRIMING: &[u8] = b"fw4dtsdkj";

/// Classified body of one command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `dtrack2 ok`
    Ok,
    /// `dtrack2 err <code> "<message>"`
    Error(Dtrack2Error),
    /// Any other well-formed body, e.g. a `dtrack2 set ...` echo.
    Payload(String),
}

/// An entry from the controller's event log, as returned by `dtrack2 getmsg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Component the message originates from (e.g. `cam`).
    pub origin: String,
    /// Severity/status word (e.g. `ok`, `err`).
    pub status: String,
    /// Frame counter at the time of the event.
    pub frame: u32,
    /// Controller error id.
    pub error_id: u32,
    /// Human-readable text.
    pub message: String,
}

/// Format a `dtrack2 set` request.
pub fn format_set(category: &str, name: &str, value: &str) -> String {
    format!("dtrack2 set {} {} {}", category, name, value)
}

/// Format a `dtrack2 get` request.
pub fn format_get(category: &str, name: &str) -> String {
    format!("dtrack2 get {} {}", category, name)
}

/// Error codes arrive in decimal or `0x`-prefixed hexadecimal.
fn parse_error_code(token: &str) -> Option<i32> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok().map(|v| v as i32)
    } else {
        token.parse().ok()
    }
}

/// Text between the first and last double quote.
fn quoted_text(s: &str) -> Option<&str> {
    let start = s.find('"')?;
    let end = s.rfind('"')?;
    if end <= start {
        return None;
    }
    Some(&s[start + 1..end])
}

/// Classify one reply body. `None` means the body could not be tokenized
/// (the `Malformed` outcome).
pub fn classify(body: &str) -> Option<Response> {
    let trimmed = body.trim();
    if trimmed == "dtrack2 ok" || trimmed.starts_with("dtrack2 ok ") {
        return Some(Response::Ok);
    }
    if let Some(rest) = trimmed.strip_prefix("dtrack2 err ") {
        let code = parse_error_code(rest.split_ascii_whitespace().next()?)?;
        let message = quoted_text(rest)?.to_string();
        return Some(Response::Error(Dtrack2Error { code, message }));
    }
    Some(Response::Payload(trimmed.to_string()))
}

/// Walk `echo` and `expected` in lockstep with the controller's two
/// canonicalization tolerances: a run of spaces matches any non-empty run
/// of spaces, and a run of `'0'` digits not preceded by a digit (on its own
/// side) matches any such run, possibly empty, on the other side (the
/// controller strips leading zeros). Any other difference is a mismatch.
///
/// On success returns the suffix of `echo` after the matched part.
pub fn match_parameter<'a>(echo: &'a str, expected: &str) -> Option<&'a str> {
    let e = echo.as_bytes();
    let p = expected.as_bytes();
    let mut i = 0;
    let mut j = 0;
    while j < p.len() {
        if p[j] == b' ' {
            if i >= e.len() || e[i] != b' ' {
                return None;
            }
            while j < p.len() && p[j] == b' ' {
                j += 1;
            }
            while i < e.len() && e[i] == b' ' {
                i += 1;
            }
            continue;
        }
        let p_zero = p[j] == b'0' && (j == 0 || !p[j - 1].is_ascii_digit());
        let e_zero =
            i < e.len() && e[i] == b'0' && (i == 0 || !e[i - 1].is_ascii_digit());
        if p_zero || e_zero {
            if p_zero {
                while j < p.len() && p[j] == b'0' {
                    j += 1;
                }
            }
            if e_zero {
                while i < e.len() && e[i] == b'0' {
                    i += 1;
                }
            }
            continue;
        }
        if i >= e.len() || e[i] != p[j] {
            return None;
        }
        i += 1;
        j += 1;
    }
    Some(&echo[i..])
}

/// Extract the value from a `dtrack2 get` reply: the body must echo
/// `dtrack2 set <category> <name>` (under [`match_parameter`] tolerances)
/// and the remainder is the value, stripped of embedded NULs.
pub fn extract_get_value(body: &str, category: &str, name: &str) -> Option<String> {
    let expected = format!("dtrack2 set {} {}", category, name);
    let suffix = match_parameter(body, &expected)?;
    Some(suffix.trim_start_matches(' ').replace('\0', ""))
}

/// Parse a `dtrack2 msg <origin> <status> <frame> 0x<err> "<text>"` body.
pub fn parse_event_message(body: &str) -> Option<EventMessage> {
    let rest = body.trim().strip_prefix("dtrack2 msg")?;
    let mut words = rest.split_ascii_whitespace();
    let origin = words.next()?.to_string();
    let status = words.next()?.to_string();
    let frame = words.next()?.parse().ok()?;
    let error_id = words
        .next()?
        .strip_prefix("0x")
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())?;
    let message = quoted_text(rest)?.to_string();
    Some(EventMessage {
        origin,
        status,
        frame,
        error_id,
        message,
    })
}

// -- Feedback datagram builders --
//
// Each builder returns the full wire payload including the terminating
// NUL. Range checking happens in the session layer before any I/O.

/// `tfb 1 [<hand> <finger> 1.0 <strength>]`
pub fn format_tactile_finger(hand_id: u32, finger_id: u32, strength: f64) -> Vec<u8> {
    format!("tfb 1 [{} {} 1.0 {}]\0", hand_id, finger_id, strength).into_bytes()
}

/// `tfb <N> [<hand> 0 1.0 <s0>] [<hand> 1 1.0 <s1>] ...`
pub fn format_tactile_hand(hand_id: u32, strengths: &[f64]) -> Vec<u8> {
    let mut out = format!("tfb {}", strengths.len());
    for (finger, strength) in strengths.iter().enumerate() {
        out.push_str(&format!(" [{} {} 1.0 {}]", hand_id, finger, strength));
    }
    out.push('\0');
    out.into_bytes()
}

/// Switch all `num_fingers` actuators of a hand off; byte-identical to
/// [`format_tactile_hand`] with all strengths zero.
pub fn format_tactile_hand_off(hand_id: u32, num_fingers: usize) -> Vec<u8> {
    format_tactile_hand(hand_id, &vec![0.0; num_fingers])
}

/// `ffb 1 [<flystick> <durationMs> <frequencyHz> 0 0][]`
pub fn format_flystick_beep(flystick_id: u32, duration_ms: u32, frequency_hz: u32) -> Vec<u8> {
    format!(
        "ffb 1 [{} {} {} 0 0][]\0",
        flystick_id, duration_ms, frequency_hz
    )
    .into_bytes()
}

/// `ffb 1 [<flystick> 0 0 <pattern> 0][]`
pub fn format_flystick_vibration(flystick_id: u32, pattern_id: u32) -> Vec<u8> {
    format!("ffb 1 [{} 0 0 {} 0][]\0", flystick_id, pattern_id).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_ok_err_payload() {
        assert_eq!(classify("dtrack2 ok"), Some(Response::Ok));
        assert_eq!(
            classify("dtrack2 err 8 \"parameter unknown\""),
            Some(Response::Error(Dtrack2Error {
                code: 8,
                message: "parameter unknown".into()
            }))
        );
        assert_eq!(
            classify("dtrack2 err 0x00000008 \"parameter unknown\""),
            Some(Response::Error(Dtrack2Error {
                code: 8,
                message: "parameter unknown".into()
            }))
        );
        assert_eq!(
            classify("dtrack2 set system access full"),
            Some(Response::Payload("dtrack2 set system access full".into()))
        );
        assert_eq!(classify("dtrack2 err what"), None);
    }

    #[test]
    fn matcher_tolerates_space_runs() {
        assert_eq!(match_parameter("a  b c", "a b c"), Some(""));
        assert_eq!(match_parameter("a b   c rest", "a b c"), Some(" rest"));
        // A space in the expected string needs at least one in the echo.
        assert_eq!(match_parameter("ab c", "a b c"), None);
    }

    #[test]
    fn matcher_tolerates_leading_zero_runs() {
        assert_eq!(match_parameter("x 07", "x 7"), Some(""));
        assert_eq!(match_parameter("x 7", "x 007"), Some(""));
        assert_eq!(match_parameter("x 0007 y", "x 07 y"), Some(""));
        // Zeros preceded by a digit are significant.
        assert_eq!(match_parameter("x 10", "x 1"), None);
        assert_eq!(match_parameter("x 1", "x 10"), None);
    }

    #[test]
    fn matcher_rejects_other_differences() {
        assert_eq!(match_parameter("x 8", "x 7"), None);
        assert_eq!(match_parameter("y 7", "x 7"), None);
        assert_eq!(match_parameter("x", "x 7"), None);
    }

    #[test]
    fn get_value_extraction() {
        assert_eq!(
            extract_get_value("dtrack2 set system access full", "system", "access"),
            Some("full".into())
        );
        assert_eq!(
            extract_get_value("dtrack2 set config  active_room  room01", "config", "active_room"),
            Some("room01".into())
        );
        assert_eq!(
            extract_get_value("dtrack2 set system latency 42", "system", "access"),
            None
        );
    }

    #[test]
    fn event_message_parsing() {
        let msg = parse_event_message("dtrack2 msg cam ok 17 0x000000a3 \"lens dirty\"").unwrap();
        assert_eq!(msg.origin, "cam");
        assert_eq!(msg.status, "ok");
        assert_eq!(msg.frame, 17);
        assert_eq!(msg.error_id, 0xa3);
        assert_eq!(msg.message, "lens dirty");

        assert_eq!(parse_event_message("dtrack2 ok"), None);
    }

    #[test]
    fn beep_datagram_is_byte_exact() {
        assert_eq!(
            format_flystick_beep(2, 500, 4400),
            b"ffb 1 [2 500 4400 0 0][]\0".to_vec()
        );
    }

    #[test]
    fn vibration_datagram() {
        assert_eq!(
            format_flystick_vibration(1, 3),
            b"ffb 1 [1 0 0 3 0][]\0".to_vec()
        );
    }

    #[test]
    fn tactile_zero_hand_matches_hand_off() {
        assert_eq!(
            format_tactile_hand(0, &[0.0, 0.0, 0.0]),
            format_tactile_hand_off(0, 3)
        );
        assert_eq!(
            format_tactile_hand(1, &[0.5]),
            b"tfb 1 [1 0 1.0 0.5]\0".to_vec()
        );
        assert_eq!(
            format_tactile_finger(1, 0, 0.5),
            b"tfb 1 [1 0 1.0 0.5]\0".to_vec()
        );
    }
}
