//! Session facade for a DTrack controller.

use crate::error::{DTrackError, Dtrack2Error, Fault};
use crate::net::{bind_data_socket, CommandChannel};
use crate::parser;
use crate::protocol::{self, EventMessage, Response};
use crate::stream::MeasurementStream;
use crate::types::Snapshot;
use crate::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Tunables of a session; the defaults match the controller's published
/// behavior.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long `receive()` waits for a measurement datagram.
    pub data_timeout: Duration,
    /// How long a command waits for its reply (and the TCP connect bound).
    pub command_timeout: Duration,
    /// Receive buffer per datagram; must hold the largest datagram the
    /// controller emits.
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(10),
            buffer_size: 32 * 1024,
        }
    }
}

/// Parsed form of the single-argument connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: Option<String>,
    data_port: u16,
    firewall: bool,
}

/// Grammar: `<port>`, `<multicast-ip>:<port>`, `<host>:<port>` or
/// `<host>:<port>:fw`.
fn parse_connection(conn: &str) -> Result<Endpoint> {
    let parts: Vec<&str> = conn.split(':').collect();
    let bad = || DTrackError::InvalidArgument(format!("connection string {:?}", conn));
    match parts.as_slice() {
        [port] => Ok(Endpoint {
            host: None,
            data_port: port.parse().map_err(|_| bad())?,
            firewall: false,
        }),
        [host, port] => Ok(Endpoint {
            host: Some(host.to_string()),
            data_port: port.parse().map_err(|_| bad())?,
            firewall: false,
        }),
        [host, port, "fw"] => Ok(Endpoint {
            host: Some(host.to_string()),
            data_port: port.parse().map_err(|_| bad())?,
            firewall: true,
        }),
        _ => Err(bad()),
    }
}

/// A session with one DTrack controller.
///
/// Owns the UDP measurement receiver, optionally a TCP command session,
/// and the current [`Snapshot`]. All operations are synchronous; `receive`
/// blocks up to the configured data timeout.
pub struct DTrack {
    config: Config,
    /// Controller address, unknown in pure-listening and multicast modes.
    controller: Option<IpAddr>,
    multicast: Option<Ipv4Addr>,
    /// The measurement socket; reader threads run on clones of it, so the
    /// port survives stop/start cycles. Also used for priming and
    /// feedback sends.
    socket: Option<UdpSocket>,
    local_port: u16,
    stream: Option<MeasurementStream>,
    command: Option<CommandChannel>,
    snapshot: Snapshot,
    last_source: Option<SocketAddr>,
    last_data_error: Option<Fault>,
    last_server_error: Option<Fault>,
    last_dtrack2_error: Option<Dtrack2Error>,
    last_event_message: Option<EventMessage>,
}

impl DTrack {
    /// Open a session with default [`Config`].
    ///
    /// The connection string decides the mode: `"5000"` listens on UDP
    /// port 5000; `"224.0.1.1:5000"` joins a multicast group;
    /// `"atc-301:5000"` additionally opens the TCP command session;
    /// `"atc-301:5000:fw"` skips TCP but primes a stateful firewall.
    pub fn open(conn: &str) -> Result<DTrack> {
        Self::open_with(conn, Config::default())
    }

    /// Open a session with explicit tunables.
    pub fn open_with(conn: &str, config: Config) -> Result<DTrack> {
        let endpoint = parse_connection(conn)?;

        let multicast = endpoint
            .host
            .as_deref()
            .and_then(|h| h.parse::<Ipv4Addr>().ok())
            .filter(|ip| ip.is_multicast());

        let controller = match (&endpoint.host, multicast) {
            (Some(host), None) => Some(resolve(host)?),
            _ => None,
        };

        let socket = bind_data_socket(endpoint.data_port, multicast)?;
        let local_port = socket.local_addr()?.port();
        let stream = MeasurementStream::start(socket.try_clone()?, config.buffer_size)?;

        // Communicating mode opens TCP; firewall mode deliberately not.
        let command = match controller {
            Some(ip) if !endpoint.firewall => {
                let addr = SocketAddr::new(ip, protocol::COMMAND_PORT);
                match CommandChannel::connect(addr, config.command_timeout) {
                    Ok(channel) => Some(channel),
                    Err(err) => {
                        log::warn!("command session unavailable: {}", err);
                        None
                    }
                }
            }
            _ => None,
        };

        log::info!(
            "session open: data port {}, controller {:?}, multicast {:?}",
            local_port,
            controller,
            multicast
        );

        Ok(DTrack {
            config,
            controller,
            multicast,
            socket: Some(socket),
            local_port,
            stream: Some(stream),
            command,
            snapshot: Snapshot::default(),
            last_source: None,
            last_data_error: None,
            last_server_error: None,
            last_dtrack2_error: None,
            last_event_message: None,
        })
    }

    // -- mode and state accessors --

    /// The UDP receiver bound successfully and is armed.
    pub fn is_data_interface_valid(&self) -> bool {
        self.stream.is_some()
    }

    /// A TCP command session exists.
    pub fn is_command_interface_valid(&self) -> bool {
        self.command.is_some()
    }

    /// Local UDP port measurement data arrives on.
    pub fn local_data_port(&self) -> u16 {
        self.local_port
    }

    /// Controller address, when the connection string named one.
    pub fn controller_addr(&self) -> Option<IpAddr> {
        self.controller
    }

    /// The most recently published snapshot (empty before the first frame).
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Fault of the last data-channel operation, `None` after success.
    pub fn last_data_error(&self) -> Option<Fault> {
        self.last_data_error
    }

    /// Fault of the last command-channel operation, `None` after success.
    pub fn last_server_error(&self) -> Option<Fault> {
        self.last_server_error
    }

    /// Last `dtrack2 err` reply the controller sent, if any.
    pub fn last_dtrack2_error(&self) -> Option<&Dtrack2Error> {
        self.last_dtrack2_error.as_ref()
    }

    /// Last event message retrieved with [`DTrack::get_message`].
    pub fn last_event_message(&self) -> Option<&EventMessage> {
        self.last_event_message.as_ref()
    }

    // -- measurement data path --

    /// Wait for the next measurement datagram and publish its snapshot.
    ///
    /// On timeout or parse failure the previous snapshot stays current.
    pub fn receive(&mut self) -> Result<&Snapshot> {
        let stream = match &self.stream {
            Some(stream) => stream,
            None => {
                self.last_data_error = Some(Fault::Net);
                return Err(DTrackError::Terminated);
            }
        };
        match stream.recv_timeout(self.config.data_timeout) {
            Ok(datagram) => self.process_packet(&datagram.data, Some(datagram.source)),
            Err(DTrackError::Timeout) => {
                self.last_data_error = Some(Fault::Timeout);
                Err(DTrackError::Timeout)
            }
            Err(err) => {
                self.last_data_error = Some(Fault::Net);
                Err(err)
            }
        }
    }

    /// Parse one caller-supplied datagram and publish its snapshot.
    ///
    /// Fails only on empty input or a malformed frame; the source address,
    /// when given, becomes the fallback feedback destination.
    pub fn process_packet(
        &mut self,
        data: &[u8],
        source: Option<SocketAddr>,
    ) -> Result<&Snapshot> {
        if let Some(source) = source {
            self.last_source = Some(source);
        }
        match parser::parse_frame(data) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.last_data_error = None;
                Ok(&self.snapshot)
            }
            Err(err) => {
                self.last_data_error = Some(Fault::Parse);
                Err(err.into())
            }
        }
    }

    // -- measurement lifecycle --

    /// Start measurement: `dtrack2 tracking start` when a command session
    /// exists. The firewall is primed and the receiver armed even when the
    /// command fails, so an already-running measurement keeps flowing; a
    /// command error takes precedence over a priming/arming one.
    pub fn start_measurement(&mut self) -> Result<()> {
        let command_result = if self.command.is_some() {
            self.command_expect_ok("dtrack2 tracking start")
        } else {
            Ok(())
        };
        let arm_result = self.prime_firewall().and_then(|_| self.arm());
        command_result.and(arm_result)
    }

    /// Stop measurement: disarm the receiver (a pending `receive` returns
    /// promptly), then `dtrack2 tracking stop` when a command session
    /// exists.
    pub fn stop_measurement(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        if self.command.is_some() {
            self.command_expect_ok("dtrack2 tracking stop")?;
        }
        Ok(())
    }

    /// Send the stateful-firewall priming datagram from the data port to
    /// the controller's sender port. A no-op when the controller address
    /// is unknown.
    pub fn prime_firewall(&mut self) -> Result<()> {
        let (Some(ip), Some(socket)) = (self.controller, self.socket.as_ref()) else {
            return Ok(());
        };
        socket.send_to(
            protocol::FIREWALL_PRIMING,
            SocketAddr::new(ip, protocol::SENDER_PORT),
        )?;
        Ok(())
    }

    /// Re-arm the UDP receiver after a stop.
    fn arm(&mut self) -> Result<()> {
        if self.stream.is_none() {
            let socket = match &self.socket {
                Some(socket) => socket.try_clone()?,
                None => {
                    let socket = bind_data_socket(self.local_port, self.multicast)?;
                    self.socket = Some(socket.try_clone()?);
                    socket
                }
            };
            self.stream = Some(MeasurementStream::start(socket, self.config.buffer_size)?);
        }
        Ok(())
    }

    /// Close both channels. Idempotent.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.socket = None;
        self.command = None;
    }

    // -- command channel --

    /// Send one `dtrack2` command and classify the reply.
    pub fn send_command(&mut self, command: &str) -> Result<Response> {
        let channel = self.command.as_mut().ok_or(DTrackError::NotConnected)?;
        match channel.exchange(command) {
            Ok(body) => match protocol::classify(&body) {
                Some(response) => {
                    self.last_server_error = None;
                    if let Response::Error(err) = &response {
                        self.last_dtrack2_error = Some(err.clone());
                    }
                    Ok(response)
                }
                None => {
                    self.last_server_error = Some(Fault::Parse);
                    Err(DTrackError::MalformedResponse(body))
                }
            },
            Err(err) => {
                self.last_server_error = Some(match err {
                    DTrackError::Timeout => Fault::Timeout,
                    DTrackError::MalformedResponse(_) => Fault::Parse,
                    _ => Fault::Net,
                });
                if matches!(err, DTrackError::ConnectionLost | DTrackError::Net(_)) {
                    self.command = None;
                }
                Err(err)
            }
        }
    }

    fn command_expect_ok(&mut self, command: &str) -> Result<()> {
        match self.send_command(command)? {
            Response::Ok => Ok(()),
            Response::Error(err) => Err(DTrackError::Controller {
                code: err.code,
                message: err.message,
            }),
            Response::Payload(body) => {
                self.last_server_error = Some(Fault::Parse);
                Err(DTrackError::MalformedResponse(body))
            }
        }
    }

    /// `dtrack2 set <category> <name> <value>`, requiring `dtrack2 ok`.
    pub fn set_param(&mut self, category: &str, name: &str, value: &str) -> Result<()> {
        self.command_expect_ok(&protocol::format_set(category, name, value))
    }

    /// `dtrack2 get <category> <name>`, returning the echoed value.
    pub fn get_param(&mut self, category: &str, name: &str) -> Result<String> {
        match self.send_command(&protocol::format_get(category, name))? {
            Response::Payload(body) => {
                match protocol::extract_get_value(&body, category, name) {
                    Some(value) => Ok(value),
                    None => {
                        self.last_server_error = Some(Fault::Parse);
                        Err(DTrackError::MalformedResponse(body))
                    }
                }
            }
            Response::Error(err) => Err(DTrackError::Controller {
                code: err.code,
                message: err.message,
            }),
            Response::Ok => {
                self.last_server_error = Some(Fault::Parse);
                Err(DTrackError::MalformedResponse("dtrack2 ok".into()))
            }
        }
    }

    /// Whether this session holds full access to the controller, as
    /// opposed to the monitor access left while its own front-end runs.
    pub fn has_full_access(&mut self) -> Result<bool> {
        Ok(self.get_param("system", "access")? == "full")
    }

    /// Fetch the next event message from the controller log, `None` when
    /// the log is drained.
    pub fn get_message(&mut self) -> Result<Option<EventMessage>> {
        match self.send_command("dtrack2 getmsg")? {
            Response::Payload(body) => match protocol::parse_event_message(&body) {
                Some(message) => {
                    self.last_event_message = Some(message.clone());
                    Ok(Some(message))
                }
                None => Ok(None),
            },
            Response::Error(err) => Err(DTrackError::Controller {
                code: err.code,
                message: err.message,
            }),
            Response::Ok => Ok(None),
        }
    }

    // -- feedback --

    fn feedback_target(&self) -> Result<SocketAddr> {
        if let Some(ip) = self.controller {
            return Ok(SocketAddr::new(ip, protocol::FEEDBACK_PORT));
        }
        match self.last_source {
            Some(source) => Ok(SocketAddr::new(source.ip(), protocol::FEEDBACK_PORT)),
            None => Err(DTrackError::UnknownDestination),
        }
    }

    fn send_feedback(&self, payload: &[u8]) -> Result<()> {
        let target = self.feedback_target()?;
        let socket = self.socket.as_ref().ok_or(DTrackError::Terminated)?;
        socket.send_to(payload, target)?;
        Ok(())
    }

    fn check_strength(strength: f64) -> Result<()> {
        if (0.0..=1.0).contains(&strength) {
            Ok(())
        } else {
            Err(DTrackError::InvalidArgument(format!(
                "tactile strength {} outside [0, 1]",
                strength
            )))
        }
    }

    /// Drive one tactile actuator of a fingertracking hand.
    pub fn tactile_finger(&mut self, hand_id: u32, finger_id: u32, strength: f64) -> Result<()> {
        Self::check_strength(strength)?;
        self.send_feedback(&protocol::format_tactile_finger(hand_id, finger_id, strength))
    }

    /// Drive all tactile actuators of a hand, one strength per finger.
    pub fn tactile_hand(&mut self, hand_id: u32, strengths: &[f64]) -> Result<()> {
        for &strength in strengths {
            Self::check_strength(strength)?;
        }
        self.send_feedback(&protocol::format_tactile_hand(hand_id, strengths))
    }

    /// Switch all tactile actuators of a hand off.
    pub fn tactile_hand_off(&mut self, hand_id: u32, num_fingers: usize) -> Result<()> {
        self.send_feedback(&protocol::format_tactile_hand_off(hand_id, num_fingers))
    }

    /// Let a Flystick beep.
    pub fn flystick_beep(
        &mut self,
        flystick_id: u32,
        duration_ms: u32,
        frequency_hz: u32,
    ) -> Result<()> {
        self.send_feedback(&protocol::format_flystick_beep(
            flystick_id,
            duration_ms,
            frequency_hz,
        ))
    }

    /// Start one of a Flystick's built-in vibration patterns.
    pub fn flystick_vibration(&mut self, flystick_id: u32, pattern_id: u32) -> Result<()> {
        self.send_feedback(&protocol::format_flystick_vibration(flystick_id, pattern_id))
    }
}

impl Drop for DTrack {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse() {
        return Ok(ip);
    }
    (host, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip())
        .ok_or_else(|| DTrackError::InvalidArgument(format!("cannot resolve host {:?}", host)))
}
