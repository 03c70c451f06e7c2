//! Socket plumbing for the measurement and command channels.

use crate::error::DTrackError;
use crate::protocol::MAX_COMMAND_LEN;
use crate::Result;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

/// Read timeout on the measurement socket; the reader thread checks its
/// stop flag at this interval.
pub(crate) const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bind the local measurement socket. Port 0 lets the OS pick; a multicast
/// group is joined on the default interface when given.
pub(crate) fn bind_data_socket(port: u16, multicast: Option<Ipv4Addr>) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
    if let Some(group) = multicast {
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    }
    socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
    Ok(socket)
}

/// Persistent TCP session to the controller's command port.
///
/// One request, one reply, both NUL-terminated ASCII. Commands are
/// serialized by the `&mut self` receivers; a socket-level failure marks
/// the session dead and every later call fails fast.
pub(crate) struct CommandChannel {
    stream: TcpStream,
    timeout: Duration,
    dead: bool,
}

impl CommandChannel {
    pub(crate) fn connect(addr: SocketAddr, timeout: Duration) -> Result<CommandChannel> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;
        log::info!("command session established with {}", addr);
        Ok(CommandChannel {
            stream,
            timeout,
            dead: false,
        })
    }

    /// Send one command and wait for its reply body (NUL stripped).
    pub(crate) fn exchange(&mut self, command: &str) -> Result<String> {
        if self.dead {
            return Err(DTrackError::ConnectionLost);
        }
        if command.len() > MAX_COMMAND_LEN {
            return Err(DTrackError::CommandTooLong {
                len: command.len(),
            });
        }

        let mut wire = Vec::with_capacity(command.len() + 1);
        wire.extend_from_slice(command.as_bytes());
        wire.push(0);
        if let Err(err) = self.stream.write_all(&wire) {
            return Err(self.fail(err));
        }

        self.read_reply()
    }

    fn read_reply(&mut self) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut reply: Vec<u8> = Vec::new();
        let mut chunk = [0u8; MAX_COMMAND_LEN + 1];

        loop {
            if let Some(end) = reply.iter().position(|&b| b == 0) {
                return Ok(String::from_utf8_lossy(&reply[..end]).into_owned());
            }
            if reply.len() >= MAX_COMMAND_LEN {
                return Err(DTrackError::MalformedResponse(
                    String::from_utf8_lossy(&reply).into_owned(),
                ));
            }

            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return Err(DTrackError::Timeout),
            };
            self.stream.set_read_timeout(Some(remaining))?;

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.dead = true;
                    log::warn!("controller closed the command session");
                    return Err(DTrackError::ConnectionLost);
                }
                Ok(n) => reply.extend_from_slice(&chunk[..n]),
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(DTrackError::Timeout)
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    fn fail(&mut self, err: std::io::Error) -> DTrackError {
        self.dead = true;
        log::warn!("command session error: {}", err);
        DTrackError::Net(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// One-shot mock controller: accepts a connection, reads up to the NUL,
    /// answers with a fixed reply.
    fn mock_controller(reply: &'static [u8]) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut byte = [0u8; 1];
            while stream.read(&mut byte).map(|n| n == 1).unwrap_or(false) {
                if byte[0] == 0 {
                    break;
                }
                received.push(byte[0]);
            }
            stream.write_all(reply).unwrap();
        });
        addr
    }

    #[test]
    fn exchange_round_trip() {
        let addr = mock_controller(b"dtrack2 set system access full\0");
        let mut channel = CommandChannel::connect(addr, Duration::from_secs(2)).unwrap();
        let body = channel.exchange("dtrack2 get system access").unwrap();
        assert_eq!(body, "dtrack2 set system access full");
    }

    #[test]
    fn oversized_command_is_rejected_before_io() {
        let addr = mock_controller(b"dtrack2 ok\0");
        let mut channel = CommandChannel::connect(addr, Duration::from_secs(2)).unwrap();
        let command = "x".repeat(250);
        match channel.exchange(&command) {
            Err(DTrackError::CommandTooLong { len: 250 }) => {}
            other => panic!("unexpected: {:?}", other),
        }
        // The session stays usable afterwards.
        assert_eq!(channel.exchange("dtrack2 tracking start").unwrap(), "dtrack2 ok");
    }

    #[test]
    fn closed_session_reports_connection_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let mut channel = CommandChannel::connect(addr, Duration::from_secs(2)).unwrap();
        match channel.exchange("dtrack2 getmsg") {
            Err(DTrackError::ConnectionLost) | Err(DTrackError::Net(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        // Dead for good.
        match channel.exchange("dtrack2 getmsg") {
            Err(DTrackError::ConnectionLost) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn reply_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_millis(300));
            drop(stream);
        });
        let mut channel = CommandChannel::connect(addr, Duration::from_millis(100)).unwrap();
        match channel.exchange("dtrack2 getmsg") {
            Err(DTrackError::Timeout) => {}
            other => panic!("unexpected: {:?}", other),
        }
        hold.join().unwrap();
    }
}
