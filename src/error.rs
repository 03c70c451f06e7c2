/// Errors that can occur when talking to a DTrack controller.
#[derive(Debug, thiserror::Error)]
pub enum DTrackError {
    #[error("network error: {0}")]
    Net(#[from] std::io::Error),

    #[error("timeout waiting for data")]
    Timeout,

    #[error("measurement data parse error: {0}")]
    Parse(#[from] crate::parser::ParseError),

    #[error("command too long: {len} bytes")]
    CommandTooLong { len: usize },

    #[error("malformed controller response: {0:?}")]
    MalformedResponse(String),

    #[error("command session lost")]
    ConnectionLost,

    #[error("no command interface (listening mode)")]
    NotConnected,

    #[error("measurement receiver stopped")]
    Terminated,

    #[error("controller error 0x{code:08x}: {message}")]
    Controller { code: i32, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown destination: no controller address and no datagram received yet")]
    UnknownDestination,
}

/// Pollable fault value for the data and command channels.
///
/// `receive()` and the command primitive keep the most recent fault of
/// their channel readable after the call returns; `None` in the session
/// accessors means the last operation on that channel succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No data or no reply within the configured timeout.
    Timeout,
    /// Socket-level failure.
    Net,
    /// The payload could not be parsed.
    Parse,
}

/// A `dtrack2 err <code> "<message>"` reply reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dtrack2Error {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for Dtrack2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "dtrack2 error 0x{:08x}: {}", self.code, self.message)
    }
}
