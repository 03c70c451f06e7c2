//! Background receiver for measurement datagrams.

use crate::Result;
use crossbeam_channel::{Receiver, Sender};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One raw measurement datagram and where it came from.
pub(crate) struct Datagram {
    pub data: Vec<u8>,
    pub source: SocketAddr,
}

/// Handle to the armed UDP receiver.
///
/// A dedicated reader thread owns the socket and forwards datagrams over a
/// bounded channel; the session pulls them with a timeout. Stopping sets a
/// flag the thread polls at its socket read timeout.
pub(crate) struct MeasurementStream {
    receiver: Receiver<Datagram>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MeasurementStream {
    pub(crate) fn start(socket: UdpSocket, buffer_size: usize) -> Result<MeasurementStream> {
        let (sender, receiver) = crossbeam_channel::bounded(256);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("dtrack-recv".into())
            .spawn(move || reader_loop(socket, buffer_size, sender, stop_clone))?;

        Ok(MeasurementStream {
            receiver,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Wait up to `timeout` for the next datagram.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Datagram> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => crate::DTrackError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => crate::DTrackError::Terminated,
        })
    }

    /// Stop the reader thread and wait for it to finish.
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MeasurementStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reader_loop(
    socket: UdpSocket,
    buffer_size: usize,
    sender: Sender<Datagram>,
    stop_flag: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; buffer_size];

    log::info!("measurement reader started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("measurement reader stopping");
            break;
        }

        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                let datagram = Datagram {
                    data: buf[..len].to_vec(),
                    source,
                };
                if let Err(err) = sender.try_send(datagram) {
                    match err {
                        crossbeam_channel::TrySendError::Full(_) => {
                            log::trace!("receive queue full, dropping datagram");
                        }
                        crossbeam_channel::TrySendError::Disconnected(_) => {
                            log::info!("receive queue disconnected, stopping reader");
                            break;
                        }
                    }
                }
            }
            // Poll tick, check the stop flag again.
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => {
                log::warn!("measurement read error: {}", err);
            }
        }
    }
}
