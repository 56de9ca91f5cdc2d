use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use anyhow::Context;
use serde_derive::Deserialize;

use super::{LineSource, ReadOutcome, POLL_INTERVAL};
use crate::error::CaptureError;

const MAX_DATAGRAM: usize = 65_507;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UdpSettings {
    /// Local address to receive on, e.g. `0.0.0.0:2390`.
    pub bind: String,
}

/// Receives datagrams and hands them out line by line.
///
/// A datagram may carry several newline separated lines. The end of a
/// datagram also ends a line, so a sender that omits the trailing newline
/// still produces one record per datagram.
pub struct UdpSource {
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    queued: VecDeque<Vec<u8>>,
    buffer: Vec<u8>,
}

impl UdpSource {
    pub fn bind(settings: &UdpSettings) -> anyhow::Result<UdpSource> {
        let socket = UdpSocket::bind(&settings.bind)
            .with_context(|| format!("Unable to bind UDP socket to {}", settings.bind))?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;

        log::info!("Listening for UDP datagrams on {}", local_addr);

        Ok(UdpSource {
            socket: Some(socket),
            local_addr,
            queued: VecDeque::new(),
            buffer: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn queue_datagram(&mut self, len: usize) {
        let datagram = &self.buffer[..len];
        for line in datagram.split_inclusive(|byte| *byte == b'\n') {
            self.queued.push_back(line.to_vec());
        }
    }
}

impl LineSource for UdpSource {
    fn poll_line(&mut self) -> anyhow::Result<ReadOutcome> {
        if let Some(line) = self.queued.pop_front() {
            return Ok(ReadOutcome::Line(line));
        }

        let socket = self.socket.as_ref().ok_or_else(|| CaptureError::Closed(self.describe()))?;
        match socket.recv_from(&mut self.buffer) {
            Ok((len, from)) => {
                log::trace!("Received {} bytes from {}", len, from);
                self.queue_datagram(len);
                // An empty datagram is an empty line
                Ok(ReadOutcome::Line(self.queued.pop_front().unwrap_or_default()))
            }
            Err(e) => match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(ReadOutcome::Idle),
                _ => Err(anyhow::Error::new(e).context("Error receiving UDP datagram")),
            },
        }
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.socket.take().is_some() {
            self.queued.clear();
            log::info!("UDP socket on {} closed.", self.local_addr);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn describe(&self) -> String {
        format!("UDP socket on {}", self.local_addr)
    }
}

impl Drop for UdpSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
