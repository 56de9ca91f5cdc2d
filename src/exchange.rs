use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use anyhow::Context;

use crate::config::ExchangeConfig;

const RECV_BUFFER: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Reply { payload: String, from: SocketAddr },
    NoResponse,
}

/// Send one datagram to the configured target and wait once for an answer.
pub fn request(config: &ExchangeConfig) -> anyhow::Result<ExchangeOutcome> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Unable to bind UDP socket")?;
    socket.set_read_timeout(Some(config.timeout()))?;

    log::debug!("Sending {:?} to {}", config.payload, config.target);
    socket
        .send_to(config.payload.as_bytes(), config.target.as_str())
        .with_context(|| format!("Unable to send to {}", config.target))?;

    let mut buffer = [0u8; RECV_BUFFER];
    let (len, from) = match socket.recv_from(&mut buffer) {
        Ok(received) => received,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            log::info!("No response received.");
            return Ok(ExchangeOutcome::NoResponse);
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Error receiving reply")),
    };

    let payload = String::from_utf8(buffer[..len].to_vec())
        .map_err(|e| anyhow::anyhow!("Reply from {} is not valid UTF-8: {}", from, e))?;
    log::info!("Arduino replied: {}", payload);

    Ok(ExchangeOutcome::Reply { payload, from })
}
