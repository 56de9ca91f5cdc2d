use std::io::{BufRead, BufReader, ErrorKind, Read};

use super::{LineSource, ReadOutcome};
use crate::error::CaptureError;

/// Longest partial line kept while waiting for its newline.
pub const MAX_PARTIAL_LINE: usize = 64 * 1024;

/// Line source over any byte stream: a serial port, a file, stdin.
///
/// Partial lines survive read timeouts; the bytes already received stay in
/// `pending` until the newline shows up.
pub struct StreamSource<R: Read> {
    label: String,
    reader: Option<BufReader<R>>,
    pending: Vec<u8>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(label: impl Into<String>, reader: R) -> StreamSource<R> {
        StreamSource {
            label: label.into(),
            reader: Some(BufReader::new(reader)),
            pending: Vec::new(),
        }
    }
}

impl<R: Read> LineSource for StreamSource<R> {
    fn poll_line(&mut self) -> anyhow::Result<ReadOutcome> {
        let reader = self.reader.as_mut().ok_or_else(|| CaptureError::Closed(self.label.clone()))?;

        // One fill per poll, so a stream without newlines still hands control
        // back to the loop after every chunk.
        let (used, complete) = match reader.fill_buf() {
            Ok(available) if available.is_empty() => {
                if self.pending.is_empty() {
                    return Ok(ReadOutcome::Closed);
                }
                // Unterminated tail before EOF
                return Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)));
            }
            Ok(available) => match available.iter().position(|byte| *byte == b'\n') {
                Some(end) => {
                    self.pending.extend_from_slice(&available[..=end]);
                    (end + 1, true)
                }
                None => {
                    self.pending.extend_from_slice(available);
                    (available.len(), false)
                }
            },
            Err(e) => {
                return match e.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(ReadOutcome::Idle),
                    ErrorKind::BrokenPipe => {
                        log::error!("Unable to connect to data collection port ({})", self.label);
                        Err(CaptureError::Disconnected.into())
                    }
                    _ => Err(anyhow::Error::new(e).context(format!("Error reading from {}", self.label))),
                }
            }
        };
        reader.consume(used);

        if complete {
            return Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)));
        }

        if self.pending.len() > MAX_PARTIAL_LINE {
            log::warn!("Dropping {} bytes without a newline from {}", self.pending.len(), self.label);
            self.pending.clear();
        }
        Ok(ReadOutcome::Idle)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(reader) = self.reader.take() {
            drop(reader);
            if !self.pending.is_empty() {
                log::warn!("Discarding {} bytes of incomplete line from {}", self.pending.len(), self.label);
                self.pending.clear();
            }
            log::info!("{} closed.", self.label);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl<R: Read> Drop for StreamSource<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
