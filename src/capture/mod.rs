pub mod record;

use std::fmt;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::channel::{LineSource, ReadOutcome};
use crate::error::CaptureError;
use crate::writer::Writer;

pub use record::{Record, RecordCheck, Validation};

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Longest wait for a complete line. `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub lossy_utf8: bool,
    pub check: RecordCheck,
    /// Log every written record at info level instead of debug.
    pub echo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    EndOfInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub lines_read: usize,
    pub records_written: usize,
    pub empty_lines: usize,
    pub rejected: usize,
    pub stop_reason: StopReason,
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines read, {} records written, {} empty, {} rejected",
            self.lines_read, self.records_written, self.empty_lines, self.rejected
        )
    }
}

/// Moves lines from one input channel into one output sink until the
/// token is cancelled, the input ends, or something fails.
pub struct CaptureLoop<S: LineSource, W: Writer> {
    source: S,
    writer: W,
    options: CaptureOptions,
    token: CancellationToken,
}

impl<S: LineSource, W: Writer> CaptureLoop<S, W> {
    pub fn new(source: S, writer: W, options: CaptureOptions, token: CancellationToken) -> CaptureLoop<S, W> {
        CaptureLoop { source, writer, options, token }
    }

    /// Run to completion. The sink is closed first and the channel second on
    /// every exit path, including errors.
    pub fn run(mut self) -> anyhow::Result<CaptureSummary> {
        let result = self.pump();

        if matches!(result, Ok(ref summary) if summary.stop_reason == StopReason::Interrupted) {
            log::info!("Data logging stopped by user.");
        }

        let writer_closed = self.writer.close();
        let source_closed = self.source.close();

        let summary = result?;
        writer_closed?;
        source_closed?;
        Ok(summary)
    }

    fn pump(&mut self) -> anyhow::Result<CaptureSummary> {
        let mut summary = CaptureSummary {
            lines_read: 0,
            records_written: 0,
            empty_lines: 0,
            rejected: 0,
            stop_reason: StopReason::Interrupted,
        };

        self.writer.init()?;

        let mut last_line = Instant::now();
        while !self.token.is_cancelled() {
            let raw = match self.source.poll_line()? {
                ReadOutcome::Line(raw) => raw,
                ReadOutcome::Idle => {
                    if let Some(timeout) = self.options.read_timeout {
                        if last_line.elapsed() >= timeout {
                            return Err(CaptureError::ReadTimeout(timeout).into());
                        }
                    }
                    continue;
                }
                ReadOutcome::Closed => {
                    log::info!("{} reached end of input", self.source.describe());
                    summary.stop_reason = StopReason::EndOfInput;
                    return Ok(summary);
                }
            };

            last_line = Instant::now();
            summary.lines_read += 1;

            let record = match Record::parse(&raw, self.options.lossy_utf8)? {
                Some(record) => record,
                None => {
                    summary.empty_lines += 1;
                    continue;
                }
            };

            if let Err(reason) = self.options.check.check(&record) {
                log::warn!("Skipping line {:?}: {}", record.line(), reason);
                summary.rejected += 1;
                continue;
            }

            if self.options.echo {
                log::info!("{}", record.line());
            } else {
                log::debug!("Line not empty. Data: {:?}", record.fields());
            }

            self.writer.write_record(&record)?;
            summary.records_written += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::CsvWriter;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Events(Rc<RefCell<Vec<&'static str>>>);

    /// Scripted channel; cancels the token once the script runs dry.
    struct Script {
        outcomes: VecDeque<ReadOutcome>,
        token: CancellationToken,
        closed: bool,
        events: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Script {
        fn lines(lines: &[&str], token: &CancellationToken, events: &Events) -> Script {
            Script {
                outcomes: lines.iter().map(|l| ReadOutcome::Line(l.as_bytes().to_vec())).collect(),
                token: token.clone(),
                closed: false,
                events: events.0.clone(),
            }
        }
    }

    impl LineSource for Script {
        fn poll_line(&mut self) -> anyhow::Result<ReadOutcome> {
            match self.outcomes.pop_front() {
                Some(outcome) => Ok(outcome),
                None => {
                    self.token.cancel();
                    Ok(ReadOutcome::Idle)
                }
            }
        }

        fn close(&mut self) -> anyhow::Result<()> {
            if !self.closed {
                self.closed = true;
                self.events.borrow_mut().push("source closed");
            }
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn describe(&self) -> String {
            "script".to_string()
        }
    }

    /// Writer that records into the shared event log.
    struct Recorder {
        rows: Rc<RefCell<Vec<Vec<String>>>>,
        events: Rc<RefCell<Vec<&'static str>>>,
        closed: bool,
    }

    impl Writer for Recorder {
        fn init(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn write_record(&mut self, record: &Record) -> anyhow::Result<()> {
            self.rows.borrow_mut().push(record.fields().to_vec());
            Ok(())
        }

        fn records_written(&self) -> usize {
            self.rows.borrow().len()
        }

        fn close(&mut self) -> anyhow::Result<()> {
            if !self.closed {
                self.closed = true;
                self.events.borrow_mut().push("writer closed");
            }
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn recorder(events: &Events) -> (Recorder, Rc<RefCell<Vec<Vec<String>>>>) {
        let rows = Rc::new(RefCell::new(Vec::new()));
        (Recorder { rows: rows.clone(), events: events.0.clone(), closed: false }, rows)
    }

    #[test]
    fn writes_non_empty_lines_in_order() {
        let token = CancellationToken::new();
        let events = Events::default();
        let source = Script::lines(&["1,2\n", "\n", "  \r\n", "3,4\r\n"], &token, &events);
        let (writer, rows) = recorder(&events);

        let summary = CaptureLoop::new(source, writer, CaptureOptions::default(), token).run().unwrap();

        assert_eq!(*rows.borrow(), vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(summary.lines_read, 4);
        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.empty_lines, 2);
        assert_eq!(summary.stop_reason, StopReason::Interrupted);
    }

    #[test]
    fn closes_writer_before_source() {
        let token = CancellationToken::new();
        let events = Events::default();
        let source = Script::lines(&["a\n"], &token, &events);
        let (writer, _) = recorder(&events);

        CaptureLoop::new(source, writer, CaptureOptions::default(), token).run().unwrap();

        assert_eq!(*events.0.borrow(), vec!["writer closed", "source closed"]);
    }

    #[test]
    fn stops_at_end_of_input() {
        let token = CancellationToken::new();
        let events = Events::default();
        let mut source = Script::lines(&["a\n"], &token, &events);
        source.outcomes.push_back(ReadOutcome::Closed);
        let (writer, _) = recorder(&events);

        let summary = CaptureLoop::new(source, writer, CaptureOptions::default(), token.clone()).run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::EndOfInput);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn decode_failure_still_cleans_up() {
        let token = CancellationToken::new();
        let events = Events::default();
        let mut source = Script::lines(&[], &token, &events);
        source.outcomes.push_back(ReadOutcome::Line(vec![b'1', 0xff, b'\n']));
        let (writer, rows) = recorder(&events);

        let result = CaptureLoop::new(source, writer, CaptureOptions::default(), token).run();

        assert!(result.is_err());
        assert!(rows.borrow().is_empty());
        assert_eq!(*events.0.borrow(), vec!["writer closed", "source closed"]);
    }

    #[test]
    fn numeric_validation_skips_bad_lines() {
        let token = CancellationToken::new();
        let events = Events::default();
        let source = Script::lines(&["1,2,3\n", "1,x,3\n", "1,2\n", "4,5,6\n"], &token, &events);
        let (writer, rows) = recorder(&events);
        let options = CaptureOptions {
            check: RecordCheck { validation: Validation::Numeric, expected_fields: Some(3) },
            ..CaptureOptions::default()
        };

        let summary = CaptureLoop::new(source, writer, options, token).run().unwrap();

        assert_eq!(summary.rejected, 2);
        assert_eq!(*rows.borrow(), vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
    }

    #[test]
    fn read_timeout_ends_the_run() {
        struct Silent(Rc<RefCell<Vec<&'static str>>>);

        impl LineSource for Silent {
            fn poll_line(&mut self) -> anyhow::Result<ReadOutcome> {
                std::thread::sleep(Duration::from_millis(5));
                Ok(ReadOutcome::Idle)
            }
            fn close(&mut self) -> anyhow::Result<()> {
                self.0.borrow_mut().push("source closed");
                Ok(())
            }
            fn is_closed(&self) -> bool {
                false
            }
            fn describe(&self) -> String {
                "silent".to_string()
            }
        }

        let events = Events::default();
        let (writer, _) = recorder(&events);
        let source = Silent(events.0.clone());
        let options = CaptureOptions { read_timeout: Some(Duration::from_millis(30)), ..CaptureOptions::default() };

        let err = CaptureLoop::new(source, writer, options, CancellationToken::new()).run().unwrap_err();

        assert!(matches!(err.downcast_ref::<CaptureError>(), Some(CaptureError::ReadTimeout(_))));
        assert_eq!(*events.0.borrow(), vec!["writer closed", "source closed"]);
    }

    #[test]
    fn writes_csv_through_the_loop() {
        let token = CancellationToken::new();
        let events = Events::default();
        let source = Script::lines(&["1,0.1,0.2,9.8,0.01,0.02,0.03\n", "\n"], &token, &events);
        let mut out = Vec::new();
        let header = ["time", "ax", "ay", "az", "gx", "gy", "gz", "t"].map(String::from).to_vec();

        CaptureLoop::new(source, CsvWriter::new(&mut out, header), CaptureOptions::default(), token)
            .run()
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "time,ax,ay,az,gx,gy,gz,t\r\n1,0.1,0.2,9.8,0.01,0.02,0.03\r\n"
        );
    }
}
