use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{create_file, Writer};
use crate::capture::Record;

/// Writes each record's stripped line followed by a newline.
pub struct TextWriter<W: Write = File> {
    out: Option<W>,
    records_written: usize,
}

impl TextWriter<File> {
    pub fn create(path: &Path) -> anyhow::Result<TextWriter<File>> {
        Ok(TextWriter::new(create_file(path)?))
    }
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W) -> TextWriter<W> {
        TextWriter { out: Some(out), records_written: 0 }
    }
}

impl<W: Write> Writer for TextWriter<W> {
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(|| anyhow::anyhow!("Text output already closed"))?;
        out.write_all(record.line().as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        self.records_written += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.records_written
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.out.is_none()
    }
}

impl<W: Write> Drop for TextWriter<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
