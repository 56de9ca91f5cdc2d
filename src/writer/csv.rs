use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{create_file, Writer};
use crate::capture::Record;

const ROW_TERMINATOR: &str = "\r\n";

/// Writes a header row once, then one row per record.
pub struct CsvWriter<W: Write = File> {
    out: Option<W>,
    header: Vec<String>,
    header_written: bool,
    records_written: usize,
}

impl CsvWriter<File> {
    pub fn create(path: &Path, header: Vec<String>) -> anyhow::Result<CsvWriter<File>> {
        Ok(CsvWriter::new(create_file(path)?, header))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W, header: Vec<String>) -> CsvWriter<W> {
        CsvWriter { out: Some(out), header, header_written: false, records_written: 0 }
    }

    fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(|| anyhow::anyhow!("CSV output already closed"))?;
        out.write_all(format_row(fields).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Join fields into one CSV row, quoting the ones that need it.
pub fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            row.push(',');
        }

        let field = field.as_ref();
        if field.contains(['"', ',', '\r', '\n']) {
            row.push('"');
            row.push_str(&field.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row.push_str(ROW_TERMINATOR);
    row
}

impl<W: Write> Writer for CsvWriter<W> {
    fn init(&mut self) -> anyhow::Result<()> {
        if self.header_written {
            return Ok(());
        }
        let header = std::mem::take(&mut self.header);
        self.write_row(&header)?;
        self.header = header;
        self.header_written = true;
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> anyhow::Result<()> {
        if !self.header_written {
            self.init()?;
        }
        self.write_row(record.fields())?;
        self.records_written += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.records_written
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            log::debug!("CSV output closed after {} records", self.records_written);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.out.is_none()
    }
}

impl<W: Write> Drop for CsvWriter<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
