use std::fs::File;
use std::path::Path;

use anyhow::Context;

use crate::capture::Record;

pub mod csv;
pub mod text;

pub use self::csv::CsvWriter;
pub use self::text::TextWriter;

/// Output sink of a capture. Every record is flushed as soon as it is
/// written.
pub trait Writer {
    /// Write whatever precedes the records, such as a CSV header.
    fn init(&mut self) -> anyhow::Result<()>;
    fn write_record(&mut self, record: &Record) -> anyhow::Result<()>;
    fn records_written(&self) -> usize;
    /// Flush and release the output. Calling it again is a no-op.
    fn close(&mut self) -> anyhow::Result<()>;
    fn is_closed(&self) -> bool;
}

macro_rules! forward_writer {
    ($ty:ty) => {
        impl<T: Writer + ?Sized> Writer for $ty {
            fn init(&mut self) -> anyhow::Result<()> {
                (**self).init()
            }

            fn write_record(&mut self, record: &Record) -> anyhow::Result<()> {
                (**self).write_record(record)
            }

            fn records_written(&self) -> usize {
                (**self).records_written()
            }

            fn close(&mut self) -> anyhow::Result<()> {
                (**self).close()
            }

            fn is_closed(&self) -> bool {
                (**self).is_closed()
            }
        }
    };
}

forward_writer!(Box<T>);
forward_writer!(&mut T);

/// Create (or truncate) an output file, making parent directories as needed.
pub fn create_file(path: &Path) -> anyhow::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Unable to create directory {}", dir.display()))?;
    }

    let file = File::create(path).with_context(|| format!("Unable to create output file {}", path.display()))?;
    log::info!("Created file: {}", path.display());
    Ok(file)
}
