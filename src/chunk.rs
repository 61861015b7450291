//! Sorted runs and line-oriented file access.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use log;
use tempfile;

/// Where a run is written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    /// A freshly allocated temporary file.
    Temp,
    /// The final sort destination.
    Destination,
}

impl WriteTarget {
    /// Selects a write target. The run that is known to be the only remaining one is written straight to the
    /// destination, so no rename across file systems is ever needed.
    pub fn select(is_final: bool) -> Self {
        if is_final {
            WriteTarget::Destination
        } else {
            WriteTarget::Temp
        }
    }
}

/// A file holding records in sorted order.
#[derive(Debug)]
pub struct Run {
    path: PathBuf,
    /// Set for temporary runs, removes the file when dropped.
    tmp_path: Option<tempfile::TempPath>,
    records: usize,
}

impl Run {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the run.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn is_temporary(&self) -> bool {
        self.tmp_path.is_some()
    }

    /// Opens a line source over the run.
    pub fn open(&self, buf_size: Option<usize>) -> io::Result<LineSource> {
        LineSource::open(&self.path, buf_size)
    }

    /// Deletes a consumed temporary run. Deletion errors are logged and ignored.
    pub fn retire(self) {
        if let Some(tmp_path) = self.tmp_path {
            if let Err(err) = tmp_path.close() {
                log::warn!("temporary run {} not removed: {}", self.path.display(), err);
            }
        }
    }
}

/// Line source over a file. The file is closed as soon as the source is exhausted or fails.
///
/// Lines are returned as raw bytes without the trailing `\n` or `\r\n`, no encoding is assumed.
pub struct LineSource {
    reader: Option<io::BufReader<fs::File>>,
}

impl LineSource {
    pub fn open(path: &Path, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(LineSource { reader: Some(reader) });
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl Iterator for LineSource {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.as_mut()?.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(err) => {
                self.reader = None;
                Some(Err(err))
            }
        }
    }
}

/// Line sink producing a [`Run`].
///
/// [`LineSink::finish`] flushes and closes the file reporting errors. A sink dropped without being finished
/// still flushes its buffer, ignoring errors, and a temporary file it allocated is removed.
pub struct LineSink {
    writer: io::BufWriter<fs::File>,
    path: PathBuf,
    tmp_path: Option<tempfile::TempPath>,
    records: usize,
}

impl LineSink {
    /// Creates a sink for the given write target.
    ///
    /// # Arguments
    /// * `target` - Write target
    /// * `tmp_dir` - Directory temporary runs are allocated in
    /// * `destination` - Final sort destination
    /// * `buf_size` - Write buffer size
    pub fn create(
        target: WriteTarget,
        tmp_dir: &Path,
        destination: &Path,
        buf_size: Option<usize>,
    ) -> io::Result<Self> {
        let (file, path, tmp_path) = match target {
            WriteTarget::Destination => (fs::File::create(destination)?, destination.to_path_buf(), None),
            WriteTarget::Temp => {
                let (file, tmp_path) = tempfile::Builder::new()
                    .prefix("run-")
                    .suffix(".txt")
                    .tempfile_in(tmp_dir)?
                    .into_parts();
                (file, tmp_path.to_path_buf(), Some(tmp_path))
            }
        };

        let writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        return Ok(LineSink {
            writer,
            path,
            tmp_path,
            records: 0,
        });
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a record followed by a line feed.
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")?;
        self.records += 1;

        return Ok(());
    }

    /// Flushes and closes the sink returning the written run.
    pub fn finish(self) -> io::Result<Run> {
        let LineSink {
            writer,
            path,
            tmp_path,
            records,
        } = self;

        let file = writer.into_inner().map_err(|err| err.into_error())?;
        let size = file.metadata()?.len();
        drop(file);

        log::debug!("run {} saved ({} records, {})", path.display(), records, ByteSize(size));

        return Ok(Run {
            path,
            tmp_path,
            records,
        });
    }
}
