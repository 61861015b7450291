//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::buffer::{RecordBuffer, RecordBufferBuilder};
use crate::chunk::{LineSink, LineSource, Run, WriteTarget};
use crate::key::KeyExtractor;
use crate::merger::BinaryHeapMerger;
use crate::order::SortOrder;

/// Default number of records sorted in memory at once.
pub const DEFAULT_SORT_SIZE: usize = 10000;
/// Default number of runs merged in a single pass.
pub const DEFAULT_MERGE_SIZE: usize = 32;
/// Default field delimiter.
pub const DEFAULT_DELIMITER: &str = " ";

/// Sorter configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Sort size is less than 2.
    SortSizeTooSmall(usize),
    /// Merge size is less than 2.
    MergeSizeTooSmall(usize),
    /// No key column configured.
    NoKeyColumns,
    /// Field delimiter is empty.
    EmptyDelimiter,
    /// Source and destination denote the same file.
    SamePaths(PathBuf),
}

impl Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConfigError::SortSizeTooSmall(size) => write!(f, "sort size must be at least 2, got {}", size),
            ConfigError::MergeSizeTooSmall(size) => write!(f, "merge size must be at least 2, got {}", size),
            ConfigError::NoKeyColumns => write!(f, "at least one key column is required"),
            ConfigError::EmptyDelimiter => write!(f, "field delimiter must not be empty"),
            ConfigError::SamePaths(path) => {
                write!(f, "source and destination are the same file: {}", path.display())
            }
        }
    }
}

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration.
    Config(ConfigError),
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// Record has no field at a key column.
    KeyOutOfRange { column: usize, record: Vec<u8> },
    /// Runs left unmerged after a merge pass completed.
    UnmergedRuns(usize),
    /// Merge requested without any run.
    NoRuns,
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(err) => Some(err),
            SortError::TempDir(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::KeyOutOfRange { .. } => None,
            SortError::UnmergedRuns(_) => None,
            SortError::NoRuns => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(err) => write!(f, "invalid configuration: {}", err),
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::KeyOutOfRange { column, record } => {
                write!(f, "key column {} out of range for record {:?}", column, String::from_utf8_lossy(record))
            }
            SortError::UnmergedRuns(count) => {
                write!(f, "internal error: {} runs left open after merge completed", count)
            }
            SortError::NoRuns => write!(f, "no runs to merge"),
        }
    }
}

impl From<ConfigError> for SortError {
    fn from(err: ConfigError) -> Self {
        SortError::Config(err)
    }
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug)]
pub struct ExternalSorterBuilder {
    /// Maximum number of records sorted in memory at once.
    sort_size: usize,
    /// Maximum number of runs merged in a single pass.
    merge_size: usize,
    /// Field delimiter.
    delimiter: String,
    /// Zero-based key columns.
    columns: Vec<usize>,
    /// Records ordering policy.
    order: SortOrder,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        if self.sort_size < 2 {
            return Err(ConfigError::SortSizeTooSmall(self.sort_size).into());
        }
        if self.merge_size < 2 {
            return Err(ConfigError::MergeSizeTooSmall(self.merge_size).into());
        }
        if self.columns.is_empty() {
            return Err(ConfigError::NoKeyColumns.into());
        }
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter.into());
        }

        ExternalSorter::new(
            RecordBufferBuilder::new(self.sort_size, false),
            self.merge_size,
            KeyExtractor::new(self.columns, self.delimiter),
            self.order,
            self.tmp_dir.as_deref(),
            self.rw_buf_size,
        )
    }

    /// Sets maximum number of records sorted in memory at once.
    pub fn with_sort_size(mut self, sort_size: usize) -> ExternalSorterBuilder {
        self.sort_size = sort_size;
        return self;
    }

    /// Sets maximum number of runs merged in a single pass.
    pub fn with_merge_size(mut self, merge_size: usize) -> ExternalSorterBuilder {
        self.merge_size = merge_size;
        return self;
    }

    /// Sets field delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> ExternalSorterBuilder {
        self.delimiter = delimiter.into();
        return self;
    }

    /// Sets zero-based columns the sort key is composed of.
    pub fn with_key_columns(mut self, columns: Vec<usize>) -> ExternalSorterBuilder {
        self.columns = columns;
        return self;
    }

    /// Sets reverse sorting order.
    pub fn with_reverse(mut self, reverse: bool) -> ExternalSorterBuilder {
        self.order.reverse = reverse;
        return self;
    }

    /// Sets stable sorting.
    pub fn with_stable(mut self, stable: bool) -> ExternalSorterBuilder {
        self.order.stable = stable;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets run read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            sort_size: DEFAULT_SORT_SIZE,
            merge_size: DEFAULT_MERGE_SIZE,
            delimiter: DEFAULT_DELIMITER.to_string(),
            columns: vec![0],
            order: SortOrder::default(),
            tmp_dir: None,
            rw_buf_size: None,
        }
    }
}

/// External sorter.
pub struct ExternalSorter {
    /// Record buffer builder.
    buffer_builder: RecordBufferBuilder,
    /// Maximum number of runs merged in a single pass.
    merge_size: usize,
    /// Record key extractor.
    extractor: KeyExtractor,
    /// Records ordering policy.
    order: SortOrder,
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `buffer_builder` - Builder of record buffers used for in-memory sorting.
    /// * `merge_size` - Maximum number of runs merged in a single pass.
    /// * `extractor` - Record key extractor.
    /// * `order` - Records ordering policy.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Runs file read/write buffer size.
    pub fn new(
        buffer_builder: RecordBufferBuilder,
        merge_size: usize,
        extractor: KeyExtractor,
        order: SortOrder,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, SortError> {
        return Ok(ExternalSorter {
            buffer_builder,
            merge_size,
            extractor,
            order,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            rw_buf_size,
        });
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts `source` file lines writing the result to `destination`.
    /// Returns the path of the sorted file.
    ///
    /// # Arguments
    /// * `source` - File to be sorted
    /// * `destination` - File the sorted records are written to. Created or truncated.
    pub fn sort(&self, source: &Path, destination: &Path) -> Result<PathBuf, SortError> {
        Self::check_paths(source, destination)?;

        log::info!("sorting {} into {}", source.display(), destination.display());

        let runs = self.sort_chunks(source, destination)?;
        log::info!("external sort preparation done ({} runs)", runs.len());

        let run = self.merge_passes(runs, destination)?;
        log::info!("sorting done ({} records)", run.len());

        return Ok(run.path().to_path_buf());
    }

    fn check_paths(source: &Path, destination: &Path) -> Result<(), ConfigError> {
        if source == destination {
            return Err(ConfigError::SamePaths(source.to_path_buf()));
        }

        if let (Ok(source), Ok(destination)) = (fs::canonicalize(source), fs::canonicalize(destination)) {
            if source == destination {
                return Err(ConfigError::SamePaths(source));
            }
        }

        return Ok(());
    }

    /// Splits the source into sorted runs. Returns the runs in creation order.
    ///
    /// If the whole source fits into a single buffer it is written straight to the destination, which is then
    /// the only run returned. An empty source results in a single empty run at the destination.
    pub fn sort_chunks(&self, source: &Path, destination: &Path) -> Result<Vec<Run>, SortError> {
        let mut lines = LineSource::open(source, self.rw_buf_size)
            .map_err(SortError::IO)?
            .peekable();

        let mut buffer = self.buffer_builder.build();
        let mut runs = Vec::new();

        while let Some(line) = lines.next() {
            let record = line.map_err(SortError::IO)?;
            let key = self.extractor.extract(&record)?;
            buffer.push(key, record);

            if buffer.is_full() {
                let is_final = runs.is_empty() && lines.peek().is_none();
                runs.push(self.write_run(buffer, WriteTarget::select(is_final), destination)?);
                buffer = self.buffer_builder.build();
            }
        }

        if !buffer.is_empty() || runs.is_empty() {
            let is_final = runs.is_empty();
            runs.push(self.write_run(buffer, WriteTarget::select(is_final), destination)?);
        }

        return Ok(runs);
    }

    /// Sorts a buffer and saves it as a run.
    pub fn write_run(
        &self,
        mut buffer: RecordBuffer,
        target: WriteTarget,
        destination: &Path,
    ) -> Result<Run, SortError> {
        log::debug!("sorting chunk data ({} records) ...", buffer.len());
        buffer.sort(self.order);

        log::debug!("saving chunk data to {:?}", target);
        let mut sink = self.create_sink(target, destination)?;
        for record in buffer.into_records() {
            sink.write_line(&record).map_err(SortError::IO)?;
        }

        return sink.finish().map_err(SortError::IO);
    }

    /// Merges sorted runs into a single run.
    /// Consumed temporary runs are removed once the merged run is saved.
    pub fn merge_runs(&self, runs: Vec<Run>, target: WriteTarget, destination: &Path) -> Result<Run, SortError> {
        log::debug!("merging {} runs into {:?}", runs.len(), target);

        let mut sources = Vec::with_capacity(runs.len());
        for run in &runs {
            sources.push(run.open(self.rw_buf_size).map_err(SortError::IO)?);
        }

        let mut sink = self.create_sink(target, destination)?;
        let merger = BinaryHeapMerger::new(sources, self.extractor.clone(), self.order);
        for record in merger {
            sink.write_line(&record?).map_err(SortError::IO)?;
        }
        let merged = sink.finish().map_err(SortError::IO)?;

        for run in runs {
            run.retire();
        }

        return Ok(merged);
    }

    /// Merges runs pass by pass until a single run is left.
    ///
    /// Every pass splits the runs into consecutive groups of at most `merge_size` runs and merges each group.
    /// The pass consisting of a single group writes to the destination.
    pub fn merge_passes(&self, mut runs: Vec<Run>, destination: &Path) -> Result<Run, SortError> {
        let mut pass = 0;

        while runs.len() > 1 {
            pass += 1;
            let groups_number = (runs.len() + self.merge_size - 1) / self.merge_size;
            let is_final = groups_number == 1;
            log::debug!("merge pass {}: {} runs in {} groups", pass, runs.len(), groups_number);

            let mut merged = Vec::with_capacity(groups_number);
            let mut pending = runs.into_iter();
            loop {
                let group = Vec::from_iter(pending.by_ref().take(self.merge_size));
                if group.is_empty() {
                    break;
                }
                merged.push(self.merge_runs(group, WriteTarget::select(is_final), destination)?);
            }

            runs = merged;
        }

        return runs.pop().ok_or(SortError::NoRuns);
    }

    fn create_sink(&self, target: WriteTarget, destination: &Path) -> Result<LineSink, SortError> {
        LineSink::create(target, self.tmp_dir.path(), destination, self.rw_buf_size).map_err(|err| match target {
            WriteTarget::Temp => SortError::TempDir(err),
            WriteTarget::Destination => SortError::IO(err),
        })
    }
}
