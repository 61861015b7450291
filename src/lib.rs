//! `ext-line-sort` is an external sort implementation for line-oriented text files.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. The file is split into chunks that each fit in
//! RAM, every chunk is sorted and saved as a run, then runs are merged pass by pass until a single sorted file
//! is left. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `ext-line-sort` supports the following features:
//!
//! * **Column keys:**
//!   records are split by a delimiter and sorted by the concatenation of the selected columns,
//!   keys are compared as byte strings, so input need not be valid UTF-8.
//! * **Stable sorting:**
//!   records with equal keys may keep their original relative order, across runs and merge passes.
//! * **Bounded resources:**
//!   the number of records sorted in memory and the number of runs merged at once are both limited.
//! * **No renames:**
//!   the run known to be the last one is written directly to the destination, so temporary and destination
//!   storage may live on different devices.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_line_sort::ExternalSorterBuilder;
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_delimiter(",")
//!         .with_key_columns(vec![2, 0])
//!         .with_sort_size(100_000)
//!         .with_merge_size(16)
//!         .with_stable(true)
//!         .with_tmp_dir(Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     sorter.sort(Path::new("input.csv"), Path::new("output.csv")).unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod key;
pub mod merger;
pub mod order;
pub mod sort;

pub use buffer::{RecordBuffer, RecordBufferBuilder};
pub use chunk::{LineSink, LineSource, Run, WriteTarget};
pub use key::KeyExtractor;
pub use merger::BinaryHeapMerger;
pub use order::SortOrder;
pub use sort::{ConfigError, ExternalSorter, ExternalSorterBuilder, SortError};
