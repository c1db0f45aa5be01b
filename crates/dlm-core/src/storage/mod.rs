//! Destination file access for a single transfer run.
//!
//! The file is opened read/write without truncation so bytes from earlier runs
//! survive, and every write lands at an explicit offset rather than at EOF.

mod writer;

pub use writer::StorageWriter;
