//! Positioned writer over the task's destination file.

use std::fs::File;
use std::io;
use std::path::Path;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Exclusive writer for one transfer run. The cursor starts at the offset the
/// run resumes from and only moves forward by bytes actually written. Dropping
/// the writer closes the file.
pub struct StorageWriter {
    file: File,
    position: u64,
}

impl StorageWriter {
    /// Open (creating if missing, never truncating) `path` with the cursor at `offset`.
    pub fn open(path: &Path, offset: u64) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            file,
            position: offset,
        })
    }

    /// Write all of `data` at the cursor and advance it.
    #[cfg(unix)]
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, self.position)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// Non-Unix fallback: seek + write on the exclusively owned handle.
    #[cfg(not(unix))]
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// Offset the next chunk will be written at.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flush file data to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}
