use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

/// Download buffer that stays in memory up to a threshold and rolls over
/// to an anonymous temporary file beyond it.
///
/// A threshold of `0` disables the rollover entirely.
#[derive(Debug)]
pub struct SpooledBuffer {
    inner: SpooledTempFile,
}

impl SpooledBuffer {
    pub fn new(max_memory_size: u64) -> Self {
        let limit = match max_memory_size {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Self {
            inner: SpooledTempFile::new(limit),
        }
    }

    pub fn is_on_disk(&self) -> bool {
        self.inner.is_rolled()
    }
}

impl Read for SpooledBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SpooledBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for SpooledBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
