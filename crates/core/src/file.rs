use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::spool::SpooledBuffer;

/// A file handed to [`Storage::save`](crate::storage::Storage::save).
///
/// Besides the byte stream, a handle reports its declared size and may
/// carry a content type declared by whoever produced it (typically the
/// HTTP layer that received the upload). Wrapper handles expose the file
/// they wrap so its declared type can be consulted too.
pub trait FileHandle: Read + Seek + Send {
    fn size(&self) -> u64;

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn wrapped(&self) -> Option<&dyn FileHandle> {
        None
    }
}

/// In-memory content.
#[derive(Debug, Clone)]
pub struct ContentFile {
    cursor: Cursor<Vec<u8>>,
    content_type: Option<String>,
}

impl ContentFile {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: Cursor::new(data.into()),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl Read for ContentFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for ContentFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl FileHandle for ContentFile {
    fn size(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// An uploaded stream with a size and content type declared by the sender.
#[derive(Debug)]
pub struct UploadedFile<R> {
    inner: R,
    size: u64,
    content_type: Option<String>,
}

impl<R: Read + Seek + Send> UploadedFile<R> {
    pub fn new(inner: R, size: u64, content_type: Option<String>) -> Self {
        Self {
            inner,
            size,
            content_type,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl UploadedFile<File> {
    /// Opens a local file, taking the declared size from its metadata.
    pub fn open(path: impl AsRef<Path>, content_type: Option<String>) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self::new(file, size, content_type))
    }
}

impl<R: Read> Read for UploadedFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for UploadedFile<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<R: Read + Seek + Send> FileHandle for UploadedFile<R> {
    fn size(&self) -> u64 {
        self.size
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// A file attached to a record field. It declares nothing itself and
/// defers to the file it wraps.
#[derive(Debug)]
pub struct FieldFile<F> {
    file: F,
}

impl<F: FileHandle> FieldFile<F> {
    pub fn new(file: F) -> Self {
        Self { file }
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

impl<F: FileHandle> Read for FieldFile<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl<F: FileHandle> Seek for FieldFile<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl<F: FileHandle> FileHandle for FieldFile<F> {
    fn size(&self) -> u64 {
        self.file.size()
    }

    fn wrapped(&self) -> Option<&dyn FileHandle> {
        Some(&self.file)
    }
}

/// A downloaded object, positioned at its first byte.
#[derive(Debug)]
pub struct StoredFile {
    name: String,
    size: u64,
    buffer: SpooledBuffer,
}

impl StoredFile {
    pub(crate) fn new(name: impl Into<String>, size: u64, buffer: SpooledBuffer) -> Self {
        Self {
            name: name.into(),
            size,
            buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_on_disk(&self) -> bool {
        self.buffer.is_on_disk()
    }

    /// Reads everything from the start of the object.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.buffer.seek(SeekFrom::Start(0))?;
        let mut out = Vec::new();
        self.buffer.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for StoredFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Seek for StoredFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl FileHandle for StoredFile {
    fn size(&self) -> u64 {
        self.size
    }
}
