//! Seekable byte sources
//!
//! The byte-source abstraction the object store and font layer consume:
//! position, length, seek, read, plus a direct memory span for zero-copy
//! table parsing where the backing storage allows it.
//!
//! A `Stream` owns a mutable position and is deliberately not `Sync`; a
//! source shared between threads needs one external lock per source, because
//! seek followed by read is not atomic.

use crate::base::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Trait for stream data sources.
pub trait ByteSource {
    /// Read data into the buffer, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Seek to a position.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    /// Get current position.
    fn tell(&mut self) -> io::Result<u64>;
    /// Total length if known.
    fn len(&self) -> Option<u64>;
    /// The whole source as one memory span, if memory-backed.
    fn span(&self) -> Option<&[u8]> {
        None
    }
}

/// File-based source.
struct FileSource {
    reader: BufReader<File>,
    len: u64,
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.reader.stream_position()
    }

    fn len(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// Memory-based source over `bytes::Bytes`.
struct MemorySource {
    data: Bytes,
    position: usize,
}

impl MemorySource {
    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.position = (new_pos as usize).min(self.data.len());
        Ok(self.position as u64)
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        let to_read = buf.len().min(remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position as u64)
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn span(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

/// Memory-mapped file source.
struct MmapSource {
    map: memmap2::Mmap,
    position: usize,
}

impl ByteSource for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data: &[u8] = &self.map;
        let remaining = &data[self.position.min(data.len())..];
        let to_read = buf.len().min(remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.map.len() as i64;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.position = (new_pos as usize).min(self.map.len());
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position as u64)
    }

    fn len(&self) -> Option<u64> {
        Some(self.map.len() as u64)
    }

    fn span(&self) -> Option<&[u8]> {
        Some(&self.map)
    }
}

/// A seekable, readable byte stream.
pub struct Stream {
    inner: Box<dyn ByteSource>,
    filename: Option<String>,
}

impl Stream {
    /// Open a stream from a file path (buffered reads).
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::System)?;
        let len = file.metadata().map_err(Error::System)?.len();
        Ok(Self {
            inner: Box::new(FileSource {
                reader: BufReader::new(file),
                len,
            }),
            filename: Some(path.to_string_lossy().into_owned()),
        })
    }

    /// Open a stream from a file path via a shared memory map (zero-copy span).
    pub fn open_file_mapped<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::System)?;
        // Safety: the map is read-only and held for the life of the source;
        // concurrent truncation of the underlying file is the caller's
        // contract, as with any mmap consumer.
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(Error::System)?;
        Ok(Self {
            inner: Box::new(MmapSource { map, position: 0 }),
            filename: Some(path.to_string_lossy().into_owned()),
        })
    }

    /// Open a stream from a byte slice (copies once).
    pub fn open_memory(data: &[u8]) -> Self {
        Self::open_bytes(Bytes::copy_from_slice(data))
    }

    /// Open a stream from a `Bytes` instance (zero-copy).
    pub fn open_bytes(data: Bytes) -> Self {
        Self {
            inner: Box::new(MemorySource { data, position: 0 }),
            filename: None,
        }
    }

    /// Current read position.
    pub fn position(&mut self) -> Result<u64> {
        self.inner.tell().map_err(Error::System)
    }

    /// Total length if known.
    pub fn len(&self) -> Option<u64> {
        self.inner.len()
    }

    /// Check if the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == Some(0)
    }

    /// The filename if this is a file stream.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The whole stream as one memory span, if memory-backed.
    pub fn span(&self) -> Option<&[u8]> {
        self.inner.span()
    }

    /// Seek to a position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos).map_err(Error::System)
    }

    /// Read bytes into a buffer, returning how many were read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.inner.read(&mut buf[total..]).map_err(Error::System)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes or fail with `Error::Eof`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.read(buf)? < buf.len() {
            return Err(Error::Eof);
        }
        Ok(())
    }

    /// Read a single byte, `None` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let n = self.inner.read(&mut buf).map_err(Error::System)?;
        Ok(if n == 1 { Some(buf[0]) } else { None })
    }

    /// Read all remaining data into one `Bytes` buffer.
    ///
    /// Memory-backed sources hand out their span without copying.
    pub fn read_all(&mut self) -> Result<Bytes> {
        let pos = self.inner.tell().map_err(Error::System)? as usize;
        if let Some(span) = self.inner.span() {
            let data = Bytes::copy_from_slice(&span[pos.min(span.len())..]);
            self.inner
                .seek(SeekFrom::End(0))
                .map_err(Error::System)?;
            return Ok(data);
        }
        let mut data = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.inner.read(&mut chunk).map_err(Error::System)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(Bytes::from(data))
    }

    /// Read a 16-bit unsigned big-endian integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Read a 32-bit unsigned big-endian integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_stream_read() {
        let mut s = Stream::open_memory(b"Hello, World!");
        assert_eq!(s.len(), Some(13));
        let mut buf = [0u8; 5];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Hello");
        assert_eq!(s.position().unwrap(), 5);
    }

    #[test]
    fn test_memory_stream_seek() {
        let mut s = Stream::open_memory(b"0123456789");
        s.seek(SeekFrom::Start(5)).unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(b'5'));
        s.seek(SeekFrom::Current(2)).unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(b'8'));
        s.seek(SeekFrom::End(-1)).unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(b'9'));
        assert_eq!(s.read_byte().unwrap(), None);
    }

    #[test]
    fn test_memory_stream_span() {
        let s = Stream::open_memory(b"span data");
        assert_eq!(s.span(), Some(&b"span data"[..]));
    }

    #[test]
    fn test_stream_read_exact_eof() {
        let mut s = Stream::open_memory(b"ab");
        let mut buf = [0u8; 4];
        assert!(matches!(s.read_exact(&mut buf), Err(Error::Eof)));
    }

    #[test]
    fn test_stream_read_all() {
        let mut s = Stream::open_memory(b"0123456789");
        let mut buf = [0u8; 3];
        s.read_exact(&mut buf).unwrap();
        let rest = s.read_all().unwrap();
        assert_eq!(&rest[..], b"3456789");
        assert_eq!(s.read_byte().unwrap(), None);
    }

    #[test]
    fn test_stream_integers() {
        let mut s = Stream::open_memory(&[0x12, 0x34, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(s.read_u16().unwrap(), 0x1234);
        assert_eq!(s.read_u32().unwrap(), 0x100);
    }

    #[test]
    fn test_file_stream() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"file contents").unwrap();
        tmp.flush().unwrap();

        let mut s = Stream::open_file(tmp.path()).unwrap();
        assert_eq!(s.len(), Some(13));
        assert!(s.filename().is_some());
        assert!(s.span().is_none());
        let all = s.read_all().unwrap();
        assert_eq!(&all[..], b"file contents");
    }

    #[test]
    fn test_file_stream_mapped() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"mapped contents").unwrap();
        tmp.flush().unwrap();

        let mut s = Stream::open_file_mapped(tmp.path()).unwrap();
        assert_eq!(s.span(), Some(&b"mapped contents"[..]));
        s.seek(SeekFrom::Start(7)).unwrap();
        let rest = s.read_all().unwrap();
        assert_eq!(&rest[..], b"contents");
    }

    #[test]
    fn test_seek_before_start_fails() {
        let mut s = Stream::open_memory(b"abc");
        assert!(s.seek(SeekFrom::End(-10)).is_err());
    }
}
