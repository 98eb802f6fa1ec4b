//! Buffered decompressing stream over one archive entry.
//!
//! [`EntryStream`] pulls fixed-size chunks of decompressed data from the
//! archive primitive on demand and serves reads out of a single resident
//! buffer. When the primitive runs dry the stream checks the byte count
//! against the declared size, closes the decompression cursor (which checks
//! the CRC) and reports end-of-stream from then on.

use log::{debug, trace, warn};
use std::io::{self, BufRead, Read, Seek, SeekFrom};

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::catalog::EntryCatalog;
use super::structures::EntryRecord;

/// Tunables for entry streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    buffer_capacity: usize,
}

impl StreamOptions {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 8192;
    pub const MAX_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            buffer_capacity: Self::DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Size of the read-ahead buffer; a chunk pull never exceeds it.
    ///
    /// Clamped to `1..=MAX_BUFFER_CAPACITY`.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.clamp(1, Self::MAX_BUFFER_CAPACITY);
        self
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of an [`EntryStream`].
///
/// A stream starts `Streaming`. Closing or dropping it releases the
/// decompression cursor; there is no way to reopen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Data may still be pulled from the archive
    Streaming,
    /// All data was delivered and validated
    EndOfEntry,
    /// The entry failed size or CRC validation, or the source failed
    Failed,
}

/// Readable stream over the decompressed content of one catalogued entry.
///
/// The stream holds its catalog mutably borrowed, which is what keeps a
/// second stream from being opened on the same catalog while this one lives.
pub struct EntryStream<'a, R: ReadAt> {
    catalog: &'a mut EntryCatalog<R>,
    entry: EntryRecord,
    buffer: Box<[u8]>,
    /// Read position inside the resident window
    pos: usize,
    /// End of valid data in `buffer`
    end: usize,
    /// Decompressed bytes pulled from the archive so far
    pulled: u64,
    state: StreamState,
}

impl<'a, R: ReadAt> EntryStream<'a, R> {
    /// Open `record` for reading with the catalog's stream options.
    pub fn open(catalog: &'a mut EntryCatalog<R>, record: &EntryRecord) -> Result<Self> {
        let options = catalog.options();
        Self::open_with(catalog, record, options)
    }

    /// Open `record` for reading.
    ///
    /// # Errors
    ///
    /// - [`ZipError::EntryMismatch`] if `record` was not produced by `catalog`
    /// - [`ZipError::EntryOpen`] if the archive cannot be positioned on the
    ///   entry or the entry cannot be decompressed
    pub fn open_with(
        catalog: &'a mut EntryCatalog<R>,
        record: &EntryRecord,
        options: StreamOptions,
    ) -> Result<Self> {
        let entry_open = |reason: String| ZipError::EntryOpen {
            index: record.index(),
            name: record.name().to_string(),
            reason,
        };

        if catalog.is_closed() {
            return Err(entry_open("catalog is closed".to_string()));
        }
        catalog.verify(record)?;
        // Size checks and messages use the catalog's copy, not the caller's
        let entry = catalog
            .entry(record.index())
            .cloned()
            .ok_or_else(|| entry_open("entry is not catalogued".to_string()))?;

        if !catalog.position_at(entry.index()) {
            return Err(entry_open("cannot position the archive on this entry".to_string()));
        }
        catalog.open_current().map_err(|e| entry_open(e.to_string()))?;

        debug!(
            "Streaming entry #{} {} ({} bytes, buffer {})",
            entry.index(),
            entry.name(),
            entry.uncompressed_size(),
            options.buffer_capacity()
        );

        Ok(Self {
            catalog,
            entry,
            buffer: vec![0u8; options.buffer_capacity()].into_boxed_slice(),
            pos: 0,
            end: 0,
            pulled: 0,
            state: StreamState::Streaming,
        })
    }

    /// The entry this stream reads
    pub fn entry(&self) -> &EntryRecord {
        &self.entry
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Decompressed bytes pulled from the archive so far
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Absolute offset of the next byte to be read
    pub fn position(&self) -> u64 {
        self.window_base() + self.pos as u64
    }

    fn window_base(&self) -> u64 {
        self.pulled - self.end as u64
    }

    /// Estimate of bytes readable before the stream needs the archive again.
    ///
    /// Advisory only: zero once the entry is finished, otherwise the smaller
    /// of the buffer capacity and the declared bytes not yet pulled.
    pub fn available_hint(&self) -> u64 {
        if self.state != StreamState::Streaming {
            return 0;
        }
        let remaining = self.entry.uncompressed_size().saturating_sub(self.pulled);
        remaining.min(self.buffer.len() as u64)
    }

    /// Reposition inside the resident window.
    ///
    /// Returns the new position, or `None` when `position` is not in the
    /// window of already pulled bytes currently held by the buffer. Never
    /// pulls from the archive.
    pub fn seek_to(&mut self, position: u64) -> Option<u64> {
        if position == self.position() {
            return Some(position);
        }
        let base = self.window_base();
        let window_end = base + self.end as u64;
        if position < base || position >= window_end || position > self.entry.uncompressed_size() {
            trace!(
                "Seek to {} outside window [{}, {}) of {}",
                position,
                base,
                window_end,
                self.entry.name()
            );
            return None;
        }
        self.pos = (position - base) as usize;
        Some(position)
    }

    /// Read a single byte, `None` at end of entry
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.fill_buf()?.first().copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Release the decompression cursor without validating the rest of the entry
    pub fn close(self) {}

    /// Refill the buffer with the next chunk from the archive.
    fn pull(&mut self) -> Result<()> {
        let result = match self.catalog.archive_mut() {
            Some(archive) => archive.read_current(&mut self.buffer),
            None => Err(ZipError::InvalidArchive("catalog is closed")),
        };
        let n = match result {
            Ok(n) => n,
            // The compressed data ran out before the deflate stream ended
            Err(ZipError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.fail();
                warn!(
                    "{}: compressed data ends after {} of {} bytes",
                    self.entry.name(),
                    self.pulled,
                    self.entry.uncompressed_size()
                );
                return Err(ZipError::TruncatedEntry {
                    name: self.entry.name().to_string(),
                    expected: self.entry.uncompressed_size(),
                    actual: self.pulled,
                });
            }
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };

        if n > 0 {
            self.pos = 0;
            self.end = n;
            self.pulled += n as u64;
            return Ok(());
        }

        self.finish()
    }

    /// The archive has no more data: validate size, then CRC.
    fn finish(&mut self) -> Result<()> {
        let expected = self.entry.uncompressed_size();
        if self.pulled != expected {
            self.fail();
            warn!(
                "{}: got {} bytes, {} declared",
                self.entry.name(),
                self.pulled,
                expected
            );
            return Err(ZipError::TruncatedEntry {
                name: self.entry.name().to_string(),
                expected,
                actual: self.pulled,
            });
        }

        let closed = match self.catalog.archive_mut() {
            Some(archive) => archive.close_current(),
            None => Ok(()),
        };
        if let Err(e) = closed {
            self.state = StreamState::Failed;
            warn!("{}", e);
            return Err(e);
        }

        self.state = StreamState::EndOfEntry;
        debug!("Finished {} after {} bytes", self.entry.name(), self.pulled);
        Ok(())
    }

    fn fail(&mut self) {
        self.state = StreamState::Failed;
        if let Some(archive) = self.catalog.archive_mut() {
            archive.close_quietly();
        }
    }
}

impl<R: ReadAt> BufRead for EntryStream<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.end && self.state == StreamState::Streaming {
            self.pull().map_err(ZipError::into_io)?;
        }
        Ok(&self.buffer[self.pos..self.end])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.end);
    }
}

impl<R: ReadAt> Read for EntryStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: ReadAt> Seek for EntryStream<'_, R> {
    /// Window-local seek; see [`EntryStream::seek_to`].
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
            SeekFrom::End(delta) => self.entry.uncompressed_size().checked_add_signed(delta),
        };
        target
            .and_then(|t| self.seek_to(t))
            .ok_or_else(|| {
                ZipError::BadSeek {
                    position: target.unwrap_or(0),
                }
                .into_io()
            })
    }
}

impl<R: ReadAt> Drop for EntryStream<'_, R> {
    fn drop(&mut self) {
        if let Some(archive) = self.catalog.archive_mut() {
            archive.close_quietly();
        }
    }
}
