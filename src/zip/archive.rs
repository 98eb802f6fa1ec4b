//! Low-level ZIP archive access.
//!
//! [`ZipArchive`] is the navigation and decompression primitive the catalog
//! is built on. It offers exactly what a minimal unzip library would:
//! the global entry count, forward-only `first`/`next` navigation over the
//! Central Directory, metadata of the current entry, and a single
//! decompression cursor for the current entry.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory in one request and keep it in memory
//! 4. Walk Central Directory headers one at a time as the cursor moves
//! 5. For decompression, read the entry's Local File Header to find its data

use flate2::Crc;
use flate2::read::DeflateDecoder;
use log::{debug, trace};
use std::io::{self, Read};
use std::sync::Arc;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Reads a bounded byte range of the archive sequentially.
struct SectionReader<R: ReadAt> {
    reader: Arc<R>,
    pos: u64,
    end: u64,
}

impl<R: ReadAt> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.end || buf.is_empty() {
            return Ok(0);
        }
        let want = (self.end - self.pos).min(buf.len() as u64) as usize;
        let n = self.reader.read_at(self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

enum Decoder<R: ReadAt> {
    Stored(SectionReader<R>),
    Deflate(DeflateDecoder<SectionReader<R>>),
}

/// The decompression cursor of the entry currently open for reading.
struct OpenEntry<R: ReadAt> {
    name: String,
    expected_crc: u32,
    crc: Crc,
    decoder: Decoder<R>,
}

/// Central Directory cursor: byte offset of the current header and its
/// ordinal in enumeration order.
struct Position {
    offset: usize,
    ordinal: u64,
    header: CentralDirectoryHeader,
}

/// Handle to an opened ZIP archive.
///
/// Navigation is forward-only, and at most one entry can be open for
/// decompression at a time. Moving the cursor closes any open entry.
pub struct ZipArchive<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
    entry_count: u64,
    comment: String,
    central_directory: Vec<u8>,
    position: Option<Position>,
    open_entry: Option<OpenEntry<R>>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Open an archive, reading its EOCD record and Central Directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or no valid EOCD
    /// is found, indicating the data is not a ZIP archive.
    pub fn open(reader: Arc<R>) -> Result<Self> {
        let size = reader.size();
        let (eocd, eocd_offset, comment) = find_eocd(reader.as_ref(), size)?;

        let (cd_offset, cd_size, entry_count) = if eocd.is_zip64() {
            let eocd64 = read_zip64_eocd(reader.as_ref(), eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.checked_add(cd_size).is_none_or(|end| end > eocd_offset) {
            return Err(ZipError::InvalidArchive(
                "central directory lies outside the archive",
            ));
        }

        // Read the entire Central Directory in one request
        // (efficient for HTTP as it's a single Range request)
        let mut central_directory = vec![0u8; cd_size as usize];
        reader.read_exact_at(cd_offset, &mut central_directory)?;

        debug!(
            "Opened archive: {} entries, central directory {} bytes at offset {}",
            entry_count, cd_size, cd_offset
        );

        Ok(Self {
            reader,
            size,
            entry_count,
            comment,
            central_directory,
            position: None,
            open_entry: None,
        })
    }

    /// Number of entries declared by the EOCD record
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// The archive's global comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Total size of the archive in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the cursor to the first entry.
    pub fn goto_first(&mut self) -> bool {
        self.close_quietly();
        self.position = None;
        if self.entry_count == 0 {
            return false;
        }
        self.position = self.header_at(0, 0);
        self.position.is_some()
    }

    /// Move the cursor to the next entry.
    ///
    /// Returns `false` at the end of the directory, when unpositioned, or
    /// when the next header is damaged. A failed move leaves the cursor
    /// unpositioned.
    pub fn goto_next(&mut self) -> bool {
        self.close_quietly();
        let Some(current) = self.position.take() else {
            return false;
        };
        if current.ordinal + 1 >= self.entry_count {
            return false;
        }
        self.position = self.header_at(current.offset + current.header.record_len, current.ordinal + 1);
        self.position.is_some()
    }

    fn header_at(&self, offset: usize, ordinal: u64) -> Option<Position> {
        let data = self.central_directory.get(offset..)?;
        match CentralDirectoryHeader::from_bytes(data) {
            Ok(header) => Some(Position {
                offset,
                ordinal,
                header,
            }),
            Err(e) => {
                debug!("Central directory header #{} unreadable: {}", ordinal, e);
                None
            }
        }
    }

    /// Metadata of the entry under the cursor
    pub fn current_entry_info(&self) -> Option<&CentralDirectoryHeader> {
        self.position.as_ref().map(|p| &p.header)
    }

    /// Open the entry under the cursor for decompression.
    ///
    /// Any previously opened entry is closed first, without CRC validation.
    pub fn open_current(&mut self) -> Result<()> {
        self.close_quietly();
        let header = self
            .current_entry_info()
            .ok_or(ZipError::InvalidArchive("no current entry"))?;

        if header.is_encrypted() {
            return Err(ZipError::Encrypted(header.file_name.clone()));
        }
        let method = CompressionMethod::from_u16(header.compression_method);
        if let CompressionMethod::Unknown(method) = method {
            return Err(ZipError::UnsupportedMethod {
                name: header.file_name.clone(),
                method,
            });
        }

        // The Local File Header has its own name/extra lengths which may
        // differ from the Central Directory copy
        let mut lfh = [0u8; LFH_SIZE];
        self.reader.read_exact_at(header.lfh_offset, &mut lfh)?;
        let data_offset = header.lfh_offset + LFH_SIZE as u64 + local_header_tail_len(&lfh)?;
        let data_end = data_offset
            .checked_add(header.compressed_size)
            .filter(|end| *end <= self.size)
            .ok_or(ZipError::InvalidArchive("entry data lies outside the archive"))?;

        let section = SectionReader {
            reader: Arc::clone(&self.reader),
            pos: data_offset,
            end: data_end,
        };
        let decoder = match method {
            CompressionMethod::Deflate => Decoder::Deflate(DeflateDecoder::new(section)),
            _ => Decoder::Stored(section),
        };

        debug!(
            "Opened {} ({:?}, {} -> {} bytes, data at {})",
            header.file_name, method, header.compressed_size, header.uncompressed_size, data_offset
        );

        self.open_entry = Some(OpenEntry {
            name: header.file_name.clone(),
            expected_crc: header.crc32,
            crc: Crc::new(),
            decoder,
        });
        Ok(())
    }

    /// Pull the next chunk of decompressed data from the open entry.
    ///
    /// Returns `Ok(0)` once the entry's data is exhausted.
    pub fn read_current(&mut self, buf: &mut [u8]) -> Result<usize> {
        let entry = self
            .open_entry
            .as_mut()
            .ok_or(ZipError::InvalidArchive("no entry is open for reading"))?;

        let n = loop {
            let result = match &mut entry.decoder {
                Decoder::Stored(section) => section.read(buf),
                Decoder::Deflate(decoder) => decoder.read(buf),
            };
            match result {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };
        entry.crc.update(&buf[..n]);
        trace!("Pulled {} bytes from {}", n, entry.name);
        Ok(n)
    }

    /// Close the open entry, validating the CRC of everything pulled from it.
    pub fn close_current(&mut self) -> Result<()> {
        let Some(entry) = self.open_entry.take() else {
            return Ok(());
        };
        let actual = entry.crc.sum();
        if actual != entry.expected_crc {
            return Err(ZipError::CrcMismatch {
                name: entry.name,
                expected: entry.expected_crc,
                actual,
            });
        }
        Ok(())
    }

    /// Drop the open entry without validating it
    pub fn close_quietly(&mut self) {
        self.open_entry = None;
    }

    pub fn has_open_entry(&self) -> bool {
        self.open_entry.is_some()
    }
}

/// Find and parse the End of Central Directory record.
///
/// Handles both the simple case (no comment) and archives with comments
/// by searching backwards for the signature.
fn find_eocd<R: ReadAt + ?Sized>(
    reader: &R,
    size: u64,
) -> Result<(EndOfCentralDirectory, u64, String)> {
    const EOCD_SIZE: u64 = EndOfCentralDirectory::SIZE as u64;

    if size < EOCD_SIZE {
        return Err(ZipError::InvalidArchive("file too small to be a ZIP archive"));
    }

    // Try the common case first: no archive comment
    let offset = size - EOCD_SIZE;
    let mut buf = [0u8; EndOfCentralDirectory::SIZE];
    reader.read_exact_at(offset, &mut buf)?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
        let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
        return Ok((eocd, offset, String::new()));
    }

    let search_size = (MAX_COMMENT_SIZE + EOCD_SIZE).min(size);
    let search_start = size - search_size;
    let mut buf = vec![0u8; search_size as usize];
    reader.read_exact_at(search_start, &mut buf)?;

    // Search backwards; the comment length must account for the remaining bytes
    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
        let comment_start = i + EndOfCentralDirectory::SIZE;
        if comment_len == buf.len() - comment_start {
            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..comment_start])?;
            let comment = String::from_utf8_lossy(&buf[comment_start..]).into_owned();
            return Ok((eocd, search_start + i as u64, comment));
        }
    }

    Err(ZipError::InvalidArchive("end of central directory not found"))
}

/// Read the ZIP64 End of Central Directory record.
///
/// The ZIP64 EOCD Locator sits immediately before the regular EOCD.
fn read_zip64_eocd<R: ReadAt + ?Sized>(reader: &R, eocd_offset: u64) -> Result<Zip64EOCD> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64EOCDLocator::SIZE as u64)
        .ok_or(ZipError::InvalidArchive("missing ZIP64 locator"))?;
    let mut locator_buf = [0u8; Zip64EOCDLocator::SIZE];
    reader.read_exact_at(locator_offset, &mut locator_buf)?;
    let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

    let mut eocd64_buf = [0u8; Zip64EOCD::MIN_SIZE];
    reader.read_exact_at(locator.eocd64_offset, &mut eocd64_buf)?;
    Zip64EOCD::from_bytes(&eocd64_buf)
}
