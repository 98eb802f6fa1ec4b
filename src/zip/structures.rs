use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::InvalidArchive("bad end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::InvalidArchive("bad ZIP64 locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::InvalidArchive("bad ZIP64 end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// General purpose flag bit 0: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// MS-DOS directory attribute in the low byte of the external attributes
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// One parsed Central Directory File Header.
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attrs: u32,
    pub lfh_offset: u64,
    pub file_name: String,
    pub comment: String,
    /// Total length of the header including its variable-length fields
    pub record_len: usize,
}

impl CentralDirectoryHeader {
    /// Parse the header starting at the beginning of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CDFH_MIN_SIZE || &data[0..4] != CDFH_SIGNATURE {
            return Err(ZipError::InvalidArchive("bad central directory header"));
        }

        let mut cursor = Cursor::new(&data[4..CDFH_MIN_SIZE]);
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as usize;
        let file_comment_length = cursor.read_u16::<LittleEndian>()? as usize;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let record_len =
            CDFH_MIN_SIZE + file_name_length + extra_field_length + file_comment_length;
        if data.len() < record_len {
            return Err(ZipError::InvalidArchive("central directory header overruns directory"));
        }

        let name_end = CDFH_MIN_SIZE + file_name_length;
        let extra_end = name_end + extra_field_length;
        // Lossy conversion keeps non-UTF8 names listable
        let file_name = String::from_utf8_lossy(&data[CDFH_MIN_SIZE..name_end]).into_owned();
        let comment = String::from_utf8_lossy(&data[extra_end..record_len]).into_owned();

        // ZIP64 extended information lives in extra field 0x0001; a value is
        // present only when the matching header field is saturated.
        let mut extra = Cursor::new(&data[name_end..extra_end]);
        let extra_len = extra_field_length as u64;
        while extra.position() + 4 <= extra_len {
            let header_id = extra.read_u16::<LittleEndian>()?;
            let field_size = extra.read_u16::<LittleEndian>()? as u64;
            let field_end = (extra.position() + field_size).min(extra_len);

            if header_id == 0x0001 {
                if uncompressed_size == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    uncompressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    compressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    lfh_offset = extra.read_u64::<LittleEndian>()?;
                }
            }
            extra.set_position(field_end);
        }

        Ok(Self {
            flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            external_attrs,
            lfh_offset,
            file_name,
            comment,
            record_len,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// Length of the variable part of a Local File Header (name + extra field).
pub fn local_header_tail_len(lfh: &[u8]) -> Result<u64> {
    if lfh.len() < LFH_SIZE || &lfh[0..4] != LFH_SIGNATURE {
        return Err(ZipError::InvalidArchive("bad local file header"));
    }
    let mut cursor = Cursor::new(&lfh[26..LFH_SIZE]);
    let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;
    Ok(file_name_length + extra_field_length)
}

/// Metadata of one catalogued archive entry.
///
/// Records are created once while the catalog enumerates the archive and are
/// never modified afterwards. `index` always equals the record's position in
/// [`EntryCatalog::entries`](super::EntryCatalog::entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) comment: String,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) crc32: u32,
    pub(crate) method: CompressionMethod,
    pub(crate) last_mod_time: u16,
    pub(crate) last_mod_date: u16,
    pub(crate) external_attrs: u32,
    pub(crate) is_directory: bool,
    pub(crate) encrypted: bool,
    pub(crate) lfh_offset: u64,
}

impl EntryRecord {
    pub(crate) fn from_header(index: usize, header: &CentralDirectoryHeader) -> Self {
        let is_directory = header.external_attrs & DOS_DIRECTORY_ATTR != 0
            || header.file_name.ends_with('/');
        Self {
            index,
            name: header.file_name.clone(),
            comment: header.comment.clone(),
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            crc32: header.crc32,
            method: CompressionMethod::from_u16(header.compression_method),
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            external_attrs: header.external_attrs,
            is_directory,
            encrypted: header.is_encrypted(),
            lfh_offset: header.lfh_offset,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn external_attrs(&self) -> u32 {
        self.external_attrs
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Packed DOS timestamp: date in the high word, time in the low word
    pub fn dos_datetime(&self) -> u32 {
        ((self.last_mod_date as u32) << 16) | self.last_mod_time as u32
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdfh(name: &str, extra: &[u8], comment: &str, external_attrs: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CDFH_SIGNATURE);
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&0x6000u16.to_le_bytes());
        out.extend_from_slice(&0x5821u16.to_le_bytes());
        out.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        out.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        out.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&external_attrs.to_le_bytes());
        out.extend_from_slice(&7u32.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(extra);
        out.extend_from_slice(comment.as_bytes());
        out
    }

    #[test]
    fn parses_zip64_sizes_and_comment() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&1u16.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        extra.extend_from_slice(&0x2000u64.to_le_bytes());
        let mut data = cdfh("big.bin", &extra, "note", 0);
        data.extend_from_slice(b"trailing");

        let header = CentralDirectoryHeader::from_bytes(&data).unwrap();
        assert_eq!(header.file_name, "big.bin");
        assert_eq!(header.comment, "note");
        assert_eq!(header.uncompressed_size, 0x1_0000_0000);
        assert_eq!(header.compressed_size, 0x2000);
        assert_eq!(header.lfh_offset, 7);
        assert_eq!(header.record_len, data.len() - b"trailing".len());
    }

    #[test]
    fn directory_from_attribute_bit() {
        let header = CentralDirectoryHeader::from_bytes(&cdfh("folder", &[], "", 0x10)).unwrap();
        let record = EntryRecord::from_header(3, &header);
        assert!(record.is_directory());
        assert_eq!(record.index(), 3);
        assert_eq!(record.method(), CompressionMethod::Deflate);
        assert_eq!(record.dos_datetime(), 0x5821_6000);
        assert_eq!(record.mod_date(), (2024, 1, 1));
        assert_eq!(record.mod_time(), (12, 0, 0));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let data = cdfh("name.txt", &[], "", 0);
        assert!(matches!(
            CentralDirectoryHeader::from_bytes(&data[..data.len() - 1]),
            Err(ZipError::InvalidArchive(_))
        ));
    }
}
