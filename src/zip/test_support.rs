//! In-memory ZIP writer for tests.
//!
//! Shared between unit tests and the integration tests under `tests/`, so it
//! depends on nothing but `std` and `flate2`.

#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::Write;

struct PendingEntry {
    name: String,
    comment: String,
    method: u16,
    crc32: u32,
    compressed: Vec<u8>,
    uncompressed_size: u32,
    external_attrs: u32,
}

/// Builds a ZIP archive in memory, with knobs to damage the Central Directory.
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    comment: String,
    declared_entries: Option<u16>,
}

fn crc_of(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            comment: String::new(),
            declared_entries: None,
        }
    }

    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            comment: String::new(),
            method: 0,
            crc32: crc_of(data),
            compressed: data.to_vec(),
            uncompressed_size: data.len() as u32,
            external_attrs: 0,
        });
        self
    }

    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        self.entries.push(PendingEntry {
            name: name.to_string(),
            comment: String::new(),
            method: 8,
            crc32: crc_of(data),
            compressed: encoder.finish().unwrap(),
            uncompressed_size: data.len() as u32,
            external_attrs: 0,
        });
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            comment: String::new(),
            method: 0,
            crc32: 0,
            compressed: Vec::new(),
            uncompressed_size: 0,
            external_attrs: 0x10,
        });
        self
    }

    pub fn entry_comment(mut self, index: usize, comment: &str) -> Self {
        self.entries[index].comment = comment.to_string();
        self
    }

    pub fn corrupt_crc(mut self, index: usize) -> Self {
        self.entries[index].crc32 ^= 0xA5A5_A5A5;
        self
    }

    pub fn method(mut self, index: usize, method: u16) -> Self {
        self.entries[index].method = method;
        self
    }

    pub fn declared_size(mut self, index: usize, size: u32) -> Self {
        self.entries[index].uncompressed_size = size;
        self
    }

    /// Keep only the first `len` bytes of the entry's stored data
    pub fn truncate_data(mut self, index: usize, len: usize) -> Self {
        self.entries[index].compressed.truncate(len);
        self
    }

    pub fn compressed_len(&self, index: usize) -> usize {
        self.entries[index].compressed.len()
    }

    pub fn archive_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn declared_entries(mut self, count: u16) -> Self {
        self.declared_entries = Some(count);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(b"PK\x03\x04");
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0x6000u16.to_le_bytes());
            out.extend_from_slice(&0x5821u16.to_le_bytes());
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.compressed);
        }

        let cd_offset = out.len() as u32;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0x6000u16.to_le_bytes());
            out.extend_from_slice(&0x5821u16.to_le_bytes());
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.external_attrs.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(entry.comment.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;

        let count = self
            .declared_entries
            .unwrap_or(self.entries.len() as u16);
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(self.comment.as_bytes());
        out
    }
}
