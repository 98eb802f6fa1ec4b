//! Entry catalog: enumerate once, then position by index.
//!
//! The archive primitive only knows how to go to the first entry or step to
//! the next one. [`EntryCatalog`] records every entry during a single forward
//! pass at open time and turns that forward-only cursor into index-addressed
//! positioning, rewinding to the first entry whenever the target lies behind
//! the cursor.

use log::{debug, trace, warn};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, ReadAt};

use super::archive::ZipArchive;
use super::stream::{EntryStream, StreamOptions};
use super::structures::EntryRecord;

/// Catalog of every entry in one archive, with a single positionable cursor.
///
/// At most one [`EntryStream`] can be alive per catalog: a stream holds the
/// catalog mutably borrowed for its whole lifetime, so the previous session
/// has to be dropped (or closed) before the next one is opened.
///
/// ```compile_fail
/// use runzip::{EntryCatalog, MemoryReader};
///
/// fn two_sessions(catalog: &mut EntryCatalog<MemoryReader>) {
///     let first = catalog.open_index(0).unwrap();
///     let second = catalog.open_index(1).unwrap();
///     drop(first);
///     drop(second);
/// }
/// ```
///
/// The catalog is not synchronized. Hosts sharing it between threads must
/// guard the catalog and its live stream as one unit, e.g. with a `Mutex`.
pub struct EntryCatalog<R: ReadAt> {
    archive: Option<ZipArchive<R>>,
    entries: Vec<EntryRecord>,
    comment: String,
    /// Index the archive cursor is on; `None` when unpositioned or unreliable
    cursor: Option<usize>,
    options: StreamOptions,
}

impl EntryCatalog<LocalFileReader> {
    /// Open a ZIP archive from the local filesystem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let reader = LocalFileReader::new(path).map_err(|e| ZipError::ArchiveOpen {
            path: label.clone(),
            reason: e.to_string(),
        })?;
        Self::from_reader_named(Arc::new(reader), label)
    }
}

impl<R: ReadAt> EntryCatalog<R> {
    /// Open an archive from any random-access source.
    pub fn from_reader(reader: Arc<R>) -> Result<Self> {
        Self::from_reader_named(reader, "<reader>")
    }

    /// Open an archive from any random-access source, naming it in errors.
    ///
    /// # Errors
    ///
    /// [`ZipError::ArchiveOpen`] if the source is not a readable ZIP archive,
    /// [`ZipError::Enumeration`] if fewer entries can be walked than the
    /// archive declares.
    pub fn from_reader_named(reader: Arc<R>, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let mut archive = ZipArchive::open(reader).map_err(|e| ZipError::ArchiveOpen {
            path: label.clone(),
            reason: e.to_string(),
        })?;

        let expected = archive.entry_count();
        let mut entries = Vec::with_capacity(expected.min(u16::MAX as u64) as usize);

        if expected > 0 {
            let mut positioned = archive.goto_first();
            while positioned {
                let Some(header) = archive.current_entry_info() else {
                    break;
                };
                entries.push(EntryRecord::from_header(entries.len(), header));
                if entries.len() as u64 == expected {
                    break;
                }
                positioned = archive.goto_next();
            }
        }

        if (entries.len() as u64) < expected {
            warn!(
                "{}: enumeration stopped after {} of {} entries",
                label,
                entries.len(),
                expected
            );
            return Err(ZipError::Enumeration {
                expected,
                found: entries.len() as u64,
            });
        }

        debug!("{}: catalogued {} entries", label, entries.len());

        let cursor = entries.len().checked_sub(1);
        Ok(Self {
            comment: archive.comment().to_string(),
            archive: Some(archive),
            entries,
            cursor,
            options: StreamOptions::default(),
        })
    }

    /// Set the options used by streams opened through this catalog
    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> StreamOptions {
        self.options
    }

    /// Number of catalogued entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// All entries in enumeration order
    pub fn entries(&self) -> &[EntryRecord] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&EntryRecord> {
        self.entries.get(index)
    }

    /// Index of the first entry with exactly this name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    /// The archive's global comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }

    /// Move the archive cursor to the entry at `index`.
    ///
    /// Moving backwards restarts from the first entry. Returns `false` if any
    /// navigation step fails; the cursor is then treated as unreliable and the
    /// next call re-scans from the top.
    pub fn position_at(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        let Some(archive) = self.archive.as_mut() else {
            return false;
        };

        let mut current = match self.cursor {
            Some(current) if current == index => return true,
            Some(current) if current < index => current,
            _ => {
                trace!("Rewinding to first entry to reach #{}", index);
                if !archive.goto_first() {
                    self.cursor = None;
                    warn!("Lost archive position while rewinding");
                    return false;
                }
                0
            }
        };

        while current < index {
            if !archive.goto_next() {
                self.cursor = None;
                warn!("Lost archive position stepping from #{} to #{}", current, index);
                return false;
            }
            current += 1;
        }

        self.cursor = Some(current);
        true
    }

    /// Open a stream over `record`'s content with this catalog's options
    pub fn open_entry(&mut self, record: &EntryRecord) -> Result<EntryStream<'_, R>> {
        let options = self.options;
        EntryStream::open_with(self, record, options)
    }

    /// Open a stream over the entry at `index`
    pub fn open_index(&mut self, index: usize) -> Result<EntryStream<'_, R>> {
        let record = self
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| ZipError::EntryOpen {
                index,
                name: String::new(),
                reason: format!("index out of range (catalog has {} entries)", self.size()),
            })?;
        self.open_entry(&record)
    }

    /// Release the archive, any open decompression cursor, and every record.
    ///
    /// Closing an already closed catalog does nothing.
    pub fn close(&mut self) {
        if let Some(mut archive) = self.archive.take() {
            archive.close_quietly();
            debug!("Closed archive with {} entries", self.entries.len());
        }
        self.entries.clear();
        self.cursor = None;
    }

    /// Check that `record` is this catalog's record at its index
    pub(crate) fn verify(&self, record: &EntryRecord) -> Result<()> {
        match self.entries.get(record.index()) {
            Some(own) if own.crc32() == record.crc32() => Ok(()),
            _ => Err(ZipError::EntryMismatch {
                index: record.index(),
                name: record.name().to_string(),
            }),
        }
    }

    /// Open the decompression cursor for the entry under the archive cursor
    pub(crate) fn open_current(&mut self) -> Result<()> {
        let archive = self
            .archive
            .as_mut()
            .ok_or(ZipError::InvalidArchive("catalog is closed"))?;
        let result = archive.open_current();
        if result.is_err() {
            self.cursor = None;
        }
        result
    }

    pub(crate) fn archive_mut(&mut self) -> Option<&mut ZipArchive<R>> {
        self.archive.as_mut()
    }
}

impl<R: ReadAt> Drop for EntryCatalog<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::test_support::ZipBuilder;

    fn catalog(data: Vec<u8>) -> EntryCatalog<MemoryReader> {
        EntryCatalog::from_reader(Arc::new(MemoryReader::new(data))).unwrap()
    }

    fn five_entries() -> Vec<u8> {
        ZipBuilder::new()
            .stored("zero", b"0")
            .deflated("one", b"11")
            .stored("two", b"222")
            .directory("three/")
            .deflated("four", b"4444")
            .finish()
    }

    #[test]
    fn enumerates_in_order() {
        let catalog = catalog(five_entries());
        assert_eq!(catalog.size(), 5);
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["zero", "one", "two", "three/", "four"]);
        for (i, entry) in catalog.entries().iter().enumerate() {
            assert_eq!(entry.index(), i);
        }
        assert!(catalog.entry(3).unwrap().is_directory());
        assert_eq!(catalog.index_of("two"), Some(2));
        assert_eq!(catalog.index_of("missing"), None);
    }

    #[test]
    fn repeated_position_is_a_no_op() {
        let mut catalog = catalog(five_entries());
        assert!(catalog.position_at(2));
        assert_eq!(catalog.cursor, Some(2));
        assert!(catalog.position_at(2));
        assert_eq!(catalog.cursor, Some(2));
    }

    #[test]
    fn rewinds_and_reforwards() {
        let mut catalog = catalog(five_entries());
        for index in [4, 1, 4, 0, 3] {
            assert!(catalog.position_at(index));
            let info = catalog.archive.as_ref().unwrap().current_entry_info().unwrap();
            assert_eq!(info.file_name, catalog.entries()[index].name());
        }
    }

    #[test]
    fn out_of_range_position_fails() {
        let mut catalog = catalog(five_entries());
        assert!(!catalog.position_at(5));
    }

    #[test]
    fn lost_navigation_fails_enumeration() {
        let data = ZipBuilder::new()
            .stored("a", b"a")
            .stored("b", b"b")
            .declared_entries(4)
            .finish();
        let result = EntryCatalog::from_reader(Arc::new(MemoryReader::new(data)));
        assert!(matches!(
            result,
            Err(ZipError::Enumeration {
                expected: 4,
                found: 2
            })
        ));
    }

    #[test]
    fn garbage_fails_to_open() {
        let result = EntryCatalog::from_reader_named(
            Arc::new(MemoryReader::new(vec![7u8; 100])),
            "junk.zip",
        );
        match result {
            Err(ZipError::ArchiveOpen { path, .. }) => assert_eq!(path, "junk.zip"),
            _ => panic!("expected ArchiveOpen"),
        }
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let mut catalog = catalog(ZipBuilder::new().finish());
        assert_eq!(catalog.size(), 0);
        assert!(!catalog.position_at(0));
    }

    #[test]
    fn close_is_idempotent() {
        let mut catalog = catalog(five_entries());
        catalog.close();
        assert!(catalog.is_closed());
        assert_eq!(catalog.size(), 0);
        assert!(!catalog.position_at(0));
        catalog.close();
        assert!(catalog.is_closed());
    }

    #[test]
    fn keeps_comments() {
        let data = ZipBuilder::new()
            .stored("a", b"a")
            .entry_comment(0, "first entry")
            .archive_comment("whole archive")
            .finish();
        let catalog = catalog(data);
        assert_eq!(catalog.comment(), "whole archive");
        assert_eq!(catalog.entries()[0].comment(), "first entry");
    }
}
