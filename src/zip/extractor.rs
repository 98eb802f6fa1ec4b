use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::catalog::EntryCatalog;
use super::structures::EntryRecord;

/// Copies entry content out of a catalog through entry streams
pub struct ZipExtractor<R: ReadAt> {
    catalog: EntryCatalog<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(catalog: EntryCatalog<R>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &EntryCatalog<R> {
        &self.catalog
    }

    /// List all files in the archive
    pub fn list_files(&self) -> &[EntryRecord] {
        self.catalog.entries()
    }

    /// Stream an entry into `writer`, returning the number of bytes copied.
    ///
    /// Size and CRC errors surface once the whole entry has been written.
    pub fn extract_to_writer<W: Write + ?Sized>(
        &mut self,
        entry: &EntryRecord,
        writer: &mut W,
    ) -> Result<u64> {
        let mut stream = self.catalog.open_entry(entry)?;
        let copied = io::copy(&mut stream, writer).map_err(ZipError::from_io_error)?;
        debug!("Copied {} bytes of {}", copied, entry.name());
        Ok(copied)
    }

    /// Extract file to disk
    pub fn extract_to_file(&mut self, entry: &EntryRecord, output_path: &Path) -> Result<u64> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = io::BufWriter::new(fs::File::create(output_path)?);
        let copied = self.extract_to_writer(entry, &mut file)?;
        file.flush()?;
        Ok(copied)
    }

    /// Extract file to stdout
    pub fn extract_to_stdout(&mut self, entry: &EntryRecord) -> Result<u64> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let copied = self.extract_to_writer(entry, &mut lock)?;
        lock.flush()?;
        Ok(copied)
    }

    /// Decompress an entry without keeping its data, validating size and CRC
    pub fn test_entry(&mut self, entry: &EntryRecord) -> Result<u64> {
        self.extract_to_writer(entry, &mut io::sink())
    }
}
