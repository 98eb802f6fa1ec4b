//! ZIP entry catalog and streaming entry reader.
//!
//! This module lets a caller enumerate a ZIP archive once and then read any
//! entry as a buffered, checksum-validated byte stream.
//!
//! ## Architecture
//!
//! The module is organized into layered components:
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`archive`]: Forward-only navigation and a single decompression cursor over the Central Directory
//! - [`catalog`]: Entry enumeration and index-addressed positioning
//! - [`stream`]: Buffered pull-based reader over one entry
//! - [`extractor`]: Copying entries to files, stdout or any writer
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - Seeking is limited to the currently buffered window

pub mod archive;
pub mod catalog;
mod extractor;
pub mod stream;
mod structures;

#[cfg(test)]
mod test_support;

pub use archive::ZipArchive;
pub use catalog::EntryCatalog;
pub use extractor::ZipExtractor;
pub use stream::{EntryStream, StreamOptions, StreamState};
pub use structures::*;
