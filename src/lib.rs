//! # runzip
//!
//! Streaming ZIP entry reader.
//!
//! An [`EntryCatalog`] opens an archive and enumerates every entry exactly
//! once. Any catalogued entry can then be opened as an [`EntryStream`]: a
//! buffered [`std::io::Read`] that decompresses on demand, checks the byte
//! count against the declared size and validates the CRC32 when the entry is
//! exhausted. One stream at a time may be open per catalog.
//!
//! Archives can come from the local filesystem, from memory, or from HTTP
//! servers that support Range requests.
//!
//! ## Features
//!
//! - Index-addressed positioning over forward-only Central Directory navigation
//! - Support for ZIP64 format (archives larger than 4GB)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - Size and CRC32 validation at end of entry
//! - Seeking within the resident buffer window
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use runzip::EntryCatalog;
//!
//! fn main() -> runzip::Result<()> {
//!     let mut catalog = EntryCatalog::open("archive.zip")?;
//!     for entry in catalog.entries() {
//!         println!("{} ({} bytes)", entry.name(), entry.uncompressed_size());
//!     }
//!
//!     if let Some(index) = catalog.index_of("README.md") {
//!         let mut text = String::new();
//!         catalog.open_index(index)?.read_to_string(&mut text)?;
//!         println!("{text}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use zip::{
    CompressionMethod, EntryCatalog, EntryRecord, EntryStream, StreamOptions, StreamState,
    ZipExtractor,
};
