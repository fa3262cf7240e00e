//! ZIP archive writing.
//!
//! ## Architecture
//!
//! - [`structures`]: record layouts (local/central headers, EOCD, ZIP64 records)
//!   and their little-endian serialization
//! - [`writer`]: [`ZipWriter`], the [`ArchiveSink`](crate::io::ArchiveSink)
//!   implementation that sequences those records into a stream
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE levels 1-9
//! - ZIP64 extensions for members, offsets and entry counts past the classic limits
//! - UTF-8 member names
//! - Streaming output: member data is followed by a data descriptor
//! - Unix permission bits and DOS modification times
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - The central directory is held in memory until the archive is finished

mod structures;
mod writer;

pub use structures::*;
pub use writer::ZipWriter;
