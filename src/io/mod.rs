mod output;

pub use output::OutputFile;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::zip::CompressionMethod;

/// Per-member settings handed to an [`ArchiveSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOptions {
    pub method: CompressionMethod,
    /// DEFLATE effort 1-9; ignored for stored members.
    pub level: u8,
    pub modified: NaiveDateTime,
    /// Unix permission bits, without the file type.
    pub unix_mode: Option<u32>,
}

/// Destination for archive members.
///
/// A file member is written as `start_file`, any number of `write_chunk`
/// calls, then `finish_file`. Members appear in the archive in the order
/// they were started.
#[async_trait]
pub trait ArchiveSink: Send {
    /// Add an empty directory member. `name` ends with `/`.
    async fn add_directory(&mut self, name: &str, options: EntryOptions) -> Result<()>;

    /// Begin a file member.
    async fn start_file(&mut self, name: &str, options: EntryOptions) -> Result<()>;

    /// Append uncompressed content to the current file member. Content may be
    /// passed on before the member is finished, so callers need not buffer it.
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;

    /// Seal the current file member.
    async fn finish_file(&mut self) -> Result<()>;

    /// Write trailing records and flush. Returns the archive size in bytes.
    async fn finish(&mut self) -> Result<u64>;
}
