//! # zipup
//!
//! Build a zip archive from files, directories and glob patterns.
//!
//! Each `--src` on the command line declares one entry. Entries pick up the
//! root, destination directory and compression level that are in effect when
//! they are declared; `--` resets those settings to their defaults.
//!
//! ## Features
//!
//! - Plain files, recursive directories and glob patterns as sources
//! - Archive names computed relative to a per-entry root and placed under a
//!   per-entry destination directory
//! - Per-entry compression: store (level 0) or DEFLATE levels 1-9
//! - Portable `/`-separated member names on every platform
//! - ZIP64 output for large archives
//!
//! ## Example
//!
//! ```no_run
//! use zipup::{build_archive, Invocation};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tokens = ["--archive", "out.zip", "--root", "dist", "--src", "dist"];
//!     if let Invocation::Build(plan) = Invocation::from_tokens(&tokens, "/home/me/project")? {
//!         let summary = build_archive(&plan).await?;
//!         println!("{} files", summary.files);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod expand;
pub mod io;
pub mod path;
pub mod zip;

pub use builder::{build_archive, build_into, ArchivePlan, ArchiveSummary};
pub use cli::{Invocation, Token};
pub use config::{resolve, BuildPlan, EntryDescriptor, Level, ResolverState};
pub use error::{Error, ErrorKind, Result};
pub use expand::{expand, ArchiveMapping, Expander};
pub use io::{ArchiveSink, EntryOptions, OutputFile};
pub use crate::zip::{CompressionMethod, ZipWriter};
