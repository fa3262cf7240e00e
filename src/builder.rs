//! Archive assembly.
//!
//! Building happens in two passes. First every entry is expanded, in
//! declaration order, into an [`ArchivePlan`]; then each planned member is
//! streamed from disk into an [`ArchiveSink`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::config::BuildPlan;
use crate::error::{Error, Result};
use crate::expand::{ArchiveMapping, Expander};
use crate::io::{ArchiveSink, EntryOptions, OutputFile};
use crate::zip::{CompressionMethod, ZipWriter};

const CHUNK_SIZE: usize = 64 * 1024;

/// Ordered set of archive members keyed by archive path.
///
/// A mapping for an archive path that is already planned replaces the earlier
/// one in place: the last source wins but the member keeps its first position.
#[derive(Debug, Default)]
pub struct ArchivePlan {
    members: Vec<ArchiveMapping>,
    index: HashMap<String, usize>,
    collisions: usize,
}

impl ArchivePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mapping: ArchiveMapping) {
        match self.index.get(&mapping.archive_path) {
            Some(&i) => {
                warn!(
                    archive_path = %mapping.archive_path,
                    replaced = %self.members[i].source.display(),
                    by = %mapping.source.display(),
                    "archive path collision, keeping the later source"
                );
                self.collisions += 1;
                self.members[i] = mapping;
            }
            None => {
                self.index
                    .insert(mapping.archive_path.clone(), self.members.len());
                self.members.push(mapping);
            }
        }
    }

    pub fn members(&self) -> &[ArchiveMapping] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Expand every entry of `build` in declaration order.
    ///
    /// The archive being written is never planned as one of its own members.
    pub async fn from_build(build: &BuildPlan) -> Result<Self> {
        let output = tokio::fs::canonicalize(build.output_path()).await.ok();
        let mut plan = Self::new();
        for entry in &build.entries {
            let mut expander = Expander::new(&build.cwd, entry);
            while let Some(mapping) = expander.next().await? {
                if is_output(&mapping.source, output.as_deref()).await {
                    debug!(source = %mapping.source.display(), "skipping the archive being written");
                    continue;
                }
                plan.insert(mapping);
            }
        }
        Ok(plan)
    }
}

/// Whether `source` is the canonical `output` file.
async fn is_output(source: &Path, output: Option<&Path>) -> bool {
    let Some(output) = output else {
        return false;
    };
    if source.file_name() != output.file_name() {
        return false;
    }
    tokio::fs::canonicalize(source)
        .await
        .is_ok_and(|source| source == output)
}

/// What ended up in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
    pub collisions: usize,
    /// Uncompressed bytes read from sources.
    pub bytes_read: u64,
    /// Size of the finished archive.
    pub archive_size: u64,
}

/// Parent directories of `archive_path`, outermost first, each ending in `/`.
fn parent_dirs(archive_path: &str) -> impl Iterator<Item = &str> {
    archive_path
        .match_indices('/')
        .map(move |(i, _)| &archive_path[..=i])
}

fn modified_time(meta: &std::fs::Metadata) -> NaiveDateTime {
    let time = meta.modified().map(DateTime::<Local>::from).unwrap_or_else(|_| Local::now());
    time.naive_local()
}

#[cfg(unix)]
fn unix_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

/// Stream every planned member into `sink` and finish it.
///
/// `output` only labels write errors.
pub async fn write_plan<S: ArchiveSink + ?Sized>(
    plan: &ArchivePlan,
    sink: &mut S,
    output: &Path,
) -> Result<ArchiveSummary> {
    let mut summary = ArchiveSummary {
        collisions: plan.collisions(),
        ..Default::default()
    };
    let mut dirs: HashSet<&str> = HashSet::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let started = Local::now().naive_local();

    for member in plan.members() {
        for dir in parent_dirs(&member.archive_path) {
            if dirs.insert(dir) {
                let options = EntryOptions {
                    method: CompressionMethod::Stored,
                    level: 0,
                    modified: started,
                    unix_mode: None,
                };
                sink.add_directory(dir, options)
                    .await
                    .map_err(|e| Error::write(output, e))?;
                summary.directories += 1;
            }
        }

        let source = &member.source;
        let mut file = tokio::fs::File::open(source)
            .await
            .map_err(|e| Error::filesystem(source, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| Error::filesystem(source, e))?;

        let options = EntryOptions {
            method: member.level.method(),
            level: member.level.get(),
            modified: modified_time(&meta),
            unix_mode: unix_mode(&meta),
        };
        sink.start_file(&member.archive_path, options)
            .await
            .map_err(|e| Error::write(output, e))?;

        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| Error::filesystem(source, e))?;
            if n == 0 {
                break;
            }
            sink.write_chunk(&buf[..n])
                .await
                .map_err(|e| Error::write(output, e))?;
            summary.bytes_read += n as u64;
        }

        sink.finish_file()
            .await
            .map_err(|e| Error::write(output, e))?;
        summary.files += 1;
    }

    summary.archive_size = sink.finish().await.map_err(|e| Error::write(output, e))?;
    Ok(summary)
}

/// Expand `build` and write the result into `sink`.
pub async fn build_into<S: ArchiveSink + ?Sized>(
    build: &BuildPlan,
    sink: &mut S,
) -> Result<ArchiveSummary> {
    let plan = ArchivePlan::from_build(build).await?;
    write_plan(&plan, sink, &build.output).await
}

/// Create the output file named by `build` and write the archive into it.
///
/// The output is opened before any input is examined. If anything fails
/// afterwards the partial archive is deleted.
pub async fn build_archive(build: &BuildPlan) -> Result<ArchiveSummary> {
    let output = OutputFile::create(&build.output_path())
        .await
        .map_err(|e| Error::write(&build.output, e))?;
    debug!(path = %output.path().display(), "created archive");
    let mut writer = ZipWriter::new(output);

    match build_into(build, &mut writer).await {
        Ok(summary) => {
            info!(
                archive = %writer.get_ref().path().display(),
                files = summary.files,
                directories = summary.directories,
                collisions = summary.collisions,
                bytes_read = summary.bytes_read,
                archive_size = summary.archive_size,
                "archive written"
            );
            Ok(summary)
        }
        Err(err) => {
            let output = writer.into_inner();
            let path = output.path().to_path_buf();
            if let Err(e) = output.discard().await {
                warn!(archive = %path.display(), error = %e, "failed to remove partial archive");
            }
            Err(err)
        }
    }
}
