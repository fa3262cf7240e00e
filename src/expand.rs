//! Entry expansion.
//!
//! An [`Expander`] turns one [`EntryDescriptor`] into the files it names, each
//! paired with its archive path. A source is dispatched three ways:
//!
//! - an existing regular file maps to one archive member
//! - an existing directory contributes all of its children, recursively
//! - anything else is a glob pattern whose matching files are dispatched again
//!
//! A listed child that no longer resolves, such as a dangling symlink, matches
//! nothing and is skipped. Other I/O failures abort the expansion.
//!
//! Pending paths live on an explicit stack instead of the call stack, so deep
//! trees cannot overflow it. Popping from the end and pushing children in
//! reverse keeps the output in depth-first listing order.

use std::io;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use tracing::{debug, warn};

use crate::config::{EntryDescriptor, Level};
use crate::error::{Error, Result};
use crate::path::{archive_path, is_absolute, path_to_posix, to_posix};

/// One resolved file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMapping {
    /// `/`-separated member name, no leading separator.
    pub archive_path: String,
    /// Filesystem location of the content.
    pub source: PathBuf,
    pub level: Level,
}

enum Pending {
    /// The entry's own `src`: a path or a pattern.
    Source(String),
    /// A path produced by a directory listing or a glob match.
    Found(PathBuf),
}

enum SourceKind {
    File,
    Directory,
    Pattern,
    /// A listed child that vanished or is a dangling link.
    Missing,
    Other,
}

/// Wildcards never match `/` or a leading `.`, like a shell.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidInput
    )
}

/// Lazily expands a single entry.
pub struct Expander<'a> {
    cwd: &'a str,
    entry: &'a EntryDescriptor,
    pending: Vec<Pending>,
}

impl<'a> Expander<'a> {
    pub fn new(cwd: &'a str, entry: &'a EntryDescriptor) -> Self {
        Self {
            cwd,
            entry,
            pending: vec![Pending::Source(entry.src.clone())],
        }
    }

    /// Anchor a relative path at the configured working directory.
    fn absolute(&self, path: &str) -> PathBuf {
        Path::new(self.cwd).join(path)
    }

    async fn classify(&self, path: &Path, may_be_pattern: bool) -> Result<SourceKind> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(SourceKind::File),
            Ok(meta) if meta.is_dir() => Ok(SourceKind::Directory),
            Ok(_) => Ok(SourceKind::Other),
            Err(e) if is_missing(&e) && may_be_pattern => Ok(SourceKind::Pattern),
            Err(e) if is_missing(&e) => Ok(SourceKind::Missing),
            Err(e) => Err(Error::filesystem(path, e)),
        }
    }

    /// Children of `dir`, sorted by file name.
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Error::filesystem(dir, e))?;
        let mut children = Vec::new();
        while let Some(child) = reader
            .next_entry()
            .await
            .map_err(|e| Error::filesystem(dir, e))?
        {
            children.push(child.path());
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(children)
    }

    /// Regular files matching `pattern`, in the glob engine's order.
    async fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = if is_absolute(&to_posix(pattern)) {
            pattern.to_string()
        } else {
            format!("{}/{}", glob::Pattern::escape(self.cwd), pattern)
        };

        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let paths = match glob::glob_with(&pattern, GLOB_OPTIONS) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(%pattern, error = %e, "invalid glob pattern, no files matched");
                    return Ok(Vec::new());
                }
            };

            let mut files = Vec::new();
            for path in paths {
                let path = path.map_err(|e| Error::Glob {
                    path: e.path().to_path_buf(),
                    source: e,
                })?;
                if path.is_file() {
                    files.push(path);
                }
            }
            Ok(files)
        })
        .await
        .map_err(|e| Error::filesystem(Path::new(&self.entry.src), io::Error::other(e)))??;

        Ok(matches)
    }

    fn mapping(&self, path: PathBuf) -> Result<ArchiveMapping> {
        let archive_path = archive_path(
            self.cwd,
            &self.entry.root,
            &self.entry.dst,
            &path_to_posix(&path),
        );
        if archive_path.is_empty() {
            return Err(Error::validation(format!(
                r#"The source "{}" has an empty name in the archive; use a "--root" above it or a "--dst""#,
                path.display()
            )));
        }
        debug!(source = %path.display(), %archive_path, level = %self.entry.level, "resolved");
        Ok(ArchiveMapping {
            archive_path,
            source: path,
            level: self.entry.level,
        })
    }

    /// Next file of the entry, or `None` once it is exhausted.
    pub async fn next(&mut self) -> Result<Option<ArchiveMapping>> {
        while let Some(item) = self.pending.pop() {
            let (path, may_be_pattern) = match item {
                Pending::Source(src) => (self.absolute(&src), true),
                Pending::Found(path) => (path, false),
            };

            match self.classify(&path, may_be_pattern).await? {
                SourceKind::File => return self.mapping(path).map(Some),
                SourceKind::Directory => {
                    let children = self.list(&path).await?;
                    self.pending
                        .extend(children.into_iter().rev().map(Pending::Found));
                }
                SourceKind::Pattern => {
                    let matches = self.glob(&self.entry.src).await?;
                    if matches.is_empty() {
                        debug!(pattern = %self.entry.src, "no files matched");
                    }
                    self.pending
                        .extend(matches.into_iter().rev().map(Pending::Found));
                }
                SourceKind::Missing => {
                    debug!(path = %path.display(), "skipping missing path");
                }
                SourceKind::Other => {
                    debug!(path = %path.display(), "skipping non-regular file");
                }
            }
        }
        Ok(None)
    }

    /// Drain the expander.
    pub async fn collect(mut self) -> Result<Vec<ArchiveMapping>> {
        let mut out = Vec::new();
        while let Some(mapping) = self.next().await? {
            out.push(mapping);
        }
        Ok(out)
    }
}

/// All files of `entry`, in expansion order.
pub async fn expand(cwd: &str, entry: &EntryDescriptor) -> Result<Vec<ArchiveMapping>> {
    Expander::new(cwd, entry).collect().await
}
