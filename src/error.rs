//! Error types shared by the resolver, the expander and the archive builder.
//!
//! Every failure carries an explicit [`ErrorKind`] so the binary can decide how
//! to report it without inspecting concrete error types.

use std::io;
use std::path::{Path, PathBuf};

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing command-line configuration.
    Validation,
    /// Stat, list or read failure on an input path.
    Filesystem,
    /// Failure creating or writing the output archive.
    Write,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Glob {
        path: PathBuf,
        #[source]
        source: glob::GlobError,
    },

    #[error("failed to write archive {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn filesystem(path: &Path, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn write(
        path: &Path,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Error::Write {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Filesystem { .. } | Error::Glob { .. } => ErrorKind::Filesystem,
            Error::Write { .. } => ErrorKind::Write,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);

        let fs = Error::filesystem(Path::new("a"), io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(fs.kind(), ErrorKind::Filesystem);

        let write = Error::write(Path::new("out.zip"), anyhow::anyhow!("disk full"));
        assert_eq!(write.kind(), ErrorKind::Write);
        assert_eq!(write.to_string(), "failed to write archive out.zip: disk full");
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = Error::validation(r#"At least one "--src" argument must be provided"#);
        assert_eq!(
            err.to_string(),
            r#"At least one "--src" argument must be provided"#
        );
    }
}
