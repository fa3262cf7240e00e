//! Entry configuration.
//!
//! Resolution walks the tokens once, keeping a running [`ResolverState`].
//! Every `--src` snapshots that state into an [`EntryDescriptor`]; later
//! `--root`/`--dst`/`--level` tokens or a `--` reset only affect entries
//! declared after them.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::Token;
use crate::error::{Error, Result};
use crate::path::to_posix;
use crate::zip::CompressionMethod;

pub const DEFAULT_DST: &str = "/";

/// Compression level, 0 (store) through 9 (maximum DEFLATE effort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const STORE: Level = Level(0);
    pub const BEST: Level = Level(9);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 9).then_some(Level(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn method(self) -> CompressionMethod {
        if self.0 == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::BEST
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Level::new)
            .ok_or_else(|| {
                Error::validation(
                    r#"The value for the "--level" argument must be a number between 0 and 9 inclusive"#,
                )
            })
    }
}

/// Immutable snapshot of the configuration at the moment a source was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Base path archive names are computed against, `/`-separated.
    pub root: String,
    /// Directory inside the archive the entry's files land in.
    pub dst: String,
    pub level: Level,
    /// File, directory or glob pattern, exactly as given.
    pub src: String,
}

/// Running configuration while tokens are consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverState {
    cwd: String,
    pub root: String,
    pub dst: String,
    pub level: Level,
}

impl ResolverState {
    pub fn new(cwd: &str) -> Self {
        let cwd = to_posix(cwd);
        Self {
            root: cwd.clone(),
            dst: DEFAULT_DST.to_string(),
            level: Level::default(),
            cwd,
        }
    }

    /// Restore root, dst and level to their defaults.
    pub fn reset(&mut self) {
        *self = Self::new(&self.cwd);
    }

    pub fn entry(&self, src: &str) -> EntryDescriptor {
        EntryDescriptor {
            root: self.root.clone(),
            dst: self.dst.clone(),
            level: self.level,
            src: src.to_string(),
        }
    }
}

/// Everything needed to build one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub output: PathBuf,
    pub cwd: String,
    pub entries: Vec<EntryDescriptor>,
}

impl BuildPlan {
    /// The output path anchored at the working directory.
    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.cwd).join(&self.output)
    }
}

fn missing_value(token: Token) -> Error {
    Error::validation(format!(
        r#"A value for the "{}" argument must be provided"#,
        token.long()
    ))
}

/// Turn an ordered token list into a [`BuildPlan`].
///
/// Unrecognized tokens are skipped. A value-bearing token takes the next
/// token as its value whatever it looks like.
pub fn resolve<S: AsRef<str>>(tokens: &[S], cwd: &str) -> Result<BuildPlan> {
    let mut state = ResolverState::new(cwd);
    let mut output: Option<PathBuf> = None;
    let mut entries = Vec::new();

    let mut iter = tokens.iter().map(AsRef::as_ref);
    while let Some(raw) = iter.next() {
        let Some(token) = Token::parse(raw) else {
            continue;
        };

        let value = if token.takes_value() {
            Some(iter.next().ok_or_else(|| missing_value(token))?)
        } else {
            None
        };

        match (token, value) {
            (Token::Archive, Some(path)) => {
                if output.is_some() {
                    return Err(Error::validation(
                        r#"The "--archive" argument cannot be provided more than once"#,
                    ));
                }
                output = Some(PathBuf::from(path));
            }
            (Token::Root, Some(root)) => state.root = to_posix(root),
            (Token::Dst, Some(dst)) => state.dst = to_posix(dst),
            (Token::Level, Some(level)) => state.level = level.parse()?,
            (Token::Src, Some(src)) => entries.push(state.entry(src)),
            (Token::Reset, _) => state.reset(),
            _ => {}
        }
    }

    let output = output
        .ok_or_else(|| Error::validation(r#"The "--archive" argument must be provided"#))?;

    if entries.is_empty() {
        return Err(Error::validation(
            r#"At least one "--src" argument must be provided"#,
        ));
    }

    Ok(BuildPlan {
        output,
        cwd: state.cwd,
        entries,
    })
}
