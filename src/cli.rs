//! Command-line vocabulary, help text and invocation classification.
//!
//! Entry configuration is positional and stateful (`--root` applies to every
//! later `--src` until `--` resets it), so the tokens are walked in order by
//! [`crate::config::resolve`] rather than handed to a declarative parser.
//! `clap` still owns the vocabulary description and renders the help output.

use clap::{Arg, ArgAction, Command};

use crate::config::{self, BuildPlan};
use crate::error::Result;

pub const BIN_NAME: &str = "zipup";

/// A recognized command-line token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Archive,
    Help,
    Examples,
    Root,
    Dst,
    Level,
    Src,
    Reset,
}

impl Token {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "--archive" | "-a" => Some(Token::Archive),
            "--help" | "-h" => Some(Token::Help),
            "--examples" => Some(Token::Examples),
            "--root" | "-r" => Some(Token::Root),
            "--dst" | "-d" => Some(Token::Dst),
            "--level" | "-l" => Some(Token::Level),
            "--src" | "-s" => Some(Token::Src),
            "--" => Some(Token::Reset),
            _ => None,
        }
    }

    /// Whether the token consumes the following token as its value.
    pub fn takes_value(self) -> bool {
        matches!(
            self,
            Token::Archive | Token::Root | Token::Dst | Token::Level | Token::Src
        )
    }

    /// Long spelling used in messages.
    pub fn long(self) -> &'static str {
        match self {
            Token::Archive => "--archive",
            Token::Help => "--help",
            Token::Examples => "--examples",
            Token::Root => "--root",
            Token::Dst => "--dst",
            Token::Level => "--level",
            Token::Src => "--src",
            Token::Reset => "--",
        }
    }
}

/// What the caller should do for a given command line.
#[derive(Debug)]
pub enum Invocation {
    /// Print usage. `is_error` is set when no arguments were given at all.
    Help { is_error: bool },
    /// Print usage examples.
    Examples,
    /// Build an archive.
    Build(BuildPlan),
}

impl Invocation {
    /// Classify `tokens` (program name excluded).
    ///
    /// `--help` and `--examples` win over everything else, including
    /// configuration errors, when they appear in token position.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S], cwd: &str) -> Result<Self> {
        if tokens.is_empty() {
            return Ok(Invocation::Help { is_error: true });
        }

        let mut iter = tokens.iter().map(AsRef::as_ref);
        while let Some(token) = iter.next() {
            match Token::parse(token) {
                Some(Token::Help) => return Ok(Invocation::Help { is_error: false }),
                Some(Token::Examples) => return Ok(Invocation::Examples),
                Some(t) if t.takes_value() => {
                    iter.next();
                }
                _ => {}
            }
        }

        config::resolve(tokens, cwd).map(Invocation::Build)
    }
}

/// Vocabulary description used for help rendering.
pub fn command() -> Command {
    Command::new(BIN_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .override_usage(format!("{BIN_NAME} <options> <entry...>"))
        .disable_help_flag(true)
        .disable_version_flag(true)
        .next_help_heading("Options")
        .arg(
            Arg::new("archive")
                .long("archive")
                .short('a')
                .value_name("FILE")
                .action(ArgAction::Set)
                .help("The filename of the archive to create."),
        )
        .arg(
            Arg::new("help")
                .long("help")
                .short('h')
                .action(ArgAction::SetTrue)
                .help("Print this help."),
        )
        .arg(
            Arg::new("examples")
                .long("examples")
                .action(ArgAction::SetTrue)
                .help("Print usage examples."),
        )
        .next_help_heading("Entry")
        .arg(
            Arg::new("root")
                .long("root")
                .short('r')
                .value_name("DIR")
                .action(ArgAction::Append)
                .help(
                    "The directory to which --src paths will be relative in the archive. \
                     Must be provided before any --src arguments in the entry. \
                     Defaults to the current working directory.",
                ),
        )
        .arg(
            Arg::new("dst")
                .long("dst")
                .short('d')
                .value_name("DIR")
                .action(ArgAction::Append)
                .help(
                    "The directory to which --src paths will be added in the archive. \
                     Must be provided before any --src arguments in the entry. \
                     Defaults to \"/\".",
                ),
        )
        .arg(
            Arg::new("level")
                .long("level")
                .short('l')
                .value_name("0-9")
                .action(ArgAction::Append)
                .help(
                    "The compression level with which the --src files will be stored in \
                     the archive. \"0\" = store, \"1\" = best speed, \"9\" = best compression. \
                     Defaults to \"9\".",
                ),
        )
        .arg(
            Arg::new("src")
                .long("src")
                .short('s')
                .value_name("PATH")
                .action(ArgAction::Append)
                .help(
                    "A filename, directory, or glob pattern to add to the archive. \
                     Must be provided one or more times per entry.",
                ),
        )
        .after_help(format!(
            "  --  Resets the --root, --dst, and --level arguments to their default values.\n\n\
             For examples, run \"{BIN_NAME} --examples\""
        ))
}

pub fn usage() -> String {
    command().render_help().to_string()
}

pub fn examples() -> String {
    const EXAMPLES: &[(&str, &str)] = &[
        (
            "--archive out.zip --src dist",
            "Creates out.zip and adds the \"dist\" directory to the root of the archive.",
        ),
        (
            "--archive out.zip --root dist --src dist",
            "Creates out.zip and adds the contents of the \"dist\" directory to root of the\n  archive.",
        ),
        (
            "--archive out.zip --dst info --src dist",
            "Creates out.zip and adds the \"dist\" directory to the \"info\" directory in the\n  archive.",
        ),
        (
            "--archive out.zip --root dist --dst info --src dist",
            "Creates out.zip and adds the contents of the \"dist\" directory to the \"info\"\n  directory in the archive.",
        ),
        (
            "--archive out.zip --src dist --src info.txt",
            "Creates out.zip and adds the \"dist\" directory and the \"info.txt\" file to the\n  root of the archive.",
        ),
        (
            "--archive out.zip --dst info --src dist --src info.txt",
            "Creates out.zip and adds the \"dist\" directory and the \"info.txt\" file to the\n  \"info\" directory in the archive.",
        ),
        (
            "--archive out.zip --dst info --src dist -- --src info.txt",
            "Creates out.zip and adds the \"dist\" directory to the \"info\" directory in the\n  archive and adds the \"info.txt\" file to the root of the archive.",
        ),
        (
            "--archive out.zip --level 0 --src 'assets/**/*.png'",
            "Creates out.zip and stores every PNG below \"assets\" without compression.",
        ),
    ];

    let mut out = String::from("Examples:\n");
    for (args, description) in EXAMPLES {
        out.push_str(&format!("\n{BIN_NAME} {args}\n  {description}\n"));
    }
    out
}
