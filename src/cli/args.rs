//! CLI argument definitions using clap derive

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Usage line printed after the error for any malformed invocation
pub const USAGE: &str = "ie. getrun <group> <artifact> <version> <mainClass>";

/// getrun - fetch a Maven artifact with its dependencies and run it
///
/// Resolves the artifact's transitive runtime dependencies into a local
/// cache directory, then starts `java -cp <cache jars> <mainClass>`.
#[derive(Parser, Debug)]
#[command(name = "getrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Maven group id, e.g. org.example
    pub group: String,

    /// Maven artifact id
    pub artifact: String,

    /// Artifact version
    #[arg(id = "artifact_version", value_name = "VERSION")]
    pub version: String,

    /// Fully qualified class to run
    #[arg(value_name = "MAIN_CLASS")]
    pub main_class: String,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "GETRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Remove the cache directory and resolve again
    #[arg(long)]
    pub refresh: bool,
}

/// Result of reading the command line
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// Help or version output requested
    Info(clap::Error),
    /// Malformed command line
    Invalid(clap::Error),
}

impl Cli {
    /// Parse without exiting, separating help/version from real errors
    pub fn read<I, T>(args: I) -> Invocation
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Invocation::Run(cli),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Invocation::Info(e),
                _ => Invocation::Invalid(e),
            },
        }
    }
}
