//! Command-line argument parsing. A thin boundary layer: it only produces
//! validated option values for `main` to act on, nothing else.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

const DEFAULT_CONFIG_PATH: &str = "/etc/nvhttpd/nvhttpd.conf";

/// Small, self-contained static-content HTTP/1.x server.
// clap's auto-generated version flag binds to `-V`; this binary exposes
// `-v` instead, so the default is disabled and replaced with an explicit
// lowercase one.
#[derive(Parser, Debug)]
#[command(name = "nvhttpd", version, about, disable_help_flag = false, disable_version_flag = true)]
pub struct Cli {
    /// Path to the INI configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print version information and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: (),
}

pub fn parse() -> Cli {
    Cli::parse()
}
