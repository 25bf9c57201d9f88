//! CLI argument parsing using clap derive API
//!
//! This module is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::Parser;

/// scorewatch-tail -- diagnostic tail for game server log sources.
///
/// Prints the last N lines of each source, then optionally follows the
/// files the same way the daemon does: offset-tracked, rotation-aware,
/// one ordered stream per source.
#[derive(Parser, Debug)]
#[command(name = "scorewatch-tail", version, about, long_about = None)]
pub struct TailCli {
    /// Log file to tail. Repeat for multiple sources.
    #[arg(long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Number of backfill lines to print per source before following.
    #[arg(long = "lines", default_value_t = 10)]
    pub lines: usize,

    /// Keep following the files for new lines (like `tail -f`).
    #[arg(short = 'f', long = "follow")]
    pub follow: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_files() {
        let cli = TailCli::parse_from([
            "scorewatch-tail",
            "--file",
            "/var/log/game/arena1.log",
            "--file",
            "/var/log/game/arena2.log",
            "--lines",
            "25",
            "-f",
        ]);
        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.lines, 25);
        assert!(cli.follow);
    }

    #[test]
    fn lines_defaults_to_ten() {
        let cli = TailCli::parse_from(["scorewatch-tail", "--file", "a.log"]);
        assert_eq!(cli.lines, 10);
        assert!(!cli.follow);
    }

    #[test]
    fn at_least_one_file_is_required() {
        let result = TailCli::try_parse_from(["scorewatch-tail"]);
        assert!(result.is_err());
    }
}
