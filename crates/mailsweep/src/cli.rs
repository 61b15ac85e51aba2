//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Delete mail from chosen senders in an Outlook mailbox.
#[derive(Debug, Parser)]
#[command(name = "mailsweep", version, about)]
pub struct Args {
    /// Configuration file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// List matches without deleting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore cached tokens and sign in again.
    #[arg(long)]
    pub force_login: bool,

    /// More logging; repeat for wire-level detail.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["mailsweep"]);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(!args.dry_run);
        assert!(!args.force_login);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "mailsweep",
            "--config",
            "other.json",
            "--dry-run",
            "--force-login",
            "-vv",
        ]);
        assert_eq!(args.config, PathBuf::from("other.json"));
        assert!(args.dry_run);
        assert!(args.force_login);
        assert_eq!(args.verbose, 2);
    }
}
