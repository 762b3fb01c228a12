//! Command line definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Send one message to many recipients through an external messaging channel
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Bulk message dispatcher", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (overrides HERALD_CONFIG and the default locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output and engine logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send the message to every valid recipient
    Send(SendArgs),
    /// Send the message to the first valid recipient only
    Test(SendArgs),
    /// Check recipients without sending anything
    Validate(RecipientArgs),
    /// Manage the saved draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Show statistics of recent runs
    History {
        /// Number of runs to show, newest last
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show recorded outcomes
    Log {
        /// Number of rows to show, newest last
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Only show rows of this run
        #[arg(long)]
        run: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DraftAction {
    /// Save a message and recipients for later
    Save {
        #[command(flatten)]
        message: MessageArgs,

        #[command(flatten)]
        recipients: RecipientArgs,
    },
    /// Print the saved draft
    Show,
}

#[derive(Args, Debug, Default)]
pub struct MessageArgs {
    /// Message text
    #[arg(short, long, conflicts_with = "message_file")]
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(long)]
    pub message_file: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct RecipientArgs {
    /// Comma separated phone numbers
    #[arg(short, long, conflicts_with = "import")]
    pub recipients: Option<String>,

    /// Import recipients from a .csv or .json file
    #[arg(short, long)]
    pub import: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {
    #[command(flatten)]
    pub message: MessageArgs,

    #[command(flatten)]
    pub recipients: RecipientArgs,

    /// Fill in whatever is not given on the command line from the saved draft
    #[arg(long)]
    pub from_draft: bool,

    /// Seconds to wait between recipients
    #[arg(long)]
    pub delay: Option<u64>,

    /// Send attempts per recipient
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Log what would be sent instead of sending
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_send() {
        let cli = Cli::try_parse_from([
            "herald",
            "send",
            "--message",
            "Hello",
            "--recipients",
            "9876543210, 9876543211",
            "--delay",
            "3",
            "--yes",
            "--dry-run",
        ])
        .expect("parse");

        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.message.message.as_deref(), Some("Hello"));
        assert_eq!(
            args.recipients.recipients.as_deref(),
            Some("9876543210, 9876543211")
        );
        assert_eq!(args.delay, Some(3));
        assert!(args.yes);
        assert!(args.dry_run);
    }

    #[test]
    fn rejects_conflicting_inputs() {
        assert!(
            Cli::try_parse_from([
                "herald",
                "validate",
                "--recipients",
                "1",
                "--import",
                "numbers.csv"
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["herald", "send", "--max-attempts", "0"]).is_err()
        );
    }
}
