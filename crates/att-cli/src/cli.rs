//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// OTP-verified attendance tracker.
///
/// People submit the current six-digit code to record their arrival and
/// departure. Administrators read daily summaries and export date ranges.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a code to record the next arrival or departure.
    Mark {
        /// Numeric user id of the submitter.
        #[arg(long)]
        user: i64,

        /// Given name of the submitter.
        #[arg(long)]
        first_name: String,

        /// Family name of the submitter.
        #[arg(long)]
        last_name: Option<String>,

        /// Handle of the submitter (defaults to `user_<id>`).
        #[arg(long)]
        username: Option<String>,

        /// The six-digit code.
        code: String,
    },

    /// Show today's attendance for one user.
    Status {
        #[arg(long)]
        user: i64,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarize everyone's attendance on one date.
    Report {
        /// Date to report (YYYY-MM-DD, defaults to today).
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one user's recent attendance, newest day first.
    History {
        #[arg(long)]
        user: i64,

        /// Number of days to look back.
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export all events in a date range as CSV.
    Export {
        /// First date (YYYY-MM-DD, inclusive).
        start: String,

        /// Last date (YYYY-MM-DD, inclusive).
        end: String,

        /// Output file (defaults to the configured export directory).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Admin password, required when one is configured.
        #[arg(long)]
        password: Option<String>,
    },

    /// Set the display name used for a user in reports.
    Alias {
        #[arg(long)]
        user: i64,

        /// Given name.
        first: String,

        /// Family name (may be several words).
        last: Vec<String>,
    },

    /// Manage the shared code secret.
    #[command(subcommand)]
    Totp(TotpAction),

    /// Write a starter config file with a fresh secret.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

/// Secret management actions.
#[derive(Debug, Subcommand)]
pub enum TotpAction {
    /// Generate a new secret and print its provisioning URI.
    New {
        /// Issuer shown in authenticator apps.
        #[arg(long, default_value = "Attendance Bot")]
        issuer: String,

        /// Account label shown in authenticator apps.
        #[arg(long, default_value = "attendance")]
        account: String,
    },

    /// Print the current code for the configured secret.
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn alias_collects_multi_word_last_name() {
        let cli = Cli::parse_from(["att", "alias", "--user", "7", "Siti", "Nur", "Aminah"]);
        let Some(Commands::Alias { user, first, last }) = cli.command else {
            panic!("expected alias command");
        };
        assert_eq!(user, 7);
        assert_eq!(first, "Siti");
        assert_eq!(last, vec!["Nur", "Aminah"]);
    }

    #[test]
    fn history_defaults_to_thirty_days() {
        let cli = Cli::parse_from(["att", "history", "--user", "42"]);
        assert!(matches!(
            cli.command,
            Some(Commands::History { days: 30, .. })
        ));
    }
}
