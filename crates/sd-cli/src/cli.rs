//! CLI argument parsing.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use sd_ldap::Listing;
use sd_model::UserState;

use crate::config::OutputFormat;

/// sdctl - Administration tool for the staff directory.
#[derive(Debug, Parser)]
#[command(name = "sdctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (overrides the default location).
    #[arg(short, long, env = "SDCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// User management commands.
    #[command(subcommand)]
    User(UserCommand),

    /// Group management commands.
    #[command(subcommand)]
    Group(GroupCommand),

    /// Maintenance reports.
    #[command(subcommand)]
    Report(ReportCommand),

    /// Distinct values used across all users.
    Listing {
        /// Which attribute to list.
        #[arg(value_enum)]
        kind: ListingKind,
    },

    /// Directory connection check.
    Status,
}

/// User commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Show a single user.
    Show {
        /// Login name.
        uid: String,
    },

    /// Search users.
    Search {
        /// Free-text term matched against names, uid and mail.
        term: Option<String>,

        /// Restrict to one company.
        #[arg(long)]
        company: Option<String>,

        /// Restrict to an account state.
        #[arg(long, value_enum)]
        state: Option<StateArg>,

        /// Restrict to an employment type.
        #[arg(long)]
        employee_type: Option<String>,
    },

    /// Suggest free usernames for a name.
    Suggest {
        /// Given name.
        given_name: String,
        /// Family name.
        sn: String,
    },

    /// Activate an account.
    Activate {
        /// Login name.
        uid: String,
    },

    /// Deactivate an account.
    Deactivate {
        /// Login name.
        uid: String,
        /// Skip confirmation.
        #[arg(short, long)]
        force: bool,
    },

    /// Reset a password to a random value and print it.
    ResetPassword {
        /// Login name.
        uid: String,
        /// Skip confirmation.
        #[arg(short, long)]
        force: bool,
    },

    /// List the groups of a user.
    Groups {
        /// Login name.
        uid: String,
    },
}

/// Group commands.
#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// List all groups.
    List,

    /// Show a single group.
    Show {
        /// Group name.
        cn: String,
    },

    /// List the members of a group.
    Members {
        /// Group name.
        cn: String,
    },

    /// List the administrators of a group.
    Admins {
        /// Group name.
        cn: String,
    },

    /// Add a user to a group.
    AddMember {
        /// Group name.
        cn: String,
        /// Login name.
        uid: String,
    },

    /// Remove a user from a group.
    RemoveMember {
        /// Group name.
        cn: String,
        /// Login name.
        uid: String,
    },
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Accounts that need maintenance.
    Unmaintained {
        /// Look-ahead window in weeks (overrides config).
        #[arg(short, long)]
        weeks: Option<u64>,

        /// Reference date (defaults to today).
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Mail the report to the configured recipients.
        #[arg(long)]
        notify: bool,

        /// Also mail each user leaving within the notice period.
        #[arg(long)]
        notify_users: bool,
    },
}

/// Account state argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    /// Enabled accounts.
    Active,
    /// Disabled accounts.
    Inactive,
}

impl From<StateArg> for UserState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Active => Self::Active,
            StateArg::Inactive => Self::Inactive,
        }
    }
}

/// Listing argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListingKind {
    /// Employment types.
    Types,
    /// Office locations.
    Locations,
    /// Departments.
    Departments,
}

impl From<ListingKind> for Listing {
    fn from(kind: ListingKind) -> Self {
        match kind {
            ListingKind::Types => Self::EmployeeTypes,
            ListingKind::Locations => Self::Locations,
            ListingKind::Departments => Self::Departments,
        }
    }
}
