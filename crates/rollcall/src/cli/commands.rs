//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::Category;
use crate::stats::MemberSortOrder;

/// Member directory commands.
#[derive(Debug, Subcommand)]
pub enum MembersCommand {
    /// List members in sheet order
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a member at the end of the sheet
    Add {
        /// Member name
        name: String,

        /// Membership category
        #[arg(long, value_enum, default_value = "first-timer")]
        category: CategoryArg,
    },

    /// Rename a member or change their category
    Rename {
        /// Member id
        id: String,

        /// New name
        name: String,

        /// New category (unchanged when omitted)
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// Remove a member; rows below move up
    Remove {
        /// Member id
        id: String,
    },
}

/// Mark command arguments.
#[derive(Debug, Args)]
pub struct MarkCommand {
    /// Meeting date (defaults to the upcoming meeting day)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Start from the saved or previous-week selection instead of nobody
    #[arg(short, long)]
    pub keep: bool,

    /// Ids of members who were present
    pub ids: Vec<String>,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Meeting date (defaults to the upcoming meeting day)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Statistics commands.
#[derive(Debug, Subcommand)]
pub enum StatsCommand {
    /// Totals across all meetings
    Overall {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Per-member attendance and streaks
    Members {
        /// Sort order; remembered for next time
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Per-category attendance
    Categories {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Attendance trend over recent meetings
    Trend {
        /// Number of recent meetings (overrides the configured window)
        #[arg(short, long)]
        window: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Category argument, accepted by name or by sheet code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// Old member (OM)
    #[value(alias = "om")]
    OldMember,
    /// Extended team (XT)
    #[value(alias = "xt")]
    ExtendedTeam,
    /// Returning (RN)
    #[value(alias = "rn")]
    Returning,
    /// First timer (FT)
    #[value(alias = "ft")]
    FirstTimer,
    /// Visitor (VS)
    #[value(alias = "vs")]
    Visitor,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::OldMember => Self::OldMember,
            CategoryArg::ExtendedTeam => Self::ExtendedTeam,
            CategoryArg::Returning => Self::Returning,
            CategoryArg::FirstTimer => Self::FirstTimer,
            CategoryArg::Visitor => Self::Visitor,
        }
    }
}

/// Sort order argument for member statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Alphabetical
    Name,
    /// Best attendance first
    AttendanceDesc,
    /// Worst attendance first
    AttendanceAsc,
    /// Longest current streak first
    CurrentStreak,
    /// Longest ever streak first
    LongestStreak,
    /// By category
    Category,
}

impl From<SortArg> for MemberSortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => Self::Name,
            SortArg::AttendanceDesc => Self::AttendanceDesc,
            SortArg::AttendanceAsc => Self::AttendanceAsc,
            SortArg::CurrentStreak => Self::CurrentStreak,
            SortArg::LongestStreak => Self::LongestStreak,
            SortArg::Category => Self::Category,
        }
    }
}
