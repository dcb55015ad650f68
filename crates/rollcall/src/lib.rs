//! `rollcall` - Weekly meeting attendance backed by a spreadsheet
//!
//! This library keeps a member directory and per-date attendance records in
//! step with a tabular sheet, computes attendance statistics and streaks, and
//! holds the presentation state for marking who was present.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dates;
pub mod error;
pub mod logging;
pub mod model;
pub mod repository;
pub mod settings;
pub mod sheet;
pub mod stats;
pub mod storage;

pub use config::Config;
pub use coordinator::{AttendanceCoordinator, MessageKind, SelectionSeed, UiMessage, ViewSnapshot};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{AttendanceRecord, Category, Member};
pub use repository::{AttendanceRepository, LoadReport, ReportedError, RosterSnapshot};
pub use settings::{MemorySettings, SettingsStore};
pub use sheet::{MemorySheet, SqliteSheet, TabularSource};
pub use stats::{MemberSortOrder, StatisticsPolicy, StatisticsReport, StatisticsService};
pub use storage::Storage;
