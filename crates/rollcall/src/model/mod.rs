//! Core data types: members, per-date attendance records and categories.

mod category;
mod member;
mod record;

pub use category::Category;
pub use member::Member;
pub use record::AttendanceRecord;
