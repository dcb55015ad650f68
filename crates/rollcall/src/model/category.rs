//! Membership categories.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the fixed membership tags used to group members for reporting.
///
/// The sheet's status column holds the short [`code`](Category::code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Long-standing members.
    #[serde(rename = "OM")]
    OldMember,
    /// Extended leadership team.
    #[serde(rename = "XT")]
    ExtendedTeam,
    /// Members coming back after a long absence.
    #[serde(rename = "RN")]
    Returning,
    /// Attending for the first weeks.
    #[serde(rename = "FT")]
    FirstTimer,
    /// Guests who are not (yet) members.
    #[serde(rename = "VS")]
    Visitor,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Self; 5] = [
        Self::OldMember,
        Self::ExtendedTeam,
        Self::Returning,
        Self::FirstTimer,
        Self::Visitor,
    ];

    /// Short code stored in the sheet's status column.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::OldMember => "OM",
            Self::ExtendedTeam => "XT",
            Self::Returning => "RN",
            Self::FirstTimer => "FT",
            Self::Visitor => "VS",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OldMember => "Old Member",
            Self::ExtendedTeam => "Extended Team",
            Self::Returning => "Returning",
            Self::FirstTimer => "First Timer",
            Self::Visitor => "Visitor",
        }
    }

    /// Match a status cell against the known codes, ignoring case and
    /// surrounding whitespace. Unknown codes yield `None`; there is no fallback.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.code().eq_ignore_ascii_case(code))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|c| c.code()).collect();
            Error::invalid_input(format!(
                "unknown category '{s}' (expected one of {})",
                known.join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_case_insensitive() {
        assert_eq!(Category::from_code("OM"), Some(Category::OldMember));
        assert_eq!(Category::from_code("om"), Some(Category::OldMember));
        assert_eq!(Category::from_code(" xt "), Some(Category::ExtendedTeam));
        assert_eq!(Category::from_code("Vs"), Some(Category::Visitor));
    }

    #[test]
    fn test_unknown_code_has_no_default() {
        assert_eq!(Category::from_code(""), None);
        assert_eq!(Category::from_code("Old Member"), None);
        assert_eq!(Category::from_code("ZZ"), None);
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in Category::ALL.iter().enumerate() {
            for b in &Category::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_from_str_error_lists_codes() {
        let err = "nope".parse::<Category>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("OM"));
        assert!(msg.contains("VS"));
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(Category::FirstTimer.to_string(), "First Timer");
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Category::Returning).unwrap();
        assert_eq!(json, "\"RN\"");
        let parsed: Category = serde_json::from_str("\"XT\"").unwrap();
        assert_eq!(parsed, Category::ExtendedTeam);
    }
}
