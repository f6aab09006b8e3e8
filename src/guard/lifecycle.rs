use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle of a case as driven by the statuses recorded on it.
///
/// ```text
/// new ──► in_progress ──► closed ◄──► reopened
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "reopened")]
    Reopened,
}

impl Lifecycle {
    /// State after recording a status. Whether the move out of `Closed` is
    /// allowed is decided by the guard, not here.
    pub fn next(self, is_final: bool) -> Self {
        match (self, is_final) {
            (_, true) => Self::Closed,
            (Self::Closed, false) => Self::Reopened,
            (_, false) => Self::InProgress,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "new" => Self::New,
            "in_progress" => Self::InProgress,
            "closed" => Self::Closed,
            "reopened" => Self::Reopened,
            _ => bail!("unknown case lifecycle '{s}'"),
        })
    }
}
