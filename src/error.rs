//! Error classification shared by every component.
//!
//! Each module keeps its own `thiserror` enum; `kind()` on those enums maps a concrete failure
//! onto one of these categories so the request layer can pick a status without inspecting
//! message text.

use std::fmt;

/// Coarse category of a failure, independent of the component that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Object, index, or registry entry is absent.
    NotFound,
    /// Content-hash precondition rejected an update or delete.
    Conflict,
    /// Remote backend failed or answered with an unexpected status.
    Transport,
    /// Required credential or setting is missing or malformed.
    Configuration,
    /// Caller supplied something unusable (bad filename, unreadable PDF).
    InvalidInput,
    /// Local failure while reading or writing derived state.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transport => "transport",
            Self::Configuration => "configuration",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        };
        f.write_str(label)
    }
}
