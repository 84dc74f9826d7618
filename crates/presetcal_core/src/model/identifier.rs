//! Event identifier codec.
//!
//! # Responsibility
//! - Decide which strings may be stored as a preset's backend identifier.
//!
//! # Invariants
//! - Accepted shape is `8-4-4-4-12:8-4-4-4-12` (two calendar-style UUID
//!   strings joined by `:`).
//! - Validation is structural only: character counts per group, no hex or
//!   version checks.
//! - No backend type is referenced here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Separator between the two halves of a composite identifier.
pub const IDENTIFIER_SEGMENT_SEPARATOR: char = ':';
/// Separator between groups inside one half.
pub const IDENTIFIER_GROUP_SEPARATOR: char = '-';
/// Required character count of each group, in order.
pub const IDENTIFIER_GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

static EVENT_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    let half = IDENTIFIER_GROUP_LENGTHS
        .iter()
        .map(|len| format!("[^:-]{{{len}}}"))
        .collect::<Vec<_>>()
        .join("-");
    Regex::new(&format!("^{half}:{half}$")).expect("valid event identifier regex")
});

/// Identifier codec rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Candidate does not match the composite identifier grammar.
    Malformed(String),
}

impl Display for IdentifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed event identifier: `{value}`"),
        }
    }
}

impl Error for IdentifierError {}

/// Validates one candidate backend identifier.
///
/// # Errors
/// - `IdentifierError::Malformed` when the candidate does not split into two
///   non-empty halves of five groups with lengths 8-4-4-4-12.
pub fn validate_event_identifier(candidate: &str) -> Result<(), IdentifierError> {
    if EVENT_IDENTIFIER_RE.is_match(candidate) {
        Ok(())
    } else {
        Err(IdentifierError::Malformed(candidate.to_string()))
    }
}
