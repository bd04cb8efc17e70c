//! Error types for bracket definitions and edits.

use thiserror::Error;

use super::models::EventRef;
use crate::labels::{Binding, Label};
use crate::rider::Bib;

/// Result type for competition operations
pub type BracketResult<T> = Result<T, BracketError>;

/// Broken bracket definitions.
///
/// These are raised while a competition is built or loaded and are not
/// recoverable: the definition has to be fixed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Rule string does not follow `<label>+ -> <label> <label>*`
    #[error("Malformed rule \"{rule}\": {reason}")]
    MalformedRule { rule: String, reason: String },

    /// Heat count outside 1..=3
    #[error("Event \"{rule}\" asks for {heats} heats, expected 1 to 3")]
    InvalidHeatCount { rule: String, heats: u8 },

    /// A Start was requested beyond the third heat
    #[error("Cannot run heat {0}: an event has at most 3 heats")]
    TooManyHeats(u8),

    /// Two events produce the same label
    #[error("Output label {label} of \"{rule}\" is already produced by another event")]
    DuplicateOutputLabel { label: Label, rule: String },

    /// Two events consume the same label
    #[error("Composition label {label} of \"{rule}\" is already consumed by another event")]
    DuplicateInputLabel { label: Label, rule: String },

    /// More labels produced than consumed so far in bracket order
    #[error("Event \"{rule}\" brings the bracket to {outputs} output labels for {inputs} input labels")]
    OutputsExceedInputs {
        rule: String,
        outputs: usize,
        inputs: usize,
    },

    /// Engine configuration value out of range
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Edits rejected at the boundary. The competition is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("Bib {0} does not match any eligible rider")]
    UnknownBib(Bib),

    #[error("Bib {0} appears more than once in the submission")]
    DuplicateBib(Bib),

    #[error("Bib {0} is already registered")]
    BibTaken(Bib),

    #[error("Unknown status code \"{0}\"")]
    UnknownStatus(String),

    #[error("Place {place} is outside 1..={max}")]
    InvalidPlace { place: u32, max: usize },

    #[error("No event at {0}")]
    UnknownEvent(EventRef),

    #[error("Event {event} has no start {start}")]
    UnknownStart { event: EventRef, start: usize },
}

/// Errors returned by the competition mutation entry points
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BracketError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Entry(#[from] EntryError),

    /// A label is single-assignment; this is a programming error.
    #[error("Label {label} is bound to {bound}, cannot rebind it to {attempted}")]
    LabelRebound {
        label: Label,
        bound: Binding,
        attempted: Binding,
    },

    #[error("Starters cannot be reassigned once events have produced results")]
    StartersLocked,
}

impl BracketError {
    /// True for errors caused by user input rather than a broken bracket.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Entry(_) | Self::StartersLocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_error_wraps_into_bracket_error() {
        let err: BracketError = EntryError::UnknownBib(42).into();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_rebound_is_not_recoverable() {
        let err = BracketError::LabelRebound {
            label: Label::new("1R"),
            bound: Binding::Bye,
            attempted: Binding::Bye,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("1R"));
    }
}
