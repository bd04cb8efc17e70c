//! Bracket engine: events, heats and label propagation.
//!
//! A competition is a tree of tournaments, systems and events. Events read
//! their entrants through symbolic labels and publish their finish order
//! through output labels, which later events consume.

pub mod competition;
pub mod errors;
pub mod event;
pub(crate) mod heat;
pub mod models;
pub mod rule;
pub mod start;

pub use competition::Competition;
pub use errors::{BracketError, BracketResult, ConfigError, EntryError};
pub use event::{Event, FinishEntry, FinishPlace, MAX_HEATS};
pub use models::{CompetitionFormat, CompetitionKind, EventRef, System, Tournament};
pub use rule::EventRule;
pub use start::{PlaceEntry, Roster, Start};
