//! # Sprint Bracket
//!
//! Progression engine for cycling elimination brackets: track sprint, Keirin
//! and cross-country eliminator (XCE) competitions.
//!
//! A bracket is written as a list of event rules such as `N1 N4 -> Q1 Q1L`.
//! The left side lists the entrant labels, the right side the labels the
//! event publishes once it is decided. Seed labels `N1..Nk` are bound from
//! qualifying times; `{k}R` labels hold the final ranking.
//!
//! ## Lifecycle
//!
//! - **Seed**: bind `N1..Nk` to riders by qualifying time, byes after that
//! - **Advance**: create the next heat of an event with its lane order
//! - **Record**: enter places, statuses, warnings and relegations
//! - **Propagate**: bind output labels of every decided event, repeatedly,
//!   until nothing changes
//! - **Classify**: derive the final ranking from the bound labels
//!
//! Labels are single-assignment: once an output is bound it never changes.
//!
//! ## Core Modules
//!
//! - [`bracket`]: competition tree, events, starts and propagation
//! - [`labels`]: the label registry and non-continuing reasons
//! - [`results`]: final classification
//! - [`snapshot`]: JSON and binary persistence
//!
//! ## Example
//!
//! ```
//! use sprint_bracket::{CompetitionFormat, EventRef, LaneRandomizer, PlaceEntry, Rider};
//!
//! let format: CompetitionFormat = serde_json::from_str(r#"{
//!     "name": "Sprint 2",
//!     "tournaments": [{ "systems": [
//!         { "name": "Final", "events": [{ "rule": "N1 N2 -> 1R 2R" }] }
//!     ]}]
//! }"#).unwrap();
//!
//! let mut competition = format.build().unwrap();
//! competition.add_rider(Rider::new(1).with_qualifying_time(10.2)).unwrap();
//! competition.add_rider(Rider::new(2).with_qualifying_time(10.4)).unwrap();
//! competition.seed_qualifying_times(&[]).unwrap();
//!
//! let at = EventRef::new(0, 0, 0);
//! let mut randomizer = LaneRandomizer::seeded(7);
//! let start = competition.advance_heat(at, &mut randomizer).unwrap().unwrap();
//! competition
//!     .record_heat_places(at, start, &[PlaceEntry::finisher(2), PlaceEntry::finisher(1)])
//!     .unwrap();
//! competition.propagate().unwrap();
//!
//! let winner = competition.results().ranked().next().unwrap().1;
//! assert_eq!(competition.rider(winner).unwrap().bib, 2);
//! ```

/// Competition tree, events, starts and label propagation.
pub mod bracket;
pub use bracket::{
    BracketError, BracketResult, Competition, CompetitionFormat, CompetitionKind, ConfigError,
    EntryError, Event, EventRef, EventRule, PlaceEntry, Roster, Start,
};

/// Engine tuning knobs.
pub mod config;
pub use config::BracketConfig;

/// Lane draws.
pub mod draw;
pub use draw::LaneRandomizer;

pub mod labels;
pub use labels::{Binding, Label, LabelState, NonContinuing};

/// Final classification.
pub mod results;
pub use results::{Classification, ClassificationRow, Placing};

pub mod rider;
pub use rider::{Bib, QualifyingStatus, Rider, RiderId};

/// Saving and restoring competitions.
pub mod snapshot;
pub use snapshot::{SnapshotError, SnapshotResult};
