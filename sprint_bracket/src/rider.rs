//! Competitor records.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Race number worn by a rider. Unique within a competition.
pub type Bib = u32;

/// Qualifying time of a rider who has not set one. Every real time sorts ahead of it.
pub const QUALIFYING_TIME_DEFAULT: f64 = 99.0 * 60.0 * 60.0;

/// Qualifying time used when ranking a bye against real riders.
pub const OPEN_QUALIFYING_TIME: f64 = QUALIFYING_TIME_DEFAULT + 1.0;

fn default_qualifying_time() -> f64 {
    QUALIFYING_TIME_DEFAULT
}

/// Handle to a rider in the competition roster.
///
/// Handles stay valid for the life of the competition since riders are never
/// removed once registered, and survive bib renumbering.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RiderId(pub usize);

impl fmt::Display for RiderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rider #{}", self.0)
    }
}

/// Outcome of qualifying
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum QualifyingStatus {
    #[default]
    Normal,
    /// Did not qualify; never seeded into the bracket
    Dnq,
}

impl fmt::Display for QualifyingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualifyingStatus::Normal => write!(f, ""),
            QualifyingStatus::Dnq => write!(f, "DNQ"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Rider {
    pub bib: Bib,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub team_code: String,
    #[serde(default)]
    pub license: String,
    /// Seconds
    #[serde(default = "default_qualifying_time")]
    pub qualifying_time: f64,
    /// Roster position, used to break qualifying-time ties
    #[serde(default)]
    pub seeding: usize,
    #[serde(default)]
    pub status: QualifyingStatus,
}

impl Rider {
    pub fn new(bib: Bib) -> Self {
        Self {
            bib,
            first_name: String::new(),
            last_name: String::new(),
            team: String::new(),
            team_code: String::new(),
            license: String::new(),
            qualifying_time: QUALIFYING_TIME_DEFAULT,
            seeding: 0,
            status: QualifyingStatus::Normal,
        }
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    pub fn with_team(mut self, team: &str) -> Self {
        self.team = team.to_string();
        self
    }

    pub fn with_qualifying_time(mut self, seconds: f64) -> Self {
        self.qualifying_time = seconds.min(QUALIFYING_TIME_DEFAULT);
        self
    }

    pub fn has_qualifying_time(&self) -> bool {
        self.qualifying_time < QUALIFYING_TIME_DEFAULT
    }

    /// Qualifying order: status first (DNQ last), then time, then seeding.
    pub fn cmp_qualifying(&self, other: &Self) -> Ordering {
        self.status
            .cmp(&other.status)
            .then(self.qualifying_time.total_cmp(&other.qualifying_time))
            .then(self.seeding.cmp(&other.seeding))
    }

    /// Empty when no time has been set.
    pub fn qualifying_time_text(&self) -> String {
        if self.has_qualifying_time() {
            format_seconds(self.qualifying_time)
        } else {
            String::new()
        }
    }

    /// "LAST, First"
    pub fn full_name(&self) -> String {
        let last = self.last_name.to_uppercase();
        [last.as_str(), self.first_name.as_str()]
            .into_iter()
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn bib_full_name(&self) -> String {
        if self.bib > 0 {
            format!("({}) {}", self.bib, self.full_name())
        } else {
            self.full_name()
        }
    }

    /// "LAST, F."
    pub fn short_name(&self) -> String {
        match self.first_name.chars().next() {
            Some(initial) if !self.last_name.is_empty() => {
                format!("{}, {}.", self.last_name.to_uppercase(), initial)
            }
            _ if !self.last_name.is_empty() => self.last_name.to_uppercase(),
            _ => self.first_name.clone(),
        }
    }

    pub fn bib_short_name(&self) -> String {
        format!("{} {}", self.bib, self.short_name())
    }

    /// Full name followed by the team in parentheses.
    pub fn long_name(&self) -> String {
        if self.team.is_empty() {
            self.full_name()
        } else {
            format!("{} ({})", self.full_name(), self.team)
        }
    }
}

/// Formats seconds as `h:mm:ss.mmm`, dropping leading zero fields.
pub fn format_seconds(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let secs = (millis / 1000) % 60;
    let ms = millis % 1000;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{ms:03}")
    } else if minutes > 0 {
        format!("{minutes}:{secs:02}.{ms:03}")
    } else {
        format!("{secs}.{ms:03}")
    }
}
