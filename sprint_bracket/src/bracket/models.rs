//! Bracket groupings, event references and serializable bracket formats.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::competition::Competition;
use super::errors::ConfigError;
use super::event::Event;
use crate::config::BracketConfig;

/// Kind of competition, derived from the bracket definition.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionKind {
    Sprint,
    Keirin,
    /// Cross-country eliminator heats (MTB)
    Eliminator,
}

impl CompetitionKind {
    /// Eliminator when the name says `XCE` or any event produces `RR`
    /// round-out labels; Keirin when the name says so; sprint otherwise.
    pub fn detect<'a>(name: &str, events: impl IntoIterator<Item = &'a Event>) -> Self {
        let eliminator = name.contains("XCE")
            || events
                .into_iter()
                .any(|event| event.others().iter().any(|label| label.is_elimination()));
        if eliminator {
            CompetitionKind::Eliminator
        } else if name.to_lowercase().contains("keirin") || name.contains("Kerin") {
            CompetitionKind::Keirin
        } else {
            CompetitionKind::Sprint
        }
    }

    /// Sprint and Keirin share the winner-chain classification.
    pub fn is_sprint(self) -> bool {
        self != CompetitionKind::Eliminator
    }

    pub fn is_eliminator(self) -> bool {
        self == CompetitionKind::Eliminator
    }
}

impl fmt::Display for CompetitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompetitionKind::Sprint => write!(f, "sprint"),
            CompetitionKind::Keirin => write!(f, "keirin"),
            CompetitionKind::Eliminator => write!(f, "eliminator"),
        }
    }
}

/// Position of an event in the tournament → system → event tree.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EventRef {
    pub tournament: usize,
    pub system: usize,
    pub event: usize,
}

impl EventRef {
    pub const fn new(tournament: usize, system: usize, event: usize) -> Self {
        Self {
            tournament,
            system,
            event,
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.tournament, self.system, self.event)
    }
}

/// A round of events, such as "Quarterfinals".
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct System {
    pub name: String,
    pub events: Vec<Event>,
}

impl System {
    pub fn new(name: &str, events: Vec<Event>) -> Self {
        Self {
            name: name.to_string(),
            events,
        }
    }

    /// `None` as soon as one event has no estimate.
    pub fn competition_time(&self, kind: CompetitionKind, config: &BracketConfig) -> Option<f64> {
        self.events
            .iter()
            .map(|event| event.competition_time(kind, config))
            .sum()
    }
}

/// Ordered systems; a competition may hold parallel tournaments.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Tournament {
    #[serde(default)]
    pub name: String,
    pub systems: Vec<System>,
}

impl Tournament {
    pub fn new(name: &str, systems: Vec<System>) -> Self {
        Self {
            name: name.to_string(),
            systems,
        }
    }

    pub fn competition_time(&self, kind: CompetitionKind, config: &BracketConfig) -> Option<f64> {
        self.systems
            .iter()
            .map(|system| system.competition_time(kind, config))
            .sum()
    }
}

fn default_heats() -> u8 {
    1
}

/// Textual event definition, as found in bracket format files.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct EventFormat {
    pub rule: String,
    #[serde(default = "default_heats")]
    pub heats: u8,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SystemFormat {
    pub name: String,
    pub events: Vec<EventFormat>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct TournamentFormat {
    #[serde(default)]
    pub name: String,
    pub systems: Vec<SystemFormat>,
}

/// Serializable bracket definition.
///
/// ```
/// use sprint_bracket::CompetitionFormat;
///
/// let format: CompetitionFormat = serde_json::from_str(r#"{
///     "name": "Sprint 2",
///     "tournaments": [{ "systems": [
///         { "name": "Final", "events": [{ "rule": "N1 N2 -> 1R 2R", "heats": 3 }] }
///     ]}]
/// }"#).unwrap();
/// let competition = format.build().unwrap();
/// assert_eq!(competition.starters(), 2);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct CompetitionFormat {
    pub name: String,
    pub tournaments: Vec<TournamentFormat>,
}

impl CompetitionFormat {
    pub fn build(&self) -> Result<Competition, ConfigError> {
        self.build_with_config(BracketConfig::default())
    }

    /// Parse every rule and build a validated competition.
    pub fn build_with_config(&self, config: BracketConfig) -> Result<Competition, ConfigError> {
        let tournaments = self
            .tournaments
            .iter()
            .map(|tournament| {
                let systems = tournament
                    .systems
                    .iter()
                    .map(|system| {
                        let events = system
                            .events
                            .iter()
                            .map(|event| Event::new(&event.rule, event.heats))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(System::new(&system.name, events))
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(Tournament::new(&tournament.name, systems))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Competition::with_config(&self.name, tournaments, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        let sprint = [Event::new("N1 N2 -> 1R 2R", 3).unwrap()];
        let eliminator = [Event::new("N1 N2 N3 N4 -> Q1 Q2 A1RR3 A1RR4", 1).unwrap()];

        assert_eq!(
            CompetitionKind::detect("Sprint 8", &sprint),
            CompetitionKind::Sprint
        );
        assert_eq!(
            CompetitionKind::detect("Keirin 6", &sprint),
            CompetitionKind::Keirin
        );
        assert_eq!(
            CompetitionKind::detect("Kerin", &sprint),
            CompetitionKind::Keirin
        );
        assert_eq!(
            CompetitionKind::detect("XCE 16", &sprint),
            CompetitionKind::Eliminator
        );
        assert_eq!(
            CompetitionKind::detect("Heats", &eliminator),
            CompetitionKind::Eliminator
        );
        assert!(CompetitionKind::Keirin.is_sprint());
        assert!(!CompetitionKind::Eliminator.is_sprint());
    }

    #[test]
    fn test_system_time_sums() {
        let config = BracketConfig::default();
        let system = System::new(
            "Final",
            vec![
                Event::new("S1L S2L -> 3R 4R", 1).unwrap(),
                Event::new("S1 S2 -> 1R 2R", 3).unwrap(),
            ],
        );
        assert_eq!(
            system.competition_time(CompetitionKind::Sprint, &config),
            Some(450.0)
        );
        assert_eq!(
            system.competition_time(CompetitionKind::Eliminator, &config),
            None
        );

        let tournament = Tournament::new("", vec![system.clone(), system]);
        assert_eq!(
            tournament.competition_time(CompetitionKind::Keirin, &config),
            Some(1200.0)
        );
    }

    #[test]
    fn test_format_rejects_bad_rule() {
        let format = CompetitionFormat {
            name: "Broken".to_string(),
            tournaments: vec![TournamentFormat {
                name: String::new(),
                systems: vec![SystemFormat {
                    name: "Final".to_string(),
                    events: vec![EventFormat {
                        rule: "N1 N2 1R".to_string(),
                        heats: 1,
                    }],
                }],
            }],
        };
        assert!(matches!(
            format.build(),
            Err(ConfigError::MalformedRule { .. })
        ));
    }

    #[test]
    fn test_event_ref_display() {
        assert_eq!(EventRef::new(0, 2, 1).to_string(), "0.2.1");
    }
}
