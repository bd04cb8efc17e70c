//! Parser for the textual event rule `<label>+ -> <label> <label>*`.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::errors::ConfigError;
use crate::labels::Label;

const ARROW: &str = "->";

/// Typed form of an event rule such as `N1 N4 -> Q1 Q1L`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventRule {
    composition: Vec<Label>,
    winner: Label,
    others: Vec<Label>,
}

impl EventRule {
    /// Input labels, in lane order of the rule.
    pub fn composition(&self) -> &[Label] {
        &self.composition
    }

    pub fn winner(&self) -> &Label {
        &self.winner
    }

    pub fn others(&self) -> &[Label] {
        &self.others
    }

    /// Winner followed by the other output labels.
    pub fn outputs(&self) -> impl Iterator<Item = &Label> {
        std::iter::once(&self.winner).chain(self.others.iter())
    }

    pub fn output_count(&self) -> usize {
        1 + self.others.len()
    }
}

impl FromStr for EventRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ConfigError::MalformedRule {
            rule: s.to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = s.split_whitespace().collect();
        let arrow = tokens
            .iter()
            .position(|t| *t == ARROW)
            .ok_or_else(|| malformed("missing \"->\""))?;
        if tokens[arrow + 1..].contains(&ARROW) {
            return Err(malformed("more than one \"->\""));
        }

        let composition: Vec<Label> = tokens[..arrow].iter().map(|t| Label::new(*t)).collect();
        if composition.is_empty() {
            return Err(malformed("empty composition"));
        }

        let mut outputs = tokens[arrow + 1..].iter().map(|t| Label::new(*t));
        let winner = outputs.next().ok_or_else(|| malformed("missing winner label"))?;

        Ok(Self {
            composition,
            winner,
            others: outputs.collect(),
        })
    }
}

impl TryFrom<String> for EventRule {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventRule> for String {
    fn from(value: EventRule) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EventRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.composition {
            write!(f, "{label} ")?;
        }
        write!(f, "{ARROW}")?;
        for label in self.outputs() {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}
