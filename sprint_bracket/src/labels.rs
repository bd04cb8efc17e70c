//! Bracket labels and the registry that binds them to riders.
//!
//! Labels are the edges of the bracket graph. Seed labels (`N1`, `N2`, ...)
//! are bound when qualifying times are seeded; every other label is bound
//! exactly once by the event that produces it.

use log::info;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    collections::BTreeMap,
    fmt,
    str::FromStr,
};

use crate::bracket::errors::{BracketError, BracketResult, EntryError};
use crate::rider::{QualifyingStatus, Rider, RiderId};

/// Symbolic slot in the bracket, such as `N3`, `1R` or `A1RR3`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Qualifying seed slot `N{k}`
    pub fn seed(k: usize) -> Self {
        Self(format!("N{k}"))
    }

    /// Final classification slot `{k}R`
    pub fn winner_chain(k: usize) -> Self {
        Self(format!("{k}R"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_seed(&self) -> bool {
        self.0.starts_with('N')
    }

    /// Rank `k` of a `{k}R` label.
    pub fn winner_chain_rank(&self) -> Option<usize> {
        let digits = self.0.strip_suffix('R')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Riders eliminated into a time-trial ranking (`{k}TT`).
    pub fn is_time_trial(&self) -> bool {
        self.0.ends_with("TT")
    }

    /// Eliminator round-out labels carry `RR`.
    pub fn is_elimination(&self) -> bool {
        self.0.contains("RR")
    }

    /// Round number written immediately before `RR`, as in `A2RR3`.
    pub fn elimination_round(&self) -> Option<u32> {
        let head = &self.0[..self.0.find("RR")?];
        let digits = head.len() - head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        head[head.len() - digits..].parse().ok()
    }

    /// Trailing number of the label, as in `A2RR3` → 3.
    pub fn trailing_number(&self) -> Option<usize> {
        let digits = self.0.len() - self.0.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        self.0[self.0.len() - digits..].parse().ok()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Label {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What a bound label refers to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Binding {
    Rider(RiderId),
    /// No entrant in this slot
    Bye,
}

impl Binding {
    pub fn rider(self) -> Option<RiderId> {
        match self {
            Binding::Rider(id) => Some(id),
            Binding::Bye => None,
        }
    }

    pub fn is_bye(self) -> bool {
        self == Binding::Bye
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Rider(id) => write!(f, "{id}"),
            Binding::Bye => write!(f, "bye"),
        }
    }
}

/// Result of looking a label up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    Rider(RiderId),
    Bye,
    Unbound,
}

impl From<Option<Binding>> for Resolution {
    fn from(value: Option<Binding>) -> Self {
        match value {
            Some(Binding::Rider(id)) => Resolution::Rider(id),
            Some(Binding::Bye) => Resolution::Bye,
            None => Resolution::Unbound,
        }
    }
}

/// Heat status codes, in increasing severity.
///
/// `Inside` only asks the rider to take the inside lane on the next start;
/// the others take the rider out of the competition.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum NonContinuing {
    Inside,
    Dnf,
    Dns,
    Dq,
}

impl NonContinuing {
    pub fn severity(self) -> u8 {
        match self {
            NonContinuing::Inside => 1,
            NonContinuing::Dnf => 2,
            NonContinuing::Dns => 3,
            NonContinuing::Dq => 4,
        }
    }

    /// DNF, DNS and DQ end a rider's competition.
    pub fn ends_competition(self) -> bool {
        self >= NonContinuing::Dnf
    }

    pub fn code(self) -> &'static str {
        match self {
            NonContinuing::Inside => "Inside",
            NonContinuing::Dnf => "DNF",
            NonContinuing::Dns => "DNS",
            NonContinuing::Dq => "DQ",
        }
    }

    /// Empty text means a plain finisher.
    pub fn parse_optional(text: &str) -> Result<Option<Self>, EntryError> {
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            text.parse().map(Some)
        }
    }
}

/// Severity of an optional status; finishers are 0.
pub fn severity(status: Option<NonContinuing>) -> u8 {
    status.map_or(0, NonContinuing::severity)
}

impl fmt::Display for NonContinuing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for NonContinuing {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            NonContinuing::Inside,
            NonContinuing::Dnf,
            NonContinuing::Dns,
            NonContinuing::Dq,
        ]
        .into_iter()
        .find(|status| status.code().eq_ignore_ascii_case(s))
        .ok_or_else(|| EntryError::UnknownStatus(s.to_string()))
    }
}

/// Label → entrant registry plus the non-continuing status of labels.
///
/// Owned by the competition and passed explicitly to events and starts.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LabelState {
    labels: BTreeMap<Label, Binding>,
    non_continuing: BTreeMap<Label, NonContinuing>,
}

impl LabelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a label once.
    ///
    /// Returns `Ok(true)` when the label was unbound, `Ok(false)` when it was
    /// already bound to the same entrant. Rebinding to a different entrant
    /// fails.
    pub fn bind(&mut self, label: Label, binding: Binding) -> BracketResult<bool> {
        self.can_bind(&label, binding)?;
        if self.labels.contains_key(&label) {
            return Ok(false);
        }
        self.labels.insert(label, binding);
        Ok(true)
    }

    /// Fails exactly when [`LabelState::bind`] would, without binding.
    pub fn can_bind(&self, label: &Label, binding: Binding) -> BracketResult<()> {
        match self.labels.get(label) {
            Some(existing) if *existing != binding => Err(BracketError::LabelRebound {
                label: label.clone(),
                bound: *existing,
                attempted: binding,
            }),
            _ => Ok(()),
        }
    }

    pub fn resolve(&self, label: &str) -> Resolution {
        self.binding(label).into()
    }

    pub fn binding(&self, label: &str) -> Option<Binding> {
        self.labels.get(label).copied()
    }

    pub fn rider(&self, label: &str) -> Option<RiderId> {
        self.binding(label).and_then(Binding::rider)
    }

    pub fn is_bound(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Bound to a rider and not out of the competition.
    pub fn is_in_contention(&self, label: &str) -> bool {
        self.rider(label).is_some() && !self.non_continuing.contains_key(label)
    }

    pub fn non_continuing(&self, label: &str) -> Option<NonContinuing> {
        self.non_continuing.get(label).copied()
    }

    pub fn record_non_continuing(&mut self, label: Label, reason: NonContinuing) {
        self.non_continuing.insert(label, reason);
    }

    pub(crate) fn clear_non_continuing(&mut self) {
        self.non_continuing.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, Binding)> {
        self.labels.iter().map(|(label, binding)| (label, *binding))
    }

    pub fn non_continuing_iter(&self) -> impl Iterator<Item = (&Label, NonContinuing)> {
        self.non_continuing
            .iter()
            .map(|(label, reason)| (label, *reason))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// True while only seed labels are bound, i.e. no event has produced output.
    pub fn can_reassign_starters(&self) -> bool {
        self.labels.keys().all(Label::is_seed)
    }

    /// Seed the starter labels from the roster.
    ///
    /// Riders marked DNQ are skipped. The rest are ranked by qualifying time
    /// (roster seeding breaks ties) and the first `starters` are bound to
    /// `N1..Nk`. Remaining seed labels up to `slot_capacity` become byes so
    /// that brackets referencing unused slots still resolve. Returns the
    /// number of riders seeded.
    pub fn seed(&mut self, riders: &[Rider], starters: usize, slot_capacity: usize) -> usize {
        self.labels.clear();
        self.non_continuing.clear();

        let mut qualified: Vec<(usize, &Rider)> = riders
            .iter()
            .enumerate()
            .filter(|(_, rider)| rider.status != QualifyingStatus::Dnq)
            .collect();
        qualified.sort_by(|(_, a), (_, b)| {
            a.qualifying_time
                .total_cmp(&b.qualifying_time)
                .then(a.seeding.cmp(&b.seeding))
        });
        qualified.truncate(starters);

        for (k, (idx, _)) in qualified.iter().enumerate() {
            self.labels
                .insert(Label::seed(k + 1), Binding::Rider(RiderId(*idx)));
        }
        let seeded = qualified.len();
        for k in seeded + 1..=slot_capacity {
            self.labels.insert(Label::seed(k), Binding::Bye);
        }

        info!(
            "Seeded {seeded} of {} riders into {starters} starter slots",
            riders.len()
        );
        seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_kinds() {
        assert!(Label::new("N12").is_seed());
        assert_eq!(Label::new("12R").winner_chain_rank(), Some(12));
        assert_eq!(Label::new("R").winner_chain_rank(), None);
        assert_eq!(Label::new("A1RR").winner_chain_rank(), None);
        assert!(Label::new("9TT").is_time_trial());
        assert!(Label::new("B2RR4").is_elimination());
        assert_eq!(Label::new("B2RR4").elimination_round(), Some(2));
        assert_eq!(Label::new("B2RR4").trailing_number(), Some(4));
        assert_eq!(Label::new("BRR4").elimination_round(), None);
        assert_eq!(Label::new("Q1L").trailing_number(), None);
    }

    #[test]
    fn test_bind_is_single_assignment() {
        let mut state = LabelState::new();
        assert_eq!(state.bind("1R".into(), Binding::Rider(RiderId(0))), Ok(true));
        assert_eq!(state.bind("1R".into(), Binding::Rider(RiderId(0))), Ok(false));
        assert!(matches!(
            state.bind("1R".into(), Binding::Rider(RiderId(1))),
            Err(BracketError::LabelRebound { .. })
        ));
        assert_eq!(state.resolve("1R"), Resolution::Rider(RiderId(0)));
    }

    #[test]
    fn test_can_bind_does_not_bind() {
        let mut state = LabelState::new();
        let label = Label::new("1R");
        assert_eq!(state.can_bind(&label, Binding::Rider(RiderId(3))), Ok(()));
        assert!(!state.is_bound("1R"));

        state.bind(label.clone(), Binding::Bye).unwrap();
        assert_eq!(state.can_bind(&label, Binding::Bye), Ok(()));
        assert!(matches!(
            state.can_bind(&label, Binding::Rider(RiderId(3))),
            Err(BracketError::LabelRebound { .. })
        ));
    }

    #[test]
    fn test_bye_can_be_bound_repeatedly() {
        let mut state = LabelState::new();
        assert_eq!(state.bind("2R".into(), Binding::Bye), Ok(true));
        assert_eq!(state.bind("2R".into(), Binding::Bye), Ok(false));
        assert_eq!(state.bind("3R".into(), Binding::Bye), Ok(true));
        assert_eq!(state.resolve("3R"), Resolution::Bye);
        assert_eq!(state.resolve("4R"), Resolution::Unbound);
    }

    #[test]
    fn test_in_contention() {
        let mut state = LabelState::new();
        state.bind("N1".into(), Binding::Rider(RiderId(0))).unwrap();
        state.bind("N2".into(), Binding::Bye).unwrap();
        state.bind("N3".into(), Binding::Rider(RiderId(1))).unwrap();
        state.record_non_continuing("N3".into(), NonContinuing::Dns);

        assert!(state.is_in_contention("N1"));
        assert!(!state.is_in_contention("N2"));
        assert!(!state.is_in_contention("N3"));
        assert!(!state.is_in_contention("N4"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!("dnf".parse::<NonContinuing>(), Ok(NonContinuing::Dnf));
        assert_eq!(NonContinuing::parse_optional(" "), Ok(None));
        assert_eq!(
            NonContinuing::parse_optional("DQ"),
            Ok(Some(NonContinuing::Dq))
        );
        assert!("DNX".parse::<NonContinuing>().is_err());
        assert!(NonContinuing::Inside < NonContinuing::Dnf);
        assert!(!NonContinuing::Inside.ends_competition());
        assert!(NonContinuing::Dns.ends_competition());
        assert_eq!(severity(None), 0);
    }

    #[test]
    fn test_seed_skips_dnq_and_fills_byes() {
        let mut riders: Vec<Rider> = [12.0, 10.5, 11.0, 10.0, 13.0]
            .iter()
            .enumerate()
            .map(|(i, t)| Rider::new(i as u32 + 1).with_qualifying_time(*t))
            .collect();
        riders[3].status = QualifyingStatus::Dnq;

        let mut state = LabelState::new();
        let seeded = state.seed(&riders, 3, 128);

        assert_eq!(seeded, 3);
        assert_eq!(state.rider("N1"), Some(RiderId(1)));
        assert_eq!(state.rider("N2"), Some(RiderId(2)));
        assert_eq!(state.rider("N3"), Some(RiderId(0)));
        for k in 4..=128 {
            assert_eq!(state.resolve(&format!("N{k}")), Resolution::Bye);
        }
        assert_eq!(state.len(), 128);
        assert!(state.can_reassign_starters());
    }

    #[test]
    fn test_seed_ties_break_on_seeding() {
        let mut riders = vec![
            Rider::new(1).with_qualifying_time(10.0),
            Rider::new(2).with_qualifying_time(10.0),
        ];
        riders[0].seeding = 2;
        riders[1].seeding = 1;

        let mut state = LabelState::new();
        state.seed(&riders, 2, 8);
        assert_eq!(state.rider("N1"), Some(RiderId(1)));
        assert_eq!(state.rider("N2"), Some(RiderId(0)));
    }
}
