//! Bracket nodes: one match definition and the starts run for it.

use log::debug;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

use super::errors::{BracketResult, ConfigError};
use super::models::CompetitionKind;
use super::rule::EventRule;
use super::start::{Roster, Start};
use crate::config::BracketConfig;
use crate::draw::LaneRandomizer;
use crate::labels::{self, Binding, Label, LabelState, NonContinuing};
use crate::rider::{OPEN_QUALIFYING_TIME, Rider, RiderId};

/// Heats are capped at three: best of three decides.
pub const MAX_HEATS: u8 = 3;

/// Placing of an entrant in a resolved event.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FinishPlace {
    Rank(usize),
    Status(NonContinuing),
}

impl fmt::Display for FinishPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishPlace::Rank(rank) => write!(f, "{rank}"),
            FinishPlace::Status(status) => write!(f, "{status}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FinishEntry {
    pub entrant: Binding,
    /// 1-based position in the finish order
    pub rank: usize,
    pub place: FinishPlace,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Event {
    rule: EventRule,
    heats_max: u8,
    starts: Vec<Start>,
    /// Cached once the event resolves
    finish: Vec<FinishEntry>,
}

impl Event {
    /// Parse `rule` and check the heat count.
    pub fn new(rule: &str, heats_max: u8) -> Result<Self, ConfigError> {
        Self::from_rule(rule.parse()?, heats_max)
    }

    pub fn from_rule(rule: EventRule, heats_max: u8) -> Result<Self, ConfigError> {
        let event = Self {
            rule,
            heats_max,
            starts: Vec::new(),
            finish: Vec::new(),
        };
        event.check_heats()?;
        Ok(event)
    }

    pub(crate) fn check_heats(&self) -> Result<(), ConfigError> {
        if (1..=MAX_HEATS).contains(&self.heats_max) {
            Ok(())
        } else {
            Err(ConfigError::InvalidHeatCount {
                rule: self.rule.to_string(),
                heats: self.heats_max,
            })
        }
    }

    pub fn rule(&self) -> &EventRule {
        &self.rule
    }

    pub fn composition(&self) -> &[Label] {
        self.rule.composition()
    }

    pub fn winner(&self) -> &Label {
        self.rule.winner()
    }

    pub fn others(&self) -> &[Label] {
        self.rule.others()
    }

    /// Winner then other output labels.
    pub fn outputs(&self) -> impl Iterator<Item = &Label> {
        self.rule.outputs()
    }

    pub fn heats_max(&self) -> u8 {
        self.heats_max
    }

    pub fn starts(&self) -> &[Start] {
        &self.starts
    }

    pub fn start(&self, index: usize) -> Option<&Start> {
        self.starts.get(index)
    }

    pub fn finish(&self) -> &[FinishEntry] {
        &self.finish
    }

    /// Every input is known, someone can still ride and the winner is open.
    pub fn can_start(&self, labels: &LabelState) -> bool {
        let composition = self.composition();
        composition.iter().all(|c| labels.is_bound(c.as_str()))
            && composition.iter().any(|c| labels.is_in_contention(c.as_str()))
            && !labels.is_bound(self.winner().as_str())
    }

    pub fn is_finished(&self, labels: &LabelState) -> bool {
        labels.is_bound(self.winner().as_str())
    }

    /// Heats run so far, restarts excluded.
    pub fn heat(&self) -> u8 {
        let run = self.starts.iter().filter(|s| !s.restart_required()).count();
        run.min(self.heats_max as usize) as u8
    }

    pub fn remaining_composition(&self, labels: &LabelState) -> Vec<Label> {
        self.composition()
            .iter()
            .filter(|c| labels.is_in_contention(c.as_str()))
            .cloned()
            .collect()
    }

    /// Output labels that remaining entrants can still reach.
    pub fn out_labels(&self, labels: &LabelState) -> Vec<Label> {
        let remaining = self.remaining_composition(labels).len();
        self.outputs()
            .take(remaining.max(1))
            .cloned()
            .collect()
    }

    /// Riders behind the remaining composition.
    pub fn composition_riders<'a>(&self, roster: Roster<'a>) -> Vec<&'a Rider> {
        self.remaining_composition(roster.labels)
            .iter()
            .filter_map(|c| roster.rider(c.as_str()))
            .collect()
    }

    /// Create the next start, or `None` when the event cannot start.
    pub fn advance_heat(
        &mut self,
        roster: Roster<'_>,
        sort_by_bib: bool,
        randomizer: &mut LaneRandomizer,
    ) -> BracketResult<Option<usize>> {
        if !self.can_start(roster.labels) {
            return Ok(None);
        }
        let start = Start::draw(
            &self.starts,
            self.rule.composition(),
            roster,
            sort_by_bib,
            randomizer,
        )?;
        self.starts.push(start);
        Ok(Some(self.starts.len() - 1))
    }

    /// A start together with the composition it draws from.
    pub(crate) fn start_with_composition(&mut self, index: usize) -> Option<(&mut Start, &[Label])> {
        let Self { rule, starts, .. } = self;
        starts
            .get_mut(index)
            .map(|start| (start, rule.composition()))
    }

    /// Drop trailing starts left over from an interrupted session.
    pub fn discard_hanging_starts(&mut self) -> usize {
        let before = self.starts.len();
        while self.starts.last().is_some_and(Start::is_hanging) {
            self.starts.pop();
        }
        before - self.starts.len()
    }

    /// Copy the non-continuing reasons of every start into `labels`.
    pub fn fold_non_continuing(&self, labels: &mut LabelState) {
        for start in &self.starts {
            for (label, reason) in start.non_continuing() {
                labels.record_non_continuing(label.clone(), *reason);
            }
        }
    }

    /// Resolve the outputs of this event if the recorded heats decide it.
    ///
    /// Returns `Ok(false)` while the event is still undecided or cannot start.
    pub fn propagate(&mut self, labels: &mut LabelState, riders: &[Rider]) -> BracketResult<bool> {
        if !self.can_start(labels) {
            return Ok(false);
        }
        self.fold_non_continuing(labels);

        let remaining = self.remaining_composition(labels);
        if let [sole] = remaining.as_slice() {
            let binding = labels.binding(sole.as_str()).unwrap_or(Binding::Bye);
            let bindings = std::iter::once((self.winner().clone(), binding))
                .chain(self.others().iter().map(|other| (other.clone(), Binding::Bye)))
                .collect();
            bind_all(labels, bindings)?;
            self.finish = default_finish(self.composition(), labels, riders);
            debug!("{} resolved by default: {}", self.rule, sole);
            return Ok(true);
        }

        let Some(decider) = self.deciding_start() else {
            return Ok(false);
        };
        let continuing = decider.continuing_positions();
        let order = if self.heats_max == 1 {
            decider.finish_positions().to_vec()
        } else {
            continuing.to_vec()
        };

        let Some(first) = continuing.first() else {
            return Ok(false);
        };
        let winner = labels.binding(first.as_str()).unwrap_or(Binding::Bye);
        let mut bindings = vec![(self.winner().clone(), winner)];
        for (i, other) in self.others().iter().enumerate() {
            let binding = continuing
                .get(i + 1)
                .and_then(|c| labels.binding(c.as_str()))
                .unwrap_or(Binding::Bye);
            bindings.push((other.clone(), binding));
        }
        bind_all(labels, bindings)?;

        self.finish = ranked_finish(&order, labels);
        debug!("{} resolved after {} heats", self.rule, self.heat());
        Ok(true)
    }

    /// First non-restart start whose winner has collected enough wins.
    fn deciding_start(&self) -> Option<&Start> {
        let needed = self.heats_max.saturating_sub(1).max(1);
        let mut wins: HashMap<&Label, u8> = HashMap::new();
        self.starts
            .iter()
            .filter(|s| !s.restart_required())
            .filter(|s| !s.continuing_positions().is_empty())
            .find(|s| {
                let count = wins.entry(&s.continuing_positions()[0]).or_default();
                *count += 1;
                *count >= needed
            })
    }

    /// Per remaining entrant: `Win`, a status code, or `-` for everyone else
    /// once the heat has been run; empty before that.
    pub fn heat_places(&self, heat: u8, labels: &LabelState) -> Vec<String> {
        let remaining = self.remaining_composition(labels);
        let run = self
            .starts
            .iter()
            .filter(|s| !s.restart_required())
            .nth((heat as usize).wrapping_sub(1));

        match run {
            Some(start) => remaining
                .iter()
                .map(|c| match (start.non_continuing().get(c), start.place(c.as_str())) {
                    (Some(status), _) => status.code().to_string(),
                    (None, Some(1)) => "Win".to_string(),
                    (None, None) if start.inside().contains(c) => {
                        NonContinuing::Inside.code().to_string()
                    }
                    (None, _) => "-".to_string(),
                })
                .collect(),
            None => vec![String::new(); remaining.len()],
        }
    }

    pub fn finish_rank(&self, rider: RiderId) -> Option<usize> {
        self.finish
            .iter()
            .find(|entry| entry.entrant == Binding::Rider(rider))
            .map(|entry| entry.rank)
    }

    pub fn finish_place(&self, rider: RiderId) -> Option<FinishPlace> {
        self.finish
            .iter()
            .find(|entry| entry.entrant == Binding::Rider(rider))
            .map(|entry| entry.place)
    }

    /// Estimated seconds on the track, `None` for eliminator events.
    pub fn competition_time(&self, kind: CompetitionKind, config: &BracketConfig) -> Option<f64> {
        match kind {
            CompetitionKind::Keirin => Some(config.keirin_secs),
            CompetitionKind::Sprint if self.heats_max == 1 => Some(config.sprint_final_secs),
            CompetitionKind::Sprint => Some(1.5 * config.sprint_final_secs),
            CompetitionKind::Eliminator => None,
        }
    }
}

/// Bind every output or none of them.
fn bind_all(labels: &mut LabelState, bindings: Vec<(Label, Binding)>) -> BracketResult<()> {
    for (label, binding) in &bindings {
        labels.can_bind(label, *binding)?;
    }
    for (label, binding) in bindings {
        labels.bind(label, binding)?;
    }
    Ok(())
}

/// Finish order for an event won by default: the whole composition ranked by
/// status, then qualifying time.
fn default_finish(composition: &[Label], labels: &LabelState, riders: &[Rider]) -> Vec<FinishEntry> {
    let mut sortable: Vec<(u8, f64, usize, Binding, Option<NonContinuing>)> = composition
        .iter()
        .enumerate()
        .map(|(place, c)| {
            let entrant = labels.binding(c.as_str()).unwrap_or(Binding::Bye);
            let time = entrant
                .rider()
                .and_then(|id| riders.get(id.0))
                .map_or(OPEN_QUALIFYING_TIME, |r| r.qualifying_time);
            let status = labels.non_continuing(c.as_str());
            (labels::severity(status), time, place, entrant, status)
        })
        .collect();
    sortable.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    sortable
        .into_iter()
        .enumerate()
        .map(|(p, (_, _, _, entrant, status))| finish_entry(p, entrant, status))
        .collect()
}

/// Finish order of a deciding start, ranked by status then place.
fn ranked_finish(order: &[Label], labels: &LabelState) -> Vec<FinishEntry> {
    let mut sortable: Vec<(u8, usize, Binding, Option<NonContinuing>)> = order
        .iter()
        .enumerate()
        .map(|(place, c)| {
            let status = labels.non_continuing(c.as_str());
            let entrant = labels.binding(c.as_str()).unwrap_or(Binding::Bye);
            (labels::severity(status), place, entrant, status)
        })
        .collect();
    sortable.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    sortable
        .into_iter()
        .enumerate()
        .map(|(p, (_, _, entrant, status))| finish_entry(p, entrant, status))
        .collect()
}

fn finish_entry(p: usize, entrant: Binding, status: Option<NonContinuing>) -> FinishEntry {
    FinishEntry {
        entrant,
        rank: p + 1,
        place: status.map_or(FinishPlace::Rank(p + 1), FinishPlace::Status),
    }
}
