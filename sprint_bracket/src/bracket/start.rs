//! A single heat attempt within an event.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::errors::{ConfigError, EntryError};
use super::heat::{DrawContext, HeatTransition, LaneRule};
use crate::draw::LaneRandomizer;
use crate::labels::{self, Label, LabelState, NonContinuing};
use crate::rider::{Bib, Rider};

/// Read access to label bindings together with the roster they point into.
#[derive(Clone, Copy, Debug)]
pub struct Roster<'a> {
    pub labels: &'a LabelState,
    pub riders: &'a [Rider],
}

impl<'a> Roster<'a> {
    pub fn new(labels: &'a LabelState, riders: &'a [Rider]) -> Self {
        Self { labels, riders }
    }

    pub fn rider(&self, label: &str) -> Option<&'a Rider> {
        self.labels
            .rider(label)
            .and_then(|id| self.riders.get(id.0))
    }

    pub fn bib(&self, label: &str) -> Option<Bib> {
        self.rider(label).map(|rider| rider.bib)
    }

    /// Labels of `composition` still in contention, in order.
    pub fn remaining(&self, composition: &[Label]) -> Vec<Label> {
        composition
            .iter()
            .filter(|label| self.labels.is_in_contention(label.as_str()))
            .cloned()
            .collect()
    }
}

/// One line of a heat result, in finish order.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct PlaceEntry {
    pub bib: Bib,
    #[serde(default)]
    pub status: Option<NonContinuing>,
    #[serde(default)]
    pub warning: bool,
    #[serde(default)]
    pub relegation: bool,
}

impl PlaceEntry {
    pub fn finisher(bib: Bib) -> Self {
        Self {
            bib,
            status: None,
            warning: false,
            relegation: false,
        }
    }

    pub fn with_status(bib: Bib, status: NonContinuing) -> Self {
        Self {
            status: Some(status),
            ..Self::finisher(bib)
        }
    }

    /// Build an entry from the raw text columns of a results sheet.
    pub fn parse(bib: Bib, status: &str, warning: &str, relegation: &str) -> Result<Self, EntryError> {
        Ok(Self {
            bib,
            status: NonContinuing::parse_optional(status)?,
            warning: parse_flag(warning),
            relegation: parse_flag(relegation),
        })
    }
}

/// True when the text starts with one of `1`, `T`, `t`, `Y`, `y`.
pub fn parse_flag(text: &str) -> bool {
    matches!(text.trim_start().chars().next(), Some('1' | 'T' | 't' | 'Y' | 'y'))
}

/// One executed or pending heat attempt.
///
/// Owned by its event; the predecessor is the previous element of the
/// event's start list.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Start {
    heat: u8,
    first_start_in_heat: bool,
    restart_required: bool,
    can_draw_lots: bool,
    start_positions: Vec<Label>,
    /// Every ranked entrant, non-finishers included
    finish_positions: Vec<Label>,
    /// Finishers only
    continuing_positions: Vec<Label>,
    /// Rank among continuing entrants
    places: BTreeMap<Label, u32>,
    /// Seconds, keyed by place
    times: BTreeMap<u32, f64>,
    relegated: BTreeSet<Label>,
    warned: BTreeSet<Label>,
    /// Must start on the inside lane next time
    inside: Vec<Label>,
    non_continuing: BTreeMap<Label, NonContinuing>,
    places_timestamp: Option<DateTime<Utc>>,
}

impl Start {
    fn empty(heat: u8, first_start_in_heat: bool, can_draw_lots: bool, lanes: Vec<Label>) -> Self {
        Self {
            heat,
            first_start_in_heat,
            restart_required: false,
            can_draw_lots,
            start_positions: lanes,
            finish_positions: Vec::new(),
            continuing_positions: Vec::new(),
            places: BTreeMap::new(),
            times: BTreeMap::new(),
            relegated: BTreeSet::new(),
            warned: BTreeSet::new(),
            inside: Vec::new(),
            non_continuing: BTreeMap::new(),
            places_timestamp: None,
        }
    }

    /// Create the start that follows `history`.
    ///
    /// Lanes not in contention are dropped; eliminator competitions line
    /// riders up by bib.
    pub(crate) fn draw(
        history: &[Start],
        composition: &[Label],
        roster: Roster<'_>,
        sort_by_bib: bool,
        randomizer: &mut LaneRandomizer,
    ) -> Result<Self, ConfigError> {
        let transition = HeatTransition::after(history)?;
        let remaining = roster.remaining(composition);
        let draw = transition.lane_order(&mut DrawContext {
            history,
            remaining: &remaining,
            randomizer,
        });

        let mut lanes: Vec<Label> = draw
            .lanes
            .into_iter()
            .filter(|label| roster.labels.is_in_contention(label.as_str()))
            .collect();
        if sort_by_bib {
            lanes.sort_by_key(|label| roster.bib(label.as_str()));
        }

        debug!(
            "Heat {} start {}: lanes {:?}",
            transition.heat(),
            history.len() + 1,
            lanes
        );
        Ok(Self::empty(
            transition.heat(),
            transition.first_start_in_heat(),
            draw.can_draw_lots,
            lanes,
        ))
    }

    /// Bib → label for the entrants a submission may name.
    ///
    /// Entrants already out of the competition through this very start stay
    /// addressable so the same result can be submitted again.
    fn entrant_lookup(
        &self,
        composition: &[Label],
        roster: Roster<'_>,
    ) -> HashMap<Bib, Label> {
        composition
            .iter()
            .filter(|label| {
                roster.labels.is_in_contention(label.as_str())
                    || self.non_continuing.contains_key(label.as_str())
            })
            .filter_map(|label| roster.bib(label.as_str()).map(|bib| (bib, label.clone())))
            .collect()
    }

    fn resolve_bibs(
        &self,
        bibs: impl Iterator<Item = Bib>,
        composition: &[Label],
        roster: Roster<'_>,
    ) -> Result<Vec<Label>, EntryError> {
        let lookup = self.entrant_lookup(composition, roster);
        let mut seen = BTreeSet::new();
        bibs.map(|bib| {
            if !seen.insert(bib) {
                return Err(EntryError::DuplicateBib(bib));
            }
            lookup.get(&bib).cloned().ok_or(EntryError::UnknownBib(bib))
        })
        .collect()
    }

    /// Record the finish order of this start.
    ///
    /// Every bib is checked before anything changes. Derived state is
    /// rebuilt from scratch, so submitting the same entries twice gives the
    /// same result.
    pub fn set_places(
        &mut self,
        entries: &[PlaceEntry],
        composition: &[Label],
        roster: Roster<'_>,
    ) -> Result<(), EntryError> {
        let ids = self.resolve_bibs(entries.iter().map(|e| e.bib), composition, roster)?;

        self.places.clear();
        self.finish_positions.clear();
        self.continuing_positions.clear();
        self.non_continuing.clear();
        self.inside.clear();
        self.warned.clear();
        self.relegated.clear();

        let mut ranked: Vec<(u8, u32, Label)> = Vec::with_capacity(entries.len());
        let mut place = 0;
        for (entry, id) in entries.iter().zip(ids) {
            match entry.status {
                Some(NonContinuing::Inside) => self.inside.push(id.clone()),
                Some(reason) if reason.ends_competition() => {
                    self.non_continuing.insert(id.clone(), reason);
                }
                _ => {}
            }
            if entry.warning {
                self.warned.insert(id.clone());
            }
            if entry.relegation {
                self.relegated.insert(id.clone());
            }
            if entry.status != Some(NonContinuing::Dq) {
                place += 1;
                ranked.push((labels::severity(entry.status), place, id));
            }
        }
        ranked.sort();

        for (_, _, id) in ranked {
            if !self.non_continuing.contains_key(&id) {
                self.continuing_positions.push(id.clone());
                self.places
                    .insert(id.clone(), self.continuing_positions.len() as u32);
            }
            self.finish_positions.push(id);
        }
        self.places_timestamp = Some(Utc::now());
        Ok(())
    }

    /// Reorder the lanes and record statuses known before the start.
    ///
    /// Listed bibs take the first lanes in the given order; the others keep
    /// their relative order behind them.
    pub fn set_start_positions(
        &mut self,
        sequence: &[(Bib, Option<NonContinuing>)],
        composition: &[Label],
        roster: Roster<'_>,
    ) -> Result<(), EntryError> {
        let ids = self.resolve_bibs(sequence.iter().map(|(bib, _)| *bib), composition, roster)?;

        for ((_, status), id) in sequence.iter().zip(&ids) {
            self.inside.retain(|label| label != id);
            match status {
                Some(reason) if reason.ends_competition() => {
                    self.non_continuing.insert(id.clone(), *reason);
                }
                Some(_) => {
                    self.non_continuing.remove(id);
                    self.inside.push(id.clone());
                }
                None => {
                    self.non_continuing.remove(id);
                }
            }
        }

        let rest: Vec<Label> = self
            .start_positions
            .iter()
            .filter(|label| !ids.contains(*label))
            .cloned()
            .collect();
        self.start_positions = ids.into_iter().chain(rest).collect();
        Ok(())
    }

    /// Replace the per-place times.
    pub fn set_times(&mut self, times: &[(u32, f64)]) -> Result<(), EntryError> {
        let max = self.start_positions.len();
        if let Some((place, _)) = times
            .iter()
            .find(|(place, _)| *place == 0 || *place as usize > max)
        {
            return Err(EntryError::InvalidPlace { place: *place, max });
        }
        self.times = times.iter().copied().collect();
        Ok(())
    }

    /// No places recorded and not waiting for a restart: left over from an
    /// interrupted session.
    pub fn is_hanging(&self) -> bool {
        !self.restart_required && self.places.is_empty()
    }

    pub fn set_restart_required(&mut self, restart_required: bool) {
        self.restart_required = restart_required;
    }

    pub fn heat(&self) -> u8 {
        self.heat
    }

    pub fn first_start_in_heat(&self) -> bool {
        self.first_start_in_heat
    }

    pub fn restart_required(&self) -> bool {
        self.restart_required
    }

    pub fn can_draw_lots(&self) -> bool {
        self.can_draw_lots
    }

    pub fn start_positions(&self) -> &[Label] {
        &self.start_positions
    }

    pub fn finish_positions(&self) -> &[Label] {
        &self.finish_positions
    }

    pub fn continuing_positions(&self) -> &[Label] {
        &self.continuing_positions
    }

    pub fn place(&self, label: &str) -> Option<u32> {
        self.places.get(label).copied()
    }

    pub fn places(&self) -> &BTreeMap<Label, u32> {
        &self.places
    }

    pub fn times(&self) -> &BTreeMap<u32, f64> {
        &self.times
    }

    pub fn is_relegated(&self, label: &str) -> bool {
        self.relegated.contains(label)
    }

    pub fn is_warned(&self, label: &str) -> bool {
        self.warned.contains(label)
    }

    pub fn inside(&self) -> &[Label] {
        &self.inside
    }

    pub fn non_continuing(&self) -> &BTreeMap<Label, NonContinuing> {
        &self.non_continuing
    }

    pub fn places_timestamp(&self) -> Option<DateTime<Utc>> {
        self.places_timestamp
    }

    #[cfg(test)]
    pub(crate) fn for_test(heat: u8, first_start_in_heat: bool, lanes: Vec<Label>) -> Self {
        Self::empty(heat, first_start_in_heat, false, lanes)
    }

    #[cfg(test)]
    pub(crate) fn push_inside(&mut self, label: Label) {
        self.inside.push(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Binding;
    use crate::rider::RiderId;

    fn setup(count: usize) -> (LabelState, Vec<Rider>, Vec<Label>) {
        let riders: Vec<Rider> = (1..=count as u32).map(Rider::new).collect();
        let mut labels = LabelState::new();
        let composition: Vec<Label> = (1..=count).map(Label::seed).collect();
        for (i, label) in composition.iter().enumerate() {
            labels.bind(label.clone(), Binding::Rider(RiderId(i))).unwrap();
        }
        (labels, riders, composition)
    }

    fn first_start(labels: &LabelState, riders: &[Rider], composition: &[Label]) -> Start {
        let mut randomizer = LaneRandomizer::seeded(11);
        Start::draw(&[], composition, Roster::new(labels, riders), false, &mut randomizer).unwrap()
    }

    #[test]
    fn test_parse_flag() {
        for yes in ["1", "True", "t", "Yes", "y"] {
            assert!(parse_flag(yes), "{yes}");
        }
        for no in ["", "0", "false", "No", "x"] {
            assert!(!parse_flag(no), "{no}");
        }
    }

    #[test]
    fn test_place_entry_parse() {
        let entry = PlaceEntry::parse(4, "DNF", "1", "").unwrap();
        assert_eq!(entry.status, Some(NonContinuing::Dnf));
        assert!(entry.warning);
        assert!(!entry.relegation);
        assert_eq!(
            PlaceEntry::parse(4, "LATE", "", ""),
            Err(EntryError::UnknownStatus("LATE".to_string()))
        );
    }

    #[test]
    fn test_first_start_draws_all_entrants() {
        let (labels, riders, composition) = setup(4);
        let start = first_start(&labels, &riders, &composition);
        assert_eq!(start.heat(), 1);
        assert!(start.first_start_in_heat());
        assert!(start.can_draw_lots());
        let mut lanes = start.start_positions().to_vec();
        lanes.sort();
        assert_eq!(lanes, composition);
        assert!(start.is_hanging());
    }

    #[test]
    fn test_eliminator_lanes_sorted_by_bib() {
        let (mut labels, riders, composition) = setup(4);
        labels.record_non_continuing(Label::new("N2"), NonContinuing::Dns);
        let mut randomizer = LaneRandomizer::seeded(5);
        let start = Start::draw(
            &[],
            &composition,
            Roster::new(&labels, &riders),
            true,
            &mut randomizer,
        )
        .unwrap();
        assert_eq!(
            start.start_positions(),
            &[Label::new("N1"), Label::new("N3"), Label::new("N4")]
        );
    }

    #[test]
    fn test_set_places_orders_by_status() {
        let (labels, riders, composition) = setup(4);
        let mut start = first_start(&labels, &riders, &composition);
        let entries = vec![
            PlaceEntry::with_status(3, NonContinuing::Dnf),
            PlaceEntry::finisher(2),
            PlaceEntry {
                warning: true,
                ..PlaceEntry::with_status(1, NonContinuing::Inside)
            },
            PlaceEntry::with_status(4, NonContinuing::Dq),
        ];
        start
            .set_places(&entries, &composition, Roster::new(&labels, &riders))
            .unwrap();

        assert_eq!(start.continuing_positions(), &[Label::new("N2"), Label::new("N1")]);
        assert_eq!(
            start.finish_positions(),
            &[Label::new("N2"), Label::new("N1"), Label::new("N3")]
        );
        assert_eq!(start.place("N2"), Some(1));
        assert_eq!(start.place("N1"), Some(2));
        assert_eq!(start.place("N3"), None);
        assert_eq!(start.inside(), &[Label::new("N1")]);
        assert!(start.is_warned("N1"));
        assert_eq!(start.non_continuing().get("N4"), Some(&NonContinuing::Dq));
        assert!(start.places_timestamp().is_some());
        assert!(!start.is_hanging());
    }

    #[test]
    fn test_set_places_is_idempotent() {
        let (labels, riders, composition) = setup(3);
        let mut start = first_start(&labels, &riders, &composition);
        let entries = vec![
            PlaceEntry {
                relegation: true,
                ..PlaceEntry::finisher(2)
            },
            PlaceEntry::with_status(1, NonContinuing::Inside),
            PlaceEntry::with_status(3, NonContinuing::Dns),
        ];
        let roster = Roster::new(&labels, &riders);
        start.set_places(&entries, &composition, roster).unwrap();
        let once = start.clone();
        start.set_places(&entries, &composition, roster).unwrap();

        assert_eq!(start.places(), once.places());
        assert_eq!(start.finish_positions(), once.finish_positions());
        assert_eq!(start.continuing_positions(), once.continuing_positions());
        assert_eq!(start.inside(), once.inside());
        assert_eq!(start.non_continuing(), once.non_continuing());
        assert!(start.is_relegated("N2"));
    }

    #[test]
    fn test_resubmission_after_status_folded() {
        let (mut labels, riders, composition) = setup(2);
        let mut start = first_start(&labels, &riders, &composition);
        let entries = vec![PlaceEntry::finisher(1), PlaceEntry::with_status(2, NonContinuing::Dnf)];
        start
            .set_places(&entries, &composition, Roster::new(&labels, &riders))
            .unwrap();

        labels.record_non_continuing(Label::new("N2"), NonContinuing::Dnf);
        start
            .set_places(&entries, &composition, Roster::new(&labels, &riders))
            .unwrap();
        assert_eq!(start.continuing_positions(), &[Label::new("N1")]);
    }

    #[test]
    fn test_bad_bibs_leave_start_untouched() {
        let (labels, riders, composition) = setup(2);
        let mut start = first_start(&labels, &riders, &composition);
        let roster = Roster::new(&labels, &riders);
        start
            .set_places(&[PlaceEntry::finisher(1), PlaceEntry::finisher(2)], &composition, roster)
            .unwrap();
        let before = start.clone();

        assert_eq!(
            start.set_places(&[PlaceEntry::finisher(9)], &composition, roster),
            Err(EntryError::UnknownBib(9))
        );
        assert_eq!(
            start.set_places(&[PlaceEntry::finisher(1), PlaceEntry::finisher(1)], &composition, roster),
            Err(EntryError::DuplicateBib(1))
        );
        assert_eq!(start, before);
    }

    #[test]
    fn test_set_start_positions() {
        let (labels, riders, composition) = setup(4);
        let mut start = first_start(&labels, &riders, &composition);
        let roster = Roster::new(&labels, &riders);
        let drawn = start.start_positions().to_vec();

        start
            .set_start_positions(&[(4, None), (2, Some(NonContinuing::Dns))], &composition, roster)
            .unwrap();
        assert_eq!(&start.start_positions()[..2], &[Label::new("N4"), Label::new("N2")]);
        let rest: Vec<Label> = drawn
            .into_iter()
            .filter(|l| l.as_str() != "N4" && l.as_str() != "N2")
            .collect();
        assert_eq!(&start.start_positions()[2..], rest.as_slice());
        assert_eq!(start.non_continuing().get("N2"), Some(&NonContinuing::Dns));

        start
            .set_start_positions(&[(2, None)], &composition, roster)
            .unwrap();
        assert!(start.non_continuing().is_empty());
    }

    #[test]
    fn test_set_times() {
        let (labels, riders, composition) = setup(2);
        let mut start = first_start(&labels, &riders, &composition);
        start.set_times(&[(1, 10.5), (2, 10.9)]).unwrap();
        assert_eq!(start.times().get(&1), Some(&10.5));
        assert_eq!(
            start.set_times(&[(3, 11.0)]),
            Err(EntryError::InvalidPlace { place: 3, max: 2 })
        );
        assert_eq!(start.times().len(), 2);
    }

    #[test]
    fn test_restart_is_not_hanging() {
        let (labels, riders, composition) = setup(2);
        let mut start = first_start(&labels, &riders, &composition);
        start.set_restart_required(true);
        assert!(!start.is_hanging());
    }
}
