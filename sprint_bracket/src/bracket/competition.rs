//! The competition: bracket tree, roster and label registry.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::errors::{BracketError, BracketResult, ConfigError, EntryError};
use super::event::Event;
use super::models::{CompetitionKind, EventRef, Tournament};
use super::start::{PlaceEntry, Roster, Start};
use crate::config::BracketConfig;
use crate::draw::LaneRandomizer;
use crate::labels::{Label, LabelState, NonContinuing};
use crate::results::{Classification, ClassificationRule, Classifier};
use crate::rider::{Bib, QUALIFYING_TIME_DEFAULT, QualifyingStatus, Rider, RiderId};

/// Every event with its position, in bracket order.
fn all_events(tournaments: &[Tournament]) -> impl Iterator<Item = (EventRef, &Event)> {
    tournaments.iter().enumerate().flat_map(|(t, tournament)| {
        tournament
            .systems
            .iter()
            .enumerate()
            .flat_map(move |(s, system)| {
                system
                    .events
                    .iter()
                    .enumerate()
                    .map(move |(e, event)| (EventRef::new(t, s, e), event))
            })
    })
}

fn all_events_mut(tournaments: &mut [Tournament]) -> impl Iterator<Item = &mut Event> {
    tournaments
        .iter_mut()
        .flat_map(|tournament| tournament.systems.iter_mut())
        .flat_map(|system| system.events.iter_mut())
}

fn locate_mut(tournaments: &mut [Tournament], at: EventRef) -> Result<&mut Event, EntryError> {
    tournaments
        .get_mut(at.tournament)
        .and_then(|tournament| tournament.systems.get_mut(at.system))
        .and_then(|system| system.events.get_mut(at.event))
        .ok_or(EntryError::UnknownEvent(at))
}

/// Check the label wiring and return the number of starters.
///
/// Composition labels and output labels must each be unique across the
/// bracket, and no prefix of the bracket may produce more labels than it
/// consumes.
fn check_bracket(tournaments: &[Tournament]) -> Result<usize, ConfigError> {
    let mut inputs: BTreeSet<&Label> = BTreeSet::new();
    let mut outputs: BTreeSet<&Label> = BTreeSet::new();
    let mut starters = 0;

    for (_, event) in all_events(tournaments) {
        event.check_heats()?;
        let rule = || event.rule().to_string();

        for label in event.composition() {
            if !inputs.insert(label) {
                return Err(ConfigError::DuplicateInputLabel {
                    label: label.clone(),
                    rule: rule(),
                });
            }
            if label.is_seed() {
                starters += 1;
            }
        }
        for label in event.outputs() {
            if !outputs.insert(label) {
                return Err(ConfigError::DuplicateOutputLabel {
                    label: label.clone(),
                    rule: rule(),
                });
            }
        }
        if outputs.len() > inputs.len() {
            return Err(ConfigError::OutputsExceedInputs {
                rule: rule(),
                outputs: outputs.len(),
                inputs: inputs.len(),
            });
        }
    }
    Ok(starters)
}

/// Aggregate root of the bracket engine.
///
/// All mutation goes through the entry points here; after a batch of edits
/// call [`Competition::propagate`] to bring every derivable label up to date.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Competition {
    name: String,
    tournaments: Vec<Tournament>,
    riders: Vec<Rider>,
    labels: LabelState,
    kind: CompetitionKind,
    starters: usize,
    #[serde(default)]
    config: BracketConfig,
}

impl Competition {
    pub fn new(name: &str, tournaments: Vec<Tournament>) -> Result<Self, ConfigError> {
        Self::with_config(name, tournaments, BracketConfig::default())
    }

    pub fn with_config(
        name: &str,
        tournaments: Vec<Tournament>,
        config: BracketConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let starters = check_bracket(&tournaments)?;
        let kind = CompetitionKind::detect(name, all_events(&tournaments).map(|(_, e)| e));
        info!("Created {kind} competition \"{name}\" for {starters} starters");
        Ok(Self {
            name: name.to_string(),
            tournaments,
            riders: Vec::new(),
            labels: LabelState::new(),
            kind,
            starters,
            config,
        })
    }

    /// Re-run construction checks, e.g. after decoding a snapshot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        let starters = check_bracket(&self.tournaments)?;
        if starters != self.starters {
            return Err(ConfigError::Invalid {
                field: "starters".to_string(),
                reason: format!("recorded {} but the bracket seeds {starters}", self.starters),
            });
        }
        let kind = CompetitionKind::detect(&self.name, self.events().map(|(_, e)| e));
        if kind != self.kind {
            return Err(ConfigError::Invalid {
                field: "kind".to_string(),
                reason: format!("recorded {} but the bracket is {kind}", self.kind),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CompetitionKind {
        self.kind
    }

    /// Number of seed labels referenced by the bracket.
    pub fn starters(&self) -> usize {
        self.starters
    }

    pub fn config(&self) -> &BracketConfig {
        &self.config
    }

    pub fn tournaments(&self) -> &[Tournament] {
        &self.tournaments
    }

    pub fn labels(&self) -> &LabelState {
        &self.labels
    }

    pub fn riders(&self) -> &[Rider] {
        &self.riders
    }

    pub fn rider(&self, id: RiderId) -> Option<&Rider> {
        self.riders.get(id.0)
    }

    pub fn rider_by_bib(&self, bib: Bib) -> Option<RiderId> {
        self.riders
            .iter()
            .position(|rider| rider.bib == bib)
            .map(RiderId)
    }

    pub fn roster(&self) -> Roster<'_> {
        Roster::new(&self.labels, &self.riders)
    }

    pub fn events(&self) -> impl Iterator<Item = (EventRef, &Event)> {
        all_events(&self.tournaments)
    }

    pub fn event(&self, at: EventRef) -> Option<&Event> {
        self.tournaments
            .get(at.tournament)
            .and_then(|tournament| tournament.systems.get(at.system))
            .and_then(|system| system.events.get(at.event))
    }

    // Roster

    /// Register a rider. Bibs are unique.
    ///
    /// # Errors
    ///
    /// [`EntryError::BibTaken`] when another rider already wears the bib.
    pub fn add_rider(&mut self, rider: Rider) -> Result<RiderId, EntryError> {
        if self.rider_by_bib(rider.bib).is_some() {
            return Err(EntryError::BibTaken(rider.bib));
        }
        self.riders.push(rider);
        self.update_seeding();
        Ok(RiderId(self.riders.len() - 1))
    }

    /// Fails with [`EntryError::UnknownBib`] if nobody wears `bib`.
    pub fn set_rider_status(&mut self, bib: Bib, status: QualifyingStatus) -> Result<(), EntryError> {
        let id = self.rider_by_bib(bib).ok_or(EntryError::UnknownBib(bib))?;
        if let Some(rider) = self.riders.get_mut(id.0) {
            rider.status = status;
        }
        Ok(())
    }

    /// Seeding index follows roster order and breaks qualifying-time ties.
    pub fn update_seeding(&mut self) {
        for (i, rider) in self.riders.iter_mut().enumerate() {
            rider.seeding = i + 1;
        }
    }

    /// Riders by qualifying status, time and seeding.
    pub fn qualifying_order(&self) -> Vec<RiderId> {
        let mut order: Vec<RiderId> = (0..self.riders.len()).map(RiderId).collect();
        order.sort_by(|a, b| self.riders[a.0].cmp_qualifying(&self.riders[b.0]));
        order
    }

    /// Riders ranked beyond the starter count.
    pub fn dnq_riders(&self) -> Vec<RiderId> {
        self.qualifying_order()
            .into_iter()
            .skip(self.starters)
            .collect()
    }

    /// Give bibs 1..n in qualifying order.
    pub fn renumber_bibs_by_qualifying(&mut self) {
        for (i, id) in self.qualifying_order().into_iter().enumerate() {
            if let Some(rider) = self.riders.get_mut(id.0) {
                rider.bib = i as Bib + 1;
            }
        }
    }

    // Seeding

    /// Seed labels may only be reassigned until an event has produced output.
    pub fn can_reassign_starters(&self) -> bool {
        self.labels.can_reassign_starters()
    }

    /// Apply qualifying times and re-seed the starter labels.
    ///
    /// Riders not listed keep their current time. Returns the number of riders
    /// seeded into the bracket.
    ///
    /// # Errors
    ///
    /// * [`BracketError::StartersLocked`] once any event has bound an output.
    /// * [`EntryError::DuplicateBib`] or [`EntryError::UnknownBib`] for a bad
    ///   entry. Nothing is applied in that case.
    pub fn seed_qualifying_times(&mut self, times: &[(Bib, f64)]) -> BracketResult<usize> {
        if !self.can_reassign_starters() {
            warn!("Rejected qualifying times: bracket already started");
            return Err(BracketError::StartersLocked);
        }

        let mut seen = BTreeSet::new();
        let mut updates = Vec::with_capacity(times.len());
        for &(bib, seconds) in times {
            if !seen.insert(bib) {
                return Err(EntryError::DuplicateBib(bib).into());
            }
            let id = self.rider_by_bib(bib).ok_or(EntryError::UnknownBib(bib))?;
            updates.push((id, seconds));
        }
        for (id, seconds) in updates {
            if let Some(rider) = self.riders.get_mut(id.0) {
                rider.qualifying_time = seconds.min(QUALIFYING_TIME_DEFAULT);
            }
        }

        self.update_seeding();
        Ok(self
            .labels
            .seed(&self.riders, self.starters, self.config.seed_slot_capacity))
    }

    // Heats

    /// Create the next start of an event, `None` when it cannot start.
    ///
    /// Returns the index of the new start.
    ///
    /// # Errors
    ///
    /// [`EntryError::UnknownEvent`] if `at` names no event, and
    /// [`ConfigError::TooManyHeats`] when the event already used up its
    /// decider.
    pub fn advance_heat(
        &mut self,
        at: EventRef,
        randomizer: &mut LaneRandomizer,
    ) -> BracketResult<Option<usize>> {
        let sort_by_bib = self.kind.is_eliminator();
        let Self {
            tournaments,
            labels,
            riders,
            ..
        } = self;
        let event = locate_mut(tournaments, at)?;
        event.advance_heat(Roster::new(labels, riders), sort_by_bib, randomizer)
    }

    /// Run `edit` on one start; rejected edits are logged and leave the start as it was.
    fn edit_start<T>(
        &mut self,
        at: EventRef,
        start: usize,
        edit: impl FnOnce(&mut Start, &[Label], Roster<'_>) -> Result<T, EntryError>,
    ) -> BracketResult<T> {
        let Self {
            tournaments,
            labels,
            riders,
            ..
        } = self;
        let result = locate_mut(tournaments, at).and_then(|event| {
            let (heat, composition) = event
                .start_with_composition(start)
                .ok_or(EntryError::UnknownStart { event: at, start })?;
            edit(heat, composition, Roster::new(labels, riders))
        });
        if let Err(err) = &result {
            warn!("Rejected edit of event {at} start {start}: {err}");
        }
        result.map_err(BracketError::from)
    }

    /// Record the finish order of one start.
    ///
    /// # Arguments
    ///
    /// * `at` - the event
    /// * `start` - index returned by [`Competition::advance_heat`]
    /// * `entries` - bibs in finishing order, each with an optional status
    ///
    /// # Errors
    ///
    /// Unknown event or start, a bib outside the start, a repeated bib, or a
    /// place beyond the field. The start keeps its previous result.
    pub fn record_heat_places(
        &mut self,
        at: EventRef,
        start: usize,
        entries: &[PlaceEntry],
    ) -> BracketResult<()> {
        self.edit_start(at, start, |heat, composition, roster| {
            heat.set_places(entries, composition, roster)
        })
    }

    /// Replace the times of one start, keyed by finishing place.
    ///
    /// # Errors
    ///
    /// [`EntryError::InvalidPlace`] for place 0 or a place beyond the field,
    /// besides the unknown event or start cases.
    pub fn record_heat_times(
        &mut self,
        at: EventRef,
        start: usize,
        times: &[(u32, f64)],
    ) -> BracketResult<()> {
        self.edit_start(at, start, |heat, _, _| heat.set_times(times))
    }

    /// # Errors
    ///
    /// Same as [`Competition::record_heat_places`]; a rejected sequence
    /// leaves the lanes untouched.
    pub fn record_start_positions(
        &mut self,
        at: EventRef,
        start: usize,
        sequence: &[(Bib, Option<NonContinuing>)],
    ) -> BracketResult<()> {
        self.edit_start(at, start, |heat, composition, roster| {
            heat.set_start_positions(sequence, composition, roster)
        })
    }

    /// Fails only for an unknown event or start.
    pub fn set_restart_required(
        &mut self,
        at: EventRef,
        start: usize,
        restart_required: bool,
    ) -> BracketResult<()> {
        self.edit_start(at, start, |heat, _, _| {
            heat.set_restart_required(restart_required);
            Ok(())
        })
    }

    // Resolution

    /// Resolve events until a full pass makes no progress.
    ///
    /// Non-continuing reasons are rebuilt from every recorded start first, so
    /// corrected results take effect. Each resolution binds a winner label
    /// that was unbound, so the loop ends after at most one pass per event.
    /// Returns the number of events resolved.
    ///
    /// # Errors
    ///
    /// [`BracketError::LabelRebound`] when a resolution would rebind a label
    /// to someone else. The failing event binds none of its outputs; events
    /// resolved earlier in the call stay resolved.
    pub fn propagate(&mut self) -> BracketResult<usize> {
        self.labels.clear_non_continuing();
        for (_, event) in all_events(&self.tournaments) {
            event.fold_non_continuing(&mut self.labels);
        }

        let mut resolved = 0;
        let mut passes = 0;
        loop {
            passes += 1;
            let mut progress = 0;
            for event in all_events_mut(&mut self.tournaments) {
                if event.propagate(&mut self.labels, &self.riders)? {
                    progress += 1;
                }
            }
            resolved += progress;
            if progress == 0 {
                break;
            }
        }

        info!("Propagation resolved {resolved} events in {passes} passes");
        Ok(resolved)
    }

    /// Final classification from the current state.
    pub fn results(&self) -> Classification {
        ClassificationRule::for_kind(self.kind).classify(self)
    }

    /// Drop trailing starts without results, left by an interrupted session.
    pub fn fix_hanging_starts(&mut self) -> usize {
        let discarded: usize = all_events_mut(&mut self.tournaments)
            .map(Event::discard_hanging_starts)
            .sum();
        if discarded > 0 {
            warn!("Discarded {discarded} hanging starts");
        }
        discarded
    }

    // Read views

    pub fn startable_events(&self) -> Vec<EventRef> {
        self.events()
            .filter(|(_, event)| event.can_start(&self.labels))
            .map(|(at, _)| at)
            .collect()
    }

    /// Riders bound to `1R..kR`; `None` for open or byed places.
    pub fn winner_chain(&self) -> Vec<Option<RiderId>> {
        (1..=self.starters)
            .map(|k| self.labels.rider(Label::winner_chain(k).as_str()))
            .collect()
    }

    /// (relegations, warnings) collected by `bib` up to event `at`.
    ///
    /// With `before`, event `at` itself is not counted.
    pub fn relegations_warnings(&self, bib: Bib, at: EventRef, before: bool) -> (usize, usize) {
        let roster = self.roster();
        let mut relegations = 0;
        let mut warnings = 0;
        for (current, event) in self.events() {
            if before && current == at {
                break;
            }
            for label in event.composition() {
                if roster.bib(label.as_str()) != Some(bib) {
                    continue;
                }
                for start in event.starts() {
                    relegations += usize::from(start.is_relegated(label.as_str()));
                    warnings += usize::from(start.is_warned(label.as_str()));
                }
            }
            if current == at {
                break;
            }
        }
        (relegations, warnings)
    }

    /// Text form such as `2 Warn,1 Rel`; empty when clean.
    pub fn relegations_warnings_text(&self, bib: Bib, at: EventRef, before: bool) -> String {
        let (relegations, warnings) = self.relegations_warnings(bib, at, before);
        let mut parts = Vec::new();
        if warnings > 0 {
            parts.push(format!("{warnings} Warn"));
        }
        if relegations > 0 {
            parts.push(format!("{relegations} Rel"));
        }
        parts.join(",")
    }

    /// Estimated seconds for the bracket itself; `None` for eliminators.
    pub fn competition_time(&self) -> Option<f64> {
        if self.kind.is_eliminator() {
            return None;
        }
        self.tournaments
            .iter()
            .map(|tournament| tournament.competition_time(self.kind, &self.config))
            .sum()
    }

    /// Estimated seconds for the qualifying time trial; `None` for eliminators.
    pub fn qualifying_time_secs(&self) -> Option<f64> {
        (!self.kind.is_eliminator())
            .then(|| self.riders.len() as f64 * self.config.sprint_qualifying_secs)
    }

    pub fn estimated_duration_secs(&self) -> Option<f64> {
        Some(self.competition_time()? + self.qualifying_time_secs()?)
    }

    /// Riders still in contention for an event.
    pub fn event_entrants(&self, at: EventRef) -> Option<Vec<&Rider>> {
        self.event(at)
            .map(|event| event.composition_riders(self.roster()))
    }

    pub fn event_outputs(&self, at: EventRef) -> Option<Vec<Label>> {
        self.event(at).map(|event| event.out_labels(&self.labels))
    }

    pub fn heat_places(&self, at: EventRef, heat: u8) -> Option<Vec<String>> {
        self.event(at)
            .map(|event| event.heat_places(heat, &self.labels))
    }

    fn system_count(&self, at: EventRef) -> Option<usize> {
        self.tournaments
            .get(at.tournament)
            .map(|tournament| tournament.systems.len())
    }

    fn event_count(&self, at: EventRef) -> Option<usize> {
        self.tournaments
            .get(at.tournament)
            .and_then(|tournament| tournament.systems.get(at.system))
            .map(|system| system.events.len())
    }

    /// Eliminator only: event sits in the second-to-last system.
    pub fn is_semi_final(&self, at: EventRef) -> bool {
        self.kind.is_eliminator()
            && self
                .system_count(at)
                .is_some_and(|count| count >= 2 && at.system == count - 2)
    }

    /// Eliminator only: event sits in the last system.
    pub fn is_final(&self, at: EventRef) -> bool {
        self.kind.is_eliminator()
            && self
                .system_count(at)
                .is_some_and(|count| at.system + 1 == count)
    }

    pub fn is_small_final(&self, at: EventRef) -> bool {
        self.is_final(at)
            && self
                .event_count(at)
                .is_some_and(|count| count >= 2 && at.event == count - 2)
    }

    pub fn is_big_final(&self, at: EventRef) -> bool {
        self.is_final(at)
            && self
                .event_count(at)
                .is_some_and(|count| at.event + 1 == count)
    }
}
