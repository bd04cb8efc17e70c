//! Random heat results for driving a bracket without a results sheet.

use log::debug;
use sprint_bracket::{
    Bib, BracketResult, Competition, EventRef, LaneRandomizer, PlaceEntry, bracket::MAX_HEATS,
};

/// Ride the next heat of `at` with a random finish order.
///
/// In the last heat an event allows, a rider who already won a heat is put
/// in front so the event is decided. Returns the start index, or `None`
/// when the event cannot start.
pub fn ride_heat(
    competition: &mut Competition,
    at: EventRef,
    randomizer: &mut LaneRandomizer,
) -> BracketResult<Option<usize>> {
    let Some(start) = competition.advance_heat(at, randomizer)? else {
        return Ok(None);
    };

    let mut order: Vec<Bib> = competition
        .event_entrants(at)
        .unwrap_or_default()
        .iter()
        .map(|rider| rider.bib)
        .collect();
    randomizer.draw_lots(&mut order);

    if let Some(winner) = previous_winner(competition, at, start) {
        order.retain(|bib| *bib != winner);
        order.insert(0, winner);
    }

    debug!("Simulated event {at} start {start}: {order:?}");
    let entries: Vec<PlaceEntry> = order.into_iter().map(PlaceEntry::finisher).collect();
    competition.record_heat_places(at, start, &entries)?;
    Ok(Some(start))
}

/// Earlier heat winner still riding, when `start` is the event's last heat.
fn previous_winner(competition: &Competition, at: EventRef, start: usize) -> Option<Bib> {
    let event = competition.event(at)?;
    let current = event.start(start)?;
    if event.heats_max() < 2 || current.heat() != event.heats_max() {
        return None;
    }
    let roster = competition.roster();
    event.starts()[..start]
        .iter()
        .filter(|s| !s.restart_required())
        .filter_map(|s| s.continuing_positions().first())
        .filter(|label| roster.labels.is_in_contention(label.as_str()))
        .find_map(|label| roster.bib(label.as_str()))
}

/// Ride startable events until none is left, propagating after each heat.
///
/// Returns the number of heats ridden.
pub fn run_to_completion(
    competition: &mut Competition,
    randomizer: &mut LaneRandomizer,
) -> BracketResult<usize> {
    competition.propagate()?;
    let limit = competition.events().count() * MAX_HEATS as usize;
    let mut heats = 0;
    while heats < limit {
        let Some(at) = competition.startable_events().first().copied() else {
            break;
        };
        if ride_heat(competition, at, randomizer)?.is_none() {
            break;
        }
        competition.propagate()?;
        heats += 1;
    }
    Ok(heats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprint_bracket::{CompetitionFormat, Rider};

    fn competition(rule: &str, heats: u8, riders: u32) -> Competition {
        let format: CompetitionFormat = serde_json::from_str(&format!(
            r#"{{ "name": "Keirin", "tournaments": [{{ "systems": [
                {{ "name": "Final", "events": [{{ "rule": "{rule}", "heats": {heats} }}] }}
            ]}}]}}"#
        ))
        .unwrap();
        let mut competition = format.build().unwrap();
        for bib in 1..=riders {
            competition
                .add_rider(Rider::new(bib).with_qualifying_time(10.0 + bib as f64))
                .unwrap();
        }
        competition.seed_qualifying_times(&[]).unwrap();
        competition
    }

    #[test]
    fn test_best_of_three_always_decided() {
        for seed in 0..50 {
            let mut competition = competition("N1 N2 N3 N4 -> 1R 2R 3R 4R", 3, 4);
            let mut randomizer = LaneRandomizer::seeded(seed);
            let heats = run_to_completion(&mut competition, &mut randomizer).unwrap();
            assert!((2..=3).contains(&heats), "seed {seed} rode {heats} heats");
            assert!(competition.labels().is_bound("1R"));
            assert!(competition.startable_events().is_empty());
        }
    }

    #[test]
    fn test_single_heat_event() {
        let mut competition = competition("N1 N2 -> 1R 2R", 1, 2);
        let mut randomizer = LaneRandomizer::seeded(5);
        assert_eq!(run_to_completion(&mut competition, &mut randomizer).unwrap(), 1);
        assert_eq!(competition.results().ranked().count(), 2);
    }

    #[test]
    fn test_ride_heat_on_finished_event() {
        let mut competition = competition("N1 N2 -> 1R 2R", 1, 2);
        let mut randomizer = LaneRandomizer::seeded(5);
        run_to_completion(&mut competition, &mut randomizer).unwrap();
        let at = EventRef::new(0, 0, 0);
        assert_eq!(ride_heat(&mut competition, at, &mut randomizer).unwrap(), None);
    }

    #[test]
    fn test_same_seed_same_results() {
        let run = |seed| {
            let mut competition = competition("N1 N2 N3 N4 -> 1R 2R 3R 4R", 3, 4);
            run_to_completion(&mut competition, &mut LaneRandomizer::seeded(seed)).unwrap();
            competition.winner_chain()
        };
        assert_eq!(run(9), run(9));
    }
}
