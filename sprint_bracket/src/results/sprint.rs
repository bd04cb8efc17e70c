//! Winner-chain classification for sprint and Keirin brackets.

use std::collections::BTreeSet;

use super::{
    Classification, ClassificationRow, Classifier, Placing, RiderStates, by_qualifying_time,
    purge_placeholders, qualifying_time,
};
use crate::bracket::competition::Competition;
use crate::labels::{Binding, Label, NonContinuing};
use crate::rider::RiderId;

/// Places come from the `{k}R` labels; riders only ranked by a time trial
/// (`TT` labels) fill the remaining places from the back.
#[derive(Clone, Copy, Debug, Default)]
pub struct SprintLadder;

impl Classifier for SprintLadder {
    fn classify(&self, competition: &Competition) -> Classification {
        let states = RiderStates::collect(competition);
        let labels = competition.labels();

        let mut slots: Vec<Option<Binding>> = (1..=competition.starters())
            .map(|k| labels.binding(Label::winner_chain(k).as_str()))
            .collect();

        // Slowest first so the slowest takes the last free place
        let mut time_trial: Vec<RiderId> = labels
            .iter()
            .filter(|(label, _)| label.is_time_trial())
            .filter_map(|(_, binding)| binding.rider())
            .collect();
        time_trial.sort_by(|a, b| {
            qualifying_time(competition, Some(*b))
                .total_cmp(&qualifying_time(competition, Some(*a)))
        });
        let mut free = slots.len();
        for rider in time_trial {
            while free > 0 && slots[free - 1].is_some() {
                free -= 1;
            }
            if free == 0 {
                break;
            }
            free -= 1;
            slots[free] = Some(Binding::Rider(rider));
        }

        let mut seen = BTreeSet::new();
        let mut rows: Vec<(Option<NonContinuing>, Option<RiderId>)> = Vec::new();
        for slot in slots {
            match slot {
                None => rows.push((None, None)),
                Some(Binding::Bye) => {}
                Some(Binding::Rider(rider)) => {
                    if states.status(rider).is_none() && seen.insert(rider) {
                        rows.push((None, Some(rider)));
                    }
                }
            }
        }

        for (status, riders) in [
            (NonContinuing::Dnf, &states.dnfs),
            (NonContinuing::Dns, &states.dnss),
        ] {
            for rider in by_qualifying_time(competition, riders.iter().copied()) {
                rows.push((Some(status), Some(rider)));
            }
        }

        purge_placeholders(&mut rows, states.abnormal_count());

        Classification {
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(p, (status, rider))| ClassificationRow {
                    placing: status.map_or(Placing::Rank(p + 1), Placing::Status),
                    rider,
                })
                .collect(),
            dnfs: Vec::new(),
            dqs: by_qualifying_time(competition, states.dqs.iter().copied()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::event::Event;
    use crate::bracket::models::{EventRef, System, Tournament};
    use crate::bracket::start::PlaceEntry;
    use crate::draw::LaneRandomizer;
    use crate::rider::Rider;

    /// Four riders: a semi pair, a time-trial ranking for the others.
    fn competition(times: &[f64]) -> Competition {
        let mut competition = Competition::new(
            "Sprint",
            vec![Tournament::new(
                "",
                vec![
                    System::new(
                        "Semi",
                        vec![
                            Event::new("N1 N4 -> S1 3TT", 1).unwrap(),
                            Event::new("N2 N3 -> S2 4TT", 1).unwrap(),
                        ],
                    ),
                    System::new("Final", vec![Event::new("S1 S2 -> 1R 2R", 1).unwrap()]),
                ],
            )],
        )
        .unwrap();
        for (i, time) in times.iter().enumerate() {
            competition
                .add_rider(Rider::new(i as u32 + 1).with_qualifying_time(*time))
                .unwrap();
        }
        competition.seed_qualifying_times(&[]).unwrap();
        competition
    }

    fn run(competition: &mut Competition, at: EventRef, entries: &[PlaceEntry]) {
        let mut randomizer = LaneRandomizer::seeded(3);
        let start = competition.advance_heat(at, &mut randomizer).unwrap().unwrap();
        competition.record_heat_places(at, start, entries).unwrap();
        competition.propagate().unwrap();
    }

    #[test]
    fn test_time_trial_losers_fill_from_back() {
        // bibs 1..4 seeded N1..N4
        let mut competition = competition(&[10.0, 10.1, 10.2, 10.3]);
        run(&mut competition, EventRef::new(0, 0, 0), &[PlaceEntry::finisher(1), PlaceEntry::finisher(4)]);
        run(&mut competition, EventRef::new(0, 0, 1), &[PlaceEntry::finisher(3), PlaceEntry::finisher(2)]);
        run(&mut competition, EventRef::new(0, 1, 0), &[PlaceEntry::finisher(3), PlaceEntry::finisher(1)]);

        let results = competition.results();
        let ranked: Vec<(usize, RiderId)> = results.ranked().collect();
        assert_eq!(
            ranked,
            vec![
                (1, RiderId(2)),
                (2, RiderId(0)),
                (3, RiderId(1)),
                (4, RiderId(3)),
            ]
        );
        assert!(results.dnfs.is_empty());
        assert!(results.dqs.is_empty());
    }

    #[test]
    fn test_dq_only_in_dq_bucket() {
        let mut competition = competition(&[10.0, 10.1, 10.2, 10.3]);
        run(
            &mut competition,
            EventRef::new(0, 0, 0),
            &[PlaceEntry::finisher(1), PlaceEntry::with_status(4, NonContinuing::Dq)],
        );
        run(
            &mut competition,
            EventRef::new(0, 0, 1),
            &[PlaceEntry::finisher(2), PlaceEntry::with_status(3, NonContinuing::Dnf)],
        );
        run(&mut competition, EventRef::new(0, 1, 0), &[PlaceEntry::finisher(2), PlaceEntry::finisher(1)]);

        let results = competition.results();
        assert_eq!(results.dqs, vec![RiderId(3)]);
        assert_eq!(results.placing_of(RiderId(3)), None);
        assert_eq!(results.placing_of(RiderId(1)), Some(Placing::Rank(1)));
        assert_eq!(results.placing_of(RiderId(0)), Some(Placing::Rank(2)));
        assert_eq!(
            results.placing_of(RiderId(2)),
            Some(Placing::Status(NonContinuing::Dnf))
        );
        assert_eq!(results.rows.len(), 3);

        let mut everyone: Vec<RiderId> = results.riders().collect();
        everyone.sort();
        assert_eq!(everyone, (0..4).map(RiderId).collect::<Vec<_>>());
    }

    #[test]
    fn test_unfinished_bracket_keeps_leading_gaps() {
        let competition = competition(&[10.0, 10.1, 10.2, 10.3]);
        let results = competition.results();
        assert_eq!(results.rows.len(), 4);
        assert!(results.rows.iter().all(|row| row.rider.is_none()));
        assert_eq!(results.rows[3].placing, Placing::Rank(4));
    }
}
