//! Round-based classification for eliminator (MTB) brackets.

use std::{
    cmp::Reverse,
    collections::BTreeSet,
};

use super::{
    Classification, ClassificationRow, Classifier, Placing, RiderStates, by_qualifying_time,
    purge_placeholders, qualifying_time,
};
use crate::bracket::competition::Competition;
use crate::bracket::models::EventRef;
use crate::labels::{self, Binding, NonContinuing};
use crate::rider::RiderId;

/// Rounds of the last two systems outrank every numbered round.
const SEMI_FINAL_ROUND: u32 = 60;
const SMALL_FINAL_ROUND: u32 = 61;
const BIG_FINAL_ROUND: u32 = 62;

/// Riders are ranked by the round they reached, then by their rank within
/// the event that ended their competition.
///
/// A rider who went out with DNF or DNS keeps that row in the ranking but
/// shows the status instead of a place number, so numbered places count
/// finishers only.
#[derive(Clone, Copy, Debug, Default)]
pub struct EliminatorRounds;

struct Candidate {
    round: u32,
    status: Option<NonContinuing>,
    rank: usize,
    time: f64,
    rider: Option<RiderId>,
}

fn event_round(competition: &Competition, at: EventRef) -> u32 {
    if competition.is_semi_final(at) {
        SEMI_FINAL_ROUND
    } else if competition.is_small_final(at) {
        SMALL_FINAL_ROUND
    } else if competition.is_big_final(at) {
        BIG_FINAL_ROUND
    } else {
        competition
            .event(at)
            .and_then(|event| event.outputs().find_map(|label| label.elimination_round()))
            .unwrap_or(1)
    }
}

impl Classifier for EliminatorRounds {
    fn classify(&self, competition: &Competition) -> Classification {
        let states = RiderStates::collect(competition);
        let mut abnormal = BTreeSet::new();
        let mut candidates = Vec::new();

        for (at, event) in competition.events() {
            let round = event_round(competition, at);
            for (i, label) in event.outputs().enumerate() {
                let rider = match event.finish().get(i).map(|entry| entry.entrant) {
                    Some(Binding::Bye) => continue,
                    Some(Binding::Rider(rider)) => Some(rider),
                    None => None,
                };
                if rider.is_some_and(|r| states.dqs.contains(&r)) {
                    continue;
                }

                let (rank, is_finish) = match label.winner_chain_rank() {
                    Some(rank) => (rank, true),
                    None => (
                        label.trailing_number().unwrap_or(i + 1),
                        label.is_elimination(),
                    ),
                };
                let status = rider.and_then(|r| states.status(r));
                match (status, rider) {
                    (Some(_), Some(rider)) => {
                        abnormal.insert(rider);
                    }
                    _ if !is_finish => continue,
                    _ => {}
                }

                candidates.push(Candidate {
                    round,
                    status,
                    rank,
                    time: qualifying_time(competition, rider),
                    rider,
                });
            }
        }

        candidates.sort_by(|a, b| {
            (Reverse(a.round), labels::severity(a.status), a.rank)
                .cmp(&(Reverse(b.round), labels::severity(b.status), b.rank))
                .then(a.time.total_cmp(&b.time))
        });

        let mut rows: Vec<(Option<NonContinuing>, Option<RiderId>)> =
            candidates.into_iter().map(|c| (c.status, c.rider)).collect();
        purge_placeholders(&mut rows, abnormal.len());

        let mut seen = BTreeSet::new();
        rows.retain(|(_, rider)| rider.is_none_or(|r| seen.insert(r)));

        let dnfs = by_qualifying_time(
            competition,
            states
                .dnfs
                .iter()
                .chain(states.dnss.iter())
                .copied()
                .filter(|r| !seen.contains(r)),
        );

        // Only finishers take a numbered place
        let mut rank = 0;
        Classification {
            rows: rows
                .into_iter()
                .map(|(status, rider)| ClassificationRow {
                    placing: status.map_or_else(
                        || {
                            rank += 1;
                            Placing::Rank(rank)
                        },
                        Placing::Status,
                    ),
                    rider,
                })
                .collect(),
            dnfs,
            dqs: by_qualifying_time(competition, states.dqs.iter().copied()),
        }
    }
}
