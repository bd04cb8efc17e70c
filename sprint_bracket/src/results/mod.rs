//! Final classification.
//!
//! Two ranking rules exist: sprint and Keirin brackets rank riders by the
//! `{k}R` winner-chain labels, eliminator brackets rank them by the round in
//! which they went out.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

use crate::bracket::competition::Competition;
use crate::bracket::models::CompetitionKind;
use crate::labels::NonContinuing;
use crate::rider::{OPEN_QUALIFYING_TIME, RiderId};

pub mod eliminator;
pub mod sprint;

pub use eliminator::EliminatorRounds;
pub use sprint::SprintLadder;

/// Classification column of a result row.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Placing {
    Rank(usize),
    Status(NonContinuing),
}

impl fmt::Display for Placing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placing::Rank(rank) => write!(f, "{rank}"),
            Placing::Status(status) => write!(f, "{status}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClassificationRow {
    pub placing: Placing,
    /// `None` for a place nobody can fill yet
    pub rider: Option<RiderId>,
}

/// Result rows plus the riders classified outside them.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Classification {
    pub rows: Vec<ClassificationRow>,
    pub dnfs: Vec<RiderId>,
    pub dqs: Vec<RiderId>,
}

impl Classification {
    /// Riders with a numeric rank, in order.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, RiderId)> + '_ {
        self.rows.iter().filter_map(|row| match (row.placing, row.rider) {
            (Placing::Rank(rank), Some(rider)) => Some((rank, rider)),
            _ => None,
        })
    }

    /// Every rider mentioned anywhere in the classification.
    pub fn riders(&self) -> impl Iterator<Item = RiderId> + '_ {
        self.rows
            .iter()
            .filter_map(|row| row.rider)
            .chain(self.dnfs.iter().copied())
            .chain(self.dqs.iter().copied())
    }

    pub fn placing_of(&self, rider: RiderId) -> Option<Placing> {
        self.rows
            .iter()
            .find(|row| row.rider == Some(rider))
            .map(|row| row.placing)
    }
}

#[enum_dispatch]
pub trait Classifier {
    fn classify(&self, competition: &Competition) -> Classification;
}

#[enum_dispatch(Classifier)]
#[derive(Clone, Copy, Debug)]
pub enum ClassificationRule {
    SprintLadder,
    EliminatorRounds,
}

impl ClassificationRule {
    pub fn for_kind(kind: CompetitionKind) -> Self {
        if kind.is_eliminator() {
            EliminatorRounds.into()
        } else {
            SprintLadder.into()
        }
    }
}

/// Riders by worst recorded status: DQ beats DNS beats DNF.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RiderStates {
    pub dqs: BTreeSet<RiderId>,
    pub dnss: BTreeSet<RiderId>,
    pub dnfs: BTreeSet<RiderId>,
}

impl RiderStates {
    pub fn collect(competition: &Competition) -> Self {
        let labels = competition.labels();
        let mut states = Self::default();
        let mut dns = BTreeSet::new();
        let mut dnf = BTreeSet::new();
        for (label, reason) in labels.non_continuing_iter() {
            let Some(rider) = labels.rider(label.as_str()) else {
                continue;
            };
            match reason {
                NonContinuing::Dq => {
                    states.dqs.insert(rider);
                }
                NonContinuing::Dns => {
                    dns.insert(rider);
                }
                NonContinuing::Dnf => {
                    dnf.insert(rider);
                }
                NonContinuing::Inside => {}
            }
        }
        states.dnss = &dns - &states.dqs;
        states.dnfs = dnf
            .into_iter()
            .filter(|r| !states.dqs.contains(r) && !states.dnss.contains(r))
            .collect();
        states
    }

    /// Worst status of a rider, `None` for finishers.
    pub fn status(&self, rider: RiderId) -> Option<NonContinuing> {
        if self.dqs.contains(&rider) {
            Some(NonContinuing::Dq)
        } else if self.dnss.contains(&rider) {
            Some(NonContinuing::Dns)
        } else if self.dnfs.contains(&rider) {
            Some(NonContinuing::Dnf)
        } else {
            None
        }
    }

    pub fn abnormal_count(&self) -> usize {
        self.dqs.len() + self.dnss.len() + self.dnfs.len()
    }
}

pub(crate) fn qualifying_time(competition: &Competition, rider: Option<RiderId>) -> f64 {
    rider
        .and_then(|id| competition.rider(id))
        .map_or(OPEN_QUALIFYING_TIME, |r| r.qualifying_time)
}

/// Sort riders by qualifying time, fastest first.
pub(crate) fn by_qualifying_time(
    competition: &Competition,
    riders: impl IntoIterator<Item = RiderId>,
) -> Vec<RiderId> {
    let mut riders: Vec<RiderId> = riders.into_iter().collect();
    riders.sort_by(|a, b| {
        qualifying_time(competition, Some(*a)).total_cmp(&qualifying_time(competition, Some(*b)))
    });
    riders
}

/// Remove up to `count` empty places, then every empty place after the
/// first filled one. Leading empty places stay: they are places still to be
/// decided.
pub(crate) fn purge_placeholders<T>(rows: &mut Vec<(T, Option<RiderId>)>, count: usize) {
    for _ in 0..count {
        match rows.iter().position(|(_, rider)| rider.is_none()) {
            Some(i) => {
                rows.remove(i);
            }
            None => break,
        }
    }
    if let Some(first) = rows.iter().position(|(_, rider)| rider.is_some()) {
        let mut i = first;
        while i < rows.len() {
            if rows[i].1.is_none() {
                rows.remove(i);
            } else {
                i += 1;
            }
        }
    }
}
