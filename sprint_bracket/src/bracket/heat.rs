//! Heat lane-order state machine.
//!
//! The state of an event's heat sequence is fully determined by the previous
//! start: its heat number and whether it has to be rerun. Each transition
//! knows how to order the lanes of the next start.
//!
//! ```text
//!            +-------------+
//!   (none) ->| OpeningDraw |--> heat 1, lots drawn
//!            +-------------+
//!   restart ->   Rerun       --> same heat, inside riders first
//!   heat 1  ->   ReverseRide --> heat 2, heat-1 lanes reversed
//!   heat 2  ->   Decider     --> heat 3, carried or redrawn
//!   heat 3  ->   error: no fourth heat
//! ```

use enum_dispatch::enum_dispatch;

use super::errors::ConfigError;
use super::start::Start;
use crate::draw::LaneRandomizer;
use crate::labels::Label;

/// Inputs available to a lane rule.
pub(crate) struct DrawContext<'a> {
    /// Starts already run for the event, oldest first
    pub history: &'a [Start],
    /// Composition labels still in contention
    pub remaining: &'a [Label],
    pub randomizer: &'a mut LaneRandomizer,
}

/// Lane order chosen for a new start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LaneDraw {
    pub lanes: Vec<Label>,
    pub can_draw_lots: bool,
}

#[enum_dispatch]
pub(crate) trait LaneRule {
    /// Heat number of the start being created.
    fn heat(&self) -> u8;

    fn first_start_in_heat(&self) -> bool;

    fn lane_order(&self, ctx: &mut DrawContext<'_>) -> LaneDraw;
}

/// First start of an event: lots are drawn.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpeningDraw;

/// The previous start must be run again.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rerun {
    heat: u8,
}

/// Second heat rides the first heat's lanes in reverse.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReverseRide;

/// Third heat.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decider;

#[enum_dispatch(LaneRule)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum HeatTransition {
    OpeningDraw,
    Rerun,
    ReverseRide,
    Decider,
}

impl HeatTransition {
    /// Transition out of the last start in `history`.
    pub fn after(history: &[Start]) -> Result<Self, ConfigError> {
        let Some(last) = history.last() else {
            return Ok(OpeningDraw.into());
        };
        if last.restart_required() {
            return Ok(Rerun { heat: last.heat() }.into());
        }
        match last.heat() + 1 {
            2 => Ok(ReverseRide.into()),
            3 => Ok(Decider.into()),
            heat => Err(ConfigError::TooManyHeats(heat)),
        }
    }
}

/// `inside` first in recorded order, then `rest` without them.
fn inside_first<'a>(inside: &[Label], rest: impl Iterator<Item = &'a Label>) -> Vec<Label> {
    inside
        .iter()
        .cloned()
        .chain(rest.filter(|label| !inside.contains(*label)).cloned())
        .collect()
}

fn fresh_draw(ctx: &mut DrawContext<'_>) -> LaneDraw {
    let mut lanes = ctx.remaining.to_vec();
    ctx.randomizer.draw_lots(&mut lanes);
    LaneDraw {
        lanes,
        can_draw_lots: true,
    }
}

impl LaneRule for OpeningDraw {
    fn heat(&self) -> u8 {
        1
    }

    fn first_start_in_heat(&self) -> bool {
        true
    }

    fn lane_order(&self, ctx: &mut DrawContext<'_>) -> LaneDraw {
        fresh_draw(ctx)
    }
}

impl LaneRule for Rerun {
    fn heat(&self) -> u8 {
        self.heat
    }

    fn first_start_in_heat(&self) -> bool {
        false
    }

    fn lane_order(&self, ctx: &mut DrawContext<'_>) -> LaneDraw {
        let lanes = match ctx.history.last() {
            Some(last) => inside_first(last.inside(), last.start_positions().iter()),
            None => ctx.remaining.to_vec(),
        };
        LaneDraw {
            lanes,
            can_draw_lots: false,
        }
    }
}

impl LaneRule for ReverseRide {
    fn heat(&self) -> u8 {
        2
    }

    fn first_start_in_heat(&self) -> bool {
        true
    }

    fn lane_order(&self, ctx: &mut DrawContext<'_>) -> LaneDraw {
        let inside = ctx.history.last().map(Start::inside).unwrap_or_default();
        // Reruns of heat 1 do not count; reverse the lanes it was drawn with
        let original = ctx
            .history
            .iter()
            .rev()
            .find(|start| start.first_start_in_heat())
            .map(Start::start_positions)
            .unwrap_or_default();
        LaneDraw {
            lanes: inside_first(inside, original.iter().rev()),
            can_draw_lots: false,
        }
    }
}

impl LaneRule for Decider {
    fn heat(&self) -> u8 {
        3
    }

    fn first_start_in_heat(&self) -> bool {
        true
    }

    fn lane_order(&self, ctx: &mut DrawContext<'_>) -> LaneDraw {
        match ctx.history.last() {
            Some(last) if !last.inside().is_empty() => LaneDraw {
                lanes: inside_first(last.inside(), last.start_positions().iter()),
                can_draw_lots: false,
            },
            _ => fresh_draw(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<Label> {
        names.iter().map(|n| Label::new(*n)).collect()
    }

    fn ctx<'a>(
        history: &'a [Start],
        remaining: &'a [Label],
        randomizer: &'a mut LaneRandomizer,
    ) -> DrawContext<'a> {
        DrawContext {
            history,
            remaining,
            randomizer,
        }
    }

    #[test]
    fn test_transition_sequence() {
        let mut history = Vec::new();
        let first = HeatTransition::after(&history).unwrap();
        assert!(matches!(first, HeatTransition::OpeningDraw(_)));
        assert_eq!(first.heat(), 1);

        history.push(Start::for_test(1, true, labels(&["N1", "N2"])));
        let second = HeatTransition::after(&history).unwrap();
        assert!(matches!(second, HeatTransition::ReverseRide(_)));
        assert_eq!(second.heat(), 2);

        history.push(Start::for_test(2, true, labels(&["N2", "N1"])));
        let third = HeatTransition::after(&history).unwrap();
        assert!(matches!(third, HeatTransition::Decider(_)));
        assert_eq!(third.heat(), 3);

        history.push(Start::for_test(3, true, labels(&["N1", "N2"])));
        assert_eq!(
            HeatTransition::after(&history).unwrap_err(),
            ConfigError::TooManyHeats(4)
        );
    }

    #[test]
    fn test_rerun_keeps_heat_and_puts_inside_first() {
        let mut start = Start::for_test(2, true, labels(&["N1", "N2", "N3"]));
        start.set_restart_required(true);
        start.push_inside(Label::new("N3"));
        let history = vec![start];

        let transition = HeatTransition::after(&history).unwrap();
        assert_eq!(transition.heat(), 2);
        assert!(!transition.first_start_in_heat());

        let mut randomizer = LaneRandomizer::seeded(1);
        let remaining = labels(&["N1", "N2", "N3"]);
        let draw = transition.lane_order(&mut ctx(&history, &remaining, &mut randomizer));
        assert_eq!(draw.lanes, labels(&["N3", "N1", "N2"]));
        assert!(!draw.can_draw_lots);
    }

    #[test]
    fn test_reverse_ride_uses_original_heat_one() {
        let original = Start::for_test(1, true, labels(&["N1", "N2", "N3"]));
        let mut rerun = Start::for_test(1, false, labels(&["N2", "N1", "N3"]));
        rerun.push_inside(Label::new("N1"));
        let history = vec![original, rerun];

        let mut randomizer = LaneRandomizer::seeded(1);
        let remaining = labels(&["N1", "N2", "N3"]);
        let draw = ReverseRide.lane_order(&mut ctx(&history, &remaining, &mut randomizer));
        assert_eq!(draw.lanes, labels(&["N1", "N3", "N2"]));
        assert!(!draw.can_draw_lots);
    }

    #[test]
    fn test_decider_redraws_without_inside() {
        let history = vec![Start::for_test(2, true, labels(&["N2", "N1"]))];
        let mut randomizer = LaneRandomizer::seeded(3);
        let remaining = labels(&["N1", "N2"]);
        let draw = Decider.lane_order(&mut ctx(&history, &remaining, &mut randomizer));

        assert!(draw.can_draw_lots);
        let mut lanes = draw.lanes.clone();
        lanes.sort();
        assert_eq!(lanes, remaining);
    }

    #[test]
    fn test_decider_carries_inside() {
        let mut heat_two = Start::for_test(2, true, labels(&["N2", "N1"]));
        heat_two.push_inside(Label::new("N1"));
        let history = vec![heat_two];
        let mut randomizer = LaneRandomizer::seeded(3);
        let remaining = labels(&["N1", "N2"]);
        let draw = Decider.lane_order(&mut ctx(&history, &remaining, &mut randomizer));

        assert_eq!(draw.lanes, labels(&["N1", "N2"]));
        assert!(!draw.can_draw_lots);
    }
}
