//! Lane draws for heat starts.

pub mod lane_randomizer;

pub use lane_randomizer::LaneRandomizer;
