//! Saving and restoring competition state.
//!
//! JSON is meant for files people may inspect; the binary form is compact
//! and uses the standard bincode configuration. Both decoders re-run the
//! construction checks before handing the competition back.

use bincode::config;
use bincode::serde::{decode_from_slice, encode_to_vec};
use log::debug;
use thiserror::Error;

use crate::bracket::competition::Competition;
use crate::bracket::errors::ConfigError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Invalid JSON snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode snapshot: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Decoded fine, but the bracket does not hold together
    #[error("Snapshot rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("{0} trailing bytes after snapshot")]
    TrailingBytes(usize),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

pub fn to_json(competition: &Competition) -> SnapshotResult<String> {
    Ok(serde_json::to_string_pretty(competition)?)
}

pub fn from_json(json: &str) -> SnapshotResult<Competition> {
    let competition: Competition = serde_json::from_str(json)?;
    competition.validate()?;
    debug!("Restored \"{}\" from JSON", competition.name());
    Ok(competition)
}

pub fn to_bytes(competition: &Competition) -> SnapshotResult<Vec<u8>> {
    Ok(encode_to_vec(competition, config::standard())?)
}

pub fn from_bytes(bytes: &[u8]) -> SnapshotResult<Competition> {
    let (competition, read): (Competition, usize) = decode_from_slice(bytes, config::standard())?;
    if read != bytes.len() {
        return Err(SnapshotError::TrailingBytes(bytes.len() - read));
    }
    competition.validate()?;
    debug!("Restored \"{}\" from {read} bytes", competition.name());
    Ok(competition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::CompetitionFormat;
    use crate::rider::Rider;

    fn competition() -> Competition {
        let format: CompetitionFormat = serde_json::from_str(
            r#"{
                "name": "Sprint 2",
                "tournaments": [{ "systems": [
                    { "name": "Final", "events": [{ "rule": "N1 N2 -> 1R 2R", "heats": 3 }] }
                ]}]
            }"#,
        )
        .unwrap();
        let mut competition = format.build().unwrap();
        competition
            .add_rider(Rider::new(4).with_name("Ada", "Lind").with_qualifying_time(10.2))
            .unwrap();
        competition
            .add_rider(Rider::new(7).with_qualifying_time(10.4))
            .unwrap();
        competition.seed_qualifying_times(&[]).unwrap();
        competition
    }

    #[test]
    fn test_json_restores_state() {
        let competition = competition();
        let json = to_json(&competition).unwrap();
        assert!(json.contains("N1 N2 -> 1R 2R"));
        assert_eq!(from_json(&json).unwrap(), competition);
    }

    #[test]
    fn test_bytes_restore_state() {
        let competition = competition();
        let bytes = to_bytes(&competition).unwrap();
        assert_eq!(from_bytes(&bytes).unwrap(), competition);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = to_bytes(&competition()).unwrap();
        bytes.push(0);
        assert!(matches!(
            from_bytes(&bytes),
            Err(SnapshotError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_malformed_rule_rejected() {
        let json = to_json(&competition()).unwrap().replace("N1 N2 -> 1R 2R", "N1 N2 1R 2R");
        assert!(matches!(from_json(&json), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_tampered_bracket_rejected() {
        let json = to_json(&competition())
            .unwrap()
            .replace("\"starters\": 2", "\"starters\": 3");
        assert!(matches!(
            from_json(&json),
            Err(SnapshotError::Config(ConfigError::Invalid { .. }))
        ));
    }
}
