//! JSON codec for the target-state table.
//!
//! The file is a JSON array of `[name, state]` pairs, rewritten in full on
//! every tick. Loading is best-effort: a missing or corrupt file starts the
//! scheduler with an empty table instead of failing.

use crate::host::Host;
use crate::target::{Action, TargetState};

/// Encode the table as `[name, state]` pairs.
pub fn encode(table: &[TargetState]) -> Result<String, PersistError> {
    let pairs: Vec<(&str, &TargetState)> = table.iter().map(|s| (s.target.as_str(), s)).collect();
    Ok(serde_json::to_string(&pairs)?)
}

/// Decode and validate a table. Any bad entry rejects the whole file.
pub fn decode(text: &str) -> Result<Vec<TargetState>, PersistError> {
    let pairs: Vec<(String, TargetState)> = serde_json::from_str(text)?;
    pairs.into_iter().map(|(name, state)| rebuild(name, state)).collect()
}

fn rebuild(name: String, mut state: TargetState) -> Result<TargetState, PersistError> {
    if name != state.target {
        return Err(PersistError::InvalidEntry {
            target: name.clone(),
            reason: format!("entry holds state for '{}'", state.target),
        });
    }

    let metrics = [
        ("current_money", state.current_money),
        ("max_money", state.max_money),
        ("current_security", state.current_security),
        ("min_security", state.min_security),
    ];
    for (field, value) in metrics {
        if !value.is_finite() || value < 0.0 {
            return Err(PersistError::InvalidEntry {
                target: name,
                reason: format!("{} is {}", field, value),
            });
        }
    }

    if state.action == Action::None {
        state.threads_needed = 0;
    }
    Ok(state)
}

/// Read the table from the host's file store.
///
/// Never fails: a missing file is a fresh start, a corrupt one is logged
/// and discarded.
pub fn load_state<H>(host: &H, path: &str) -> Vec<TargetState>
where
    H: Host + ?Sized,
{
    let text = match host.read(path) {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Vec::new(),
    };

    match decode(&text) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("discarding state file {}: {}", path, e);
            Vec::new()
        }
    }
}

/// Overwrite the state file with the current table.
pub fn save_state<H>(host: &mut H, path: &str, table: &[TargetState]) -> Result<(), PersistError>
where
    H: Host + ?Sized,
{
    let text = encode(table)?;
    host.write(path, &text);
    Ok(())
}

/// Errors that can occur while encoding or decoding the state table
#[derive(Debug)]
pub enum PersistError {
    Json(serde_json::Error),
    InvalidEntry { target: String, reason: String },
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Json(e)
    }
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Json(e) => write!(f, "JSON error: {}", e),
            PersistError::InvalidEntry { target, reason } => {
                write!(f, "invalid entry for {}: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Json(e) => Some(e),
            PersistError::InvalidEntry { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHost;
    use crate::target::Phase;

    fn state(name: &str) -> TargetState {
        TargetState {
            target: name.to_string(),
            reachable: true,
            current_money: 250_000.0,
            max_money: 1_000_000.0,
            current_security: 12.5,
            min_security: 10.0,
            phase: Phase::Running,
            action: Action::Grow,
            threads_needed: 42,
            monitor_pids: vec![7, 9],
            cycle: Action::Grow,
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut host = MockHost::new("home", 0.0);
        let table = vec![state("n00dles"), state("foodnstuff")];

        save_state(&mut host, "/tmp/state.txt", &table).unwrap();
        let loaded = load_state(&host, "/tmp/state.txt");

        assert_eq!(loaded, table);
    }

    #[test]
    fn layout_is_name_state_pairs() {
        let text = encode(&[state("n00dles")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0][0], "n00dles");
        assert_eq!(value[0][1]["target"], "n00dles");
        assert_eq!(value[0][1]["threads_needed"], 42);
    }

    #[test]
    fn malformed_file_starts_fresh() {
        let mut host = MockHost::new("home", 0.0);
        host.write("/tmp/state.txt", "[[\"n00dles\", {\"target\": ");
        assert!(load_state(&host, "/tmp/state.txt").is_empty());
    }

    #[test]
    fn missing_file_starts_fresh() {
        let host = MockHost::new("home", 0.0);
        assert!(load_state(&host, "/tmp/none.txt").is_empty());
    }

    #[test]
    fn mismatched_name_rejects_file() {
        let mut text = encode(&[state("n00dles")]).unwrap();
        text = text.replacen("[\"n00dles\"", "[\"sigma-cosmetics\"", 1);
        assert!(matches!(decode(&text), Err(PersistError::InvalidEntry { .. })));
    }

    #[test]
    fn negative_metrics_reject_file() {
        let mut bad = state("n00dles");
        bad.max_money = -1.0;
        let text = encode(&[bad]).unwrap();
        assert!(matches!(decode(&text), Err(PersistError::InvalidEntry { .. })));
    }

    #[test]
    fn idle_entries_drop_stale_requirements() {
        let mut idle = state("n00dles");
        idle.action = Action::None;
        let text = encode(&[idle]).unwrap();
        assert_eq!(decode(&text).unwrap()[0].threads_needed, 0);
    }
}
