use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINNER_COUNT: usize = 1;
pub const DEFAULT_COUNTDOWN_MS: u64 = 3000;

/// A raffle entrant. Hosts pass either names or ticket numbers; the
/// controller never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Participant {
    Number(i64),
    Text(String),
}

impl Participant {
    /// Parses one line of participant input. All-digit lines (with an
    /// optional leading minus) become numbers, anything else stays text.
    pub fn parse_entry(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i64>() {
            Ok(number) => Some(Self::Number(number)),
            Err(_) => Some(Self::Text(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Participant {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Participant {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Participant {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleState {
    pub is_running: bool,
    pub remaining_ms: u64,
    pub winners: Vec<Participant>,
}

impl RaffleState {
    pub fn idle(countdown_ms: u64) -> Self {
        Self {
            is_running: false,
            remaining_ms: countdown_ms,
            winners: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entry_splits_numbers_from_names() {
        assert_eq!(Participant::parse_entry(" 42 "), Some(Participant::Number(42)));
        assert_eq!(Participant::parse_entry("-7"), Some(Participant::Number(-7)));
        assert_eq!(
            Participant::parse_entry("ticket 9"),
            Some(Participant::Text("ticket 9".into()))
        );
        assert_eq!(Participant::parse_entry("   "), None);
    }

    #[test]
    fn participants_deserialize_untagged() {
        let parsed: Vec<Participant> =
            serde_json::from_str(r#"["alice", 7, "8"]"#).expect("participants");
        assert_eq!(
            parsed,
            vec![
                Participant::Text("alice".into()),
                Participant::Number(7),
                Participant::Text("8".into()),
            ]
        );
    }

    #[test]
    fn display_matches_raw_identifier() {
        assert_eq!(Participant::from("bob").to_string(), "bob");
        assert_eq!(Participant::from(12_i64).to_string(), "12");
    }

    #[test]
    fn idle_state_holds_full_countdown() {
        let state = RaffleState::idle(DEFAULT_COUNTDOWN_MS);
        assert!(!state.is_running);
        assert_eq!(state.remaining_ms, 3000);
        assert!(state.winners.is_empty());
    }
}
