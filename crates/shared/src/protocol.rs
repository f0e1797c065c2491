use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Participant;

/// Outcome of one completed draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub winners: Vec<Participant>,
    pub participant_count: usize,
    pub drawn_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RaffleEvent {
    Started { countdown_ms: u64 },
    Tick { remaining_ms: u64 },
    Finished { record: DrawRecord },
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(RaffleEvent::Tick { remaining_ms: 1000 }).expect("json");
        assert_eq!(json["type"], "tick");
        assert_eq!(json["payload"]["remaining_ms"], 1000);

        let json = serde_json::to_value(RaffleEvent::Reset).expect("json");
        assert_eq!(json["type"], "reset");
    }

    #[test]
    fn draw_record_keeps_mixed_participants() {
        let record = DrawRecord {
            winners: vec![Participant::from("a"), Participant::from(3_i64)],
            participant_count: 4,
            drawn_at: Utc::now(),
        };
        let raw = serde_json::to_string(&record).expect("encode");
        let decoded: DrawRecord = serde_json::from_str(&raw).expect("decode");
        assert_eq!(decoded, record);
    }
}
