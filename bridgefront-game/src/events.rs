//! Structured, bounded game log.
//!
//! Events carry a mechanical `kind` plus a free-form JSON payload for
//! renderers and debugging. The log keeps only the newest `limit` entries but
//! sequence numbers keep counting so ids stay unique for the whole game.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Stable, deterministic identifier for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Round in which the event occurred (0 during setup).
    pub round: u32,
    /// Game-wide sequence number.
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameCreated,
    SetupAdvanced,
    CapitalChosen,
    BoardBuilt,
    StartingBridgesPlaced,
    StartingCardChosen,
    RoundStarted,
    StudyResolved,
    MarketDealt,
    RollOffRound,
    CardPurchased,
    MarketClosed,
    DeclarationsLocked,
    CardResolved,
    CardFizzled,
    BasicResolved,
    PlayerDone,
    ScoutResolved,
    BattleStarted,
    RetreatExecuted,
    BodyguardRedirect,
    ArmorAbsorbed,
    UnitDestroyed,
    GoldStolen,
    BattleResolved,
    IncomeCollected,
    CollectionResolved,
    ScoreUpdated,
    ModifiersExpired,
    AgeAdvanced,
    GameWon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: EventId,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    entries: VecDeque<GameEvent>,
    limit: usize,
    next_seq: u64,
}

impl EventLog {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, round: u32, kind: EventKind, payload: serde_json::Value) -> EventId {
        let id = EventId {
            round,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.push_back(GameEvent { id, kind, payload });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        id
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &GameEvent> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of events ever pushed, including evicted ones.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.next_seq
    }

    #[must_use]
    pub fn last_of(&self, kind: EventKind) -> Option<&GameEvent> {
        self.entries.iter().rev().find(|event| event.kind == kind)
    }

    #[must_use]
    pub fn count_of(&self, kind: EventKind) -> usize {
        self.entries.iter().filter(|event| event.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded_but_ids_keep_counting() {
        let mut log = EventLog::new(2);
        log.push(1, EventKind::RoundStarted, serde_json::Value::Null);
        log.push(1, EventKind::MarketDealt, serde_json::json!({ "cards": 2 }));
        let id = log.push(2, EventKind::RoundStarted, serde_json::Value::Null);
        assert_eq!(log.len(), 2);
        assert_eq!(log.total(), 3);
        assert_eq!(id, EventId { round: 2, seq: 2 });
        assert_eq!(log.count_of(EventKind::RoundStarted), 1);
        assert_eq!(
            log.last_of(EventKind::MarketDealt).map(|event| event.payload["cards"].clone()),
            Some(serde_json::json!(2))
        );
    }

    #[test]
    fn events_round_trip() {
        let mut log = EventLog::new(5);
        log.push(0, EventKind::GameCreated, serde_json::json!({ "players": 2 }));
        let json = serde_json::to_string(&log).expect("serialize");
        let restored: EventLog = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, log);
    }
}
