//! # Leader Document
//!
//! The persisted state of one tracking session: every active leader keyed
//! by its role tag, plus route-progress counters and timestamps.
//!
//! Updates are merges, never whole-document replacement. A payload
//! overwrites the entries it names and leaves the rest of the mapping
//! untouched, so two leaders reporting independently cannot erase each
//! other. `hasLeader` and `leaderPosition` are recomputed on every
//! mutation and never trusted from a client or from storage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level keys the server computes itself. Client-supplied values for
/// these are dropped from the pass-through map instead of merged.
const SERVER_OWNED_KEYS: [&str; 5] = [
    "hasLeader",
    "lastServerUpdate",
    "timestamp",
    "serverTime",
    "source",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderPosition {
    pub lat: f64,
    pub lng: f64,
    pub leader_type: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderEntry {
    pub position: LeaderPosition,
    #[serde(default)]
    pub stop_index: i64,
    #[serde(default)]
    pub last_update: i64,
}

/// One JSON document per tracking session, merged in place by every
/// update. Unknown top-level fields ride along in `extra` so older
/// clients keep whatever they wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderState {
    pub has_leader: bool,
    pub leaders: HashMap<String, LeaderEntry>,
    pub leader_position: Option<LeaderPosition>,
    pub current_stop_index: i64,
    pub leader_stop_index: i64,
    pub last_update: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_server_update: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial document posted by a leader device. Must carry a legacy
/// `leaderPosition`, a non-empty `leaders` mapping, or both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderUpdatePayload {
    pub leader_position: Option<LeaderPosition>,
    pub leaders: Option<HashMap<String, LeaderEntry>>,
    pub current_stop_index: Option<i64>,
    pub leader_stop_index: Option<i64>,
    pub last_update: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeaderUpdatePayload {
    pub fn carries_leaders(&self) -> bool {
        self.leader_position.is_some()
            || self
                .leaders
                .as_ref()
                .is_some_and(|entries| !entries.is_empty())
    }
}

impl LeaderState {
    /// Zero-value document served before any leader has reported.
    pub fn empty(now_ms: i64) -> Self {
        Self {
            last_update: now_ms,
            ..Self::default()
        }
    }

    /// Merge a partial update into this document.
    ///
    /// Scalars are shallow-merged with the payload winning. Entries in the
    /// payload's `leaders` mapping overwrite the stored entry for the same
    /// id whole; ids the payload does not mention are left alone.
    /// `lastUpdate` moves only when the mapping actually changed,
    /// `lastServerUpdate` on every call.
    pub fn apply_update(&mut self, payload: LeaderUpdatePayload, now_ms: i64) {
        if let Some(index) = payload.current_stop_index {
            self.current_stop_index = index;
        }
        if let Some(index) = payload.leader_stop_index {
            self.leader_stop_index = index;
        }
        if let Some(stamp) = payload.last_update {
            self.last_update = stamp;
        }
        for (key, value) in payload.extra {
            if !SERVER_OWNED_KEYS.contains(&key.as_str()) {
                self.extra.insert(key, value);
            }
        }

        let mut touched = false;

        // Legacy single-leader clients report one position at the top
        // level; fold it into the mapping keyed by its role tag.
        if let Some(position) = payload.leader_position {
            let entry = LeaderEntry {
                stop_index: self.leader_stop_index,
                last_update: now_ms,
                position,
            };
            self.leaders
                .insert(entry.position.leader_type.clone(), entry);
            touched = true;
        }

        if let Some(entries) = payload.leaders {
            touched |= !entries.is_empty();
            self.leaders.extend(entries);
        }

        if touched {
            self.last_update = payload.last_update.unwrap_or(now_ms);
        }
        self.has_leader = !self.leaders.is_empty();
        self.last_server_update = Some(now_ms);
        self.refresh_position();
    }

    /// Delete one leader by id. A missing id is a no-op, not an error.
    pub fn remove_leader(&mut self, leader_type: &str, now_ms: i64) -> bool {
        let removed = self.leaders.remove(leader_type).is_some();
        if removed {
            self.last_update = now_ms;
        }
        self.has_leader = !self.leaders.is_empty();
        self.refresh_position();
        removed
    }

    pub fn active_leaders(&self) -> usize {
        self.leaders.len()
    }

    // leaderPosition mirrors the most recently written entry.
    fn refresh_position(&mut self) {
        self.leader_position = self
            .leaders
            .values()
            .max_by_key(|entry| entry.last_update)
            .map(|entry| entry.position.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{LeaderEntry, LeaderPosition, LeaderState, LeaderUpdatePayload};

    fn entry(leader_type: &str, lat: f64, last_update: i64) -> LeaderEntry {
        LeaderEntry {
            position: LeaderPosition {
                lat,
                lng: -86.9212,
                leader_type: leader_type.to_string(),
                timestamp: last_update,
            },
            stop_index: 0,
            last_update,
        }
    }

    fn payload_for(leader_type: &str, lat: f64, last_update: i64) -> LeaderUpdatePayload {
        LeaderUpdatePayload {
            leaders: Some(HashMap::from([(
                leader_type.to_string(),
                entry(leader_type, lat, last_update),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn disjoint_updates_union() {
        let mut state = LeaderState::empty(0);

        state.apply_update(payload_for("A", 1.0, 10), 10);
        state.apply_update(payload_for("B", 2.0, 20), 20);

        assert_eq!(state.active_leaders(), 2);
        assert_eq!(state.leaders["A"].position.lat, 1.0);
        assert_eq!(state.leaders["B"].position.lat, 2.0);
        assert!(state.has_leader);
    }

    #[test]
    fn same_id_overwrites_whole_entry() {
        let mut state = LeaderState::empty(0);

        state.apply_update(payload_for("A", 1.0, 10), 10);
        state.apply_update(payload_for("A", 3.0, 20), 20);

        assert_eq!(state.active_leaders(), 1);
        assert_eq!(state.leaders["A"].position.lat, 3.0);
        assert_eq!(state.leaders["A"].last_update, 20);
    }

    #[test]
    fn has_leader_tracks_mapping() {
        let mut state = LeaderState::empty(0);
        assert!(!state.has_leader);

        state.apply_update(payload_for("A", 1.0, 10), 10);
        state.apply_update(payload_for("B", 2.0, 20), 20);
        assert!(state.has_leader);

        assert!(state.remove_leader("A", 30));
        assert!(state.has_leader);

        assert!(state.remove_leader("B", 40));
        assert!(!state.has_leader);
        assert!(state.leaders.is_empty());
        assert_eq!(state.leader_position, None);
    }

    #[test]
    fn removing_missing_id_changes_nothing() {
        let mut state = LeaderState::empty(0);
        state.apply_update(payload_for("A", 1.0, 10), 10);

        assert!(!state.remove_leader("B", 50));
        assert_eq!(state.active_leaders(), 1);
        assert_eq!(state.last_update, 10);
        assert!(state.has_leader);
    }

    #[test]
    fn legacy_position_becomes_entry() {
        let mut state = LeaderState::empty(0);

        let payload = LeaderUpdatePayload {
            leader_position: Some(LeaderPosition {
                lat: 4.0,
                lng: 5.0,
                leader_type: "MAIN".to_string(),
                timestamp: 0,
            }),
            ..Default::default()
        };
        state.apply_update(payload, 15);

        assert!(state.has_leader);
        assert_eq!(state.leaders["MAIN"].position.lat, 4.0);
        assert_eq!(state.leaders["MAIN"].last_update, 15);
        assert_eq!(state.last_update, 15);
    }

    #[test]
    fn projection_follows_newest_entry() {
        let mut state = LeaderState::empty(0);

        state.apply_update(payload_for("A", 1.0, 10), 10);
        state.apply_update(payload_for("B", 2.0, 20), 20);

        let position = state.leader_position.as_ref().expect("projection set");
        assert_eq!(position.leader_type, "B");

        state.remove_leader("B", 30);
        let position = state.leader_position.as_ref().expect("projection set");
        assert_eq!(position.leader_type, "A");
    }

    #[test]
    fn payload_timestamp_wins_over_server_clock() {
        let mut state = LeaderState::empty(0);

        let mut payload = payload_for("A", 1.0, 10);
        payload.last_update = Some(777);
        state.apply_update(payload, 999);

        assert_eq!(state.last_update, 777);
        assert_eq!(state.last_server_update, Some(999));
    }

    #[test]
    fn scalars_and_unknown_fields_pass_through() {
        let payload: LeaderUpdatePayload = serde_json::from_value(json!({
            "leaders": {
                "A": { "position": { "lat": 1.0, "lng": 2.0, "leaderType": "A" } }
            },
            "currentStopIndex": 3,
            "leaderStopIndex": 4,
            "routeName": "homecoming",
            "hasLeader": false
        }))
        .expect("payload parses");

        let mut state = LeaderState::empty(0);
        state.apply_update(payload, 50);

        assert_eq!(state.current_stop_index, 3);
        assert_eq!(state.leader_stop_index, 4);
        assert_eq!(state.extra["routeName"], json!("homecoming"));
        // The client's hasLeader is ignored and recomputed.
        assert!(state.has_leader);
        assert!(!state.extra.contains_key("hasLeader"));
    }

    #[test]
    fn empty_payload_carries_nothing() {
        let payload = LeaderUpdatePayload::default();
        assert!(!payload.carries_leaders());

        let payload = LeaderUpdatePayload {
            leaders: Some(HashMap::new()),
            ..Default::default()
        };
        assert!(!payload.carries_leaders());
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut state = LeaderState::empty(5);
        state.apply_update(payload_for("A", 1.0, 10), 10);

        let raw = serde_json::to_string(&state).expect("serializes");
        let parsed: LeaderState = serde_json::from_str(&raw).expect("parses");

        assert_eq!(parsed, state);
        assert!(raw.contains("\"hasLeader\":true"));
        assert!(raw.contains("\"lastServerUpdate\":10"));
    }
}
