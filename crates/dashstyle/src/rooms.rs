//! Room aggregation.
//!
//! Maps the static floor/room topology onto the live entity registry and
//! derives per-room activity counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::host::EntityState;
use crate::host::HostError;
use crate::host::StateReader;
use crate::topology::Membership;
use crate::topology::Topology;

/// Upper bound on entities reported per room.
pub const MAX_ROOM_ENTITIES: usize = 10;

/// Lowercased states that count as "active".
pub const ACTIVE_STATES: &[&str] = &["on", "open", "active", "playing", "home", "heat", "cool"];

/// Per-request view of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub name: String,
    pub id: String,
    pub icon: String,
    /// Display labels, parallel to `entity_ids`.
    pub entities: Vec<String>,
    pub entity_ids: Vec<String>,
    pub active: usize,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomsError {
    #[error("Floor '{0}' not found")]
    UnknownFloor(String),

    #[error("Failed to read entity states: {0}")]
    Host(#[from] HostError),
}

/// Entity states keyed (and therefore ordered) by entity id.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    states: BTreeMap<String, String>,
}

impl StateSnapshot {
    pub fn get(&self, entity_id: &str) -> Option<&str> {
        self.states.get(entity_id).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}

impl FromIterator<EntityState> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = EntityState>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().map(|s| (s.entity_id, s.state)).collect(),
        }
    }
}

/// Summaries for every room on `floor`, in the floor's declared room order.
///
/// The host is queried once and every room is computed from the same
/// snapshot.
pub async fn room_summaries(
    topology: &Topology,
    floor: &str,
    states: &dyn StateReader,
) -> Result<Vec<RoomSummary>, RoomsError> {
    let floor = topology
        .floor(floor)
        .ok_or_else(|| RoomsError::UnknownFloor(floor.to_string()))?;

    let snapshot: StateSnapshot = states.all_states().await?.into_iter().collect();
    tracing::debug!(
        "Summarizing {} rooms on {} against {} entities",
        floor.rooms.len(),
        floor.code,
        snapshot.len()
    );

    Ok(floor
        .rooms
        .iter()
        .map(|room| summarize_room(topology, room, &snapshot))
        .collect())
}

/// Build the summary for a single room.
pub fn summarize_room(topology: &Topology, room: &str, snapshot: &StateSnapshot) -> RoomSummary {
    let mut entity_ids: Vec<String> = match topology.membership(room) {
        Membership::NamingConvention => snapshot
            .ids()
            .filter(|id| id.contains(room))
            .map(str::to_string)
            .collect(),
        Membership::Explicit(entities) => entities
            .iter()
            .filter(|id| snapshot.get(id).is_some())
            .cloned()
            .collect(),
    };

    let combined = format!("binary_sensor.combined_sensor_{}", room);
    if snapshot.get(&combined).is_some() && !entity_ids.contains(&combined) {
        entity_ids.push(combined);
    }

    entity_ids.truncate(MAX_ROOM_ENTITIES);

    let active = entity_ids
        .iter()
        .filter(|id| snapshot.get(id).is_some_and(is_active_state))
        .count();

    RoomSummary {
        name: display_name(room),
        id: room.to_string(),
        icon: topology.room_icon(room).to_string(),
        entities: entity_ids.iter().map(|id| entity_label(id)).collect(),
        total: entity_ids.len(),
        entity_ids,
        active,
    }
}

pub fn is_active_state(state: &str) -> bool {
    let state = state.to_lowercase();
    ACTIVE_STATES.contains(&state.as_str())
}

/// `"living_room"` -> `"Living Room"`
pub fn display_name(id: &str) -> String {
    title_case(&id.replace('_', " "))
}

/// Display label for an entity: its object id after the last `.`.
pub fn entity_label(entity_id: &str) -> String {
    let object_id = entity_id
        .rsplit_once('.')
        .map(|(_, object_id)| object_id)
        .unwrap_or(entity_id);
    display_name(object_id)
}

/// Uppercase the first letter of every word and lowercase the rest, where a
/// word is a run of letters.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("living_room"), "Living Room");
        assert_eq!(display_name("treppe_erdgeschoss"), "Treppe Erdgeschoss");
        assert_eq!(display_name("kueche"), "Kueche");
        assert_eq!(display_name("TV_LIGHT"), "Tv Light");
        assert_eq!(display_name("temp1sensor"), "Temp1Sensor");
    }

    #[test]
    fn test_display_name_is_idempotent() {
        for id in ["living_room", "buero_keller", "Außen", "sensor_2nd_floor"] {
            let once = display_name(id);
            assert_eq!(display_name(&once), once);
        }
    }

    #[test]
    fn test_entity_label() {
        assert_eq!(entity_label("light.kueche_decke"), "Kueche Decke");
        assert_eq!(
            entity_label("binary_sensor.combined_sensor_flur"),
            "Combined Sensor Flur"
        );
        assert_eq!(entity_label("no_domain"), "No Domain");
    }

    #[test]
    fn test_active_state_classification() {
        for state in ["on", "ON", "On", "open", "Active", "playing", "home", "heat", "COOL"] {
            assert!(is_active_state(state), "{} should be active", state);
        }
        for state in ["off", "closed", "", "idle", "unavailable", "not_home", "21.5"] {
            assert!(!is_active_state(state), "{} should not be active", state);
        }
    }

    #[tokio::test]
    async fn test_one_summary_per_room_in_declared_order() {
        let topology = Topology::default();
        let host = MockHost::new();

        for floor in topology.floors().iter() {
            let summaries = room_summaries(&topology, &floor.code, &host).await.unwrap();
            let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
            let expected: Vec<&str> = floor.rooms.iter().map(String::as_str).collect();
            assert_eq!(ids, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_floor() {
        let host = MockHost::with_states(&[("light.kueche", "on")]);
        let result = room_summaries(&Topology::default(), "DG", &host).await;

        match result {
            Err(RoomsError::UnknownFloor(floor)) => assert_eq!(floor, "DG"),
            other => panic!("Expected UnknownFloor, got {:?}", other),
        }
        assert_eq!(host.reads(), 0);
    }

    #[tokio::test]
    async fn test_host_failure() {
        let host = MockHost::failing();
        let result = room_summaries(&Topology::default(), "EG", &host).await;
        assert!(matches!(result, Err(RoomsError::Host(_))));
    }

    #[tokio::test]
    async fn test_room_summary_fields() {
        let host = MockHost::with_states(&[
            ("light.kueche_decke", "on"),
            ("switch.kueche_kaffee", "off"),
            ("cover.kueche_fenster", "Open"),
            ("sensor.kueche_temperatur", "21.5"),
            ("light.wohnzimmer_lampe", "on"),
        ]);
        let summaries = room_summaries(&Topology::default(), "EG", &host).await.unwrap();
        let kueche = summaries.iter().find(|s| s.id == "kueche").unwrap();

        assert_eq!(kueche.name, "Kueche");
        assert_eq!(kueche.icon, "🍳");
        assert_eq!(
            kueche.entity_ids,
            vec![
                "cover.kueche_fenster",
                "light.kueche_decke",
                "sensor.kueche_temperatur",
                "switch.kueche_kaffee",
            ]
        );
        assert_eq!(
            kueche.entities,
            vec!["Kueche Fenster", "Kueche Decke", "Kueche Temperatur", "Kueche Kaffee"]
        );
        assert_eq!(kueche.active, 2);
        assert_eq!(kueche.total, 4);
    }

    #[tokio::test]
    async fn test_room_without_entities() {
        let host = MockHost::with_states(&[("light.kueche_decke", "on")]);
        let summaries = room_summaries(&Topology::default(), "EG", &host).await.unwrap();
        let gaesteklo = summaries.iter().find(|s| s.id == "gaesteklo").unwrap();

        assert!(gaesteklo.entity_ids.is_empty());
        assert!(gaesteklo.entities.is_empty());
        assert_eq!(gaesteklo.active, 0);
        assert_eq!(gaesteklo.total, 0);
    }

    #[tokio::test]
    async fn test_entity_cap_keeps_sorted_prefix() {
        let names: Vec<String> = (0..15).rev().map(|i| format!("light.sauna_{:02}", i)).collect();
        let states: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "on")).collect();
        let host = MockHost::with_states(&states);

        let summaries = room_summaries(&Topology::default(), "Keller", &host).await.unwrap();
        let sauna = summaries.iter().find(|s| s.id == "sauna").unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("light.sauna_{:02}", i)).collect();
        assert_eq!(sauna.entity_ids, expected);
        assert_eq!(sauna.total, MAX_ROOM_ENTITIES);
        assert_eq!(sauna.active, MAX_ROOM_ENTITIES);
    }

    #[tokio::test]
    async fn test_summaries_independent_of_enumeration_order() {
        let states = [
            ("light.flur_decke", "on"),
            ("light.eingangsflur", "off"),
            ("binary_sensor.combined_sensor_flur", "on"),
            ("sensor.kellerflur_temp", "18"),
        ];
        let mut reversed = states;
        reversed.reverse();

        let topology = Topology::default();
        let forward = room_summaries(&topology, "OG", &MockHost::with_states(&states))
            .await
            .unwrap();
        let backward = room_summaries(&topology, "OG", &MockHost::with_states(&reversed))
            .await
            .unwrap();
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn test_combined_sensor_listed_once() {
        let host = MockHost::with_states(&[
            ("binary_sensor.combined_sensor_aussen", "on"),
            ("light.aussen_terrasse", "off"),
        ]);
        let summaries = room_summaries(&Topology::default(), "Außen", &host).await.unwrap();

        assert_eq!(
            summaries[0].entity_ids,
            vec!["binary_sensor.combined_sensor_aussen", "light.aussen_terrasse"]
        );
        assert_eq!(summaries[0].active, 1);
    }

    #[tokio::test]
    async fn test_explicit_membership() {
        let topology = Topology::default().with_room_entities(
            "flur",
            ["light.hallway_ceiling", "switch.missing", "cover.hall_blind"],
        );
        let host = MockHost::with_states(&[
            ("light.hallway_ceiling", "on"),
            ("cover.hall_blind", "closed"),
            ("light.eingangsflur", "on"),
            ("binary_sensor.combined_sensor_flur", "on"),
        ]);

        let summaries = room_summaries(&topology, "OG", &host).await.unwrap();
        let flur = summaries.iter().find(|s| s.id == "flur").unwrap();

        assert_eq!(
            flur.entity_ids,
            vec![
                "cover.hall_blind",
                "light.hallway_ceiling",
                "binary_sensor.combined_sensor_flur",
            ]
        );
        assert_eq!(flur.active, 2);
        assert_eq!(flur.total, 3);
    }

    #[tokio::test]
    async fn test_summary_invariants() {
        let mut names = Vec::new();
        for room in Topology::default().rooms() {
            for i in 0..12 {
                names.push((format!("switch.{}_{}", room, i), if i % 3 == 0 { "on" } else { "off" }));
            }
        }
        let states: Vec<(&str, &str)> = names.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let host = MockHost::with_states(&states);
        let topology = Topology::default();

        for floor in topology.floors().iter() {
            for summary in room_summaries(&topology, &floor.code, &host).await.unwrap() {
                assert_eq!(summary.total, summary.entity_ids.len());
                assert_eq!(summary.entities.len(), summary.entity_ids.len());
                assert!(summary.total <= MAX_ROOM_ENTITIES);
                assert!(summary.active <= summary.total);
            }
        }
    }

    #[test]
    fn test_summary_json() {
        let snapshot: StateSnapshot = [EntityState::new("light.gaesteklo", "on")]
            .into_iter()
            .collect();
        let summary = summarize_room(&Topology::default(), "gaesteklo", &snapshot);
        let json = serde_json::to_string(&summary).unwrap();
        insta::assert_snapshot!(json, @r#"{"name":"Gaesteklo","id":"gaesteklo","icon":"🚽","entities":["Gaesteklo"],"entity_ids":["light.gaesteklo"],"active":1,"total":1}"#);
    }
}
