//! Static floor and room topology.
//!
//! The topology is built once at startup (from configuration or the built-in
//! table) and shared read-only between requests.

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Serialize;
use serde::Serializer;

/// Icon used for rooms without an entry in the icon table.
pub const DEFAULT_ROOM_ICON: &str = "🏠";

/// A named grouping of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Floor {
    #[serde(skip)]
    pub code: String,
    pub name: String,
    pub icon: String,
    pub rooms: Vec<String>,
}

impl Floor {
    pub fn new(code: &str, name: &str, icon: &str, rooms: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            rooms: rooms.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// How entities are associated with a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership<'a> {
    /// Every entity whose id contains the room id.
    NamingConvention,
    /// Exactly the listed entity ids.
    Explicit(&'a BTreeSet<String>),
}

/// Floors in declaration order, serialized as a map of `code -> floor`.
#[derive(Debug, Clone, Copy)]
pub struct Floors<'a>(&'a [Floor]);

impl<'a> Floors<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Floor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Floors<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|f| (f.code.as_str(), f)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    floors: Vec<Floor>,
    room_icons: HashMap<String, String>,
    room_entities: HashMap<String, BTreeSet<String>>,
}

impl Topology {
    /// Create a topology with no room icons and naming-convention membership
    /// for every room.
    pub fn new(floors: Vec<Floor>) -> Self {
        Self {
            floors,
            room_icons: HashMap::new(),
            room_entities: HashMap::new(),
        }
    }

    pub fn with_room_icon(mut self, room: impl Into<String>, icon: impl Into<String>) -> Self {
        self.room_icons.insert(room.into(), icon.into());
        self
    }

    /// Pin a room to an explicit set of entity ids instead of the naming
    /// convention.
    pub fn with_room_entities<I, S>(mut self, room: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.room_entities
            .insert(room.into(), entities.into_iter().map(Into::into).collect());
        self
    }

    pub fn floors(&self) -> Floors<'_> {
        Floors(&self.floors)
    }

    pub fn floor(&self, code: &str) -> Option<&Floor> {
        self.floors.iter().find(|f| f.code == code)
    }

    /// All room ids in floor order, then room order.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.floors
            .iter()
            .flat_map(|f| f.rooms.iter().map(String::as_str))
    }

    pub fn room_icon(&self, room: &str) -> &str {
        self.room_icons
            .get(room)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ROOM_ICON)
    }

    pub fn membership(&self, room: &str) -> Membership<'_> {
        match self.room_entities.get(room) {
            Some(entities) => Membership::Explicit(entities),
            None => Membership::NamingConvention,
        }
    }

    /// Pairs `(shorter, longer)` where `shorter` uses the naming convention and
    /// is a substring of `longer`, so `shorter` also picks up the entities of
    /// `longer`.
    pub fn naming_collisions(&self) -> Vec<(String, String)> {
        let mut seen = BTreeSet::new();
        let rooms: Vec<&str> = self.rooms().filter(|r| seen.insert(*r)).collect();

        let mut collisions = Vec::new();
        for shorter in &rooms {
            if self.membership(shorter) != Membership::NamingConvention {
                continue;
            }
            for longer in &rooms {
                if shorter != longer && longer.contains(shorter) {
                    collisions.push((shorter.to_string(), longer.to_string()));
                }
            }
        }
        collisions
    }
}

impl Default for Topology {
    /// The built-in house layout.
    fn default() -> Self {
        let floors = vec![
            Floor::new(
                "EG",
                "Erdgeschoss",
                "mdi:home",
                &[
                    "wohnzimmer",
                    "buero",
                    "kueche",
                    "eingangsflur",
                    "gaesteklo",
                    "treppe_erdgeschoss",
                ],
            ),
            Floor::new(
                "OG",
                "Obergeschoss",
                "mdi:home-floor-1",
                &["kids", "kinderbad", "flur", "aupair", "schlafzimmer"],
            ),
            Floor::new(
                "Keller",
                "Keller",
                "mdi:stairs-down",
                &[
                    "partykeller",
                    "heizungskeller",
                    "kellerflur",
                    "waschkeller",
                    "serverraum",
                    "buero_keller",
                    "sauna",
                ],
            ),
            Floor::new("Außen", "Außenbereich", "mdi:tree", &["aussen"]),
        ];

        DEFAULT_ROOM_ICONS
            .iter()
            .fold(Topology::new(floors), |t, (room, icon)| {
                t.with_room_icon(*room, *icon)
            })
    }
}

pub(crate) const DEFAULT_ROOM_ICONS: &[(&str, &str)] = &[
    ("wohnzimmer", "🛋️"),
    ("kueche", "🍳"),
    ("buero", "💻"),
    ("eingangsflur", "🚪"),
    ("gaesteklo", "🚽"),
    ("treppe_erdgeschoss", "🪜"),
    ("kids", "🧸"),
    ("kinderbad", "🛁"),
    ("flur", "🚶"),
    ("aupair", "🛏️"),
    ("schlafzimmer", "🛌"),
    ("partykeller", "🎉"),
    ("heizungskeller", "🔥"),
    ("kellerflur", "🚶"),
    ("waschkeller", "👕"),
    ("serverraum", "🖥️"),
    ("buero_keller", "💻"),
    ("sauna", "🧖"),
    ("aussen", "🌳"),
];
