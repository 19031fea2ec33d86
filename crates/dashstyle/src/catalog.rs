//! Static descriptive tables handed to the dashboard verbatim.

use serde::Serialize;
use serde::Serializer;

/// Display metadata for one sensor category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorType {
    #[serde(skip)]
    pub code: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

/// All known sensor categories, in display order.
///
/// Serializes as a map of `code -> {name, icon}`.
#[derive(Debug, Clone, Copy)]
pub struct SensorTypes(&'static [SensorType]);

impl Serialize for SensorTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|t| (t.code, t)))
    }
}

const fn sensor(code: &'static str, name: &'static str, icon: &'static str) -> SensorType {
    SensorType { code, name, icon }
}

static SENSOR_TYPES: &[SensorType] = &[
    sensor("hoover", "Staubsauger", "mdi:robot-vacuum"),
    sensor("temperature", "Temperatur", "mdi:thermometer"),
    sensor("humidity", "Luftfeuchtigkeit", "mdi:water-percent"),
    sensor("motion", "Bewegung", "mdi:motion-sensor"),
    sensor("door", "Tür", "mdi:door"),
    sensor("window", "Fenster", "mdi:window-open"),
    sensor("light", "Licht", "mdi:lightbulb"),
    sensor("switch", "Schalter", "mdi:toggle-switch"),
    sensor("cover", "Rollladen", "mdi:window-shutter"),
    sensor("climate", "Heizung", "mdi:thermostat"),
    sensor("media", "Medien", "mdi:play"),
    sensor("security", "Sicherheit", "mdi:shield-home"),
];

pub fn sensor_types() -> SensorTypes {
    SensorTypes(SENSOR_TYPES)
}

/// Dashboard color palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub primary_color: &'static str,
    pub accent_color: &'static str,
    pub background_color: &'static str,
    pub card_background_color: &'static str,
    pub text_primary_color: &'static str,
    pub text_secondary_color: &'static str,
    pub active_color: &'static str,
    pub inactive_color: &'static str,
}

pub const DEFAULT_THEME: Theme = Theme {
    primary_color: "#1976d2",
    accent_color: "#ff9800",
    background_color: "#fafafa",
    card_background_color: "#ffffff",
    text_primary_color: "#212121",
    text_secondary_color: "#727272",
    active_color: "#4caf50",
    inactive_color: "#9e9e9e",
};
