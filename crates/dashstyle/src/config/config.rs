use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

use super::diagnostics::{format_diagnostics, Diagnostic, Error, LoadError, ValidationError, Warning};
use super::partial::{PartialConfig, PartialFloor, PartialRoom};
use crate::topology::{Floor, Topology, DEFAULT_ROOM_ICONS};

const DEFAULT_LISTEN: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8099;
const DEFAULT_FLOOR_ICON: &str = "mdi:home";

#[derive(Debug)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub home_assistant: HomeAssistantConfig,
    pub users: HashMap<String, UserConfig>,
    pub storage: StorageConfig,
    pub topology: Topology,
}

// LogLevel needs Deserialize because it's used in PartialLoggingConfig with toml::Spanned
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"dashstyle::api" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Connection to the Home Assistant REST API
#[derive(Clone)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://homeassistant.local:8123`
    pub url: String,

    /// Long-lived access token
    pub token: String,
}

impl std::fmt::Debug for HomeAssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A dashboard user, identified by bearer token
#[derive(Clone)]
pub struct UserConfig {
    pub token: String,
    pub admin: bool,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("token", &"<redacted>")
            .field("admin", &self.admin)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Where saved dashboard configuration is written; unset means saves are
    /// discarded
    pub path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Rendered diagnostics
    #[error("{0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from one or more TOML files with import resolution
    ///
    /// Returns the config together with any warnings. Fails if a file can't be
    /// loaded or if merging and validation produced any errors, in which case
    /// the error message is the rendered diagnostics.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let configs = PartialConfig::load_with_imports(paths)?;
        let (partial, diagnostics) = PartialConfig::merge(configs);
        Self::from_partial(partial, diagnostics)
    }

    /// Convert a merged PartialConfig to a Config, validating all fields
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let mut errors = Vec::new();

        let logging = partial
            .logging
            .map(|logging| LoggingConfig {
                level: logging.level.map(|s| *s.get_ref()).unwrap_or_default(),
                overrides: logging
                    .overrides
                    .map(|hm| hm.into_iter().map(|(k, v)| (k, *v.get_ref())).collect())
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let server = partial
            .server
            .map(|server| {
                let defaults = ServerConfig::default();
                ServerConfig {
                    listen: server.listen.map(|s| s.into_inner()).unwrap_or(defaults.listen),
                    port: server.port.map(|s| s.into_inner()).unwrap_or(defaults.port),
                }
            })
            .unwrap_or_default();

        let home_assistant = partial.home_assistant.unwrap_or_default();
        let url = home_assistant
            .url
            .map(|s| s.into_inner())
            .filter(|url| !url.trim().is_empty());
        let token = home_assistant
            .token
            .map(|s| s.into_inner())
            .filter(|token| !token.trim().is_empty());
        if url.is_none() {
            errors.push(ValidationError::new("home_assistant.url", "url is required"));
        }
        if token.is_none() {
            errors.push(ValidationError::new("home_assistant.token", "token is required"));
        }
        let home_assistant = HomeAssistantConfig {
            url: url.unwrap_or_default(),
            token: token.unwrap_or_default(),
        };

        let users = Self::validate_users(partial.users.unwrap_or_default(), &mut errors);

        let storage = StorageConfig {
            path: partial
                .storage
                .and_then(|s| s.path)
                .map(|s| s.into_inner()),
        };

        let topology = Self::build_topology(
            partial.floors,
            partial.rooms.unwrap_or_default(),
            &mut errors,
            &mut diagnostics,
        );

        diagnostics.extend(
            errors
                .into_iter()
                .map(|e| Diagnostic::Error(Error::Validation(e))),
        );

        if diagnostics.iter().any(|d| d.is_error()) {
            return Err(ConfigError::Invalid(format_diagnostics(&diagnostics)));
        }

        let config = Config {
            logging,
            server,
            home_assistant,
            users,
            storage,
            topology,
        };

        Ok((config, diagnostics))
    }

    /// Every user needs a token, and no two users may share one
    fn validate_users(
        partial: HashMap<String, super::partial::PartialUser>,
        errors: &mut Vec<ValidationError>,
    ) -> HashMap<String, UserConfig> {
        let mut names: Vec<&String> = partial.keys().collect();
        names.sort();

        let mut token_owners: HashMap<&str, &str> = HashMap::new();
        let mut users = HashMap::new();
        for name in names {
            let user = &partial[name];
            let Some(token) = user.token.as_deref().filter(|t| !t.trim().is_empty()) else {
                errors.push(ValidationError::new(
                    format!("users.{}.token", name),
                    "token is required",
                ));
                continue;
            };

            if let Some(owner) = token_owners.insert(token, name) {
                errors.push(ValidationError::new(
                    format!("users.{}.token", name),
                    format!("token is already assigned to user '{}'", owner),
                ));
                continue;
            }

            users.insert(
                name.clone(),
                UserConfig {
                    token: token.to_string(),
                    admin: user.admin,
                },
            );
        }

        users
    }

    /// Build the floor/room topology, falling back to the built-in floors when
    /// none are configured
    fn build_topology(
        floors: Option<Vec<PartialFloor>>,
        rooms: HashMap<String, PartialRoom>,
        errors: &mut Vec<ValidationError>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Topology {
        let mut topology = match floors.filter(|f| !f.is_empty()) {
            Some(floors) => {
                let floors = Self::validate_floors(floors, errors);
                DEFAULT_ROOM_ICONS
                    .iter()
                    .fold(Topology::new(floors), |t, (room, icon)| {
                        t.with_room_icon(*room, *icon)
                    })
            }
            None => Topology::default(),
        };

        let mut room_ids: Vec<String> = rooms.keys().cloned().collect();
        room_ids.sort();
        let mut rooms = rooms;
        for room in room_ids {
            let Some(overrides) = rooms.remove(&room) else {
                continue;
            };

            if !topology.rooms().any(|r| r == room) {
                diagnostics.push(Diagnostic::Warning(Warning::UnknownRoom {
                    room: room.clone(),
                }));
            }

            if let Some(icon) = overrides.icon {
                topology = topology.with_room_icon(room.clone(), icon);
            }
            if let Some(entities) = overrides.entities {
                topology = topology.with_room_entities(room, entities);
            }
        }

        diagnostics.extend(topology.naming_collisions().into_iter().map(
            |(room, contained_in)| {
                Diagnostic::Warning(Warning::RoomNameCollision { room, contained_in })
            },
        ));

        topology
    }

    fn validate_floors(
        partial: Vec<PartialFloor>,
        errors: &mut Vec<ValidationError>,
    ) -> Vec<Floor> {
        let mut room_floors: HashMap<String, String> = HashMap::new();
        let mut floors = Vec::new();

        for floor in partial {
            let code = floor.code.into_inner();
            if code.trim().is_empty() {
                errors.push(ValidationError::new("floors", "floor code must not be empty"));
                continue;
            }

            let mut rooms = Vec::new();
            for room in floor.rooms {
                if room.trim().is_empty() {
                    errors.push(ValidationError::new(
                        format!("floors.{}.rooms", code),
                        "room ids must not be empty",
                    ));
                } else if let Some(other) = room_floors.get(&room) {
                    errors.push(ValidationError::new(
                        format!("floors.{}.rooms", code),
                        format!("room '{}' is already on floor '{}'", room, other),
                    ));
                } else {
                    room_floors.insert(room.clone(), code.clone());
                    rooms.push(room);
                }
            }

            floors.push(Floor {
                name: floor.name.unwrap_or_else(|| code.clone()),
                icon: floor.icon.unwrap_or_else(|| DEFAULT_FLOOR_ICON.to_string()),
                code,
                rooms,
            });
        }

        floors
    }
}
