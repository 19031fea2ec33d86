use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use toml::Spanned;

use super::diagnostics::{
    Diagnostic, Error, LoadError, MergeConflictLocation, MergeError, SourceInfo, Warning,
};
use super::LogLevel;

#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub server: Option<PartialServerConfig>,
    pub home_assistant: Option<PartialHomeAssistantConfig>,
    pub users: Option<HashMap<String, PartialUser>>,
    pub storage: Option<PartialStorageConfig>,
    pub floors: Option<Vec<PartialFloor>>,
    pub rooms: Option<HashMap<String, PartialRoom>>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialServerConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialHomeAssistantConfig {
    pub url: Option<Spanned<String>>,
    pub token: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialUser {
    pub token: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialStorageConfig {
    pub path: Option<Spanned<PathBuf>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialFloor {
    pub code: Spanned<String>,
    pub name: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialRoom {
    pub icon: Option<String>,
    pub entities: Option<Vec<String>>,
}

/// First-wins bookkeeping for merged fields.
#[derive(Default)]
struct Claims {
    locations: HashMap<String, MergeConflictLocation>,
}

impl Claims {
    /// Record a definition of `field_path`.
    ///
    /// Returns false and reports a merge conflict when an earlier file already
    /// defined the field; the earlier value is kept.
    fn claim(
        &mut self,
        field_path: String,
        location: MergeConflictLocation,
        message: String,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        if let Some(prev) = self.locations.get(&field_path) {
            diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path,
                message,
                conflicts: vec![prev.clone(), location],
            })));
            false
        } else {
            self.locations.insert(field_path, location);
            true
        }
    }
}

/// Span of a `[header]` line in `content`, for tables without a spanned key.
fn header_span(content: &str, header: &str) -> Range<usize> {
    content
        .find(header)
        .map(|start| start..(start + header.len()))
        .unwrap_or(0..0)
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e,
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution
    ///
    /// Each config file is loaded, then its imports are recursively processed.
    /// Cycle detection prevents infinite loops. A file reached more than once
    /// (a shared import, or a file both passed and imported) is loaded once,
    /// at its first position.
    ///
    /// Returns a Vec of all loaded configs in order (imports first, then parent)
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut loaded = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut loaded, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        loaded: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path.clone(),
                cycle: visited.iter().cloned().collect(),
            });
        }

        if loaded.contains(&canonical_path) {
            return Ok(());
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        // Imports first (depth-first), relative to the importing file
        for import in &config.imports {
            let import_path = PathBuf::from(import);
            let resolved = if import_path.is_absolute() {
                import_path
            } else {
                path.parent()
                    .map(|dir| dir.join(&import_path))
                    .unwrap_or(import_path)
            };
            Self::load_recursive(&resolved, visited, loaded, configs)?;
        }

        configs.push(config);
        loaded.insert(canonical_path.clone());

        // Only the current import chain counts towards cycles
        visited.remove(&canonical_path);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.logging.is_none()
            && self.server.is_none()
            && self.home_assistant.is_none()
            && self.users.is_none()
            && self.storage.is_none()
            && self.floors.is_none()
            && self.rooms.is_none()
    }

    /// Merge multiple partial configs with first-wins semantics
    ///
    /// Conflicts (same field defined in multiple configs) are collected as errors
    /// but merging continues to find all conflicts at once.
    ///
    /// Returns (merged, diagnostics) where diagnostics may contain warnings and errors
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut diagnostics = Vec::new();
        let mut imports = Vec::new();
        let mut claims = Claims::default();

        for config in configs {
            imports.extend(config.imports.clone());

            let source_info = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                diagnostics.push(Diagnostic::Warning(Warning::EmptyConfig {
                    file_path: source_info.file_path.clone(),
                }));
            }

            let at = |span: Range<usize>| MergeConflictLocation {
                file_path: source_info.file_path.clone(),
                span,
                content: source_info.content.clone(),
            };

            if let Some(logging) = config.logging {
                let merged = result.logging.get_or_insert_with(Default::default);

                if let Some(level) = logging.level {
                    if claims.claim(
                        "logging.level".to_string(),
                        at(level.span()),
                        "Logging level defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.level = Some(level);
                    }
                }

                if let Some(overrides) = logging.overrides {
                    let merged_overrides = merged.overrides.get_or_insert_with(HashMap::new);
                    for (target, level) in overrides {
                        if claims.claim(
                            format!("logging.overrides.{}", target),
                            at(level.span()),
                            format!(
                                "Logging override for '{}' defined in multiple config files",
                                target
                            ),
                            &mut diagnostics,
                        ) {
                            merged_overrides.insert(target, level);
                        }
                    }
                }
            }

            if let Some(server) = config.server {
                let merged = result.server.get_or_insert_with(Default::default);

                if let Some(listen) = server.listen {
                    if claims.claim(
                        "server.listen".to_string(),
                        at(listen.span()),
                        "Listen address defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.listen = Some(listen);
                    }
                }

                if let Some(port) = server.port {
                    if claims.claim(
                        "server.port".to_string(),
                        at(port.span()),
                        "Port defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.port = Some(port);
                    }
                }
            }

            if let Some(home_assistant) = config.home_assistant {
                let merged = result.home_assistant.get_or_insert_with(Default::default);

                if let Some(url) = home_assistant.url {
                    if claims.claim(
                        "home_assistant.url".to_string(),
                        at(url.span()),
                        "Home Assistant URL defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.url = Some(url);
                    }
                }

                if let Some(token) = home_assistant.token {
                    if claims.claim(
                        "home_assistant.token".to_string(),
                        at(token.span()),
                        "Home Assistant token defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.token = Some(token);
                    }
                }
            }

            if let Some(users) = config.users {
                let merged = result.users.get_or_insert_with(HashMap::new);
                for (name, user) in users {
                    let span = header_span(&source_info.content, &format!("[users.{}]", name));
                    if claims.claim(
                        format!("users.{}", name),
                        at(span),
                        format!("User '{}' defined in multiple config files", name),
                        &mut diagnostics,
                    ) {
                        merged.insert(name, user);
                    }
                }
            }

            if let Some(storage) = config.storage {
                let merged = result.storage.get_or_insert_with(Default::default);

                if let Some(path) = storage.path {
                    if claims.claim(
                        "storage.path".to_string(),
                        at(path.span()),
                        "Storage path defined in multiple config files".to_string(),
                        &mut diagnostics,
                    ) {
                        merged.path = Some(path);
                    }
                }
            }

            if let Some(floors) = config.floors {
                let merged = result.floors.get_or_insert_with(Vec::new);
                for floor in floors {
                    if claims.claim(
                        format!("floors.{}", floor.code.get_ref()),
                        at(floor.code.span()),
                        format!(
                            "Floor '{}' defined more than once",
                            floor.code.get_ref()
                        ),
                        &mut diagnostics,
                    ) {
                        merged.push(floor);
                    }
                }
            }

            if let Some(rooms) = config.rooms {
                let merged = result.rooms.get_or_insert_with(HashMap::new);
                for (room, overrides) in rooms {
                    let span = header_span(&source_info.content, &format!("[rooms.{}]", room));
                    if claims.claim(
                        format!("rooms.{}", room),
                        at(span),
                        format!("Room '{}' defined in multiple config files", room),
                        &mut diagnostics,
                    ) {
                        merged.insert(room, overrides);
                    }
                }
            }
        }

        result.imports = imports;

        (result, diagnostics)
    }
}
