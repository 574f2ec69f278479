// Configuration loading and parsing (league.toml, app.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use fairway_core::course::{resolve_side, PlayMode, Side};
use fairway_core::handicap::{HandicapSettings, HandicapSettingsRecord};
use fairway_core::scoring::points::PointsRule;
use fairway_core::SettingsError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap an engine settings error, qualifying its field with the TOML
    /// table it came from.
    fn from_settings(section: &str, err: SettingsError) -> Self {
        let field = err.field();
        let field = if field.starts_with(section) {
            field.to_string()
        } else {
            format!("{section}.{field}")
        };
        ConfigError::ValidationError {
            field,
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: League,
    pub db_path: String,
    pub logging: LoggingSection,
}

/// A league's rules, resolved from `league.toml` into engine types.
#[derive(Debug, Clone, PartialEq)]
pub struct League {
    pub name: String,
    pub play_mode: PlayMode,
    pub first_week_side: Side,
    pub course_hole_count: usize,
    pub points: PointsRule,
    pub handicap: HandicapSettings,
}

impl League {
    /// Side in play for `week`, or `None` for a full round.
    pub fn side_for_week(&self, week: u32) -> Option<Side> {
        resolve_side(week, self.play_mode, self.first_week_side)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueSection,
    #[serde(default)]
    points: PointsRule,
    #[serde(default)]
    handicap: HandicapSettingsRecord,
}

#[derive(Debug, Clone, Deserialize)]
struct LeagueSection {
    name: String,
    play_mode: String,
    #[serde(default = "default_first_week_side")]
    first_week_side: String,
    #[serde(default = "default_course_hole_count")]
    course_hole_count: usize,
}

fn default_first_week_side() -> String {
    "front".into()
}

fn default_course_hole_count() -> usize {
    18
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    database: DatabaseSection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSection {
    /// Directory for the log file, relative to the working directory.
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_dir() -> String {
    "logs".into()
}

fn default_log_filter() -> String {
    "fairway_app=info,fairway_store=info,fairway_core=info,warn".into()
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/app.toml`, both relative to the given `base_dir`.
///
/// This does not auto-copy defaults. Prefer `load_config()` which handles
/// default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- app.toml ---
    let app_path = config_dir.join("app.toml");
    let app_text = read_file(&app_path)?;
    let app_file: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    let league = validate_league(league_file)?;
    validate_app(&app_file)?;

    Ok(Config {
        league,
        db_path: app_file.database.path,
        logging: app_file.logging,
    })
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the league directory or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        if copy_if_absent(&path, &target)? {
            copied.push(target);
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Copy `source` to `target` unless `target` already exists. Returns whether
/// a copy happened. Existing user edits are never overwritten.
fn copy_if_absent(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(mut dest) => {
            let content = std::fs::read(source).map_err(|e| ConfigError::DefaultsCopyError {
                message: format!("failed to read {}: {e}", source.display()),
            })?;
            std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", target.display()),
                }
            })?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_league(file: LeagueFile) -> Result<League, ConfigError> {
    let section = file.league;

    if section.name.trim().is_empty() {
        return Err(ConfigError::invalid("league.name", "must not be empty"));
    }

    let play_mode = PlayMode::from_str_mode(&section.play_mode).ok_or_else(|| {
        ConfigError::invalid(
            "league.play_mode",
            format!(
                "unknown play mode '{}', expected one of full_18, nine_hole_front, \
                 nine_hole_back, nine_hole_alternating",
                section.play_mode
            ),
        )
    })?;

    let first_week_side = Side::from_str_side(&section.first_week_side).ok_or_else(|| {
        ConfigError::invalid(
            "league.first_week_side",
            format!("expected front or back, got '{}'", section.first_week_side),
        )
    })?;

    if section.course_hole_count != 9 && section.course_hole_count != 18 {
        return Err(ConfigError::invalid(
            "league.course_hole_count",
            format!("must be 9 or 18, got {}", section.course_hole_count),
        ));
    }
    let needs_back_nine = matches!(
        play_mode,
        PlayMode::NineHoleBack | PlayMode::NineHoleAlternating
    );
    if section.course_hole_count == 9 && needs_back_nine {
        return Err(ConfigError::invalid(
            "league.play_mode",
            format!("{play_mode} needs a back nine but the course has 9 holes"),
        ));
    }

    file.points
        .validate()
        .map_err(|e| ConfigError::from_settings("points", e))?;

    let handicap = HandicapSettings::try_from(file.handicap)
        .map_err(|e| ConfigError::from_settings("handicap", e))?;

    Ok(League {
        name: section.name,
        play_mode,
        first_week_side,
        course_hole_count: section.course_hole_count,
        points: file.points,
        handicap,
    })
}

fn validate_app(file: &AppFile) -> Result<(), ConfigError> {
    if file.database.path.trim().is_empty() {
        return Err(ConfigError::invalid("database.path", "must not be empty"));
    }
    if file.logging.dir.trim().is_empty() {
        return Err(ConfigError::invalid("logging.dir", "must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
