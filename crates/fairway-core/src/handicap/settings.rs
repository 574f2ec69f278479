// Handicap policy settings.
//
// Leagues store their policy as a flat record (one column or TOML key per
// knob). The engine works on `HandicapSettings`, where each optional feature
// is a block that is either fully present or absent, and the score-selection
// mode carries exactly the counts it needs. Conversion from the record is the
// write-time validation step.

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Upper limit on `drop_highest + drop_lowest`.
pub const MAX_COMBINED_DROPS: u32 = 20;

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    Floor,
    /// Nearest integer, halves away from zero.
    Round,
    Ceil,
}

impl RoundingMode {
    pub fn from_str_mode(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "floor" => Some(RoundingMode::Floor),
            "round" => Some(RoundingMode::Round),
            "ceil" => Some(RoundingMode::Ceil),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::Floor => "floor",
            RoundingMode::Round => "round",
            RoundingMode::Ceil => "ceil",
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            RoundingMode::Floor => value.floor(),
            RoundingMode::Round => value.round(),
            RoundingMode::Ceil => value.ceil(),
        }
    }
}

/// Which history entries count toward the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSelection {
    All,
    /// The most recent `count` entries.
    LastN { count: u32 },
    /// The `best_of` lowest nets among the most recent `last_of` entries.
    BestOfLast { best_of: u32, last_of: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropRule {
    pub highest: u32,
    pub lowest: u32,
}

/// Exponential recency weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weighting {
    /// Weight of the most recent qualifying score.
    pub recent: f64,
    /// Fraction each step back loses, in `[0, 1)`.
    pub decay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Provisional {
    pub weeks: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandicapBounds {
    pub min: Option<f64>,
    pub max: f64,
}

impl HandicapBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        let floored = match self.min {
            Some(min) => value.max(min),
            None => value,
        };
        floored.min(self.max)
    }
}

/// A league's validated handicap policy.
#[derive(Debug, Clone, PartialEq)]
pub struct HandicapSettings {
    pub base_score: f64,
    pub multiplier: f64,
    pub rounding: RoundingMode,
    pub default_handicap: f64,
    pub bounds: HandicapBounds,
    pub selection: ScoreSelection,
    pub drop: DropRule,
    pub weighting: Option<Weighting>,
    /// Gross scores above this are clamped to it.
    pub exceptional_cap: Option<f64>,
    pub provisional: Option<Provisional>,
    pub freeze_week: Option<u32>,
    pub trend: Option<Trend>,
    pub require_approval: bool,
}

impl Default for HandicapSettings {
    fn default() -> Self {
        Self {
            base_score: 36.0,
            multiplier: 0.9,
            rounding: RoundingMode::Round,
            default_handicap: 0.0,
            bounds: HandicapBounds { min: None, max: 9.0 },
            selection: ScoreSelection::All,
            drop: DropRule::default(),
            weighting: None,
            exceptional_cap: None,
            provisional: None,
            freeze_week: None,
            trend: None,
            require_approval: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Flat record (stored shape)
// ---------------------------------------------------------------------------

/// Handicap settings as stored in `league.toml` or the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandicapSettingsRecord {
    pub base_score: f64,
    pub multiplier: f64,
    pub rounding: String,
    pub default_handicap: f64,
    pub min_handicap: Option<f64>,
    pub max_handicap: f64,
    pub score_selection: String,
    pub score_count: Option<u32>,
    pub best_of: Option<u32>,
    pub last_of: Option<u32>,
    pub drop_highest: u32,
    pub drop_lowest: u32,
    pub use_weighting: bool,
    pub weight_recent: Option<f64>,
    pub weight_decay: Option<f64>,
    pub cap_exceptional: bool,
    pub exceptional_cap: Option<f64>,
    pub prov_weeks: u32,
    pub prov_multiplier: f64,
    pub freeze_week: Option<u32>,
    pub use_trend: bool,
    pub trend_weight: Option<f64>,
    pub require_approval: bool,
}

impl Default for HandicapSettingsRecord {
    fn default() -> Self {
        HandicapSettingsRecord::from(&HandicapSettings::default())
    }
}

impl From<&HandicapSettings> for HandicapSettingsRecord {
    fn from(s: &HandicapSettings) -> Self {
        let (selection, score_count, best_of, last_of) = match s.selection {
            ScoreSelection::All => ("all", None, None, None),
            ScoreSelection::LastN { count } => ("last_n", Some(count), None, None),
            ScoreSelection::BestOfLast { best_of, last_of } => {
                ("best_of_last", None, Some(best_of), Some(last_of))
            }
        };
        Self {
            base_score: s.base_score,
            multiplier: s.multiplier,
            rounding: s.rounding.as_str().to_string(),
            default_handicap: s.default_handicap,
            min_handicap: s.bounds.min,
            max_handicap: s.bounds.max,
            score_selection: selection.to_string(),
            score_count,
            best_of,
            last_of,
            drop_highest: s.drop.highest,
            drop_lowest: s.drop.lowest,
            use_weighting: s.weighting.is_some(),
            weight_recent: s.weighting.map(|w| w.recent),
            weight_decay: s.weighting.map(|w| w.decay),
            cap_exceptional: s.exceptional_cap.is_some(),
            exceptional_cap: s.exceptional_cap,
            prov_weeks: s.provisional.map_or(0, |p| p.weeks),
            prov_multiplier: s.provisional.map_or(1.0, |p| p.multiplier),
            freeze_week: s.freeze_week,
            use_trend: s.trend.is_some(),
            trend_weight: s.trend.map(|t| t.weight),
            require_approval: s.require_approval,
        }
    }
}

impl TryFrom<HandicapSettingsRecord> for HandicapSettings {
    type Error = SettingsError;

    fn try_from(record: HandicapSettingsRecord) -> Result<Self, Self::Error> {
        record.validate_into()
    }
}

fn require_finite(field: &str, value: f64) -> Result<f64, SettingsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SettingsError::invalid(field, format!("must be a finite number, got {value}")))
    }
}

fn require_positive_count(field: &str, value: Option<u32>, mode: &str) -> Result<u32, SettingsError> {
    match value {
        None => Err(SettingsError::missing(field, &format!("score_selection = \"{mode}\""))),
        Some(0) => Err(SettingsError::invalid(field, "must be at least 1")),
        Some(n) => Ok(n),
    }
}

impl HandicapSettingsRecord {
    fn validate_into(&self) -> Result<HandicapSettings, SettingsError> {
        let base_score = require_finite("base_score", self.base_score)?;
        let multiplier = require_finite("multiplier", self.multiplier)?;
        if multiplier <= 0.0 {
            return Err(SettingsError::invalid(
                "multiplier",
                format!("must be > 0, got {multiplier}"),
            ));
        }

        let rounding = RoundingMode::from_str_mode(&self.rounding).ok_or_else(|| {
            SettingsError::UnknownValue {
                field: "rounding".into(),
                value: self.rounding.clone(),
            }
        })?;

        let default_handicap = require_finite("default_handicap", self.default_handicap)?;
        let max = require_finite("max_handicap", self.max_handicap)?;
        let min = match self.min_handicap {
            Some(min) => Some(require_finite("min_handicap", min)?),
            None => None,
        };
        if let Some(min) = min {
            if min > max {
                return Err(SettingsError::invalid(
                    "min_handicap",
                    format!("must not exceed max_handicap ({min} > {max})"),
                ));
            }
        }

        let mode = self.score_selection.trim().to_ascii_lowercase();
        let selection = match mode.as_str() {
            "all" => ScoreSelection::All,
            "last_n" => ScoreSelection::LastN {
                count: require_positive_count("score_count", self.score_count, "last_n")?,
            },
            "best_of_last" => {
                let best_of = require_positive_count("best_of", self.best_of, "best_of_last")?;
                let last_of = require_positive_count("last_of", self.last_of, "best_of_last")?;
                if best_of > last_of {
                    return Err(SettingsError::invalid(
                        "best_of",
                        format!("must not exceed last_of ({best_of} > {last_of})"),
                    ));
                }
                ScoreSelection::BestOfLast { best_of, last_of }
            }
            _ => {
                return Err(SettingsError::UnknownValue {
                    field: "score_selection".into(),
                    value: self.score_selection.clone(),
                })
            }
        };

        let combined = u64::from(self.drop_highest) + u64::from(self.drop_lowest);
        if combined > u64::from(MAX_COMBINED_DROPS) {
            return Err(SettingsError::invalid(
                "drop_highest",
                format!("drop_highest + drop_lowest must be at most {MAX_COMBINED_DROPS}, got {combined}"),
            ));
        }
        let drop = DropRule {
            highest: self.drop_highest,
            lowest: self.drop_lowest,
        };

        let weighting = if self.use_weighting {
            let recent = self
                .weight_recent
                .ok_or_else(|| SettingsError::missing("weight_recent", "use_weighting = true"))?;
            let decay = self
                .weight_decay
                .ok_or_else(|| SettingsError::missing("weight_decay", "use_weighting = true"))?;
            if require_finite("weight_recent", recent)? <= 0.0 {
                return Err(SettingsError::invalid(
                    "weight_recent",
                    format!("must be > 0, got {recent}"),
                ));
            }
            if !(0.0..1.0).contains(&require_finite("weight_decay", decay)?) {
                return Err(SettingsError::invalid(
                    "weight_decay",
                    format!("must be in [0, 1), got {decay}"),
                ));
            }
            Some(Weighting { recent, decay })
        } else {
            None
        };

        let exceptional_cap = if self.cap_exceptional {
            let cap = self
                .exceptional_cap
                .ok_or_else(|| SettingsError::missing("exceptional_cap", "cap_exceptional = true"))?;
            if require_finite("exceptional_cap", cap)? <= 0.0 {
                return Err(SettingsError::invalid(
                    "exceptional_cap",
                    format!("must be > 0, got {cap}"),
                ));
            }
            Some(cap)
        } else {
            None
        };

        let provisional = if self.prov_weeks > 0 {
            let multiplier = require_finite("prov_multiplier", self.prov_multiplier)?;
            if multiplier < 0.0 {
                return Err(SettingsError::invalid(
                    "prov_multiplier",
                    format!("must be >= 0, got {multiplier}"),
                ));
            }
            Some(Provisional {
                weeks: self.prov_weeks,
                multiplier,
            })
        } else {
            None
        };

        if self.freeze_week == Some(0) {
            return Err(SettingsError::invalid("freeze_week", "weeks start at 1"));
        }

        let trend = if self.use_trend {
            let weight = self
                .trend_weight
                .ok_or_else(|| SettingsError::missing("trend_weight", "use_trend = true"))?;
            if require_finite("trend_weight", weight)? < 0.0 {
                return Err(SettingsError::invalid(
                    "trend_weight",
                    format!("must be >= 0, got {weight}"),
                ));
            }
            Some(Trend { weight })
        } else {
            None
        };

        Ok(HandicapSettings {
            base_score,
            multiplier,
            rounding,
            default_handicap,
            bounds: HandicapBounds { min, max },
            selection,
            drop,
            weighting,
            exceptional_cap,
            provisional,
            freeze_week: self.freeze_week,
            trend,
            require_approval: self.require_approval,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
