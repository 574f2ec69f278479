// Library root: the pure handicap and scoring engine.
//
// Nothing in this crate performs I/O. Every entry point takes its inputs as
// borrowed, immutable values and returns freshly built outputs.

pub mod course;
pub mod error;
pub mod handicap;
pub mod leaderboard;
pub mod model;
pub mod scoring;

pub use error::{MatchupError, ScorecardError, SettingsError};
pub use model::TeamId;

/// Points available in every matchup. Non-forfeit splits always sum to this.
pub const TOTAL_POINTS: u32 = 20;
