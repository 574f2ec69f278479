// Handicap engine: league policy settings and the per-team computation.

pub mod engine;
pub mod settings;

pub use engine::{compute_handicap, compute_handicap_detail, HandicapBasis, HandicapComputation};
pub use settings::{HandicapSettings, HandicapSettingsRecord};
