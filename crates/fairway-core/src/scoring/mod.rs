// Scoring: net scores, weekly positions, and match points.

pub mod net;
pub mod points;
