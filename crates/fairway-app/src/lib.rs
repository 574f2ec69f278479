// Library root: league configuration, score import, and the weekly workflow
// behind the `fairway` binary. Integration tests drive these modules directly.

pub mod config;
pub mod import;
pub mod week;
