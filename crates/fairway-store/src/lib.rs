// SQLite persistence for league results and derived standings.

pub mod db;

pub use db::{Database, PendingHandicap, WeekCommit};
