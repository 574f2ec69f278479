// League administration CLI.
//
// Startup sequence:
// 1. Parse arguments
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing (log to file, not terminal)
// 4. Open database, seed league settings
// 5. Run the requested command

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use fairway_app::config::{self, Config, LoggingSection};
use fairway_app::{import, week};
use fairway_core::handicap::HandicapSettingsRecord;
use fairway_core::leaderboard::Leaderboard;
use fairway_core::model::TeamId;
use fairway_store::Database;

#[derive(Parser)]
#[command(name = "fairway")]
#[command(about = "Golf league handicaps, match points, and standings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Which side of the course is in play
    Side {
        #[arg(long)]
        week: u32,
    },
    /// Show each team's computed handicap for a week
    Handicaps {
        #[arg(long)]
        week: u32,
    },
    /// Show suggested points for a week's matchups
    Suggest {
        #[arg(long)]
        week: u32,
    },
    /// Settle and commit a week
    Finalize {
        #[arg(long)]
        week: u32,
    },
    /// Print the standings as of a week
    Leaderboard {
        #[arg(long)]
        week: u32,
    },
    /// Record scores from a CSV file
    ImportScores { path: PathBuf },
    /// Apply a handicap held for approval
    Approve {
        #[arg(long)]
        team: TeamId,
        #[arg(long)]
        week: u32,
    },
    /// List handicaps awaiting approval for a week
    Pending {
        #[arg(long)]
        week: u32,
    },
    /// Add a team, or reset an existing team's handicap
    AddTeam {
        name: String,
        #[arg(long, default_value = "0")]
        handicap: f64,
    },
    /// Pair two teams for a week
    Schedule {
        #[arg(long)]
        week: u32,
        #[arg(long)]
        a: TeamId,
        #[arg(long)]
        b: TeamId,
    },
    /// Override a matchup's points
    SetPoints {
        #[arg(long)]
        matchup: i64,
        #[arg(long)]
        a: u32,
        #[arg(long)]
        b: u32,
    },
    /// Record a forfeit
    Forfeit {
        #[arg(long)]
        matchup: i64,
        #[arg(long)]
        team: TeamId,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config().context("failed to load configuration")?;
    init_tracing(&config.logging)?;
    info!(
        "Config loaded: league={}, play mode {}",
        config.league.name, config.league.play_mode
    );

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);
    seed_settings(&db, &config)?;

    run(cli.command, &db, &config)
}

/// Keep the stored league rules in step with league.toml.
fn seed_settings(db: &Database, config: &Config) -> anyhow::Result<()> {
    db.save_handicap_settings(&HandicapSettingsRecord::from(&config.league.handicap))?;
    db.save_points_rule(&config.league.points)?;
    Ok(())
}

fn run(command: Command, db: &Database, config: &Config) -> anyhow::Result<()> {
    let league = &config.league;
    match command {
        Command::Side { week } => match league.side_for_week(week) {
            Some(side) => println!("Week {week}: {side} nine"),
            None => println!("Week {week}: full 18"),
        },
        Command::Handicaps { week } => {
            println!("{:<4} {:<24} {:>8}  basis", "id", "team", "hcp");
            for th in week::preview_handicaps(db, league, week)? {
                println!(
                    "{:<4} {:<24} {:>8.1}  {:?} ({} scores)",
                    th.team.id,
                    th.team.name,
                    th.computation.value,
                    th.computation.basis,
                    th.computation.scores_used
                );
            }
        }
        Command::Suggest { week } => {
            for s in week::suggest_week(db, league, week)? {
                let m = &s.matchup;
                match s.split {
                    Ok(split) => println!(
                        "#{:<4} {} vs {}: {}-{}",
                        m.id, m.team_a.team_id, m.team_b.team_id, split.a, split.b
                    ),
                    Err(e) => println!("#{:<4} {e}", m.id),
                }
            }
        }
        Command::Finalize { week } => {
            let summary = week::finalize_week(db, league, week)?;
            print_leaderboard(&summary.leaderboard);
            if summary.pending > 0 {
                println!("{} handicaps await approval for week {}", summary.pending, week + 1);
            }
        }
        Command::Leaderboard { week } => print_leaderboard(&week::leaderboard_for(db, week)?),
        Command::ImportScores { path } => {
            let rows = import::load_score_file(&path)?;
            let summary = import::import_rows(db, league, &rows)?;
            println!("Recorded {} scores, skipped {}", summary.recorded, summary.skipped);
        }
        Command::Approve { team, week } => {
            let value = week::approve_handicap(db, team, week)?;
            println!("Team {team} handicap is now {value}");
        }
        Command::Pending { week } => {
            for p in db.load_pending_handicaps(week)? {
                println!("team {:<4} {:>6.1}  {:?}", p.team_id, p.value, p.basis);
            }
        }
        Command::AddTeam { name, handicap } => {
            let id = db.upsert_team(&name, handicap)?;
            println!("Team {name} has id {id}");
        }
        Command::Schedule { week, a, b } => {
            let m = week::schedule_matchup(db, week, a, b)?;
            println!("Matchup #{} scheduled", m.id);
        }
        Command::SetPoints { matchup, a, b } => {
            week::set_matchup_points(db, matchup, a, b)?;
            println!("Matchup #{matchup} set to {a}-{b}");
        }
        Command::Forfeit { matchup, team } => {
            week::record_forfeit(db, matchup, team)?;
            println!("Matchup #{matchup}: team {team} forfeits");
        }
    }
    Ok(())
}

fn print_leaderboard(board: &Leaderboard) {
    println!("Standings after week {}", board.week);
    println!("{:>4} {:<6} {:>6} {:>9} {:>6} {:>6}", "rank", "team", "pts", "W-L-T", "hcp", "move");
    for s in &board.standings {
        let movement = s
            .movement
            .map_or_else(|| "new".to_string(), |m| format!("{:+}", m.rank_change));
        println!(
            "{:>4} {:<6} {:>6} {:>9} {:>6.1} {:>6}",
            s.rank,
            s.team_id,
            s.points,
            s.record(),
            s.handicap,
            movement
        );
    }
}

/// Initialize tracing to log to a file so command output stays clean.
fn init_tracing(logging: &LoggingSection) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join(&logging.dir);
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("fairway.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
