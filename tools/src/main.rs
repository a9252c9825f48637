//! ladder-runner: headless runner for the ladder core.
//!
//! Usage:
//!   ladder-runner --db ladder.db --data-dir ./data
//!   ladder-runner --db ladder.db --ipc-mode
//!   ladder-runner --db ladder.db --as-of 2026-06-01T00:00:00Z

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ladder_core::{
    clock::LadderClock,
    engine::LadderEngine,
    record::NewMatch,
    store::LadderStore,
    types::{MatchId, PlayerId},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    CreatePlayer { name: String },
    ListPlayers,
    RecordMatch { r#match: NewMatch },
    UpdateMatch { match_id: MatchId, score_a: u32, score_b: u32 },
    DeleteMatch { match_id: MatchId },
    ListMatches,
    Replay,
    King,
    Chemistry {
        #[serde(default)]
        lambda_alpha: Option<f64>,
        #[serde(default)]
        lambda_full: Option<f64>,
    },
    Profile { player_id: PlayerId },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let store = LadderStore::open(db)?;
    store.migrate()?;
    let mut engine = LadderEngine::build(store, data_dir)?;
    if let Some(raw) = flag_value(&args, "--as-of") {
        let as_of = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--as-of expects an RFC 3339 timestamp, got '{raw}'"))?
            .with_timezone(&Utc);
        engine.clock = LadderClock::Fixed(as_of);
    }

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        println!("ladder-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  as of:     {}", engine.clock.now().format("%Y-%m-%d %H:%M UTC"));
        println!();
        print_summary(&engine)?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &LadderEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        // Engine errors are reported per command; the loop keeps going.
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("ipc command failed: {e}");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &LadderEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::CreatePlayer { name } => serde_json::to_value(engine.create_player(&name)?)?,
        IpcCommand::ListPlayers => serde_json::to_value(engine.players()?)?,
        IpcCommand::RecordMatch { r#match } => serde_json::to_value(engine.record_match(r#match)?)?,
        IpcCommand::UpdateMatch { match_id, score_a, score_b } => {
            engine.update_match_score(match_id, score_a, score_b)?;
            serde_json::json!({ "status": "ok", "match_id": match_id })
        }
        IpcCommand::DeleteMatch { match_id } => {
            engine.delete_match(match_id)?;
            serde_json::json!({ "status": "ok", "deleted_match_id": match_id })
        }
        IpcCommand::ListMatches => serde_json::to_value(engine.list_matches()?)?,
        IpcCommand::Replay => serde_json::to_value(engine.replay_full_history()?)?,
        IpcCommand::King => match engine.current_king()? {
            Some(king) => serde_json::to_value(king)?,
            None => serde_json::json!({ "king": null }),
        },
        IpcCommand::Chemistry { lambda_alpha, lambda_full } => {
            let chem = &engine.config.chemistry;
            let rows = engine.recompute_chemistry(
                lambda_alpha.unwrap_or(chem.lambda_alpha),
                lambda_full.unwrap_or(chem.lambda_full),
            )?;
            serde_json::to_value(rows)?
        }
        IpcCommand::Profile { player_id } => serde_json::to_value(engine.player_profile(player_id)?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_summary(engine: &LadderEngine) -> Result<()> {
    let mut players = engine.players()?;
    players.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));

    println!("=== LEADERBOARD ===");
    if players.is_empty() {
        println!("  (no players yet)");
    }
    for (rank, p) in players.iter().enumerate() {
        println!(
            "  {:>2}. {:<20} {:>5}  crowns: {}",
            rank + 1,
            p.name,
            p.rating,
            p.crowns_collected
        );
    }

    println!();
    println!("=== THRONE ===");
    match engine.current_king()? {
        None => println!("  (vacant)"),
        Some(king) => {
            println!(
                "  {} {} ({}) for {} days{}",
                king.title,
                king.name,
                king.rating,
                king.days,
                if king.eligible { ", crown eligible" } else { "" }
            );
            for r in &king.reigns {
                println!(
                    "    player {:>3}  {} -> {}  {:>3} days{}{}",
                    r.king_id,
                    r.start.format("%Y-%m-%d"),
                    r.end.format("%Y-%m-%d"),
                    r.days,
                    if r.earned_crown { "  crown" } else { "" },
                    if r.open { "  (current)" } else { "" }
                );
            }
        }
    }

    println!();
    println!("=== CHEMISTRY (top 5 by beta) ===");
    let mut rows = engine.pair_chemistry()?;
    if rows.is_empty() {
        println!("  (no doubles chemistry yet)");
    }
    rows.sort_by(|a, b| b.beta_chemistry.total_cmp(&a.beta_chemistry));
    for r in rows.iter().take(5) {
        println!(
            "  {:>3} + {:<3} games: {:>3}  beta: {:+.4}  uplift: {:+.3} / {:+.3}",
            r.player_id_a,
            r.player_id_b,
            r.games_together,
            r.beta_chemistry,
            r.uplift_a_given_b,
            r.uplift_b_given_a
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
