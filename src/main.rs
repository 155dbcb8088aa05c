//! Flappy Core command line
//!
//! Manages a data directory (scores and per-slug tuning), serves it as a
//! line-delimited JSON loop, and runs headless autopilot demos.

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::LevelFilter;
use serde_json::{Value, json};

use flappy_core::consts::{LEADERBOARD_SIZE, REFERENCE_FRAME_MS};
use flappy_core::persistence::DataService;
use flappy_core::persistence::scores::parse_score;
use flappy_core::sim::{GameEvent, RunPhase};
use flappy_core::{DecodedSprites, Game, ScoreLedger};

/// Score and config service for the pipe-dodging game
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding scores.jsonl and config/
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Leaderboard operations
    Scores {
        #[command(subcommand)]
        action: ScoresAction,
    },
    /// Tuning documents stored per slug
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Answer JSON requests read line by line from stdin
    Serve,
    /// Play one headless run with the autopilot and record it
    Demo {
        /// Config slug to boot with
        #[arg(long, default_value = "default")]
        slug: String,
        #[arg(long, default_value = "Autopilot")]
        player: String,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Give up after this much simulated time
        #[arg(long, default_value_t = 120)]
        max_seconds: u64,
        /// Board size to fit the tuning to, e.g. 720x1280
        #[arg(long, value_parser = parse_board)]
        board: Option<(f32, f32)>,
    },
}

#[derive(Subcommand)]
enum ScoresAction {
    /// Append one score row
    Add {
        /// Score value (numbers or numeric strings)
        score: String,
        #[arg(long)]
        player: Option<String>,
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        prize_group: Option<String>,
    },
    /// Show the best scores
    Top {
        #[arg(short, long, default_value_t = LEADERBOARD_SIZE)]
        limit: usize,
    },
    /// Position a score would take on the leaderboard
    Rank { score: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { slug: String },
    /// Store a JSON document; `-` reads it from stdin
    Set { slug: String, data: String },
}

fn parse_board(s: &str) -> std::result::Result<(f32, f32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: f32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: f32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if !(w > 0.0 && h > 0.0) {
        return Err("board dimensions must be positive".to_string());
    }
    Ok((w, h))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let env = Env::default().default_filter_or(level.to_string());
    let _ = Builder::from_env(env).target(env_logger::Target::Stderr).try_init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let service = DataService::open(&args.data_dir)
        .with_context(|| format!("opening data directory {}", args.data_dir.display()))?;

    match args.command {
        Command::Scores { action } => run_scores(&service, action),
        Command::Config { action } => run_config(&service, action),
        Command::Serve => serve(&service),
        Command::Demo {
            slug,
            player,
            seed,
            max_seconds,
            board,
        } => demo(&service, &slug, &player, seed, max_seconds, board),
    }
}

fn run_scores(service: &DataService, action: ScoresAction) -> Result<()> {
    match action {
        ScoresAction::Add {
            score,
            player,
            run_id,
            prize_group,
        } => {
            let raw = json!({
                "score": score,
                "player_name": player,
                "run_id": run_id,
                "prize_group": prize_group,
            });
            let row = service.scores().append_raw(&raw).context("appending score")?;
            print_json(&row)
        }
        ScoresAction::Top { limit } => {
            let top = service.scores().top(limit).context("reading leaderboard")?;
            print_json(&json!({ "data": top }))
        }
        ScoresAction::Rank { score } => {
            let position = service
                .scores()
                .rank_for(parse_score(&Value::String(score)))
                .context("ranking score")?;
            print_json(&json!({ "position": position }))
        }
    }
}

fn run_config(service: &DataService, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { slug } => {
            let data = service
                .configs()
                .get(&slug)
                .with_context(|| format!("reading config {slug:?}"))?;
            print_json(&json!({ "data": data }))
        }
        ConfigAction::Set { slug, data } => {
            let text = if data == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).context("reading stdin")?;
                buf
            } else {
                data
            };
            let value: Value = serde_json::from_str(&text).context("config data is not valid JSON")?;
            if !value.is_object() {
                bail!("config data must be a JSON object");
            }
            let doc = service
                .configs()
                .set(&slug, value)
                .with_context(|| format!("writing config {slug:?}"))?;
            print_json(&doc)
        }
    }
}

fn serve(service: &DataService) -> Result<()> {
    log::info!("Serving requests on stdin");
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(stdout, "{}", service.handle_line(&line))?;
        stdout.flush()?;
    }
    Ok(())
}

fn demo(
    service: &DataService,
    slug: &str,
    player: &str,
    seed: u64,
    max_seconds: u64,
    board: Option<(f32, f32)>,
) -> Result<()> {
    let mut game = Game::boot(
        service.configs(),
        slug,
        board,
        DecodedSprites::default(),
        service.ledger(),
        player,
        seed,
    );
    game.set_autopilot(true);

    let frame_ms = f64::from(REFERENCE_FRAME_MS);
    let limit_ms = max_seconds as f64 * 1000.0;
    let mut now = 0.0;
    let mut flaps = 0u64;
    while game.phase() != RunPhase::Terminated {
        now += frame_ms;
        if now > limit_ms {
            let state = game.state();
            log::info!("Demo stopped after {}s without a crash", max_seconds);
            return print_json(&json!({
                "finished": false,
                "score": state.score(),
                "flaps": flaps,
                "simulatedMs": now.round(),
            }));
        }
        for event in game.frame(now) {
            match event {
                GameEvent::Flap => flaps += 1,
                GameEvent::Hit { cause } => log::info!("Hit ({:?}) at {:.0} ms", cause, now),
                _ => {}
            }
        }
    }

    while !game.reports_settled() {
        thread::sleep(Duration::from_millis(5));
        game.poll_reports();
    }
    let Some(view) = game.game_over() else {
        bail!("run ended without a game-over view");
    };
    print_json(&json!({
        "finished": true,
        "run": view.run_number,
        "score": view.score_text,
        "prizeGroup": view.prize_group,
        "ranking": view.rank.to_string(),
        "submitted": view.submitted,
        "flaps": flaps,
        "simulatedMs": now.round(),
    }))
}
