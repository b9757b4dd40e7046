//! ceo-sim: determinism harness for the quarter engine.
//!
//! Plays each seed twice with the scripted policy and compares canonical
//! hashes. Seeds come from the command line (default 1..=5).
//!
//!   ceo-sim [SEED ...]
//!
//! `CEO_ENGINE_CONFIG` and `CEO_ENGINE_CONTENT` override the built-in
//! config and content; `RUST_LOG` controls tracing output.

use std::process;

use ceo_engine::autoplay::play_game;
use ceo_engine::config::EngineConfig;
use ceo_engine::content::ContentTables;
use ceo_engine::hashing::canonical_hash;
use ceo_engine::state::{Ending, GameState};
use tracing_subscriber::EnvFilter;

const DEFAULT_SEEDS: std::ops::RangeInclusive<u64> = 1..=5;

fn parse_seeds() -> Result<Vec<u64>, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return Ok(DEFAULT_SEEDS.collect());
    }
    args.iter()
        .map(|a| a.parse::<u64>().map_err(|_| format!("not a seed: {a}")))
        .collect()
}

fn run(seed: u64, content: &ContentTables, config: &EngineConfig) -> Result<(GameState, String), String> {
    let engine = play_game(content.clone(), config.clone(), seed).map_err(|e| e.to_string())?;
    let hash = canonical_hash(engine.state()).map_err(|e| e.to_string())?;
    Ok((engine.state().clone(), hash))
}

fn describe(state: &GameState) -> String {
    let Some(outcome) = &state.outcome else {
        return format!("unfinished at Q{}", state.quarter());
    };
    let ending = match &outcome.ending {
        Ending::Terminated { parachute, .. } => format!("terminated (parachute {parachute})"),
        Ending::Collapsed { meter } => format!("collapsed ({meter})"),
        Ending::Completed => "completed".to_string(),
    };
    let verdict = if outcome.verdict.is_won { "WON" } else { "LOST" };
    format!(
        "Q{} {ending}, objectives {}/{} -> {verdict}",
        outcome.quarter, outcome.verdict.passed, outcome.verdict.required
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let seeds = match parse_seeds() {
        Ok(seeds) => seeds,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(2);
        }
    };
    let config = EngineConfig::load_from_env();
    let content = match ContentTables::load_from_env() {
        Ok(content) => content,
        Err(err) => {
            eprintln!("content: {err}");
            process::exit(2);
        }
    };

    let mut total = 0;
    let mut passed = 0;
    for seed in seeds {
        total += 1;
        let first = run(seed, &content, &config);
        let second = run(seed, &content, &config);
        match (first, second) {
            (Ok((state, h1)), Ok((_, h2))) if h1 == h2 => {
                passed += 1;
                println!("  [PASS] seed={seed} hash={} {}", &h1[..16], describe(&state));
            }
            (Ok((_, h1)), Ok((_, h2))) => {
                println!("  [FAIL] seed={seed} hash mismatch: {h1} vs {h2}");
            }
            (Err(err), _) | (_, Err(err)) => {
                println!("  [FAIL] seed={seed} error: {err}");
            }
        }
    }

    println!("\nResults: {passed}/{total} passed");
    if passed != total {
        process::exit(1);
    }
}
