use std::error::Error;
use std::time::Duration;

use colony_core::app::ColonyBuilder;
use colony_core::domain::ColonyConfig;
use colony_core::impls::GridWorld;

const DEFAULT_TICKS: u64 = 600;
const TICK_INTERVAL: Duration = Duration::from_millis(20);
const STATUS_EVERY: u64 = 50;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// COLONY_CONFIG があればその JSON を読む（部分的な JSON でもよい）
fn load_config() -> Result<ColonyConfig, Box<dyn Error>> {
    match std::env::var("COLONY_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            tracing::info!(path = %path, "config loaded");
            Ok(ColonyConfig::from_json(&raw)?)
        }
        Err(_) => Ok(ColonyConfig::default()),
    }
}

fn tick_count() -> u64 {
    std::env::var("COLONY_TICKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TICKS)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // (A) 設定と Colony を用意（設定が不正ならここで止まる）
    let config = load_config()?;
    let mut colony = ColonyBuilder::new().config(config).build()?;

    // (B) デモ用の部屋
    let mut world = GridWorld::demo();
    let ticks = tick_count();
    tracing::info!(ticks, "simulation started");

    // (C) tick ループ: Colony が判断し、World が 1 tick 進む
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    for _ in 0..ticks {
        interval.tick().await;
        let report = colony.tick(&mut world);
        world.advance();

        if report.tick % STATUS_EVERY == 0 {
            let status = colony.status();
            tracing::info!(
                tick = status.tick,
                pending = status.tasks.pending,
                in_progress = status.tasks.in_progress,
                units = status.units_by_role.values().sum::<usize>(),
                idle = status.idle_units.len(),
                "colony status"
            );
        }
    }

    // (D) 最終状態を出力
    println!("{}", serde_json::to_string_pretty(&colony.status())?);
    Ok(())
}
