use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use freehold::{
    catalog::{Catalog, CatalogLoader},
    runtime::{spawn_session, SessionHandle, SessionSettings},
    web::{serve, WebConfig},
    world::Position,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Freehold city economy simulator")]
struct Cli {
    /// YAML catalog replacing the built-in building/unit set
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Master seed for the session's random streams
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Serve the HTTP interface instead of running the headless demo
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8420)]
    port: u16,

    /// Headless demo duration in seconds
    #[arg(long, default_value_t = 10)]
    run_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let catalog = match &cli.catalog {
        Some(path) => CatalogLoader::new(".").load(path)?,
        None => Catalog::standard(),
    };
    let handle = spawn_session(SessionSettings::new(catalog, cli.seed));

    if cli.serve {
        serve(
            WebConfig {
                host: cli.host,
                port: cli.port,
            },
            handle,
        )
        .await
    } else {
        run_demo(handle, cli.run_secs).await
    }
}

/// Place a small starter city, train one warrior, and let the periodic
/// systems run for a while before reporting the final state.
async fn run_demo(handle: SessionHandle, run_secs: u64) -> Result<()> {
    handle
        .place_building("farm", Position::new(400.0, 300.0))
        .await?;
    handle
        .place_building("mine", Position::new(600.0, 300.0))
        .await?;
    handle
        .place_building("market", Position::new(500.0, 450.0))
        .await?;
    handle
        .place_building("warriorcamp", Position::new(700.0, 500.0))
        .await?;
    handle
        .start_training("warrior", Position::new(720.0, 520.0))
        .await?;

    tokio::time::sleep(Duration::from_secs(run_secs)).await;

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await;
    println!(
        "Session complete: gold {:.1}, happiness {:.1}, food {:.1}, population {}, buildings {}, military {}, deposits {}",
        snapshot.economy.gold,
        snapshot.economy.happiness,
        snapshot.economy.food,
        snapshot.economy.population,
        snapshot.economy.building_count,
        snapshot.economy.military_units,
        snapshot.deposits.len(),
    );
    Ok(())
}
