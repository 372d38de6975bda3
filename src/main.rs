use simulation::{run_simulation, SimulationConfig, SimulationError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub mod simulation;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quire=info,warn")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async_main());
}

async fn async_main() {
    if let Err(err) = run_all().await {
        eprintln!("\n✗ Simulation failed: {err}");
        std::process::exit(1);
    }
}

async fn run_all() -> Result<(), SimulationError> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            COLLABORATIVE EDITING SIMULATIONS               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: in-order delivery, no losses
    let stats = run_simulation(SimulationConfig {
        edits: 200,
        reorder_window: 1,
        drop_rate: 0.0,
        ..SimulationConfig::default()
    })
    .await?;
    stats.print();

    // Test 2: shuffled delivery
    let stats = run_simulation(SimulationConfig::default()).await?;
    stats.print();

    // Test 3: heavy shuffling with losses
    let stats = run_simulation(SimulationConfig {
        edits: 2000,
        reorder_window: 32,
        drop_rate: 0.05,
        gap_timeout: Duration::from_millis(10),
        collaborators: 8,
        seed: None,
    })
    .await?;
    stats.print();

    println!("\n✓ All simulations completed successfully!");
    Ok(())
}
