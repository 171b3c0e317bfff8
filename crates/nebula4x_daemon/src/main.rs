mod alerts;
mod analytics;
mod routes;
mod state;
mod tick_loop;

use analytics::MetricsFileWriter;
use routes::make_router_with_cors;
use state::{AppState, SimState};
use tick_loop::run_tick_loop;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nebula4x_control::Engine;
use nebula4x_core::procgen::GalaxyConfig;
use nebula4x_core::{ControlMode, EngineConfig};
use nebula4x_world::{bootstrap_scenario, create_run_dir, generate_run_id, load_content, load_state, write_run_info};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "nebula4x_daemon", about = "Nebula4X simulation daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Generate a galaxy procedurally with this seed. Mutually exclusive with --state.
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Number of star systems to generate (only with --seed).
        #[arg(long, default_value_t = 20)]
        num_systems: u32,
        /// Load an initial `State` from a JSON file. Mutually exclusive with --seed.
        #[arg(long = "state", conflicts_with = "seed")]
        state_file: Option<String>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
        /// Steps per second the simulation advances. 0 = as fast as possible.
        #[arg(long, default_value_t = 10.0)]
        ticks_per_sec: f64,
        /// Hours advanced per scheduler step.
        #[arg(long, default_value_t = 24)]
        step_hours: u32,
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Sample metrics every N steps (default 60). 0 = disabled.
        #[arg(long, default_value_t = 60)]
        metrics_every: u32,
        /// Disable automatic metrics collection to runs/ directory.
        #[arg(long)]
        no_metrics: bool,
        #[arg(long, default_value = "http://localhost:5173")]
        cors_origin: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { seed, num_systems, state_file, content_dir, port, ticks_per_sec, step_hours, max_ticks, metrics_every, no_metrics, cors_origin } => {
            let content = load_content(&content_dir)?;
            let mut engine = Engine::new(content.clone(), EngineConfig::default());

            let sim_state = if let Some(path) = state_file {
                load_state(&path, &content)?
            } else {
                let resolved_seed = seed.unwrap_or_else(rand::random);
                let galaxy_config = GalaxyConfig { seed: resolved_seed, num_systems, ..GalaxyConfig::default() };
                let (sim_state, _faction_id) = bootstrap_scenario(&content, &galaxy_config, "Sol Directorate", ControlMode::Player);
                sim_state
            };
            let seed_used = sim_state.seed;
            engine.load(sim_state);

            let (metrics_writer, run_dir) = if no_metrics {
                (None, None)
            } else {
                let run_id = generate_run_id(seed_used);
                let run_dir = create_run_dir(&run_id)?;
                write_run_info(&run_dir, &run_id, seed_used, &content.content_version, serde_json::json!({"runner": "nebula4x_daemon", "max_ticks": max_ticks}))?;
                let writer = MetricsFileWriter::new(run_dir.clone()).with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
                println!("Run directory: {}", run_dir.display());
                (Some(writer), Some(run_dir))
            };

            let alert_engine = if no_metrics { None } else { Some(alerts::AlertEngine::new(content.techs.len())) };

            let (event_tx, _) = broadcast::channel(256);
            let app_state = AppState {
                sim: Arc::new(parking_lot::Mutex::new(SimState { engine, metrics_every, metrics_history: std::collections::VecDeque::new(), metrics_writer, alert_engine })),
                event_tx: event_tx.clone(),
                ticks_per_sec: Arc::new(AtomicU64::new(ticks_per_sec.to_bits())),
                run_dir,
                paused: Arc::new(AtomicBool::new(false)),
            };

            let router = make_router_with_cors(app_state.clone(), &cors_origin);
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
            let speed = if ticks_per_sec == 0.0 { "max".to_string() } else { format!("{ticks_per_sec} steps/sec") };
            println!("nebula4x_daemon listening on http://localhost:{port}  speed={speed}");

            tokio::spawn(run_tick_loop(app_state.sim, event_tx, app_state.ticks_per_sec, max_ticks, app_state.paused, step_hours));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
