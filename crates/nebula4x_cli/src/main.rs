use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nebula4x_control::Engine;
use nebula4x_core::procgen::GalaxyConfig;
use nebula4x_core::{ControlMode, EngineConfig, EventLevel, State};
use nebula4x_world::{bootstrap_scenario, create_run_dir, generate_run_id, load_content, load_state, write_run_info};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "nebula4x_cli", about = "Nebula4X simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a fixed number of hours.
    Run {
        #[arg(long)]
        hours: u32,
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
        /// Print a status line every N hours.
        #[arg(long, default_value_t = 24)]
        print_every: u32,
        /// Hour granularity used when stepping the scheduler.
        #[arg(long, default_value_t = 24)]
        step_hours: u32,
        /// Disable writing run metadata to runs/.
        #[arg(long)]
        no_run_dir: bool,
    },
    /// Run until an event matching the given substring/level fires, or the hour budget runs out.
    RunUntil {
        #[arg(long)]
        max_hours: u32,
        #[arg(long)]
        seed: u64,
        #[arg(long, default_value_t = 20)]
        num_systems: u32,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 1)]
        step_hours: u32,
        /// Case-insensitive substring to match against event messages.
        #[arg(long, default_value = "")]
        message_contains: String,
        /// Stop on Warn-level events (in addition to Error).
        #[arg(long)]
        stop_on_warn: bool,
    },
}

fn run(
    hours: u32,
    seed: Option<u64>,
    num_systems: u32,
    state_file: Option<String>,
    content_dir: &str,
    print_every: u32,
    step_hours: u32,
    no_run_dir: bool,
) -> Result<()> {
    let content = load_content(content_dir)?;
    let config = EngineConfig::default();
    let mut engine = Engine::new(content.clone(), config);

    let state = if let Some(path) = state_file {
        load_state(&path, &content)?
    } else {
        let resolved_seed = seed.unwrap_or_else(rand::random);
        let galaxy_config = GalaxyConfig { seed: resolved_seed, num_systems, ..GalaxyConfig::default() };
        let (state, _faction_id) = bootstrap_scenario(&content, &galaxy_config, "Sol Directorate", ControlMode::Player);
        state
    };
    let seed_used = state.seed;
    engine.load(state);

    if !no_run_dir {
        let run_id = generate_run_id(seed_used);
        let run_dir = create_run_dir(&run_id)?;
        write_run_info(&run_dir, &run_id, seed_used, &content.content_version, serde_json::json!({ "hours": hours }))?;
        println!("Run directory: {}", run_dir.display());
    }

    println!(
        "Starting simulation: hours={hours} seed={seed_used} systems={} content_version={}",
        engine.state().systems.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    let mut hours_remaining = hours;
    let mut hours_since_print = 0u32;
    let mut events_seen = engine.state().events.len();
    while hours_remaining > 0 {
        let chunk = step_hours.min(hours_remaining);
        engine.advance_hours(chunk);
        hours_remaining -= chunk;
        hours_since_print += chunk;

        for event in &engine.state().events[events_seen..] {
            if event.level != EventLevel::Info {
                println!("[{}:{:02}] {:?}/{:?}: {}", event.day, event.hour, event.level, event.category, event.message);
            }
        }
        events_seen = engine.state().events.len();

        if hours_since_print >= print_every {
            print_status(engine.state());
            hours_since_print = 0;
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at day {}:", engine.state().date.day);
    print_status(engine.state());

    Ok(())
}

fn run_until(
    max_hours: u32,
    seed: u64,
    num_systems: u32,
    content_dir: &str,
    step_hours: u32,
    message_contains: &str,
    stop_on_warn: bool,
) -> Result<()> {
    let content = load_content(content_dir).context("loading content")?;
    let config = EngineConfig::default();
    let mut engine = Engine::new(content.clone(), config);

    let galaxy_config = GalaxyConfig { seed, num_systems, ..GalaxyConfig::default() };
    let (state, _faction_id) = bootstrap_scenario(&content, &galaxy_config, "Sol Directorate", ControlMode::Player);
    engine.load(state);

    let stop = nebula4x_core::EventStopCondition {
        stop_on_warn,
        stop_on_error: true,
        message_contains: message_contains.to_string(),
        ..nebula4x_core::EventStopCondition::default()
    };

    let result = engine.advance_until_event_hours(max_hours, &stop, step_hours);
    if let Some(event) = &result.triggering_event {
        println!("Stopped after {} hours on event: {}", result.hours_advanced, event.message);
    } else {
        println!("Ran the full {}-hour budget without a matching event.", result.hours_advanced);
    }
    print_status(engine.state());
    Ok(())
}

fn print_status(state: &State) {
    let day = state.date.day;
    let hour = state.date.hour_of_day;

    let mut faction_ids: Vec<_> = state.factions.keys().copied().collect();
    faction_ids.sort_unstable();
    let known_techs: usize = faction_ids.iter().filter_map(|id| state.factions.get(id)).map(|f| f.known_techs.len()).sum();

    println!(
        "[day={day:05} hour={hour:02}] systems={systems:3} ships={ships:4} colonies={colonies:3} \
         factions={factions:2} known_techs(sum)={known_techs:3} events={events}",
        systems = state.systems.len(),
        ships = state.ships.len(),
        colonies = state.colonies.len(),
        factions = state.factions.len(),
        events = state.events.len(),
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { hours, seed, num_systems, state_file, content_dir, print_every, step_hours, no_run_dir } => {
            run(hours, seed, num_systems, state_file, &content_dir, print_every, step_hours, no_run_dir)?;
        }
        Commands::RunUntil { max_hours, seed, num_systems, content_dir, step_hours, message_contains, stop_on_warn } => {
            run_until(max_hours, seed, num_systems, &content_dir, step_hours, &message_contains, stop_on_warn)?;
        }
    }
    Ok(())
}
