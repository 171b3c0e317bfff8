use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nebula4x_core::EngineConfig;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod metrics;
mod overrides;
mod run_result;
mod runner;
mod scenario;
mod summary;

#[derive(Parser)]
#[command(name = "nebula4x_bench", about = "Automated scenario runner for Nebula4X benchmarking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file across multiple seeds.
    Run {
        /// Path to the scenario JSON file.
        #[arg(long)]
        scenario: String,
        /// Output directory (default: runs/).
        #[arg(long, default_value = "runs")]
        output_dir: String,
    },
}

#[allow(clippy::too_many_lines)]
fn run(scenario_path: &str, output_dir: &str) -> Result<()> {
    let scenario = scenario::load_scenario(Path::new(scenario_path))?;
    let seeds = scenario.seeds.expand();

    println!("Loading scenario '{}': {} seeds × {} days", scenario.name, seeds.len(), scenario.days);

    let content = nebula4x_world::load_content(&scenario.content_dir)?;

    let mut engine_config = EngineConfig::default();
    overrides::apply_overrides(&mut engine_config, &scenario.overrides)?;

    let base_state = if let Some(ref state_path) = scenario.state {
        let state = nebula4x_world::load_state(state_path, &content)
            .with_context(|| format!("loading state file: {state_path}"))?;
        println!("Using state file: {state_path}");
        Some(state)
    } else {
        None
    };

    let scenario_params = serde_json::json!({
        "days": scenario.days,
        "metrics_every": scenario.metrics_every,
        "content_dir": scenario.content_dir,
        "num_systems": scenario.num_systems,
        "state": scenario.state,
        "overrides": scenario.overrides,
    });

    let batch_stamp = nebula4x_world::generate_run_id(seeds.first().copied().unwrap_or(0));
    let run_dir = PathBuf::from(output_dir).join(format!("{}_{}", scenario.name, batch_stamp));
    std::fs::create_dir_all(&run_dir).with_context(|| format!("creating output directory: {}", run_dir.display()))?;
    std::fs::copy(scenario_path, run_dir.join("scenario.json")).context("copying scenario file")?;

    println!("Output: {}", run_dir.display());
    println!("Running {} seeds in parallel...", seeds.len());

    let results: Vec<Result<runner::SeedResult>> = seeds
        .par_iter()
        .map(|&seed| {
            let seed_dir = run_dir.join(format!("seed_{seed}"));
            runner::run_seed(
                &content,
                &engine_config,
                seed,
                scenario.num_systems,
                base_state.as_ref(),
                scenario.days,
                scenario.metrics_every,
                &seed_dir,
                &scenario.name,
                &scenario_params,
            )
        })
        .collect();

    let mut seed_results = Vec::new();
    for result in results {
        match result {
            Ok(seed_result) => seed_results.push(seed_result),
            Err(err) => eprintln!("Seed failed: {err:#}"),
        }
    }

    if seed_results.is_empty() {
        anyhow::bail!("all seeds failed");
    }

    let snapshot_refs: Vec<(u64, &metrics::MetricsSnapshot)> = seed_results.iter().map(|r| (r.seed, &r.final_snapshot)).collect();

    let stats = summary::compute_summary(&snapshot_refs);
    summary::print_summary(&scenario.name, scenario.days, &stats);

    let summary_path = run_dir.join("summary.json");
    let summary_json = serde_json::to_string_pretty(&stats).context("serializing summary")?;
    std::fs::write(&summary_path, summary_json).with_context(|| format!("writing {}", summary_path.display()))?;

    let batch_id = Uuid::new_v4().to_string();
    let run_ids: Vec<&str> = seed_results.iter().map(|r| r.run_id.as_str()).collect();
    let collapsed_count = seed_results.iter().filter(|r| metrics::detect_collapse(&r.final_snapshot).0).count();

    let snapshot_only_refs: Vec<&metrics::MetricsSnapshot> = seed_results.iter().map(|r| &r.final_snapshot).collect();
    let aggregated_metrics = summary::build_aggregated_metrics(&snapshot_only_refs);

    let batch_summary = serde_json::json!({
        "batch_schema_version": 1,
        "batch_id": batch_id,
        "scenario_name": scenario.name,
        "scenario_params": scenario_params,
        "seed_count": seed_results.len(),
        "run_ids": run_ids,
        "collapsed_count": collapsed_count,
        "aggregated_metrics": aggregated_metrics,
    });

    let batch_path = run_dir.join("batch_summary.json");
    let batch_tmp = batch_path.with_extension("json.tmp");
    let batch_json = serde_json::to_string_pretty(&batch_summary).context("serializing batch summary")?;
    let mut batch_file = std::fs::File::create(&batch_tmp).with_context(|| format!("creating {}", batch_tmp.display()))?;
    batch_file.write_all(batch_json.as_bytes()).context("writing batch summary")?;
    batch_file.sync_all()?;
    std::fs::rename(&batch_tmp, &batch_path).context("renaming batch summary")?;

    println!("Summary written to {}", summary_path.display());
    println!("Batch summary written to {}", batch_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { scenario, output_dir } => run(&scenario, &output_dir)?,
    }
    Ok(())
}
