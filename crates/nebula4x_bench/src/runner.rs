use crate::metrics::{self, detect_collapse, MetricsFileWriter, MetricsSnapshot};
use crate::run_result::{self, RunResult, SummaryMetrics};
use anyhow::{Context, Result};
use nebula4x_control::Engine;
use nebula4x_core::procgen::GalaxyConfig;
use nebula4x_core::{Content, ControlMode, EngineConfig, State};
use nebula4x_world::bootstrap_scenario;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

pub struct SeedResult {
    pub seed: u64,
    pub final_snapshot: MetricsSnapshot,
    #[allow(dead_code)]
    pub wall_time_ms: u64,
    pub run_id: String,
}

#[allow(clippy::too_many_arguments)]
pub fn run_seed(
    content: &Content,
    engine_config: &EngineConfig,
    seed: u64,
    num_systems: u32,
    base_state: Option<&State>,
    days: u32,
    metrics_every: u32,
    seed_dir: &Path,
    scenario_name: &str,
    scenario_params: &serde_json::Value,
) -> Result<SeedResult> {
    let run_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    let mut engine = Engine::new(content.clone(), *engine_config);
    let state = if let Some(base) = base_state {
        let mut state = base.clone();
        state.seed = seed;
        state
    } else {
        let galaxy_config = GalaxyConfig { seed, num_systems, ..GalaxyConfig::default() };
        let (state, _faction_id) = bootstrap_scenario(content, &galaxy_config, "Autonomous Directorate", ControlMode::AiExplorer);
        state
    };
    engine.load(state);

    std::fs::create_dir_all(seed_dir).with_context(|| format!("creating seed directory: {}", seed_dir.display()))?;

    nebula4x_world::write_run_info(
        seed_dir,
        &format!("seed_{seed}"),
        seed,
        &content.content_version,
        serde_json::json!({"runner": "nebula4x_bench", "days": days}),
    )?;

    let mut metrics_writer = MetricsFileWriter::new(seed_dir).with_context(|| format!("opening metrics CSV in {}", seed_dir.display()))?;

    let metrics_every = metrics_every.max(1);
    for day in 0..days {
        engine.advance_days(1);
        if (day + 1) % metrics_every == 0 {
            let snapshot = metrics::compute_metrics(engine.state(), engine.content());
            metrics_writer.write_row(&snapshot).context("writing metrics row")?;
        }
    }

    let final_snapshot = metrics::compute_metrics(engine.state(), engine.content());
    if days % metrics_every != 0 {
        metrics_writer.write_row(&final_snapshot).context("writing final metrics row")?;
    }
    metrics_writer.flush().context("flushing metrics")?;

    #[allow(clippy::cast_possible_truncation)]
    let wall_time_ms = start.elapsed().as_millis() as u64;
    let sim_days_per_second = if wall_time_ms > 0 { f64::from(days) / (wall_time_ms as f64 / 1000.0) } else { 0.0 };

    let (collapse_occurred, collapse_reason) = detect_collapse(&final_snapshot);

    let run_result = RunResult {
        run_schema_version: 1,
        run_status: "completed".to_string(),
        run_id: run_id.clone(),
        git_sha: run_result::git_sha(),
        git_dirty: run_result::git_dirty(),
        seed,
        scenario_name: scenario_name.to_string(),
        scenario_params: scenario_params.clone(),
        day_start: 0,
        day_end: final_snapshot.day,
        total_days: days,
        wall_time_ms,
        sim_days_per_second,
        summary_metrics: Some(SummaryMetrics::from_snapshot(&final_snapshot)),
        collapse_occurred,
        collapse_day: if collapse_occurred { Some(final_snapshot.day) } else { None },
        collapse_reason,
        metrics_path: "metrics.csv".to_string(),
        events_path: None,
        error_message: None,
    };

    run_result.write_atomic(&seed_dir.join("run_result.json")).context("writing run_result.json")?;

    Ok(SeedResult { seed, final_snapshot, wall_time_ms, run_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula4x_core::test_fixtures::base_content;
    use tempfile::TempDir;

    #[test]
    fn test_run_seed_produces_output() {
        let content = base_content();
        let config = EngineConfig::default();
        let temp_dir = TempDir::new().unwrap();
        let seed_dir = temp_dir.path().join("seed_42");
        let params = serde_json::json!({"days": 30});

        let result = run_seed(&content, &config, 42, 2, None, 30, 10, &seed_dir, "test_scenario", &params).unwrap();

        assert_eq!(result.seed, 42);
        assert_eq!(result.final_snapshot.day, 30);
        assert!(!result.run_id.is_empty());
        assert!(seed_dir.join("run_info.json").exists());
        assert!(seed_dir.join("metrics.csv").exists());
        assert!(seed_dir.join("run_result.json").exists());

        let content_str = std::fs::read_to_string(seed_dir.join("run_result.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content_str).unwrap();
        assert_eq!(parsed["run_schema_version"], 1);
        assert_eq!(parsed["run_status"], "completed");
        assert_eq!(parsed["seed"], 42);
        assert!(parsed["summary_metrics"].is_object());
    }

    #[test]
    fn test_run_seed_determinism() {
        let content = base_content();
        let config = EngineConfig::default();
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();
        let params = serde_json::json!({"days": 30});

        let result1 = run_seed(&content, &config, 42, 2, None, 30, 10, &dir1.path().join("seed_42"), "test", &params).unwrap();
        let result2 = run_seed(&content, &config, 42, 2, None, 30, 10, &dir2.path().join("seed_42"), "test", &params).unwrap();

        assert_eq!(result1.final_snapshot.day, result2.final_snapshot.day);
        assert_eq!(result1.final_snapshot.known_tech_count, result2.final_snapshot.known_tech_count);
        assert_eq!(result1.final_snapshot.ship_count, result2.final_snapshot.ship_count);
    }
}
