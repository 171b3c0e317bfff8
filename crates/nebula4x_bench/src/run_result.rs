use crate::metrics::MetricsSnapshot;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub run_schema_version: u32,
    pub run_status: String,
    pub run_id: String,
    pub git_sha: String,
    pub git_dirty: bool,
    pub seed: u64,
    pub scenario_name: String,
    pub scenario_params: serde_json::Value,
    pub day_start: i64,
    pub day_end: i64,
    pub total_days: u32,
    pub wall_time_ms: u64,
    pub sim_days_per_second: f64,
    pub summary_metrics: Option<SummaryMetrics>,
    pub collapse_occurred: bool,
    pub collapse_day: Option<i64>,
    pub collapse_reason: Option<String>,
    pub metrics_path: String,
    pub events_path: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryMetrics {
    pub faction_count: u32,
    pub system_count: u32,
    pub colony_count: u32,
    pub total_population_millions: f64,
    pub total_minerals_stockpiled_tons: f64,
    pub ship_count: u32,
    pub ship_idle_count: u32,
    pub ship_mining_count: u32,
    pub ship_transiting_count: u32,
    pub ship_combat_count: u32,
    pub avg_ship_hp_fraction: f64,
    pub avg_ship_fuel_fraction: f64,
    pub ships_hot_count: u32,
    pub ships_critical_count: u32,
    pub known_tech_count: u32,
    pub techs_total: u32,
    pub contact_count: u32,
    pub deposit_site_count: u32,
    pub depleted_deposit_count: u32,
}

impl SummaryMetrics {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            faction_count: snapshot.faction_count,
            system_count: snapshot.system_count,
            colony_count: snapshot.colony_count,
            total_population_millions: f64::from(snapshot.total_population_millions),
            total_minerals_stockpiled_tons: f64::from(snapshot.total_minerals_stockpiled_tons),
            ship_count: snapshot.ship_count,
            ship_idle_count: snapshot.ship_idle_count,
            ship_mining_count: snapshot.ship_mining_count,
            ship_transiting_count: snapshot.ship_transiting_count,
            ship_combat_count: snapshot.ship_combat_count,
            avg_ship_hp_fraction: f64::from(snapshot.avg_ship_hp_fraction),
            avg_ship_fuel_fraction: f64::from(snapshot.avg_ship_fuel_fraction),
            ships_hot_count: snapshot.ships_hot_count,
            ships_critical_count: snapshot.ships_critical_count,
            known_tech_count: snapshot.known_tech_count,
            techs_total: snapshot.techs_total,
            contact_count: snapshot.contact_count,
            deposit_site_count: snapshot.deposit_site_count,
            depleted_deposit_count: snapshot.depleted_deposit_count,
        }
    }
}

impl RunResult {
    /// Write JSON atomically: write to `.tmp` then rename.
    pub fn write_atomic(&self, path: &Path) -> anyhow::Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

pub fn git_sha() -> String {
    env!("GIT_SHA").to_string()
}

pub fn git_dirty() -> bool {
    env!("GIT_DIRTY") == "true"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            day: 100,
            metrics_version: 1,
            faction_count: 1,
            system_count: 5,
            colony_count: 2,
            total_population_millions: 12.5,
            total_minerals_stockpiled_tons: 500.0,
            ship_count: 3,
            ship_idle_count: 1,
            ship_mining_count: 1,
            ship_transiting_count: 1,
            ship_combat_count: 0,
            avg_ship_hp_fraction: 0.9,
            avg_ship_fuel_fraction: 0.7,
            ships_hot_count: 0,
            ships_critical_count: 0,
            known_tech_count: 3,
            techs_total: 10,
            contact_count: 2,
            deposit_site_count: 4,
            depleted_deposit_count: 1,
        }
    }

    #[test]
    fn test_summary_metrics_from_snapshot() {
        let snapshot = sample_snapshot();
        let metrics = SummaryMetrics::from_snapshot(&snapshot);
        assert!((metrics.total_minerals_stockpiled_tons - 500.0).abs() < 1e-3);
        assert_eq!(metrics.ship_count, 3);
        assert_eq!(metrics.known_tech_count, 3);
        assert_eq!(metrics.deposit_site_count, 4);
    }

    #[test]
    fn test_run_result_round_trip_serialization() {
        let snapshot = sample_snapshot();
        let result = RunResult {
            run_schema_version: 1,
            run_status: "completed".to_string(),
            run_id: "test-uuid".to_string(),
            git_sha: "abc123".to_string(),
            git_dirty: false,
            seed: 42,
            scenario_name: "test_scenario".to_string(),
            scenario_params: serde_json::json!({"days": 1000}),
            day_start: 0,
            day_end: 100,
            total_days: 100,
            wall_time_ms: 500,
            sim_days_per_second: 200.0,
            summary_metrics: Some(SummaryMetrics::from_snapshot(&snapshot)),
            collapse_occurred: false,
            collapse_day: None,
            collapse_reason: None,
            metrics_path: "metrics.csv".to_string(),
            events_path: None,
            error_message: None,
        };

        let json = serde_json::to_string_pretty(&result).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["run_schema_version"], 1);
        assert_eq!(parsed["run_status"], "completed");
        assert_eq!(parsed["seed"], 42);
        assert!(parsed["summary_metrics"]["total_minerals_stockpiled_tons"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_atomic_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run_result.json");
        let result = RunResult {
            run_schema_version: 1,
            run_status: "completed".to_string(),
            run_id: "test-uuid".to_string(),
            git_sha: "abc123".to_string(),
            git_dirty: false,
            seed: 42,
            scenario_name: "test".to_string(),
            scenario_params: serde_json::json!({}),
            day_start: 0,
            day_end: 100,
            total_days: 100,
            wall_time_ms: 50,
            sim_days_per_second: 2000.0,
            summary_metrics: None,
            collapse_occurred: false,
            collapse_day: None,
            collapse_reason: None,
            metrics_path: "metrics.csv".to_string(),
            events_path: None,
            error_message: None,
        };

        result.write_atomic(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["run_schema_version"], 1);
    }

    #[test]
    fn test_git_sha_not_empty() {
        let sha = git_sha();
        assert!(!sha.is_empty());
    }
}
