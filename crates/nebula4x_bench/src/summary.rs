use crate::metrics::{detect_collapse, MetricsSnapshot};
use serde::Serialize;

type Extractor = (&'static str, Box<dyn Fn(&MetricsSnapshot) -> f64>);

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub seed_count: usize,
    pub collapsed_count: usize,
    pub metrics: Vec<MetricSummary>,
}

#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

fn extractors() -> Vec<Extractor> {
    vec![
        ("total_population_millions", Box::new(|s: &MetricsSnapshot| f64::from(s.total_population_millions))),
        ("total_minerals_stockpiled_tons", Box::new(|s: &MetricsSnapshot| f64::from(s.total_minerals_stockpiled_tons))),
        (
            "ship_idle_fraction",
            Box::new(|s: &MetricsSnapshot| if s.ship_count == 0 { 0.0 } else { f64::from(s.ship_idle_count) / f64::from(s.ship_count) }),
        ),
        ("known_tech_count", Box::new(|s: &MetricsSnapshot| f64::from(s.known_tech_count))),
        ("avg_ship_hp_fraction", Box::new(|s: &MetricsSnapshot| f64::from(s.avg_ship_hp_fraction))),
        ("avg_ship_fuel_fraction", Box::new(|s: &MetricsSnapshot| f64::from(s.avg_ship_fuel_fraction))),
        ("ships_critical_count", Box::new(|s: &MetricsSnapshot| f64::from(s.ships_critical_count))),
        ("contact_count", Box::new(|s: &MetricsSnapshot| f64::from(s.contact_count))),
        ("deposit_site_count", Box::new(|s: &MetricsSnapshot| f64::from(s.deposit_site_count))),
        ("depleted_deposit_count", Box::new(|s: &MetricsSnapshot| f64::from(s.depleted_deposit_count))),
    ]
}

pub fn compute_summary(snapshots: &[(u64, &MetricsSnapshot)]) -> SummaryStats {
    let seed_count = snapshots.len();
    let collapsed_count = snapshots.iter().filter(|(_, s)| detect_collapse(s).0).count();

    let metrics = extractors()
        .iter()
        .map(|(name, extract)| {
            let values: Vec<f64> = snapshots.iter().map(|(_, s)| extract(s)).collect();
            compute_metric_summary(name, &values)
        })
        .collect();

    SummaryStats { seed_count, collapsed_count, metrics }
}

fn compute_metric_summary(name: &str, values: &[f64]) -> MetricSummary {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let stddev = variance.sqrt();

    MetricSummary { name: name.to_string(), mean, min, max, stddev }
}

/// Build aggregated metrics in the `{ "key": { "mean", "min", "max", "stddev" } }` contract format.
pub fn build_aggregated_metrics(snapshots: &[&MetricsSnapshot]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, extract) in &extractors() {
        let values: Vec<f64> = snapshots.iter().map(|s| extract(s)).collect();
        let summary = compute_metric_summary(name, &values);
        map.insert(
            name.to_string(),
            serde_json::json!({"mean": summary.mean, "min": summary.min, "max": summary.max, "stddev": summary.stddev}),
        );
    }
    serde_json::Value::Object(map)
}

pub fn print_summary(scenario_name: &str, days: u32, stats: &SummaryStats) {
    println!("\n=== {scenario_name} ({} seeds, {days} days each) ===\n", stats.seed_count);
    println!("{:<32} {:>8} {:>8} {:>8} {:>8}", "Metric", "Mean", "Min", "Max", "StdDev");
    println!("{}", "-".repeat(72));
    for metric in &stats.metrics {
        println!("{:<32} {:>8.2} {:>8.2} {:>8.2} {:>8.2}", metric.name, metric.mean, metric.min, metric.max, metric.stddev);
    }
    println!("{:<32} {}/{}", "collapse_rate", stats.collapsed_count, stats.seed_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::too_many_arguments)]
    fn make_snapshot(day: i64, population: f32, ship_count: u32, ship_idle: u32, deposits: u32, techs: u32) -> MetricsSnapshot {
        MetricsSnapshot {
            day,
            metrics_version: 1,
            faction_count: 1,
            system_count: 1,
            colony_count: 1,
            total_population_millions: population,
            total_minerals_stockpiled_tons: 0.0,
            ship_count,
            ship_idle_count: ship_idle,
            ship_mining_count: 0,
            ship_transiting_count: 0,
            ship_combat_count: 0,
            avg_ship_hp_fraction: 1.0,
            avg_ship_fuel_fraction: 1.0,
            ships_hot_count: 0,
            ships_critical_count: 0,
            known_tech_count: techs,
            techs_total: 10,
            contact_count: 0,
            deposit_site_count: deposits,
            depleted_deposit_count: 0,
        }
    }

    #[test]
    fn test_summary_basic_stats() {
        let s1 = make_snapshot(100, 10.0, 2, 0, 3, 3);
        let s2 = make_snapshot(100, 20.0, 2, 0, 3, 5);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &s1), (2, &s2)];
        let stats = compute_summary(&snapshots);

        assert_eq!(stats.seed_count, 2);
        assert_eq!(stats.collapsed_count, 0);

        let population = &stats.metrics[0];
        assert_eq!(population.name, "total_population_millions");
        assert!((population.mean - 15.0).abs() < 1e-5);
        assert!((population.min - 10.0).abs() < 1e-5);
        assert!((population.max - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_collapse_detection_counted() {
        let collapsed = make_snapshot(100, 5.0, 2, 2, 0, 3);
        let healthy = make_snapshot(100, 5.0, 2, 0, 3, 3);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &collapsed), (2, &healthy)];
        let stats = compute_summary(&snapshots);

        assert_eq!(stats.collapsed_count, 1);
    }

    #[test]
    fn test_stddev_zero_for_identical() {
        let s1 = make_snapshot(100, 5.0, 2, 1, 3, 3);
        let s2 = make_snapshot(100, 5.0, 2, 1, 3, 3);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &s1), (2, &s2)];
        let stats = compute_summary(&snapshots);

        for metric in &stats.metrics {
            assert!(metric.stddev.abs() < 1e-10, "stddev for {} should be 0, got {}", metric.name, metric.stddev);
        }
    }

    #[test]
    fn test_build_aggregated_metrics_has_all_keys() {
        let s1 = make_snapshot(100, 5.0, 2, 0, 3, 3);
        let s2 = make_snapshot(100, 7.0, 2, 1, 3, 5);
        let snapshots: Vec<&MetricsSnapshot> = vec![&s1, &s2];
        let agg = build_aggregated_metrics(&snapshots);

        let obj = agg.as_object().unwrap();
        assert_eq!(obj.len(), extractors().len());
        for (name, _) in &extractors() {
            let entry = obj.get(*name).unwrap_or_else(|| panic!("missing key: {name}"));
            assert!(entry.get("mean").is_some(), "missing mean for {name}");
            assert!(entry.get("stddev").is_some(), "missing stddev for {name}");
        }
    }

    #[test]
    fn test_build_aggregated_metrics_values() {
        let s1 = make_snapshot(100, 0.0, 4, 1, 0, 3);
        let s2 = make_snapshot(100, 0.0, 6, 3, 0, 5);
        let snapshots: Vec<&MetricsSnapshot> = vec![&s1, &s2];
        let agg = build_aggregated_metrics(&snapshots);

        let known_tech = &agg["known_tech_count"];
        assert!((known_tech["mean"].as_f64().unwrap() - 4.0).abs() < 1e-5);
        assert!((known_tech["min"].as_f64().unwrap() - 3.0).abs() < 1e-5);
        assert!((known_tech["max"].as_f64().unwrap() - 5.0).abs() < 1e-5);
    }
}
