//! Snapshot metrics computed from `State`, and the trend/bottleneck analysis
//! the advisor digest endpoint serves from a rolling history of snapshots.
//!
//! `compute_metrics` samples the current state for time-series analysis: no
//! state mutation, no IO. Everything downstream (`compute_trends`,
//! `compute_rates`, `detect_bottleneck`) is pure given a `VecDeque` of
//! snapshots.

use nebula4x_core::{Content, HeatBucket, Order, State};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub day: i64,
    pub metrics_version: u32,

    pub faction_count: u32,
    pub system_count: u32,
    pub colony_count: u32,
    pub total_population_millions: f32,
    pub total_minerals_stockpiled_tons: f32,

    pub ship_count: u32,
    pub ship_idle_count: u32,
    pub ship_mining_count: u32,
    pub ship_transiting_count: u32,
    pub ship_combat_count: u32,
    pub avg_ship_hp_fraction: f32,
    pub avg_ship_fuel_fraction: f32,
    pub ships_hot_count: u32,
    pub ships_critical_count: u32,

    pub known_tech_count: u32,
    pub techs_total: u32,

    pub contact_count: u32,
    pub deposit_site_count: u32,
    pub depleted_deposit_count: u32,

    pub events_today_info: u32,
    pub events_today_warn: u32,
    pub events_today_error: u32,
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_metrics(state: &State, content: &Content) -> MetricsSnapshot {
    let total_population_millions = state.colonies.values().map(|c| c.population_millions).sum::<f64>() as f32;

    let colony_minerals: f64 = state.colonies.values().flat_map(|c| c.minerals.values()).sum();
    let ship_cargo: f64 = state.ships.values().flat_map(|s| s.cargo.values()).sum();
    let total_minerals_stockpiled_tons = (colony_minerals + ship_cargo) as f32;

    let mut ship_idle_count = 0u32;
    let mut ship_mining_count = 0u32;
    let mut ship_transiting_count = 0u32;
    let mut ship_combat_count = 0u32;
    let mut ships_hot_count = 0u32;
    let mut ships_critical_count = 0u32;
    let mut hp_fraction_sum = 0.0_f64;
    let mut fuel_fraction_sum = 0.0_f64;

    for ship in state.ships.values() {
        let current_order = state.ship_orders.get(&ship.id).and_then(|o| o.queue.front());
        match current_order {
            None => ship_idle_count += 1,
            Some(Order::MineBody { .. }) => ship_mining_count += 1,
            Some(Order::AttackShip { .. } | Order::BombardColony { .. } | Order::InvadeColony { .. }) => {
                ship_combat_count += 1;
            }
            Some(Order::TravelViaJump { .. } | Order::MoveToBody { .. } | Order::MoveToPoint { .. } | Order::OrbitBody { .. } | Order::SurveyJumpPoint { .. }) => {
                ship_transiting_count += 1;
            }
            Some(_) => {}
        }

        match ship.heat_state {
            HeatBucket::Hot => ships_hot_count += 1,
            HeatBucket::Critical => ships_critical_count += 1,
            HeatBucket::Cold | HeatBucket::Warm => {}
        }

        if let Some(design) = state.designs.get(&ship.design_id) {
            if design.max_hp > 0.0 {
                hp_fraction_sum += (ship.hp / design.max_hp).clamp(0.0, 1.0);
            }
            if design.fuel_capacity > 0.0 {
                fuel_fraction_sum += (ship.fuel / design.fuel_capacity).clamp(0.0, 1.0);
            }
        }
    }
    let ship_count = state.ships.len() as u32;
    let avg_ship_hp_fraction = if ship_count > 0 { (hp_fraction_sum / f64::from(ship_count)) as f32 } else { 1.0 };
    let avg_ship_fuel_fraction = if ship_count > 0 { (fuel_fraction_sum / f64::from(ship_count)) as f32 } else { 1.0 };

    let known_tech_count = state.factions.values().map(|f| f.known_techs.len() as u32).sum();
    let contact_count = state.factions.values().map(|f| f.contacts.len() as u32).sum();

    let mut deposit_site_count = 0u32;
    let mut depleted_deposit_count = 0u32;
    for body in state.bodies.values() {
        if body.mineral_deposits.is_empty() {
            continue;
        }
        if body.mineral_deposits.values().sum::<f64>() > 0.0 {
            deposit_site_count += 1;
        } else {
            depleted_deposit_count += 1;
        }
    }

    let today = state.date.day;
    let mut events_today_info = 0u32;
    let mut events_today_warn = 0u32;
    let mut events_today_error = 0u32;
    for event in state.events.iter().rev().take_while(|e| e.day == today) {
        match event.level {
            nebula4x_core::EventLevel::Info => events_today_info += 1,
            nebula4x_core::EventLevel::Warn => events_today_warn += 1,
            nebula4x_core::EventLevel::Error => events_today_error += 1,
        }
    }

    MetricsSnapshot {
        day: today,
        metrics_version: METRICS_VERSION,
        faction_count: state.factions.len() as u32,
        system_count: state.systems.len() as u32,
        colony_count: state.colonies.len() as u32,
        total_population_millions,
        total_minerals_stockpiled_tons,
        ship_count,
        ship_idle_count,
        ship_mining_count,
        ship_transiting_count,
        ship_combat_count,
        avg_ship_hp_fraction,
        avg_ship_fuel_fraction,
        ships_hot_count,
        ships_critical_count,
        known_tech_count,
        techs_total: content.techs.len() as u32,
        contact_count,
        deposit_site_count,
        depleted_deposit_count,
        events_today_info,
        events_today_warn,
        events_today_error,
    }
}

// ---------------------------------------------------------------------------
// Incremental CSV writer
// ---------------------------------------------------------------------------

/// Appends one CSV row per snapshot to `<run_dir>/metrics.csv`, writing the
/// header once on creation.
pub struct MetricsFileWriter {
    file: File,
}

impl MetricsFileWriter {
    pub fn new(run_dir: PathBuf) -> std::io::Result<Self> {
        let path = run_dir.join("metrics.csv");
        let is_new = !path.exists();
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(
                file,
                "day,metrics_version,faction_count,system_count,colony_count,\
                 total_population_millions,total_minerals_stockpiled_tons,\
                 ship_count,ship_idle_count,ship_mining_count,ship_transiting_count,ship_combat_count,\
                 avg_ship_hp_fraction,avg_ship_fuel_fraction,ships_hot_count,ships_critical_count,\
                 known_tech_count,techs_total,contact_count,deposit_site_count,depleted_deposit_count,\
                 events_today_info,events_today_warn,events_today_error"
            )?;
        }
        Ok(Self { file })
    }

    pub fn write_row(&mut self, s: &MetricsSnapshot) -> std::io::Result<()> {
        writeln!(
            self.file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            s.day,
            s.metrics_version,
            s.faction_count,
            s.system_count,
            s.colony_count,
            s.total_population_millions,
            s.total_minerals_stockpiled_tons,
            s.ship_count,
            s.ship_idle_count,
            s.ship_mining_count,
            s.ship_transiting_count,
            s.ship_combat_count,
            s.avg_ship_hp_fraction,
            s.avg_ship_fuel_fraction,
            s.ships_hot_count,
            s.ships_critical_count,
            s.known_tech_count,
            s.techs_total,
            s.contact_count,
            s.deposit_site_count,
            s.depleted_deposit_count,
            s.events_today_info,
            s.events_today_warn,
            s.events_today_error,
        )
    }
}

// ---------------------------------------------------------------------------
// Trends, rates, bottleneck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorDigest {
    pub day: i64,
    pub snapshot: MetricsSnapshot,
    pub trends: Vec<TrendInfo>,
    pub rates: Rates,
    pub bottleneck: Bottleneck,
    pub alerts: Vec<crate::alerts::AlertDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendInfo {
    pub metric: String,
    pub direction: TrendDirection,
    pub short_avg: f64,
    pub long_avg: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rates {
    pub population_growth_per_sample: f64,
    pub mineral_accumulation_per_sample: f64,
    pub hp_fraction_delta_per_sample: f64,
    pub idle_delta_per_sample: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Bottleneck {
    OverheatCritical,
    MineralSupply,
    FleetAttrition,
    FleetIdle,
    ResearchStalled,
    Healthy,
}

struct TrackedMetric {
    name: &'static str,
    extract: fn(&MetricsSnapshot) -> f64,
    higher_is_better: bool,
}

const TRACKED_METRICS: &[TrackedMetric] = &[
    TrackedMetric { name: "total_population_millions", extract: |s| f64::from(s.total_population_millions), higher_is_better: true },
    TrackedMetric { name: "total_minerals_stockpiled_tons", extract: |s| f64::from(s.total_minerals_stockpiled_tons), higher_is_better: true },
    TrackedMetric { name: "known_tech_count", extract: |s| f64::from(s.known_tech_count), higher_is_better: true },
    TrackedMetric { name: "avg_ship_hp_fraction", extract: |s| f64::from(s.avg_ship_hp_fraction), higher_is_better: true },
    TrackedMetric { name: "ship_idle_count", extract: |s| f64::from(s.ship_idle_count), higher_is_better: false },
    TrackedMetric { name: "contact_count", extract: |s| f64::from(s.contact_count), higher_is_better: true },
];

const SHORT_WINDOW: usize = 10;
const LONG_WINDOW: usize = 50;

fn window_average(history: &VecDeque<MetricsSnapshot>, window: usize, extract: fn(&MetricsSnapshot) -> f64) -> f64 {
    let count = history.len().min(window);
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = history.iter().rev().take(count).map(extract).sum();
    sum / count as f64
}

fn compute_trends(history: &VecDeque<MetricsSnapshot>) -> Vec<TrendInfo> {
    TRACKED_METRICS
        .iter()
        .map(|metric| {
            let short_avg = window_average(history, SHORT_WINDOW, metric.extract);
            let long_avg = window_average(history, LONG_WINDOW, metric.extract);

            let direction = if long_avg == 0.0 && short_avg == 0.0 {
                TrendDirection::Stable
            } else if short_avg > long_avg * 1.05 {
                if metric.higher_is_better { TrendDirection::Improving } else { TrendDirection::Declining }
            } else if short_avg < long_avg * 0.95 {
                if metric.higher_is_better { TrendDirection::Declining } else { TrendDirection::Improving }
            } else {
                TrendDirection::Stable
            };

            TrendInfo { metric: metric.name.to_string(), direction, short_avg, long_avg }
        })
        .collect()
}

fn compute_rates(history: &VecDeque<MetricsSnapshot>) -> Rates {
    if history.len() < 2 {
        return Rates {
            population_growth_per_sample: 0.0,
            mineral_accumulation_per_sample: 0.0,
            hp_fraction_delta_per_sample: 0.0,
            idle_delta_per_sample: 0.0,
        };
    }
    let last = &history[history.len() - 1];
    let prev = &history[history.len() - 2];

    Rates {
        population_growth_per_sample: f64::from(last.total_population_millions) - f64::from(prev.total_population_millions),
        mineral_accumulation_per_sample: f64::from(last.total_minerals_stockpiled_tons) - f64::from(prev.total_minerals_stockpiled_tons),
        hp_fraction_delta_per_sample: f64::from(last.avg_ship_hp_fraction) - f64::from(prev.avg_ship_hp_fraction),
        idle_delta_per_sample: f64::from(last.ship_idle_count) - f64::from(prev.ship_idle_count),
    }
}

fn detect_bottleneck(history: &VecDeque<MetricsSnapshot>) -> Bottleneck {
    let Some(latest) = history.back() else {
        return Bottleneck::Healthy;
    };

    if latest.ships_critical_count > 0 {
        return Bottleneck::OverheatCritical;
    }
    if latest.deposit_site_count == 0 && latest.ship_mining_count > 0 {
        return Bottleneck::MineralSupply;
    }
    if latest.avg_ship_hp_fraction < 0.3 && latest.ship_count > 0 {
        return Bottleneck::FleetAttrition;
    }
    if latest.ship_idle_count > 0 && latest.ship_count > 1 {
        return Bottleneck::FleetIdle;
    }
    if latest.known_tech_count == 0 && latest.techs_total > 0 {
        return Bottleneck::ResearchStalled;
    }

    Bottleneck::Healthy
}

pub fn compute_digest(history: &VecDeque<MetricsSnapshot>, alerts: Vec<crate::alerts::AlertDetail>) -> Option<AdvisorDigest> {
    let latest = history.back()?;

    Some(AdvisorDigest {
        day: latest.day,
        snapshot: latest.clone(),
        trends: compute_trends(history),
        rates: compute_rates(history),
        bottleneck: detect_bottleneck(history),
        alerts,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
