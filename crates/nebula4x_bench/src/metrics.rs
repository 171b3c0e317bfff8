//! Per-seed metrics snapshot and incremental CSV writer.
//!
//! Same snapshot shape the daemon samples live from a running `Engine`
//! (`nebula4x_daemon::analytics::compute_metrics`), reused here so batch runs
//! and the live daemon report comparable numbers.

use nebula4x_core::{Content, HeatBucket, Order, State};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

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

    MetricsSnapshot {
        day: state.date.day,
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
    }
}

/// Appends one CSV row per snapshot to `<seed_dir>/metrics.csv`, writing the
/// header once on creation.
pub struct MetricsFileWriter {
    file: File,
}

impl MetricsFileWriter {
    pub fn new(seed_dir: &std::path::Path) -> std::io::Result<Self> {
        let path = seed_dir.join("metrics.csv");
        let is_new = !path.exists();
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(
                file,
                "day,metrics_version,faction_count,system_count,colony_count,\
                 total_population_millions,total_minerals_stockpiled_tons,\
                 ship_count,ship_idle_count,ship_mining_count,ship_transiting_count,ship_combat_count,\
                 avg_ship_hp_fraction,avg_ship_fuel_fraction,ships_hot_count,ships_critical_count,\
                 known_tech_count,techs_total,contact_count,deposit_site_count,depleted_deposit_count"
            )?;
        }
        Ok(Self { file })
    }

    pub fn write_row(&mut self, s: &MetricsSnapshot) -> std::io::Result<()> {
        writeln!(
            self.file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
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
        )
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// A seed is considered "collapsed" when its entire idle fleet has no
/// minerals left to mine: stalled permanently rather than mid-task.
pub fn detect_collapse(snapshot: &MetricsSnapshot) -> (bool, Option<String>) {
    let collapsed = snapshot.ship_count > 0 && snapshot.ship_idle_count == snapshot.ship_count && snapshot.deposit_site_count == 0;
    if collapsed {
        (true, Some("fleet_idle + no_mineral_deposits".to_string()))
    } else {
        (false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot(day: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            day,
            metrics_version: 1,
            faction_count: 0,
            system_count: 0,
            colony_count: 0,
            total_population_millions: 0.0,
            total_minerals_stockpiled_tons: 0.0,
            ship_count: 0,
            ship_idle_count: 0,
            ship_mining_count: 0,
            ship_transiting_count: 0,
            ship_combat_count: 0,
            avg_ship_hp_fraction: 1.0,
            avg_ship_fuel_fraction: 1.0,
            ships_hot_count: 0,
            ships_critical_count: 0,
            known_tech_count: 0,
            techs_total: 0,
            contact_count: 0,
            deposit_site_count: 0,
            depleted_deposit_count: 0,
        }
    }

    #[test]
    fn metrics_csv_writer_round_trips_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetricsFileWriter::new(dir.path()).unwrap();
        writer.write_row(&empty_snapshot(3)).unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2, "expected a header row and one data row");
        assert!(lines[1].starts_with("3,1,"));
    }

    #[test]
    fn collapse_requires_idle_fleet_and_no_deposits() {
        let mut snap = empty_snapshot(10);
        snap.ship_count = 2;
        snap.ship_idle_count = 2;
        snap.deposit_site_count = 0;
        let (collapsed, reason) = detect_collapse(&snap);
        assert!(collapsed);
        assert!(reason.is_some());
    }

    #[test]
    fn no_collapse_when_deposits_remain() {
        let mut snap = empty_snapshot(10);
        snap.ship_count = 2;
        snap.ship_idle_count = 2;
        snap.deposit_site_count = 1;
        let (collapsed, _) = detect_collapse(&snap);
        assert!(!collapsed);
    }

    #[test]
    fn no_collapse_with_empty_fleet() {
        let snap = empty_snapshot(10);
        let (collapsed, _) = detect_collapse(&snap);
        assert!(!collapsed);
    }
}
