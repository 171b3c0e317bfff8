//! Terraforming: a colonized body with an active [`crate::types::TerraformTarget`]
//! drains Duranium/Neutronium from its colony each tick to nudge surface
//! temperature and atmosphere toward the target, completing once both are
//! within tolerance.

use crate::sorted::sorted_keys;
use crate::types::{Colony, EngineConfig, EventCategory, EventContext, EventLevel, SimEvent, State};

const DURANIUM: &str = "Duranium";
const NEUTRONIUM: &str = "Neutronium";
/// Nominal terraforming effort available per day before mineral affordability
/// and body-mass scaling cut it down; one "point" per day at full funding.
const NOMINAL_POINTS_PER_DAY: f64 = 1.0;

pub fn tick_terraforming(state: &mut State, config: &EngineConfig, dt_days: f64, events: &mut Vec<SimEvent>) {
    if !config.terraforming.enabled || dt_days <= 0.0 {
        return;
    }
    let cfg = &config.terraforming;
    let today = state.date.day;
    let hour = state.date.hour_of_day;

    for body_id in sorted_keys(&state.bodies) {
        let Some(target) = state.bodies[&body_id].terraforming else { continue };
        if target.complete {
            continue;
        }
        let Some(colony_id) = sorted_keys(&state.colonies)
            .into_iter()
            .find(|c| state.colonies[c].body_id == body_id)
        else {
            continue;
        };

        let mass_earth = state.bodies[&body_id].mass_earth.max(0.1);
        let mass_factor = if cfg.scale_with_body_mass { mass_earth } else { 1.0 };
        let desired_points = NOMINAL_POINTS_PER_DAY * dt_days;

        let colony: &Colony = &state.colonies[&colony_id];
        let duranium_cap = if cfg.duranium_per_point > 0.0 {
            colony.stock_of(DURANIUM) / cfg.duranium_per_point
        } else {
            f64::INFINITY
        };
        let neutronium_cap = if cfg.neutronium_per_point > 0.0 {
            colony.stock_of(NEUTRONIUM) / cfg.neutronium_per_point
        } else {
            f64::INFINITY
        };
        let points = desired_points.min(duranium_cap).min(neutronium_cap).max(0.0);
        if points <= 0.0 {
            continue;
        }

        let colony = state.colonies.get_mut(&colony_id).unwrap();
        *colony.minerals.entry(DURANIUM.to_string()).or_insert(0.0) -= points * cfg.duranium_per_point;
        *colony.minerals.entry(NEUTRONIUM.to_string()).or_insert(0.0) -= points * cfg.neutronium_per_point;

        let body = state.bodies.get_mut(&body_id).unwrap();
        let temp_capacity = (cfg.temp_k_per_point_day / mass_factor) * points;
        let atm_capacity = (cfg.atm_per_point_day / mass_factor) * points;

        let delta_temp = target.target_temp_k - body.surface_temp_k;
        let delta_atm = target.target_atm - body.atmosphere_atm;

        if cfg.split_points_between_axes {
            body.surface_temp_k += delta_temp.signum() * delta_temp.abs().min(temp_capacity / 2.0);
            body.atmosphere_atm += delta_atm.signum() * delta_atm.abs().min(atm_capacity / 2.0);
        } else if delta_temp.abs() > cfg.temp_tolerance_k {
            body.surface_temp_k += delta_temp.signum() * delta_temp.abs().min(temp_capacity);
        } else {
            body.atmosphere_atm += delta_atm.signum() * delta_atm.abs().min(atm_capacity);
        }
        body.atmosphere_atm = body.atmosphere_atm.max(0.0);

        let done = (target.target_temp_k - body.surface_temp_k).abs() <= cfg.temp_tolerance_k
            && (target.target_atm - body.atmosphere_atm).abs() <= cfg.atm_tolerance;
        if done {
            body.terraforming = Some(crate::types::TerraformTarget { complete: true, ..target });
            events.push(SimEvent {
                seq: 0,
                day: today,
                hour,
                level: EventLevel::Info,
                category: EventCategory::Economy,
                message: format!("body {body_id} finished terraforming"),
                context: EventContext { colony_id: Some(colony_id), ..Default::default() },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{spawn_body, spawn_colony, two_system_state};
    use crate::types::TerraformTarget;
    use std::collections::HashMap;

    #[test]
    fn terraforming_consumes_minerals_and_moves_toward_target() {
        let mut state = two_system_state();
        let config = EngineConfig::default();
        let sys = *state.systems.keys().next().unwrap();
        let body = spawn_body(&mut state, sys, HashMap::new());
        let faction_id = *state.factions.keys().next().unwrap();
        let colony = spawn_colony(&mut state, faction_id, body);
        state.colonies.get_mut(&colony).unwrap().minerals.insert("Duranium".to_string(), 10_000.0);
        state.colonies.get_mut(&colony).unwrap().minerals.insert("Neutronium".to_string(), 10_000.0);
        state.bodies.get_mut(&body).unwrap().surface_temp_k = 300.0;
        state.bodies.get_mut(&body).unwrap().terraforming =
            Some(TerraformTarget { target_temp_k: 288.0, target_atm: 1.0, complete: false });

        let mut events = Vec::new();
        tick_terraforming(&mut state, &config, 1.0, &mut events);

        assert!(state.bodies[&body].surface_temp_k < 300.0);
        assert!(state.colonies[&colony].stock_of("Duranium") < 10_000.0);
    }

    #[test]
    fn terraforming_completes_within_tolerance() {
        let mut state = two_system_state();
        let config = EngineConfig::default();
        let sys = *state.systems.keys().next().unwrap();
        let body = spawn_body(&mut state, sys, HashMap::new());
        let faction_id = *state.factions.keys().next().unwrap();
        let colony = spawn_colony(&mut state, faction_id, body);
        state.bodies.get_mut(&body).unwrap().surface_temp_k = 288.0;
        state.bodies.get_mut(&body).unwrap().atmosphere_atm = 1.0;
        state.bodies.get_mut(&body).unwrap().terraforming =
            Some(TerraformTarget { target_temp_k: 288.0, target_atm: 1.0, complete: false });

        let mut events = Vec::new();
        tick_terraforming(&mut state, &config, 1.0, &mut events);
        assert!(state.bodies[&body].terraforming.unwrap().complete);
        let _ = colony;
    }
}
