//! Per-ship heat budget: power draw from online subsystems generates heat,
//! hull mass dissipates it, and sustained overheat both penalizes the ship's
//! effective stats and eventually burns hull points. Shield regeneration is
//! folded in here too since it shares the same "continuous per-ship drift"
//! shape and the same `min_shield_multiplier` heat penalty.

use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{EngineConfig, EventCategory, EventContext, EventLevel, HeatBucket, SimEvent, State};

fn bucket_for(fraction: f64, cfg: &crate::types::ShipHeatConfig) -> HeatBucket {
    if fraction < cfg.penalty_start_fraction {
        HeatBucket::Cold
    } else if fraction < cfg.penalty_full_fraction {
        HeatBucket::Warm
    } else if fraction < cfg.damage_threshold_fraction {
        HeatBucket::Hot
    } else {
        HeatBucket::Critical
    }
}

/// Stepped multiplier shared by speed/sensor/shield penalties: identical shape
/// to [`crate::combat::weapon_multiplier`] but parameterized by the stat's own
/// floor, since each stat bottoms out at a different `min_*_multiplier`.
#[must_use]
pub fn stat_multiplier(bucket: HeatBucket, min_multiplier: f64) -> f64 {
    match bucket {
        HeatBucket::Cold | HeatBucket::Warm => 1.0,
        HeatBucket::Hot => (1.0 + min_multiplier) / 2.0,
        HeatBucket::Critical => min_multiplier,
    }
}

#[must_use]
pub fn speed_multiplier(bucket: HeatBucket, cfg: &EngineConfig) -> f64 {
    stat_multiplier(bucket, cfg.ship_heat.min_speed_multiplier)
}

#[must_use]
pub fn sensor_multiplier(bucket: HeatBucket, cfg: &EngineConfig) -> f64 {
    stat_multiplier(bucket, cfg.ship_heat.min_sensor_multiplier)
}

/// Recomputes every ship's `heat_state` bucket from its stored `heat` value
/// rather than trusting whatever was serialized. Called once after loading a
/// save so a state edited or migrated out-of-band can't carry a stale bucket.
pub fn recompute_heat_state(state: &mut State, config: &EngineConfig) {
    let cfg = &config.ship_heat;
    let masses: std::collections::HashMap<Id, f64> = state
        .ships
        .values()
        .filter_map(|s| state.designs.get(&s.design_id).map(|d| (s.id, d.mass_tons.max(1.0))))
        .collect();
    for ship_id in sorted_keys(&state.ships) {
        let Some(&mass_tons) = masses.get(&ship_id) else { continue };
        let capacity = cfg.base_capacity_per_mass_ton * mass_tons;
        let ship = state.ships.get_mut(&ship_id).unwrap();
        let fraction = if capacity > 0.0 { ship.heat / capacity } else { 0.0 };
        ship.heat_state = bucket_for(fraction, cfg);
    }
}

/// Runs the heat/shield pass for every ship: generation from online subsystem
/// power draw, mass-scaled dissipation, bucket reclassification, overheat
/// damage past `damage_threshold_fraction`, and shield regeneration (itself
/// reduced by the same heat bucket).
pub fn tick_heat(state: &mut State, config: &EngineConfig, dt_days: f64, events: &mut Vec<SimEvent>) {
    if !config.ship_heat.enabled || dt_days <= 0.0 {
        return;
    }
    let today = state.date.day;
    let hour = state.date.hour_of_day;
    let cfg = &config.ship_heat;

    for ship_id in sorted_keys(&state.ships) {
        let ship = &state.ships[&ship_id];
        let Some(design) = state.designs.get(&ship.design_id) else { continue };
        let mass_tons = design.mass_tons.max(1.0);
        let capacity = cfg.base_capacity_per_mass_ton * mass_tons;

        let mut draw = 0.0;
        if ship.power_policy.weapons_online {
            draw += design.power_draw_weapons;
        }
        if ship.power_policy.shields_online {
            draw += design.power_draw_shields;
        }
        if ship.power_policy.sensors_online {
            draw += design.power_draw_sensors;
        }
        if ship.power_policy.engines_online {
            draw += design.power_draw_engines;
        }
        let generation = draw * cfg.generation_per_power_use_per_day * dt_days;
        let dissipation = cfg.base_dissipation_per_mass_ton_per_day * mass_tons * dt_days;
        let max_shields = design.max_shields;
        let shield_regen = design.shield_regen_per_day;

        let ship = state.ships.get_mut(&ship_id).unwrap();
        ship.heat = (ship.heat + generation - dissipation).max(0.0);
        let fraction = ship.heat / capacity;
        ship.heat_state = bucket_for(fraction, cfg);

        if fraction >= cfg.damage_threshold_fraction {
            let damage_rate = cfg.damage_fraction_per_day_at_200pct * (fraction / 2.0);
            let damage = design.max_hp * damage_rate * dt_days;
            if damage > 0.0 {
                ship.hp = (ship.hp - damage).max(0.0);
                events.push(SimEvent {
                    seq: 0,
                    day: today,
                    hour,
                    level: EventLevel::Warn,
                    category: EventCategory::Combat,
                    message: format!("ship {ship_id} takes overheat damage"),
                    context: EventContext { faction_id: Some(ship.faction_id), ship_id: Some(ship_id), ..Default::default() },
                });
            }
        }

        if ship.power_policy.shields_online && ship.shields < max_shields {
            let mult = stat_multiplier(ship.heat_state, cfg.min_shield_multiplier);
            ship.shields = (ship.shields + shield_regen * mult * dt_days).min(max_shields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Point2;
    use crate::test_fixtures::{basic_design, spawn_ship, two_system_state};

    #[test]
    fn idle_ship_cools_toward_zero() {
        let mut state = two_system_state();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        let sys = *state.systems.keys().next().unwrap();
        let design = basic_design(&mut state);
        let ship = spawn_ship(&mut state, faction_id, sys, design, Point2::new(0.0, 0.0));
        state.ships.get_mut(&ship).unwrap().heat = 50.0;
        state.ships.get_mut(&ship).unwrap().power_policy = crate::types::PowerPolicy::default();

        let mut events = Vec::new();
        tick_heat(&mut state, &config, 1.0, &mut events);
        assert!(state.ships[&ship].heat < 50.0);
    }

    #[test]
    fn sustained_high_draw_reaches_critical_and_damages() {
        let mut state = two_system_state();
        let mut config = EngineConfig::default();
        config.ship_heat.base_dissipation_per_mass_ton_per_day = 0.0;
        let faction_id = *state.factions.keys().next().unwrap();
        let sys = *state.systems.keys().next().unwrap();
        let design = basic_design(&mut state);
        state.designs.get_mut(&design).unwrap().power_draw_weapons = 1000.0;
        state.designs.get_mut(&design).unwrap().mass_tons = 10.0;
        let ship = spawn_ship(&mut state, faction_id, sys, design, Point2::new(0.0, 0.0));
        state.ships.get_mut(&ship).unwrap().power_policy.weapons_online = true;

        let mut events = Vec::new();
        for _ in 0..5 {
            tick_heat(&mut state, &config, 1.0, &mut events);
        }
        assert_eq!(state.ships[&ship].heat_state, HeatBucket::Critical);
        assert!(state.ships[&ship].hp < state.designs[&design].max_hp);
    }
}
