//! Finite-deposit mining with scarcity-aware arbitration (component E, §4.E).
//!
//! Two passes: request aggregation per `(body, mineral)`, then arbitration that
//! either fulfills everything or distributes under scarcity by a shortage-weighted
//! iterative allocation, bounded at 8 passes plus a deterministic drain pass.

use crate::economy::{effective_multiplier, OutputMultiplier};
use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{
    Content, EngineConfig, EventCategory, EventContext, EventLevel, MineralId, OutputClass,
    SimEvent, State,
};
use std::collections::HashMap;

struct MiningRequest {
    colony_id: Id,
    request_tons: f64,
    request_per_day: f64,
}

fn sorted_mineral_keys(map: &HashMap<MineralId, f64>) -> Vec<MineralId> {
    let mut ks: Vec<MineralId> = map.keys().cloned().collect();
    ks.sort();
    ks
}

/// Runs the mining pass for `dt_days`, mutating colony mineral stockpiles and
/// body deposits. Bodies with an empty `mineral_deposits` map use legacy
/// "unlimited" semantics and are skipped here (mining against them is a no-op
/// because there is nothing finite to arbitrate; unlimited-deposit scenarios are
/// not modeled as an economy source in this engine).
pub fn tick_mining(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    dt_days: f64,
    events: &mut Vec<SimEvent>,
) {
    if dt_days <= 0.0 {
        return;
    }

    // Pass 1: request aggregation, body_id -> mineral -> requests.
    let mut requests: HashMap<Id, HashMap<MineralId, Vec<MiningRequest>>> = HashMap::new();

    for colony_id in sorted_keys(&state.colonies) {
        let colony = &state.colonies[&colony_id];
        let Some(body) = state.bodies.get(&colony.body_id) else { continue };
        if body.mineral_deposits.is_empty() {
            continue;
        }
        let mult = effective_multiplier(multipliers, colony.faction_id, OutputClass::Mining);

        let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
        inst_ids.sort();
        let mut capacity_per_day = 0.0_f64;
        for inst_id in inst_ids {
            let count = colony.installations[inst_id];
            if count == 0 {
                continue;
            }
            let Some(def) = content.installations.get(inst_id) else { continue };
            if def.mining_capacity_tons_per_day <= 0.0 {
                continue;
            }
            capacity_per_day += def.mining_capacity_tons_per_day * f64::from(count) * mult;
        }
        if capacity_per_day <= 0.0 {
            continue;
        }

        let total_remaining: f64 = body.mineral_deposits.values().sum();
        if total_remaining <= 0.0 {
            continue;
        }
        let body_id = body.id;
        for mineral in sorted_mineral_keys(&body.mineral_deposits) {
            let remaining = body.mineral_deposits[&mineral];
            if remaining <= 0.0 {
                continue;
            }
            let share_per_day = capacity_per_day * (remaining / total_remaining);
            if share_per_day <= 0.0 {
                continue;
            }
            requests.entry(body_id).or_default().entry(mineral).or_default().push(MiningRequest {
                colony_id,
                request_tons: share_per_day * dt_days,
                request_per_day: share_per_day,
            });
        }
    }

    // Pass 2: arbitration.
    let scarcity = config.mining_scarcity;
    for body_id in sorted_keys(&requests) {
        let by_mineral = &requests[&body_id];
        for mineral in sorted_mineral_keys(by_mineral) {
            let reqs = &by_mineral[&mineral];
            let remaining_before = state.bodies[&body_id].mineral_deposits[&mineral];
            let total_request: f64 = reqs.iter().map(|r| r.request_tons).sum();

            let mut allocated: HashMap<Id, f64> = HashMap::new();
            if total_request <= remaining_before {
                for r in reqs {
                    allocated.insert(r.colony_id, r.request_tons);
                }
            } else if scarcity.enabled {
                allocated = arbitrate_scarce(state, reqs, remaining_before, scarcity.buffer_days, scarcity.need_boost, &mineral);
            } else {
                // Proportional split without scarcity boosting.
                let mut remaining_pool = remaining_before;
                let mut ids: Vec<Id> = reqs.iter().map(|r| r.colony_id).collect();
                ids.sort_unstable();
                for r in reqs {
                    let share = remaining_before * (r.request_tons / total_request);
                    let give = share.min(remaining_pool).max(0.0);
                    allocated.insert(r.colony_id, give);
                    remaining_pool -= give;
                }
            }

            let mut total_given = 0.0_f64;
            let mut lowest_colony: Option<Id> = None;
            for &colony_id in &{
                let mut ids: Vec<Id> = allocated.keys().copied().collect();
                ids.sort_unstable();
                ids
            } {
                let give = allocated[&colony_id].max(0.0);
                if give <= 1e-9 {
                    continue;
                }
                total_given += give;
                if lowest_colony.is_none_or(|l| colony_id < l) {
                    lowest_colony = Some(colony_id);
                }
                if let Some(colony) = state.colonies.get_mut(&colony_id) {
                    *colony.minerals.entry(mineral.clone()).or_insert(0.0) += give;
                }
            }
            total_given = total_given.min(remaining_before);
            let body = state.bodies.get_mut(&body_id).unwrap();
            let deposit = body.mineral_deposits.get_mut(&mineral).unwrap();
            *deposit = (*deposit - total_given).max(0.0);
            if *deposit < 1e-9 {
                *deposit = 0.0;
            }

            if remaining_before > 0.0 && *deposit == 0.0 {
                events.push(SimEvent {
                    seq: 0,
                    day: state.date.day,
                    hour: state.date.hour_of_day,
                    level: EventLevel::Info,
                    category: EventCategory::Economy,
                    message: format!("deposit of {mineral} depleted at body {body_id}"),
                    context: EventContext {
                        colony_id: lowest_colony,
                        system_id: Some(body.system_id),
                        ..Default::default()
                    },
                });
            }
        }
    }
}

/// Shortage-weighted iterative allocation under scarcity, bounded at 8 rounds
/// plus a final deterministic drain pass for residual capacity.
fn arbitrate_scarce(
    state: &State,
    reqs: &[MiningRequest],
    remaining_deposit: f64,
    buffer_days: f64,
    need_boost: f64,
    mineral: &str,
) -> HashMap<Id, f64> {
    let mut caps: HashMap<Id, f64> = HashMap::new();
    let mut allocated: HashMap<Id, f64> = HashMap::new();
    let mut per_day: HashMap<Id, f64> = HashMap::new();
    let mut ids: Vec<Id> = Vec::with_capacity(reqs.len());
    for r in reqs {
        caps.insert(r.colony_id, r.request_tons);
        per_day.insert(r.colony_id, r.request_per_day);
        allocated.insert(r.colony_id, 0.0);
        ids.push(r.colony_id);
    }
    ids.sort_unstable();

    let weight_of = |colony_id: Id| -> f64 {
        let local_stock = state.colonies.get(&colony_id).map_or(0.0, |c| c.stock_of(mineral));
        let target_buffer = per_day[&colony_id] * buffer_days;
        let shortage_fraction = if target_buffer > 0.0 {
            ((target_buffer - local_stock) / target_buffer).clamp(0.0, 1.0)
        } else {
            0.0
        };
        caps[&colony_id].max(0.0) * (1.0 + need_boost * shortage_fraction)
    };

    let mut pool = remaining_deposit;
    for _pass in 0..8 {
        if pool <= 1e-9 {
            break;
        }
        let active: Vec<Id> = ids.iter().copied().filter(|id| caps[id] - allocated[id] > 1e-9).collect();
        if active.is_empty() {
            break;
        }
        let weights: HashMap<Id, f64> = active.iter().map(|&id| (id, weight_of(id))).collect();
        let total_weight: f64 = weights.values().sum();
        if total_weight <= 0.0 {
            break;
        }
        for &id in &active {
            if pool <= 1e-9 {
                break;
            }
            let share = pool * (weights[&id] / total_weight);
            let cap_left = caps[&id] - allocated[&id];
            let give = share.min(cap_left).max(0.0);
            *allocated.get_mut(&id).unwrap() += give;
            pool -= give;
        }
    }
    // Deterministic drain pass for any residual capacity.
    if pool > 1e-9 {
        for &id in &ids {
            if pool <= 1e-9 {
                break;
            }
            let cap_left = caps[&id] - allocated[&id];
            let give = pool.min(cap_left).max(0.0);
            *allocated.get_mut(&id).unwrap() += give;
            pool -= give;
        }
    }
    allocated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::compute_faction_multipliers;
    use crate::spatial::Point2;
    use crate::test_fixtures::{base_content, empty_faction_in, spawn_body, spawn_colony};
    use crate::types::ControlMode;
    use std::collections::HashMap;

    fn setup() -> (State, Content) {
        let content = base_content();
        let mut state = State::new(1);
        let faction = empty_faction_in(&mut state, "Test", ControlMode::Player);
        let sys = state.ids.next();
        state.systems.insert(
            sys,
            crate::types::StarSystem {
                id: sys,
                name: "Sys".to_string(),
                galaxy_position: Point2::new(0.0, 0.0),
                bodies: vec![],
                jump_points: vec![],
                ships: vec![],
                region_id: None,
                nebula_density: 0.0,
                storm_interval_days: None,
            },
        );
        let body = spawn_body(&mut state, sys, HashMap::from([("Duranium".to_string(), 1000.0)]));
        let colony = spawn_colony(&mut state, faction, body);
        state.colonies.get_mut(&colony).unwrap().installations.insert("mine_basic".to_string(), 1);
        (state, content)
    }

    #[test]
    fn single_colony_mining_conserves_mass() {
        let (mut state, content) = setup();
        let config = EngineConfig::default();
        let multipliers = compute_faction_multipliers(&state, &content);
        let mut events = Vec::new();
        let body = *state.bodies.keys().next().unwrap();
        let colony = *state.colonies.keys().next().unwrap();
        let before_deposit = state.bodies[&body].mineral_deposits["Duranium"];
        let before_stock = state.colonies[&colony].stock_of("Duranium");
        tick_mining(&mut state, &content, &config, &multipliers, 1.0, &mut events);
        let after_deposit = state.bodies[&body].mineral_deposits["Duranium"];
        let after_stock = state.colonies[&colony].stock_of("Duranium");
        let mined = before_deposit - after_deposit;
        let gained = after_stock - before_stock;
        assert!((mined - gained).abs() < 1e-9);
        assert!(mined > 0.0);
    }

    #[test]
    fn deposit_never_goes_negative() {
        let (mut state, content) = setup();
        let config = EngineConfig::default();
        let multipliers = compute_faction_multipliers(&state, &content);
        let mut events = Vec::new();
        for _ in 0..50 {
            tick_mining(&mut state, &content, &config, &multipliers, 1.0, &mut events);
        }
        let body = *state.bodies.keys().next().unwrap();
        assert!(state.bodies[&body].mineral_deposits["Duranium"] >= 0.0);
    }

    #[test]
    fn scarcity_arbitration_conserves_mass_across_two_colonies() {
        let (mut state, content) = setup();
        let sys = *state.systems.keys().next().unwrap();
        let faction = *state.factions.keys().next().unwrap();
        let body = *state.bodies.keys().next().unwrap();
        state.bodies.get_mut(&body).unwrap().mineral_deposits.insert("Duranium".to_string(), 10.0);
        let colony2 = spawn_colony(&mut state, faction, body);
        state.colonies.get_mut(&colony2).unwrap().installations.insert("mine_basic".to_string(), 1);
        let _ = sys;

        let config = EngineConfig::default();
        let multipliers = compute_faction_multipliers(&state, &content);
        let mut events = Vec::new();
        let before_deposit = state.bodies[&body].mineral_deposits["Duranium"];
        tick_mining(&mut state, &content, &config, &multipliers, 1.0, &mut events);
        let after_deposit = state.bodies[&body].mineral_deposits["Duranium"];
        let total_gained: f64 = state.colonies.values().map(|c| c.stock_of("Duranium")).sum();
        assert!((before_deposit - after_deposit - total_gained).abs() < 1e-9);
        assert_eq!(after_deposit, 0.0);
    }
}
