//! Shipyard construction and refits (component E, §4.E). Multiple
//! `yard_capacity` installations at a colony pool their tons/day capacity
//! into a single budget that the queue draws against in order; minerals are
//! paid per ton as the build progresses rather than all up front.

use crate::design::apply_design_to_ship;
use crate::economy::{effective_multiplier, OutputMultiplier};
use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{
    AutomationFlags, Content, EngineConfig, EventCategory, EventContext, EventLevel, HeatBucket,
    OutputClass, PowerPolicy, Ship, ShipyardBuildOrder, SimEvent, State,
};
use std::collections::HashMap;

fn yard_tons_budget(state: &State, colony_id: Id, content: &Content, mult: f64, dt_days: f64) -> f64 {
    let colony = &state.colonies[&colony_id];
    let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
    inst_ids.sort();
    let mut budget = 0.0;
    for inst_id in inst_ids {
        let count = colony.installations[inst_id];
        if count == 0 {
            continue;
        }
        let Some(def) = content.installations.get(inst_id) else { continue };
        if !def.yard_capacity {
            continue;
        }
        budget += def.cp_per_day * f64::from(count) * mult * dt_days;
    }
    budget
}

/// Max tons affordable this step given the colony's current mineral stock and
/// the content-wide per-ton build cost table.
fn affordable_tons(state: &State, colony_id: Id, content: &Content, requested_tons: f64) -> f64 {
    let colony = &state.colonies[&colony_id];
    let mut max_tons = requested_tons;
    for (mineral, per_ton) in &content.build_costs_per_ton.mineral_cost_per_ton {
        if *per_ton <= 0.0 {
            continue;
        }
        max_tons = max_tons.min(colony.stock_of(mineral) / per_ton);
    }
    max_tons.max(0.0)
}

fn pay_tons(state: &mut State, colony_id: Id, content: &Content, tons: f64) {
    if tons <= 0.0 {
        return;
    }
    let colony = state.colonies.get_mut(&colony_id).unwrap();
    let mut mineral_ids: Vec<&String> = content.build_costs_per_ton.mineral_cost_per_ton.keys().collect();
    mineral_ids.sort();
    for mineral in mineral_ids {
        let per_ton = content.build_costs_per_ton.mineral_cost_per_ton[mineral];
        if per_ton <= 0.0 {
            continue;
        }
        let entry = colony.minerals.entry(mineral.clone()).or_insert(0.0);
        *entry = (*entry - per_ton * tons).max(0.0);
    }
}

fn spawn_ship_from_design(state: &mut State, config: &EngineConfig, faction_id: Id, system_id: Id, position: crate::spatial::Point2, design_id: Id) -> Id {
    let design = state.designs[&design_id].clone();
    let id = state.ids.next();
    let mut ship = Ship {
        id,
        faction_id,
        system_id,
        position,
        velocity: crate::spatial::Point2::new(0.0, 0.0),
        design_id,
        hp: -1.0,
        shields: -1.0,
        fuel: -1.0,
        cargo: HashMap::new(),
        troops: -1.0,
        colonists: -1.0,
        missile_ammo: -1.0,
        heat: 0.0,
        heat_state: HeatBucket::Cold,
        maintenance_condition: 1.0,
        crew_grade_points: config.crew_experience.initial_grade_points,
        automation: AutomationFlags::default(),
        power_policy: PowerPolicy::default(),
        missile_cooldown_days: 0.0,
        boarding_cooldown_days: 0.0,
        name: format!("{} #{id}", design.name),
    };
    apply_design_to_ship(&mut ship, &design);
    state.ships.insert(id, ship);
    if let Some(sys) = state.systems.get_mut(&system_id) {
        sys.ships.push(id);
    }
    id
}

/// Runs one shipyard pass for `dt_days`: spends the pooled tons/day budget on
/// the head of each colony's queue (paying minerals per ton as it goes),
/// completing builds into new ships or refits into existing ones.
pub fn tick_shipyards(
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
    for colony_id in sorted_keys(&state.colonies) {
        if state.colonies[&colony_id].shipyard_queue.is_empty() {
            continue;
        }
        let faction_id = state.colonies[&colony_id].faction_id;
        let body_id = state.colonies[&colony_id].body_id;
        let system_id = state.bodies.get(&body_id).map(|b| b.system_id);
        let Some(system_id) = system_id else { continue };
        let position = state.bodies[&body_id].position;

        let mult = effective_multiplier(multipliers, faction_id, OutputClass::Shipyard);
        let mut tons_budget = yard_tons_budget(state, colony_id, content, mult, dt_days);
        if tons_budget <= 0.0 {
            continue;
        }

        let mut completed = Vec::new();
        let queue_len = state.colonies[&colony_id].shipyard_queue.len();
        for i in 0..queue_len {
            if tons_budget <= 1e-9 {
                break;
            }
            let mut entry = state.colonies[&colony_id].shipyard_queue[i].clone();
            let requested = tons_budget.min(entry.tons_remaining);
            let affordable = affordable_tons(state, colony_id, content, requested);
            if affordable <= 1e-9 {
                continue; // non-blocking: try the next entry with the remaining budget
            }
            pay_tons(state, colony_id, content, affordable);
            entry.tons_remaining -= affordable;
            tons_budget -= affordable;

            if entry.tons_remaining <= 1e-9 {
                complete_build(state, content, config, colony_id, faction_id, system_id, position, &entry, events);
                completed.push(i);
            } else {
                state.colonies.get_mut(&colony_id).unwrap().shipyard_queue[i] = entry;
            }
        }
        completed.sort_unstable();
        for &i in completed.iter().rev() {
            state.colonies.get_mut(&colony_id).unwrap().shipyard_queue.remove(i);
        }
    }
}

fn complete_build(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    colony_id: Id,
    faction_id: Id,
    system_id: Id,
    position: crate::spatial::Point2,
    entry: &ShipyardBuildOrder,
    events: &mut Vec<SimEvent>,
) {
    if let Some(refit_id) = entry.refit_ship_id {
        if let Some(design) = state.designs.get(&entry.design_id).cloned() {
            if let Some(ship) = state.ships.get_mut(&refit_id) {
                ship.design_id = entry.design_id;
                apply_design_to_ship(ship, &design);
            }
        }
        events.push(SimEvent {
            seq: 0,
            day: state.date.day,
            hour: state.date.hour_of_day,
            level: EventLevel::Info,
            category: EventCategory::Shipyard,
            message: format!("colony {colony_id} completed refit of ship {refit_id}"),
            context: EventContext { colony_id: Some(colony_id), ship_id: Some(refit_id), ..Default::default() },
        });
        return;
    }

    let ship_id = spawn_ship_from_design(state, config, faction_id, system_id, position, entry.design_id);
    if let Some(fleet_id) = entry.assign_fleet_id {
        if let Some(fleet) = state.fleets.get_mut(&fleet_id) {
            if !fleet.ship_ids.contains(&ship_id) {
                fleet.ship_ids.push(ship_id);
                fleet.ship_ids.sort_unstable();
            }
        }
    }
    if let Some(rally) = entry.rally_order.clone() {
        let _ = crate::orders::issue_order(state, ship_id, *rally, true, 0.0);
    }
    let _ = content; // design already resolved by id; content kept for symmetry with other completion paths
    events.push(SimEvent {
        seq: 0,
        day: state.date.day,
        hour: state.date.hour_of_day,
        level: EventLevel::Info,
        category: EventCategory::Shipyard,
        message: format!("colony {colony_id} completed ship {ship_id}"),
        context: EventContext { colony_id: Some(colony_id), ship_id: Some(ship_id), ..Default::default() },
    });
}

/// Queues `quantity` new-build orders for `design_id`, tons taken from the
/// design's `mass_tons`.
pub fn enqueue_new_build(state: &mut State, colony_id: Id, design_id: Id, quantity: u32, auto_queued: bool) {
    let Some(design) = state.designs.get(&design_id) else { return };
    let tons = design.mass_tons;
    let Some(colony) = state.colonies.get_mut(&colony_id) else { return };
    for _ in 0..quantity {
        colony.shipyard_queue.push(ShipyardBuildOrder {
            design_id,
            tons_remaining: tons,
            refit_ship_id: None,
            auto_queued,
            rally_order: None,
            assign_fleet_id: None,
        });
    }
}

/// Syncs a colony's new-build queue for `design_id` toward `target` ships,
/// trimming not-yet-started auto-queued entries or topping up, mirroring
/// [`crate::economy::construction::sync_auto_build_target`].
pub fn sync_ship_design_target(state: &mut State, colony_id: Id, design_id: Id, target: u32) {
    let Some(colony) = state.colonies.get_mut(&colony_id) else { return };
    let pending: u32 = colony
        .shipyard_queue
        .iter()
        .filter(|e| e.design_id == design_id && e.refit_ship_id.is_none())
        .count() as u32;
    if pending > target {
        let mut excess = pending - target;
        colony.shipyard_queue.retain(|e| {
            if excess == 0 || e.design_id != design_id || e.refit_ship_id.is_some() || !e.auto_queued {
                return true;
            }
            excess -= 1;
            false
        });
    } else if pending < target {
        let to_add = target - pending;
        drop(colony);
        enqueue_new_build(state, colony_id, design_id, to_add, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::compute_faction_multipliers;
    use crate::test_fixtures::{base_content, basic_design, two_system_state};

    fn setup() -> (State, Content, Id, Id) {
        let mut state = two_system_state();
        let faction_id = *state.factions.keys().next().unwrap();
        let sys_id = *state.systems.keys().next().unwrap();
        let mut content = base_content();
        content.installations.insert(
            "yard_basic".to_string(),
            crate::types::InstallationDef {
                id: "yard_basic".to_string(),
                name: "Basic Yard".to_string(),
                cp_per_day: 500.0,
                mineral_cost: std::collections::HashMap::new(),
                mining_capacity_tons_per_day: 0.0,
                research_per_day: 0.0,
                weapon_damage: 0.0,
                weapon_range_mkm: 0.0,
                sensor_range_mkm: 0.0,
                yard_capacity: true,
                cp_only: false,
                recipe_id: None,
                industry_capacity_tons_per_day: 0.0,
            },
        );
        content.build_costs_per_ton.mineral_cost_per_ton.insert("Duranium".to_string(), 1.0);
        let design_id = basic_design(&mut state);
        let body_id = crate::test_fixtures::spawn_body(&mut state, sys_id, std::collections::HashMap::new());
        let colony_id = crate::test_fixtures::spawn_colony(&mut state, faction_id, body_id);
        let colony = state.colonies.get_mut(&colony_id).unwrap();
        colony.minerals.insert("Duranium".to_string(), 100_000.0);
        colony.installations.insert("yard_basic".to_string(), 1);
        (state, content, colony_id, design_id)
    }

    #[test]
    fn new_build_completes_and_spawns_a_ship() {
        let (mut state, content, colony_id, design_id) = setup();
        enqueue_new_build(&mut state, colony_id, design_id, 1, false);
        let ships_before = state.ships.len();
        let config = crate::types::EngineConfig::default();
        let mut events = Vec::new();
        for _ in 0..50 {
            let multipliers = compute_faction_multipliers(&state, &content);
            tick_shipyards(&mut state, &content, &config, &multipliers, 1.0, &mut events);
        }
        assert_eq!(state.ships.len(), ships_before + 1);
        assert!(state.colonies[&colony_id].shipyard_queue.is_empty());
        assert!(events.iter().any(|e| e.category == EventCategory::Shipyard));
    }

    #[test]
    fn sync_target_trims_auto_queued_surplus() {
        let (mut state, _content, colony_id, design_id) = setup();
        sync_ship_design_target(&mut state, colony_id, design_id, 3);
        assert_eq!(state.colonies[&colony_id].shipyard_queue.len(), 3);
        sync_ship_design_target(&mut state, colony_id, design_id, 1);
        assert_eq!(state.colonies[&colony_id].shipyard_queue.len(), 1);
    }
}
