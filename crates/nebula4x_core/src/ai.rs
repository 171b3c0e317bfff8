//! Idle-ship automation and light faction-level policy (component G). Every
//! pass here only ever *issues orders* or adjusts faction bookkeeping; it
//! never mutates ship/colony state directly — that stays the job of
//! `order_exec`/`economy` once the order is actually executed.
//!
//! A ship only gets an automation decision when its order queue is empty:
//! automation never preempts a player- or template-issued order.

use crate::id::Id;
use crate::orders::issue_order;
use crate::sorted::sorted_keys;
use crate::types::{Colony, Content, EngineConfig, Order, State};

/// Runs every automation-flag pass plus faction-level housekeeping (research
/// queue refill, shipyard/construction target sync) for one tick.
pub fn tick_ai(state: &mut State, content: &Content, config: &EngineConfig, events: &mut Vec<crate::types::SimEvent>) {
    repair_research_queue_prereqs(state, content);
    refill_research_queues(state, content);
    sync_ship_design_targets(state, content);

    for ship_id in sorted_keys(&state.ships) {
        let has_orders = state.ship_orders.get(&ship_id).is_some_and(|o| !o.queue.is_empty());
        if has_orders {
            continue;
        }
        let Some(ship) = state.ships.get(&ship_id) else { continue };
        let automation = ship.automation;

        if automation.auto_refuel {
            auto_refuel(state, ship_id);
        }
        if automation.auto_repair {
            auto_repair(state, ship_id);
        }
        if automation.auto_tanker {
            auto_tanker(state, ship_id, config);
        }
        if automation.auto_salvage {
            auto_salvage(state, ship_id);
        }
        if automation.auto_colonize {
            auto_colonize(state, ship_id);
        }
        if automation.auto_explore {
            auto_explore(state, ship_id);
        }
        if automation.auto_freight {
            auto_freight(state, ship_id, config);
        }
    }
    let _ = events;
}

/// Docking at a friendly colony tops off fuel instantly; this engine has no
/// separate fuel-production chain, so a colony is treated as an unlimited
/// depot for its own faction's ships (mirrors how jump fuel cost is the only
/// place fuel is consumed at all).
fn auto_refuel(state: &mut State, ship_id: Id) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    if ship.fuel >= state.designs.get(&ship.design_id).map_or(0.0, |d| d.fuel_capacity) * ship.automation.auto_refuel_threshold {
        return;
    }
    let at_friendly_colony = sorted_keys(&state.colonies).into_iter().any(|c| {
        let colony = &state.colonies[&c];
        colony.faction_id == ship.faction_id
            && state.bodies.get(&colony.body_id).is_some_and(|b| b.system_id == ship.system_id)
    });
    if !at_friendly_colony {
        return;
    }
    let capacity = state.designs.get(&ship.design_id).map_or(0.0, |d| d.fuel_capacity);
    state.ships.get_mut(&ship_id).unwrap().fuel = capacity;
}

/// Docked repair: restores a small fraction of max hp/maintenance per day,
/// bounded by design caps. No mineral cost modeled; shipyard rebuilds cover
/// the heavier repair case.
fn auto_repair(state: &mut State, ship_id: Id) {
    const REPAIR_FRACTION_PER_DAY: f64 = 0.05;
    let Some(ship) = state.ships.get(&ship_id) else { return };
    let design_id = ship.design_id;
    let max_hp = state.designs.get(&design_id).map_or(0.0, |d| d.max_hp);
    if ship.hp >= max_hp * ship.automation.auto_repair_threshold {
        return;
    }
    let at_friendly_colony = sorted_keys(&state.colonies).into_iter().any(|c| {
        let colony = &state.colonies[&c];
        colony.faction_id == ship.faction_id
            && state.bodies.get(&colony.body_id).is_some_and(|b| b.system_id == ship.system_id)
    });
    if !at_friendly_colony {
        return;
    }
    let ship = state.ships.get_mut(&ship_id).unwrap();
    ship.hp = (ship.hp + max_hp * REPAIR_FRACTION_PER_DAY).min(max_hp);
    ship.maintenance_condition = (ship.maintenance_condition + REPAIR_FRACTION_PER_DAY).min(1.0);
}

/// A tanker idles toward the neediest same-system, same-faction ship below
/// `auto_tanker.request_threshold` and issues a refuel transfer.
fn auto_tanker(state: &mut State, ship_id: Id, config: &EngineConfig) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    let faction_id = ship.faction_id;
    let system_id = ship.system_id;
    let threshold = config.auto_tanker.request_threshold;

    let mut best: Option<(Id, f64)> = None;
    for other_id in sorted_keys(&state.ships) {
        if other_id == ship_id {
            continue;
        }
        let other = &state.ships[&other_id];
        if other.faction_id != faction_id || other.system_id != system_id {
            continue;
        }
        let capacity = state.designs.get(&other.design_id).map_or(0.0, |d| d.fuel_capacity);
        if capacity <= 0.0 {
            continue;
        }
        let fraction = other.fuel / capacity;
        if fraction < threshold && best.is_none_or(|(_, best_fraction)| fraction < best_fraction) {
            best = Some((other_id, fraction));
        }
    }
    let Some((target_id, _)) = best else { return };
    let amount = state.designs.get(&state.ships[&target_id].design_id).map_or(0.0, |d| d.fuel_capacity);
    let _ = issue_order(state, ship_id, Order::TransferFuelToShip { target_ship_id: target_id, amount }, true, config.jump_delay_days);
}

fn auto_salvage(state: &mut State, ship_id: Id) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    let system_id = ship.system_id;
    let Some(wreck_id) = sorted_keys(&state.wrecks).into_iter().find(|w| state.wrecks[w].system_id == system_id) else {
        return;
    };
    let _ = issue_order(state, ship_id, Order::SalvageWreck { wreck_id }, true, 0.05);
}

fn auto_colonize(state: &mut State, ship_id: Id) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    if ship.colonists <= 0.0 {
        return;
    }
    let faction_id = ship.faction_id;
    let system_id = ship.system_id;
    let colonized: std::collections::HashSet<Id> =
        state.colonies.values().filter(|c| c.faction_id == faction_id).map(|c| c.body_id).collect();
    let Some(body_id) = sorted_keys(&state.bodies)
        .into_iter()
        .find(|b| state.bodies[b].system_id == system_id && !colonized.contains(b) && !state.bodies[b].mineral_deposits.is_empty())
    else {
        return;
    };
    let _ = issue_order(state, ship_id, Order::MoveToBody { body_id }, true, 0.05);
    let _ = issue_order(state, ship_id, Order::ColonizeBody { body_id }, true, 0.05);
}

/// Sends an idle surveyor at the first not-yet-surveyed jump point in its
/// current system, discovering the system beyond once survey completes.
fn auto_explore(state: &mut State, ship_id: Id) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    let faction_id = ship.faction_id;
    let system_id = ship.system_id;
    let Some(faction) = state.factions.get(&faction_id) else { return };
    let Some(jp_id) = state.jump_points.values().find(|jp| {
        jp.system_id == system_id && faction.surveyed_jump_points.get(&jp.id).copied().unwrap_or(0.0) < 1.0
    }).map(|jp| jp.id) else {
        return;
    };
    let _ = issue_order(state, ship_id, Order::SurveyJumpPoint { jump_point_id: jp_id, transit_when_done: false }, true, 0.05);
}

/// Moves surplus minerals (stock above the colony's own reserve floor, by at
/// least `min_transfer_tons`) from one same-faction colony to a deficit
/// colony in a different system the freighter can route to.
fn auto_freight(state: &mut State, ship_id: Id, config: &EngineConfig) {
    let Some(ship) = state.ships.get(&ship_id) else { return };
    let faction_id = ship.faction_id;
    let cfg = &config.auto_freight;

    let colony_ids: Vec<Id> = sorted_keys(&state.colonies).into_iter().filter(|c| state.colonies[c].faction_id == faction_id).collect();
    let mut surplus: Option<(Id, String, f64)> = None;
    let mut deficit: Option<Id> = None;
    'outer: for &c in &colony_ids {
        let colony: &Colony = &state.colonies[&c];
        for mineral in sorted_keys(&colony.minerals) {
            let stock = colony.stock_of(&mineral);
            let reserve = colony.reserve_of(&mineral);
            let surplus_amount = (stock - reserve) * cfg.max_take_fraction_of_surplus;
            if surplus_amount >= cfg.min_transfer_tons {
                surplus = Some((c, mineral, surplus_amount));
                if !cfg.multi_mineral {
                    break 'outer;
                }
                break;
            }
        }
        if surplus.is_some() && !cfg.multi_mineral {
            break;
        }
    }
    let Some((from_colony, mineral, _amount)) = surplus else { return };
    for &c in &colony_ids {
        if c == from_colony {
            continue;
        }
        if state.colonies[&c].stock_of(&mineral) < state.colonies[&c].reserve_of(&mineral) {
            deficit = Some(c);
            break;
        }
    }
    let Some(to_colony) = deficit else { return };
    if issue_order(state, ship_id, Order::LoadMineral { mineral: mineral.clone(), colony_id: from_colony }, true, 0.05).is_ok() {
        let _ = issue_order(state, ship_id, Order::UnloadMineral { mineral, colony_id: to_colony }, true, 0.05);
    }
}

/// Keeps each colony's shipyard build targets matching its faction's
/// `ship_design_targets`, the one place that faction-level field is read.
fn sync_ship_design_targets(state: &mut State, content: &Content) {
    for faction_id in sorted_keys(&state.factions) {
        let targets = state.factions[&faction_id].ship_design_targets.clone();
        if targets.is_empty() {
            continue;
        }
        for colony_id in sorted_keys(&state.colonies) {
            if state.colonies[&colony_id].faction_id != faction_id {
                continue;
            }
            let has_yard = state.colonies[&colony_id]
                .installations
                .keys()
                .any(|inst_id| content.installations.get(inst_id).is_some_and(|d| d.yard_capacity));
            if !has_yard {
                continue;
            }
            for (&design_id, &target) in &targets {
                crate::economy::shipyards::sync_ship_design_target(state, colony_id, design_id, target);
            }
        }
    }
}

/// Walks each faction's research queue and splices in any missing
/// prerequisite techs directly ahead of the entry that needs them, in
/// dependency order. Handles a queue seeded (by a template, a save migration,
/// or a player edit) with a tech whose prereqs were never queued — without
/// this, that tech would simply sit unstartable forever.
fn repair_research_queue_prereqs(state: &mut State, content: &Content) {
    for faction_id in sorted_keys(&state.factions) {
        let faction = &state.factions[&faction_id];
        if faction.research_queue.is_empty() {
            continue;
        }
        let original = faction.research_queue.clone();
        let mut satisfied: std::collections::HashSet<String> = faction.known_techs.iter().cloned().collect();
        let mut repaired: Vec<String> = Vec::new();
        for tech_id in &original {
            insert_with_prereqs(tech_id, content, &mut satisfied, &mut repaired, &mut Vec::new());
        }
        state.factions.get_mut(&faction_id).unwrap().research_queue = repaired;
    }
}

/// Depth-first insert of `tech_id` into `order`, recursing into its prereqs
/// first so the result is always a valid topological ordering. `visiting`
/// guards against cyclic prereq data in content.
fn insert_with_prereqs(
    tech_id: &str,
    content: &Content,
    satisfied: &mut std::collections::HashSet<String>,
    order: &mut Vec<String>,
    visiting: &mut Vec<String>,
) {
    if satisfied.contains(tech_id) || visiting.iter().any(|v| v == tech_id) {
        return;
    }
    visiting.push(tech_id.to_string());
    if let Some(tech) = content.tech_by_id(tech_id) {
        for prereq in tech.prereqs.clone() {
            insert_with_prereqs(&prereq, content, satisfied, order, visiting);
        }
    }
    visiting.pop();
    if satisfied.insert(tech_id.to_string()) {
        order.push(tech_id.to_string());
    }
}

/// Queues the cheapest not-yet-known tech whose prereqs are satisfied, once a
/// faction's active slot and queue both run dry.
fn refill_research_queues(state: &mut State, content: &Content) {
    for faction_id in sorted_keys(&state.factions) {
        let faction = &state.factions[&faction_id];
        if faction.active_research.is_some() || !faction.research_queue.is_empty() {
            continue;
        }
        let known: std::collections::HashSet<&str> = faction.known_techs.iter().map(String::as_str).collect();
        let mut candidates: Vec<&crate::types::TechDef> = content
            .techs
            .iter()
            .filter(|t| !known.contains(t.id.as_str()) && t.prereqs.iter().all(|p| known.contains(p.as_str())))
            .collect();
        candidates.sort_by(|a, b| a.cost_rp.partial_cmp(&b.cost_rp).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.id.cmp(&b.id)));
        let Some(pick) = candidates.first() else { continue };
        state.factions.get_mut(&faction_id).unwrap().research_queue.push(pick.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Point2;
    use crate::test_fixtures::{base_content, basic_design, spawn_ship, two_system_state};

    #[test]
    fn idle_refuel_tops_off_at_friendly_colony() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        let sys = *state.systems.keys().next().unwrap();
        let body = crate::test_fixtures::spawn_body(&mut state, sys, Default::default());
        crate::test_fixtures::spawn_colony(&mut state, faction_id, body);
        let design = basic_design(&mut state);
        let ship = spawn_ship(&mut state, faction_id, sys, design, Point2::new(0.0, 0.0));
        state.ships.get_mut(&ship).unwrap().fuel = 1.0;
        state.ships.get_mut(&ship).unwrap().automation.auto_refuel = true;
        state.ships.get_mut(&ship).unwrap().automation.auto_refuel_threshold = 0.9;

        let mut events = Vec::new();
        tick_ai(&mut state, &content, &config, &mut events);
        let capacity = state.designs[&design].fuel_capacity;
        assert_eq!(state.ships[&ship].fuel, capacity);
    }

    #[test]
    fn research_queue_refills_when_empty() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let mut events = Vec::new();
        tick_ai(&mut state, &content, &config, &mut events);
        let faction_id = *state.factions.keys().next().unwrap();
        assert!(!state.factions[&faction_id].research_queue.is_empty());
    }

    #[test]
    fn research_queue_repairs_missing_prereqs_in_dependency_order() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        {
            let faction = state.factions.get_mut(&faction_id).unwrap();
            faction.known_techs.clear();
            faction.research_queue = vec!["automation_1".to_string()];
        }
        let mut events = Vec::new();
        tick_ai(&mut state, &content, &config, &mut events);
        assert_eq!(
            state.factions[&faction_id].research_queue,
            vec![
                "chemistry_1".to_string(),
                "nuclear_1".to_string(),
                "reactors_2".to_string(),
                "materials_processing_1".to_string(),
                "automation_1".to_string(),
            ]
        );
    }
}
