//! Execution of the non-movement `Order` variants (component C, continued).
//! [`crate::navigation::advance_ship_order`] owns `MoveToPoint`/`MoveToBody`/
//! `TravelViaJump`; everything else — cargo transfers, colonization, mining,
//! boarding/bombardment, salvage, anomaly investigation, scrapping — lands
//! here. Every handler mutates at most one ship and reads/writes the single
//! entity its order names; none of them move the ship.

use crate::design::purge_ship_references;
use crate::id::Id;
use crate::rng::HashRng;
use crate::sorted::sorted_keys;
use crate::types::{
    Colony, Content, EngineConfig, EventCategory, EventContext, EventLevel, Order, SimEvent, State,
};
use std::collections::HashMap;

/// Ticks progress on a jump-point survey until it reaches saturation. Not part
/// of `EngineConfig` since it depends on no ship stat the design carries; a
/// fixed rate keeps every surveyor equally capable, matching how unassigned
/// detection duties work elsewhere in this engine.
const SURVEY_PROGRESS_PER_DAY: f64 = 0.1;

const GROUND_COMBAT_ATTACKER_CASUALTY_FRACTION: f64 = 0.4;
const GROUND_COMBAT_DEFENDER_CASUALTY_FRACTION: f64 = 0.6;
const SCRAP_REFUND_FRACTION: f64 = 0.5;

/// Advances every ship's front non-movement order by `dt_days`. Run after
/// [`crate::navigation::advance_ship_order`] each tick: a ship whose front
/// order is a movement variant is skipped here (still in flight, or already
/// popped by the navigation pass).
pub fn tick_order_execution(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    dt_days: f64,
    events: &mut Vec<SimEvent>,
) {
    for ship_id in sorted_keys(&state.ship_orders) {
        if !state.ships.contains_key(&ship_id) {
            continue;
        }
        let Some(front) = state.ship_orders[&ship_id].queue.front().cloned() else { continue };
        if is_movement_order(&front) {
            continue;
        }
        let complete = execute_order(state, content, config, ship_id, &front, dt_days, events);
        let Some(orders) = state.ship_orders.get_mut(&ship_id) else { continue };
        if complete {
            orders.queue.pop_front();
            crate::orders::refill_from_repeat_template(orders);
        } else if let Some(replacement) = progressed_replacement(&front, dt_days) {
            orders.queue[0] = replacement;
        }
    }
}

fn is_movement_order(order: &Order) -> bool {
    matches!(order, Order::MoveToPoint { .. } | Order::MoveToBody { .. } | Order::TravelViaJump { .. })
}

/// For countdown-style orders that don't complete this tick, returns the order
/// with its remaining duration decremented so the next tick continues from
/// where this one left off.
fn progressed_replacement(order: &Order, dt_days: f64) -> Option<Order> {
    match order {
        Order::WaitDays { days } => Some(Order::WaitDays { days: (days - dt_days).max(0.0) }),
        Order::OrbitBody { body_id, duration_days } => {
            Some(Order::OrbitBody { body_id: *body_id, duration_days: (duration_days - dt_days).max(0.0) })
        }
        Order::BombardColony { colony_id, duration_days, progress_days } => Some(Order::BombardColony {
            colony_id: *colony_id,
            duration_days: *duration_days,
            progress_days: progress_days + dt_days,
        }),
        Order::InvestigateAnomaly { .. } => None,
        _ => None,
    }
}

#[allow(clippy::too_many_lines)]
fn execute_order(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    ship_id: Id,
    order: &Order,
    dt_days: f64,
    events: &mut Vec<SimEvent>,
) -> bool {
    let today = state.date.day;
    let hour = state.date.hour_of_day;
    match *order {
        Order::WaitDays { days } => days - dt_days <= 0.0,
        Order::ColonizeBody { body_id } => colonize_body(state, ship_id, body_id, today, hour, events),
        Order::OrbitBody { body_id, duration_days } => {
            if let (Some(body), Some(ship)) = (state.bodies.get(&body_id), state.ships.get_mut(&ship_id)) {
                ship.position = body.position;
            }
            duration_days - dt_days <= 0.0
        }
        Order::SurveyJumpPoint { jump_point_id, transit_when_done } => {
            survey_jump_point(state, ship_id, jump_point_id, transit_when_done, dt_days, today, hour, events)
        }
        Order::AttackShip { target_id, .. } => !state.ships.contains_key(&target_id),
        Order::EscortShip { target_id, follow_distance_mkm, .. } => {
            escort_ship(state, ship_id, target_id, follow_distance_mkm, dt_days, config)
        }
        Order::LoadMineral { ref mineral, colony_id } => load_mineral(state, content, ship_id, colony_id, mineral),
        Order::UnloadMineral { ref mineral, colony_id } => unload_mineral(state, ship_id, colony_id, mineral),
        Order::LoadTroops { colony_id, amount } => load_troops(state, content, ship_id, colony_id, amount),
        Order::UnloadTroops { colony_id, amount } => unload_troops(state, ship_id, colony_id, amount),
        Order::LoadColonists { colony_id, amount } => load_colonists(state, content, ship_id, colony_id, amount),
        Order::UnloadColonists { colony_id, amount } => unload_colonists(state, ship_id, colony_id, amount),
        Order::InvadeColony { colony_id } => invade_colony(state, ship_id, colony_id, today, hour, events),
        Order::BombardColony { colony_id, duration_days, progress_days } => {
            bombard_colony(state, ship_id, colony_id, duration_days, progress_days, dt_days, today, hour, events)
        }
        Order::TransferCargoToShip { target_ship_id, ref mineral, amount } => {
            transfer_cargo_to_ship(state, ship_id, target_ship_id, mineral, amount)
        }
        Order::TransferFuelToShip { target_ship_id, amount } => {
            transfer_fuel_to_ship(state, ship_id, target_ship_id, amount)
        }
        Order::TransferTroopsToShip { target_ship_id, amount } => {
            transfer_troops_to_ship(state, ship_id, target_ship_id, amount)
        }
        Order::SalvageWreck { wreck_id } => salvage_wreck(state, content, ship_id, wreck_id),
        Order::MineBody { body_id, stop_when_full } => mine_body(state, content, ship_id, body_id, stop_when_full, dt_days),
        Order::InvestigateAnomaly { anomaly_id } => {
            investigate_anomaly(state, content, config, ship_id, anomaly_id, dt_days, today, hour, events)
        }
        Order::ScrapShip => {
            scrap_ship(state, content, ship_id, today, hour, events);
            true
        }
        Order::MoveToPoint { .. } | Order::MoveToBody { .. } | Order::TravelViaJump { .. } => true,
    }
}

fn push_event(
    events: &mut Vec<SimEvent>,
    day: i64,
    hour: u8,
    level: EventLevel,
    category: EventCategory,
    message: String,
    context: EventContext,
) {
    events.push(SimEvent { seq: 0, day, hour, level, category, message, context });
}

fn remaining_cargo_capacity(ship: &crate::types::Ship, capacity: f64) -> f64 {
    let used: f64 = ship.cargo.values().sum();
    (capacity - used).max(0.0)
}

fn colonize_body(
    state: &mut State,
    ship_id: Id,
    body_id: Id,
    today: i64,
    hour: u8,
    events: &mut Vec<SimEvent>,
) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let faction_id = ship.faction_id;
    if state.colonies.values().any(|c| c.body_id == body_id && c.faction_id == faction_id) {
        return true;
    }
    let colonists = ship.colonists;
    if colonists <= 0.0 {
        return true;
    }
    let id = state.ids.next();
    state.colonies.insert(
        id,
        Colony {
            id,
            body_id,
            faction_id,
            population_millions: colonists,
            minerals: HashMap::new(),
            mineral_reserves: HashMap::new(),
            installations: HashMap::new(),
            installation_auto_targets: HashMap::new(),
            construction_queue: Vec::new(),
            shipyard_queue: Vec::new(),
            troop_strength: 0.0,
            troop_training_queue: 0.0,
            ground_forces: 0.0,
            conditions: Vec::new(),
        },
    );
    state.ships.get_mut(&ship_id).unwrap().colonists = 0.0;
    push_event(
        events,
        today,
        hour,
        EventLevel::Info,
        EventCategory::Economy,
        format!("faction {faction_id} founded a colony on body {body_id}"),
        EventContext { faction_id: Some(faction_id), ship_id: Some(ship_id), colony_id: Some(id), ..Default::default() },
    );
    true
}

fn survey_jump_point(
    state: &mut State,
    ship_id: Id,
    jump_point_id: Id,
    transit_when_done: bool,
    dt_days: f64,
    today: i64,
    hour: u8,
    events: &mut Vec<SimEvent>,
) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let faction_id = ship.faction_id;
    let Some(faction) = state.factions.get_mut(&faction_id) else { return true };
    let progress = faction.surveyed_jump_points.entry(jump_point_id).or_insert(0.0);
    *progress = (*progress + SURVEY_PROGRESS_PER_DAY * dt_days).min(1.0);
    if *progress < 1.0 {
        return false;
    }
    faction.surveyed_version = faction.surveyed_version.wrapping_add(1);
    if let Some(jp) = state.jump_points.get(&jump_point_id) {
        if let Some(linked) = state.jump_points.get(&jp.linked_jump_id) {
            let newly_discovered = faction.discovered_systems.insert(linked.system_id);
            if newly_discovered {
                faction.discovered_version = faction.discovered_version.wrapping_add(1);
            }
        }
    }
    push_event(
        events,
        today,
        hour,
        EventLevel::Info,
        EventCategory::Sensors,
        format!("faction {faction_id} completed survey of jump point {jump_point_id}"),
        EventContext { faction_id: Some(faction_id), ship_id: Some(ship_id), ..Default::default() },
    );
    if transit_when_done {
        if let Some(orders) = state.ship_orders.get_mut(&ship_id) {
            orders.queue.insert(1, Order::TravelViaJump { jump_point_id });
        }
    }
    true
}

fn escort_ship(
    state: &mut State,
    ship_id: Id,
    target_id: Id,
    follow_distance_mkm: f64,
    dt_days: f64,
    config: &EngineConfig,
) -> bool {
    let Some(target) = state.ships.get(&target_id) else { return true };
    let target_pos = target.position;
    let target_system = target.system_id;
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    if ship.system_id != target_system {
        // Out of system with its ward; nothing to do until a jump hop is
        // issued separately. Escort stays queued rather than completing.
        return false;
    }
    let speed = state.designs.get(&ship.design_id).map_or(0.0, |d| d.speed_km_s);
    if ship.position.distance_to(target_pos) <= follow_distance_mkm {
        return false;
    }
    let ship = state.ships.get_mut(&ship_id).unwrap();
    crate::navigation::step_movement_toward(&mut ship.position, target_pos, speed, dt_days, config.arrival_epsilon_mkm);
    false
}

fn load_mineral(state: &mut State, content: &Content, ship_id: Id, colony_id: Id, mineral: &str) -> bool {
    let Some(design_id) = state.ships.get(&ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&design_id).map_or(0.0, |d| d.cargo_capacity);
    let _ = content;
    let Some(colony) = state.colonies.get(&colony_id) else { return true };
    let available = colony.stock_of(mineral);
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let take = available.min(remaining_cargo_capacity(ship, capacity));
    if take <= 0.0 {
        return true;
    }
    state.colonies.get_mut(&colony_id).unwrap().minerals.insert(mineral.to_string(), available - take);
    let ship = state.ships.get_mut(&ship_id).unwrap();
    *ship.cargo.entry(mineral.to_string()).or_insert(0.0) += take;
    true
}

fn unload_mineral(state: &mut State, ship_id: Id, colony_id: Id, mineral: &str) -> bool {
    if !state.colonies.contains_key(&colony_id) {
        return true;
    }
    let Some(ship) = state.ships.get_mut(&ship_id) else { return true };
    let carried = ship.cargo.remove(mineral).unwrap_or(0.0);
    if carried <= 0.0 {
        return true;
    }
    let colony = state.colonies.get_mut(&colony_id).unwrap();
    *colony.minerals.entry(mineral.to_string()).or_insert(0.0) += carried;
    true
}

fn load_troops(state: &mut State, content: &Content, ship_id: Id, colony_id: Id, amount: f64) -> bool {
    let Some(design_id) = state.ships.get(&ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&design_id).map_or(0.0, |d| d.troop_capacity);
    let _ = content;
    let Some(colony) = state.colonies.get(&colony_id) else { return true };
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let take = amount.min(colony.troop_strength).min((capacity - ship.troops).max(0.0));
    if take <= 0.0 {
        return true;
    }
    state.colonies.get_mut(&colony_id).unwrap().troop_strength -= take;
    state.ships.get_mut(&ship_id).unwrap().troops += take;
    true
}

fn unload_troops(state: &mut State, ship_id: Id, colony_id: Id, amount: f64) -> bool {
    let Some(ship) = state.ships.get_mut(&ship_id) else { return true };
    let give = amount.min(ship.troops);
    if give <= 0.0 {
        return true;
    }
    ship.troops -= give;
    let Some(colony) = state.colonies.get_mut(&colony_id) else { return true };
    colony.troop_strength += give;
    true
}

fn load_colonists(state: &mut State, content: &Content, ship_id: Id, colony_id: Id, amount: f64) -> bool {
    let Some(design_id) = state.ships.get(&ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&design_id).map_or(0.0, |d| d.colonist_capacity);
    let _ = content;
    let Some(colony) = state.colonies.get(&colony_id) else { return true };
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let take = amount.min(colony.population_millions).min((capacity - ship.colonists).max(0.0));
    if take <= 0.0 {
        return true;
    }
    state.colonies.get_mut(&colony_id).unwrap().population_millions -= take;
    state.ships.get_mut(&ship_id).unwrap().colonists += take;
    true
}

fn unload_colonists(state: &mut State, ship_id: Id, colony_id: Id, amount: f64) -> bool {
    let Some(ship) = state.ships.get_mut(&ship_id) else { return true };
    let give = amount.min(ship.colonists);
    if give <= 0.0 {
        return true;
    }
    ship.colonists -= give;
    let Some(colony) = state.colonies.get_mut(&colony_id) else { return true };
    colony.population_millions += give;
    true
}

/// Ground invasion: instantaneous, odds driven by attacker troops vs. the
/// colony's combined garrison. The roll is derived from the day and the two
/// entity ids so a replay with the same seed and order stream reaches the
/// same outcome, matching the ship-boarding roll in `combat`.
fn invade_colony(
    state: &mut State,
    ship_id: Id,
    colony_id: Id,
    today: i64,
    hour: u8,
    events: &mut Vec<SimEvent>,
) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let attacker_faction = ship.faction_id;
    let attacker_troops = ship.troops;
    if attacker_troops <= 0.0 {
        return true;
    }
    let Some(colony) = state.colonies.get(&colony_id) else { return true };
    if colony.faction_id == attacker_faction {
        return true;
    }
    let defender = colony.troop_strength + colony.ground_forces;
    let seed = (today as u64) ^ ship_id.0.wrapping_mul(0x9E37_79B9) ^ colony_id.0.wrapping_mul(0x85EB_CA6B);
    let mut rng = HashRng::derive(seed, 0xC01A_D0DE);
    let chance = attacker_troops / (attacker_troops + defender * 2.0 + 1.0);
    let success = rng.next_u01() < chance;

    let attacker_losses = attacker_troops * GROUND_COMBAT_ATTACKER_CASUALTY_FRACTION;
    let defender_losses = defender * GROUND_COMBAT_DEFENDER_CASUALTY_FRACTION;
    state.ships.get_mut(&ship_id).unwrap().troops = (attacker_troops - attacker_losses).max(0.0);
    let colony = state.colonies.get_mut(&colony_id).unwrap();
    let remaining_defense = (defender - defender_losses).max(0.0);
    let ratio = if defender > 0.0 { remaining_defense / defender } else { 0.0 };
    colony.troop_strength *= ratio;
    colony.ground_forces *= ratio;

    if success {
        colony.faction_id = attacker_faction;
        colony.troop_strength = 0.0;
        colony.ground_forces = 0.0;
        if let Some(attacker) = state.factions.get_mut(&attacker_faction) {
            attacker.diplomacy.insert(colony_id, crate::types::DiplomaticStatus::Hostile);
        }
    }
    push_event(
        events,
        today,
        hour,
        if success { EventLevel::Warn } else { EventLevel::Info },
        EventCategory::Boarding,
        format!(
            "faction {attacker_faction} {} invasion of colony {colony_id}",
            if success { "won" } else { "failed" }
        ),
        EventContext { faction_id: Some(attacker_faction), ship_id: Some(ship_id), colony_id: Some(colony_id), ..Default::default() },
    );
    true
}

fn bombard_colony(
    state: &mut State,
    ship_id: Id,
    colony_id: Id,
    duration_days: f64,
    progress_days: f64,
    dt_days: f64,
    today: i64,
    hour: u8,
    events: &mut Vec<SimEvent>,
) -> bool {
    if progress_days + dt_days < duration_days {
        return false;
    }
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let attacker_faction = ship.faction_id;
    let Some(colony) = state.colonies.get_mut(&colony_id) else { return true };
    if colony.faction_id == attacker_faction {
        return true;
    }
    colony.population_millions = (colony.population_millions * 0.9).max(0.0);
    colony.ground_forces = (colony.ground_forces * 0.5).max(0.0);
    push_event(
        events,
        today,
        hour,
        EventLevel::Warn,
        EventCategory::Combat,
        format!("faction {attacker_faction} completed bombardment of colony {colony_id}"),
        EventContext { faction_id: Some(attacker_faction), ship_id: Some(ship_id), colony_id: Some(colony_id), ..Default::default() },
    );
    true
}

fn transfer_cargo_to_ship(state: &mut State, ship_id: Id, target_ship_id: Id, mineral: &str, amount: f64) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let available = ship.cargo.get(mineral).copied().unwrap_or(0.0);
    let Some(target_design_id) = state.ships.get(&target_ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&target_design_id).map_or(0.0, |d| d.cargo_capacity);
    let Some(target) = state.ships.get(&target_ship_id) else { return true };
    let room = remaining_cargo_capacity(target, capacity);
    let give = amount.min(available).min(room);
    if give <= 0.0 {
        return true;
    }
    *state.ships.get_mut(&ship_id).unwrap().cargo.entry(mineral.to_string()).or_insert(0.0) -= give;
    *state.ships.get_mut(&target_ship_id).unwrap().cargo.entry(mineral.to_string()).or_insert(0.0) += give;
    true
}

fn transfer_fuel_to_ship(state: &mut State, ship_id: Id, target_ship_id: Id, amount: f64) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let available = ship.fuel;
    let Some(target_design_id) = state.ships.get(&target_ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&target_design_id).map_or(0.0, |d| d.fuel_capacity);
    let Some(target) = state.ships.get(&target_ship_id) else { return true };
    let room = (capacity - target.fuel).max(0.0);
    let give = amount.min(available).min(room);
    if give <= 0.0 {
        return true;
    }
    state.ships.get_mut(&ship_id).unwrap().fuel -= give;
    state.ships.get_mut(&target_ship_id).unwrap().fuel += give;
    true
}

fn transfer_troops_to_ship(state: &mut State, ship_id: Id, target_ship_id: Id, amount: f64) -> bool {
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let available = ship.troops;
    let Some(target_design_id) = state.ships.get(&target_ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&target_design_id).map_or(0.0, |d| d.troop_capacity);
    let Some(target) = state.ships.get(&target_ship_id) else { return true };
    let room = (capacity - target.troops).max(0.0);
    let give = amount.min(available).min(room);
    if give <= 0.0 {
        return true;
    }
    state.ships.get_mut(&ship_id).unwrap().troops -= give;
    state.ships.get_mut(&target_ship_id).unwrap().troops += give;
    true
}

fn salvage_wreck(state: &mut State, content: &Content, ship_id: Id, wreck_id: Id) -> bool {
    let Some(design_id) = state.ships.get(&ship_id).map(|s| s.design_id) else { return true };
    let capacity = state.designs.get(&design_id).map_or(0.0, |d| d.cargo_capacity);
    let _ = content;
    let Some(wreck) = state.wrecks.get(&wreck_id).cloned() else { return true };
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let mut room = remaining_cargo_capacity(ship, capacity);
    if room <= 0.0 {
        return true;
    }
    let mut minerals = wreck.minerals;
    let ship = state.ships.get_mut(&ship_id).unwrap();
    for mineral in sorted_keys(&minerals) {
        if room <= 0.0 {
            break;
        }
        let have = minerals[&mineral];
        let take = have.min(room);
        *ship.cargo.entry(mineral.clone()).or_insert(0.0) += take;
        minerals.insert(mineral, have - take);
        room -= take;
    }
    minerals.retain(|_, v| *v > 1e-9);
    if minerals.is_empty() {
        state.wrecks.remove(&wreck_id);
    } else {
        state.wrecks.get_mut(&wreck_id).unwrap().minerals = minerals;
    }
    true
}

fn mine_body(state: &mut State, content: &Content, ship_id: Id, body_id: Id, stop_when_full: bool, dt_days: f64) -> bool {
    let Some(design_id) = state.ships.get(&ship_id).map(|s| s.design_id) else { return true };
    let Some(design) = state.designs.get(&design_id) else { return true };
    let rate = design.cargo_mining_rate * dt_days;
    let capacity = design.cargo_capacity;
    let _ = content;
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let room = remaining_cargo_capacity(ship, capacity);
    if room <= 0.0 {
        return stop_when_full;
    }
    let Some(body) = state.bodies.get(&body_id) else { return true };
    let total_remaining: f64 = body.mineral_deposits.values().sum();
    if total_remaining <= 0.0 {
        return true;
    }
    let take_total = rate.min(room).min(total_remaining);
    let mut remaining_to_take = take_total;
    let deposits: Vec<(String, f64)> = sorted_keys(&body.mineral_deposits)
        .into_iter()
        .map(|m| (m.clone(), body.mineral_deposits[&m]))
        .collect();
    let body = state.bodies.get_mut(&body_id).unwrap();
    let ship = state.ships.get_mut(&ship_id).unwrap();
    for (mineral, remaining) in deposits {
        if remaining_to_take <= 0.0 {
            break;
        }
        let share = take_total * (remaining / total_remaining);
        let take = share.min(remaining).min(remaining_to_take);
        if take <= 0.0 {
            continue;
        }
        body.mineral_deposits.insert(mineral.clone(), remaining - take);
        *ship.cargo.entry(mineral).or_insert(0.0) += take;
        remaining_to_take -= take;
    }
    false
}

fn investigate_anomaly(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    ship_id: Id,
    anomaly_id: Id,
    dt_days: f64,
    today: i64,
    hour: u8,
    events: &mut Vec<SimEvent>,
) -> bool {
    let _ = (config, dt_days);
    let Some(anomaly) = state.anomalies.get(&anomaly_id).cloned() else { return true };
    if anomaly.resolved {
        return true;
    }
    let Some(ship) = state.ships.get(&ship_id) else { return true };
    let faction_id = ship.faction_id;

    let seed = (today as u64) ^ anomaly_id.0.wrapping_mul(0x2545_F491) ^ ship_id.0.wrapping_mul(0x9E37_79B9);
    let mut rng = HashRng::derive(seed, 0xA7A0_1A6E);

    if anomaly.hazard_chance > 0.0 && rng.next_u01() < anomaly.hazard_chance {
        if let Some(ship) = state.ships.get_mut(&ship_id) {
            ship.hp = (ship.hp - anomaly.hazard_damage).max(0.0);
        }
    }

    if let Some(faction) = state.factions.get_mut(&faction_id) {
        if anomaly.research_reward > 0.0 {
            faction.research_progress_points += anomaly.research_reward;
        }
        if let Some(component_id) = &anomaly.component_unlock_id {
            faction.unlocked_components.insert(component_id.clone());
        }
    }
    if !anomaly.mineral_reward.is_empty() {
        let design_id = state.ships.get(&ship_id).map(|s| s.design_id);
        let capacity = design_id.and_then(|d| state.designs.get(&d)).map_or(0.0, |d| d.cargo_capacity);
        let _ = content;
        if let Some(ship) = state.ships.get_mut(&ship_id) {
            let mut room = remaining_cargo_capacity(ship, capacity);
            for mineral in sorted_keys(&anomaly.mineral_reward) {
                if room <= 0.0 {
                    break;
                }
                let take = anomaly.mineral_reward[&mineral].min(room);
                *ship.cargo.entry(mineral).or_insert(0.0) += take;
                room -= take;
            }
        }
    }

    let anomaly_mut = state.anomalies.get_mut(&anomaly_id).unwrap();
    anomaly_mut.resolved = true;
    anomaly_mut.resolver_faction_id = Some(faction_id);

    push_event(
        events,
        today,
        hour,
        EventLevel::Info,
        EventCategory::Procgen,
        format!("faction {faction_id} resolved anomaly {anomaly_id}"),
        EventContext { faction_id: Some(faction_id), ship_id: Some(ship_id), ..Default::default() },
    );
    true
}

/// Instantaneous: the ship is removed and a fraction of its hull value is
/// refunded as minerals to the lowest-id friendly colony sharing its system,
/// if any. Refunds are lost if no such colony exists, matching the rule that
/// minerals never teleport across systems elsewhere in this engine.
fn scrap_ship(state: &mut State, content: &Content, ship_id: Id, today: i64, hour: u8, events: &mut Vec<SimEvent>) {
    let Some(ship) = state.ships.get(&ship_id).cloned() else { return };
    let refund_colony = sorted_keys(&state.colonies)
        .into_iter()
        .find(|c| {
            let colony = &state.colonies[c];
            colony.faction_id == ship.faction_id
                && state.bodies.get(&colony.body_id).is_some_and(|b| b.system_id == ship.system_id)
        });
    if let Some(colony_id) = refund_colony {
        if let Some(design) = state.designs.get(&ship.design_id) {
            for (mineral, per_ton) in &content.build_costs_per_ton.mineral_cost_per_ton {
                let refund = per_ton * design.mass_tons * SCRAP_REFUND_FRACTION;
                if refund > 0.0 {
                    *state.colonies.get_mut(&colony_id).unwrap().minerals.entry(mineral.clone()).or_insert(0.0) += refund;
                }
            }
        }
    }
    push_event(
        events,
        today,
        hour,
        EventLevel::Info,
        EventCategory::Shipyard,
        format!("ship {ship_id} was scrapped"),
        EventContext { faction_id: Some(ship.faction_id), ship_id: Some(ship_id), system_id: Some(ship.system_id), ..Default::default() },
    );
    purge_ship_references(state, ship_id, ship.system_id);
    state.ships.remove(&ship_id);
}
