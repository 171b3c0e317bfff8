//! Order issuance, repeat templates, and fleet fan-out (component C). Order
//! compilation onto a ship — resolving the required system for the semantic
//! order and injecting `TravelViaJump` hops ahead of it — is atomic: on any
//! routing failure nothing is enqueued.

use crate::errors::ValidationError;
use crate::id::Id;
use crate::navigation::plan_route;
use crate::types::{Order, ShipOrders, State};

/// Returns the system an order's target entity resides in, if resolvable.
fn required_system_for_order(state: &State, order: &Order) -> Option<Id> {
    match order {
        Order::MoveToBody { body_id } | Order::ColonizeBody { body_id } | Order::OrbitBody { body_id, .. } | Order::MineBody { body_id, .. } => {
            state.bodies.get(body_id).map(|b| b.system_id)
        }
        Order::LoadMineral { colony_id, .. }
        | Order::UnloadMineral { colony_id, .. }
        | Order::LoadTroops { colony_id, .. }
        | Order::UnloadTroops { colony_id, .. }
        | Order::LoadColonists { colony_id, .. }
        | Order::UnloadColonists { colony_id, .. }
        | Order::InvadeColony { colony_id }
        | Order::BombardColony { colony_id, .. } => state
            .colonies
            .get(colony_id)
            .and_then(|c| state.bodies.get(&c.body_id))
            .map(|b| b.system_id),
        Order::AttackShip { target_id, .. }
        | Order::EscortShip { target_id, .. }
        | Order::TransferCargoToShip { target_ship_id: target_id, .. }
        | Order::TransferFuelToShip { target_ship_id: target_id, .. }
        | Order::TransferTroopsToShip { target_ship_id: target_id, .. } => {
            state.ships.get(target_id).map(|s| s.system_id)
        }
        Order::SalvageWreck { wreck_id } => state.wrecks.get(wreck_id).map(|w| w.system_id),
        Order::InvestigateAnomaly { anomaly_id } => {
            state.anomalies.get(anomaly_id).map(|a| a.system_id)
        }
        Order::SurveyJumpPoint { jump_point_id, .. } => {
            state.jump_points.get(jump_point_id).map(|j| j.system_id)
        }
        Order::WaitDays { .. }
        | Order::MoveToPoint { .. }
        | Order::TravelViaJump { .. }
        | Order::ScrapShip => None,
    }
}

/// The ship's predicted system after every order already queued (i.e. the system
/// its last queued `TravelViaJump` would leave it in), or its current system.
fn predicted_system(state: &State, ship_id: Id) -> Id {
    let current = state.ships[&ship_id].system_id;
    let Some(orders) = state.ship_orders.get(&ship_id) else { return current };
    let mut predicted = current;
    for order in &orders.queue {
        if let Order::TravelViaJump { jump_point_id } = order {
            if let Some(jp) = state.jump_points.get(jump_point_id) {
                if let Some(linked) = state.jump_points.get(&jp.linked_jump_id) {
                    predicted = linked.system_id;
                }
            }
        }
    }
    predicted
}

/// Compiles the route hops needed to reach `required_system` from the ship's
/// predicted nav state, returning them in queue order (source-side jump ids).
fn route_hops(
    state: &State,
    ship_id: Id,
    required_system: Id,
    restrict_to_discovered: bool,
    jump_delay_days: f64,
) -> Result<Vec<Order>, ValidationError> {
    let ship = &state.ships[&ship_id];
    let from_system = predicted_system(state, ship_id);
    if from_system == required_system {
        return Ok(Vec::new());
    }
    let speed = state.designs.get(&ship.design_id).map_or(0.0, |d| d.speed_km_s);
    let route = plan_route(
        state,
        from_system,
        ship.faction_id,
        required_system,
        restrict_to_discovered,
        speed,
        ship.position,
        None,
        jump_delay_days,
    )
    .ok_or(ValidationError::NoRoute { from: from_system, to: required_system })?;
    Ok(route
        .jump_points
        .into_iter()
        .map(|jp| Order::TravelViaJump { jump_point_id: jp })
        .collect())
}

/// Issues a single order to a ship, auto-injecting jump hops ahead of it when the
/// order's target lives in a different system. Atomic: either the whole compiled
/// sequence is enqueued, or nothing is.
pub fn issue_order(
    state: &mut State,
    ship_id: Id,
    order: Order,
    restrict_to_discovered: bool,
    jump_delay_days: f64,
) -> Result<(), ValidationError> {
    if !state.ships.contains_key(&ship_id) {
        return Err(ValidationError::UnknownEntity(ship_id));
    }
    let mut to_enqueue = Vec::new();
    if let Some(required_system) = required_system_for_order(state, &order) {
        to_enqueue.extend(route_hops(state, ship_id, required_system, restrict_to_discovered, jump_delay_days)?);
    }
    to_enqueue.push(order);

    let orders = state.ship_orders.entry(ship_id).or_default();
    orders.queue.extend(to_enqueue);
    Ok(())
}

/// Compiles a named template onto a ship. Atomic across the whole template: if
/// any order fails to route, nothing from the template is enqueued.
pub fn apply_template_smart(
    state: &mut State,
    ship_id: Id,
    template_orders: &[Order],
    restrict_to_discovered: bool,
    jump_delay_days: f64,
) -> Result<(), ValidationError> {
    if !state.ships.contains_key(&ship_id) {
        return Err(ValidationError::UnknownEntity(ship_id));
    }
    let mut compiled = Vec::new();
    // Simulate predicted_system advancement using a scratch copy of the queue.
    // The original queue is saved up front so any routing failure mid-loop can
    // restore `state.ship_orders` to its pre-call value before returning: the
    // mid-loop writes below are scratch state, never the committed result.
    let original = state.ship_orders.get(&ship_id).cloned();
    let mut scratch = original.clone().unwrap_or_default();
    for order in template_orders {
        if let Some(required_system) = required_system_for_order(state, order) {
            state.ship_orders.insert(ship_id, scratch.clone());
            let hops = match route_hops(state, ship_id, required_system, restrict_to_discovered, jump_delay_days) {
                Ok(hops) => hops,
                Err(err) => {
                    restore_ship_orders(state, ship_id, original);
                    return Err(err);
                }
            };
            compiled.extend(hops.clone());
            scratch.queue.extend(hops);
        }
        compiled.push(order.clone());
        scratch.queue.push_back(order.clone());
    }
    let mut committed = original.unwrap_or_default();
    committed.queue.extend(compiled);
    state.ship_orders.insert(ship_id, committed);
    Ok(())
}

fn restore_ship_orders(state: &mut State, ship_id: Id, original: Option<ShipOrders>) {
    match original {
        Some(orders) => {
            state.ship_orders.insert(ship_id, orders);
        }
        None => {
            state.ship_orders.remove(&ship_id);
        }
    }
}

/// Fleet fan-out: if every member is in the same predicted system, plans once
/// from the leader and pushes identical `TravelViaJump` orders to all members;
/// otherwise issues per-ship.
pub fn issue_fleet_order(
    state: &mut State,
    fleet_id: Id,
    order: Order,
    restrict_to_discovered: bool,
    jump_delay_days: f64,
) -> Result<(), ValidationError> {
    let Some(fleet) = state.fleets.get(&fleet_id).cloned() else {
        return Err(ValidationError::UnknownEntity(fleet_id));
    };
    if fleet.ship_ids.is_empty() {
        return Ok(());
    }
    let predicted: Vec<Id> = fleet
        .ship_ids
        .iter()
        .map(|&s| predicted_system(state, s))
        .collect();
    let co_located = predicted.windows(2).all(|w| w[0] == w[1]);

    if co_located {
        if let Some(required_system) = required_system_for_order(state, &order) {
            let hops = route_hops(state, fleet.leader_id, required_system, restrict_to_discovered, jump_delay_days)?;
            for &ship_id in &fleet.ship_ids {
                let orders = state.ship_orders.entry(ship_id).or_default();
                orders.queue.extend(hops.clone());
                orders.queue.push_back(order.clone());
            }
            return Ok(());
        }
    }
    for &ship_id in &fleet.ship_ids {
        issue_order(state, ship_id, order.clone(), restrict_to_discovered, jump_delay_days)?;
    }
    Ok(())
}

/// Enables repeat on a ship's queue, snapshotting the current queue as the
/// template. `-1` means infinite repeats.
pub fn enable_order_repeat(state: &mut State, ship_id: Id, repeat_count: i64) {
    if let Some(orders) = state.ship_orders.get_mut(&ship_id) {
        orders.repeat = true;
        orders.repeat_count_remaining = repeat_count;
        orders.repeat_template = orders.queue.iter().cloned().collect();
    }
}

/// Called once the queue drains; refills from the template if repeats remain.
pub fn refill_from_repeat_template(orders: &mut ShipOrders) {
    if !orders.queue.is_empty() || !orders.repeat || orders.repeat_count_remaining == 0 {
        return;
    }
    orders.queue.extend(orders.repeat_template.iter().cloned());
    if orders.repeat_count_remaining > 0 {
        orders.repeat_count_remaining -= 1;
        if orders.repeat_count_remaining == 0 {
            orders.repeat = false;
        }
    }
}

pub fn delete_queued_order(orders: &mut ShipOrders, index: usize) -> Result<(), ValidationError> {
    if index >= orders.queue.len() {
        return Err(ValidationError::QueueIndexOutOfRange { index, len: orders.queue.len() });
    }
    orders.queue.remove(index);
    Ok(())
}

pub fn move_queued_order(orders: &mut ShipOrders, from: usize, to: usize) -> Result<(), ValidationError> {
    let len = orders.queue.len();
    if from >= len || to >= len {
        return Err(ValidationError::QueueIndexOutOfRange { index: from.max(to), len });
    }
    if let Some(item) = orders.queue.remove(from) {
        orders.queue.insert(to, item);
    }
    Ok(())
}

pub fn duplicate_queued_order(orders: &mut ShipOrders, index: usize) -> Result<(), ValidationError> {
    let len = orders.queue.len();
    let item = orders
        .queue
        .get(index)
        .cloned()
        .ok_or(ValidationError::QueueIndexOutOfRange { index, len })?;
    orders.queue.insert(index + 1, item);
    Ok(())
}

pub fn clear_orders(orders: &mut ShipOrders) {
    orders.queue.clear();
    orders.repeat = false;
    orders.repeat_count_remaining = 0;
}

pub fn cancel_current_order(orders: &mut ShipOrders) {
    orders.queue.pop_front();
}
