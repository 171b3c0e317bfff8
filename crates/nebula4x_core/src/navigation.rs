//! Jump-route planning and per-tick ship movement (component D). Route planning
//! is a pure function of the graph plus a faction's discovery state; the cache in
//! [`RouteCache`] is a versioned memo, never a source of truth.

use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::spatial::Point2;
use crate::types::{Content, EngineConfig, Order, State};
use ahash::AHashMap;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Result of route planning: ordered source-side jump point ids plus total ETA.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub jump_points: Vec<Id>,
    pub eta_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteCacheKey {
    pub start_system: Id,
    pub faction_id: Id,
    pub goal_system: Id,
    pub restrict_to_discovered: bool,
    pub discovered_version: u64,
    pub surveyed_version: u64,
    pub jump_topology_version: u64,
}

#[derive(Debug, Default)]
pub struct RouteCache {
    entries: HashMap<RouteCacheKey, PlannedRoute>,
}

impl RouteCache {
    #[must_use]
    pub fn new() -> Self {
        RouteCache { entries: HashMap::new() }
    }

    #[must_use]
    pub fn get(&self, key: &RouteCacheKey) -> Option<&PlannedRoute> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: RouteCacheKey, route: PlannedRoute) {
        self.entries.insert(key, route);
    }
}

/// Cheap version stamp for the jump-point topology: the count plus id-sum of
/// all jump points. Changes whenever one is added, removed, or relinked, which
/// is the only time a cached route could become stale for reasons other than
/// a faction's own discovery state.
#[must_use]
pub fn jump_topology_version(state: &State) -> u64 {
    let mut version = state.jump_points.len() as u64;
    for jp_id in sorted_keys(&state.jump_points) {
        let jp = &state.jump_points[&jp_id];
        version = version.wrapping_mul(31).wrapping_add(jp_id.0).wrapping_add(jp.linked_jump_id.0);
    }
    version
}

/// Same as [`plan_route`] but memoized in `cache`, keyed on every input that
/// can change the result (including discovery/survey versions and jump
/// topology, so a cache built before a new jump point is surveyed or linked
/// never returns a stale route).
pub fn plan_route_cached(
    state: &State,
    cache: &mut RouteCache,
    start_system: Id,
    faction_id: Id,
    goal_system: Id,
    restrict_to_discovered: bool,
    ship_speed_km_s: f64,
    start_pos: Point2,
    goal_pos: Option<Point2>,
    jump_delay_days: f64,
) -> Option<PlannedRoute> {
    let faction = state.factions.get(&faction_id);
    let key = RouteCacheKey {
        start_system,
        faction_id,
        goal_system,
        restrict_to_discovered,
        discovered_version: faction.map_or(0, |f| f.discovered_version),
        surveyed_version: faction.map_or(0, |f| f.surveyed_version),
        jump_topology_version: jump_topology_version(state),
    };
    if let Some(route) = cache.get(&key) {
        return Some(route.clone());
    }
    let route = plan_route(
        state,
        start_system,
        faction_id,
        goal_system,
        restrict_to_discovered,
        ship_speed_km_s,
        start_pos,
        goal_pos,
        jump_delay_days,
    )?;
    cache.insert(key, route.clone());
    Some(route)
}

fn system_graph(state: &State) -> AHashMap<Id, Vec<(Id, Id)>> {
    let mut adjacency: AHashMap<Id, Vec<(Id, Id)>> = AHashMap::new();
    for jp_id in sorted_keys(&state.jump_points) {
        let jp = &state.jump_points[&jp_id];
        if let Some(linked) = state.jump_points.get(&jp.linked_jump_id) {
            adjacency
                .entry(jp.system_id)
                .or_default()
                .push((jp.id, linked.system_id));
        }
    }
    adjacency
}

/// BFS over the undirected system graph. `restrict_to_discovered` filters both the
/// systems and the jump points a faction may traverse. Ties broken by
/// `(system_id, jump_point_id)` ascending via the sorted adjacency construction.
#[must_use]
pub fn plan_route(
    state: &State,
    start_system: Id,
    faction_id: Id,
    goal_system: Id,
    restrict_to_discovered: bool,
    ship_speed_km_s: f64,
    start_pos: Point2,
    goal_pos: Option<Point2>,
    jump_delay_days: f64,
) -> Option<PlannedRoute> {
    if start_system == goal_system {
        return Some(PlannedRoute { jump_points: Vec::new(), eta_days: 0.0 });
    }
    let adjacency = system_graph(state);
    let faction = state.factions.get(&faction_id);

    let allowed_jp = |jp_id: Id| -> bool {
        if !restrict_to_discovered {
            return true;
        }
        faction.is_some_and(|f| f.surveyed_jump_points.contains_key(&jp_id))
    };
    let allowed_system = |sys_id: Id| -> bool {
        if !restrict_to_discovered {
            return true;
        }
        faction.is_some_and(|f| f.discovered_systems.contains(&sys_id))
    };

    if restrict_to_discovered && !allowed_system(start_system) {
        return None;
    }

    // Dijkstra by travel time, ties broken by (system_id, jump_point_id) via the
    // deterministic pop order of a min-heap keyed on (cost_bits, system, jp).
    #[derive(PartialEq)]
    struct HeapItem {
        cost: f64,
        system: Id,
        via_jp: Option<Id>,
    }
    impl Eq for HeapItem {}
    impl Ord for HeapItem {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            other
                .cost
                .partial_cmp(&self.cost)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| self.system.cmp(&other.system))
                .then_with(|| self.via_jp.cmp(&other.via_jp))
        }
    }
    impl PartialOrd for HeapItem {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut best_cost: HashMap<Id, f64> = HashMap::new();
    let mut came_from: HashMap<Id, (Id, Id)> = HashMap::new(); // system -> (prev_system, jp_used)
    let mut heap = BinaryHeap::new();
    best_cost.insert(start_system, 0.0);
    heap.push(HeapItem { cost: 0.0, system: start_system, via_jp: None });

    while let Some(HeapItem { cost, system, .. }) = heap.pop() {
        if system == goal_system {
            break;
        }
        if cost > *best_cost.get(&system).unwrap_or(&f64::INFINITY) {
            continue;
        }
        let Some(edges) = adjacency.get(&system) else { continue };
        for &(jp_id, next_system) in edges {
            if !allowed_jp(jp_id) || !allowed_system(next_system) {
                continue;
            }
            let jp = &state.jump_points[&jp_id];
            let travel_time = if ship_speed_km_s > 0.0 {
                // Position before this leg is approximated by start_pos on the
                // first hop; subsequent hops begin at their source jump point.
                let from_pos = if system == start_system { start_pos } else { jp.position };
                from_pos.distance_to(jp.position) / (ship_speed_km_s * 86_400.0 / 1_000_000.0)
            } else {
                0.0
            };
            let leg_cost = travel_time + jump_delay_days;
            let next_cost = cost + leg_cost;
            if next_cost < *best_cost.get(&next_system).unwrap_or(&f64::INFINITY) {
                best_cost.insert(next_system, next_cost);
                came_from.insert(next_system, (system, jp_id));
                heap.push(HeapItem { cost: next_cost, system: next_system, via_jp: Some(jp_id) });
            }
        }
    }

    if !best_cost.contains_key(&goal_system) {
        return None;
    }

    let mut path_jps = VecDeque::new();
    let mut cur = goal_system;
    while let Some(&(prev, jp_id)) = came_from.get(&cur) {
        path_jps.push_front(jp_id);
        cur = prev;
    }
    let mut eta = *best_cost.get(&goal_system).unwrap();
    if let (Some(goal), Some(&last_jp)) = (goal_pos, path_jps.back()) {
        if let Some(last) = state.jump_points.get(&last_jp) {
            if let Some(linked) = state.jump_points.get(&last.linked_jump_id) {
                if ship_speed_km_s > 0.0 {
                    let final_leg = linked.position.distance_to(goal)
                        / (ship_speed_km_s * 86_400.0 / 1_000_000.0);
                    eta += final_leg;
                }
            }
        }
    }

    Some(PlannedRoute { jump_points: path_jps.into_iter().collect(), eta_days: eta })
}

/// Plain BFS reachability check, ignoring discovery restrictions — used for
/// connectivity properties (e.g. "every system reaches every other system").
#[must_use]
pub fn bfs_reachable(state: &State, start_system: Id) -> HashSet<Id> {
    let adjacency = system_graph(state);
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start_system);
    queue.push_back(start_system);
    while let Some(sys) = queue.pop_front() {
        if let Some(edges) = adjacency.get(&sys) {
            for &(_, next) in edges {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    visited
}

/// Per-tick movement for one ship's current order, given elapsed `dt_days`.
/// Returns `true` if the order completed and should be popped from the queue.
pub fn step_movement_toward(
    position: &mut Point2,
    target: Point2,
    speed_km_s: f64,
    dt_days: f64,
    arrival_epsilon_mkm: f64,
) -> bool {
    let dx = target.x - position.x;
    let dy = target.y - position.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= arrival_epsilon_mkm {
        *position = target;
        return true;
    }
    let step = speed_km_s * dt_days * 86_400.0 / 1_000_000.0;
    if step >= dist {
        *position = target;
        true
    } else {
        let ux = dx / dist;
        let uy = dy / dist;
        position.x += ux * step;
        position.y += uy * step;
        false
    }
}

pub fn jump_fuel_cost(fuel_use_per_mkm: f64, jump_transfer_cost: f64) -> f64 {
    fuel_use_per_mkm * jump_transfer_cost
}

/// Resolves the next order for a ship (movement-family orders only); advances
/// position in place. Returns `true` when the order is complete and should be
/// popped. Non-movement orders return `false` immediately (handled elsewhere).
pub fn advance_ship_order(
    state: &mut State,
    _content: &Content,
    config: &EngineConfig,
    ship_id: Id,
    dt_days: f64,
) -> bool {
    let Some(order) = state
        .ship_orders
        .get(&ship_id)
        .and_then(|q| q.queue.front())
        .cloned()
    else {
        return false;
    };

    match order {
        Order::MoveToPoint { target } => {
            let Some(ship) = state.ships.get(&ship_id) else { return false };
            let speed = state
                .designs
                .get(&ship.design_id)
                .map_or(0.0, |d| d.speed_km_s)
                * crate::heat::speed_multiplier(ship.heat_state, config);
            let ship = state.ships.get_mut(&ship_id).unwrap();
            step_movement_toward(&mut ship.position, target, speed, dt_days, config.arrival_epsilon_mkm)
        }
        Order::MoveToBody { body_id } => {
            let Some(body) = state.bodies.get(&body_id) else { return true };
            let target = body.position;
            let Some(ship) = state.ships.get(&ship_id) else { return false };
            let speed = state
                .designs
                .get(&ship.design_id)
                .map_or(0.0, |d| d.speed_km_s)
                * crate::heat::speed_multiplier(ship.heat_state, config);
            let ship = state.ships.get_mut(&ship_id).unwrap();
            step_movement_toward(&mut ship.position, target, speed, dt_days, config.arrival_epsilon_mkm)
        }
        Order::TravelViaJump { jump_point_id } => {
            let Some(jp) = state.jump_points.get(&jump_point_id).cloned() else { return true };
            let speed = state
                .ships
                .get(&ship_id)
                .and_then(|s| state.designs.get(&s.design_id).map(|d| (s, d)))
                .map_or(0.0, |(s, d)| d.speed_km_s * crate::heat::speed_multiplier(s.heat_state, config));
            let Some(ship) = state.ships.get_mut(&ship_id) else { return false };
            let arrived =
                step_movement_toward(&mut ship.position, jp.position, speed, dt_days, config.arrival_epsilon_mkm);
            if !arrived {
                return false;
            }
            let Some(linked) = state.jump_points.get(&jp.linked_jump_id).cloned() else { return true };
            let old_system = ship.system_id;
            ship.system_id = linked.system_id;
            ship.position = linked.position;
            let design_fuel_use = state
                .designs
                .get(&ship.design_id)
                .map_or(0.0, |d| d.fuel_use_per_mkm);
            let cost = jump_fuel_cost(design_fuel_use, config.jump_fuel_transfer_cost);
            let ship = state.ships.get_mut(&ship_id).unwrap();
            ship.fuel = (ship.fuel - cost).max(0.0);
            if let Some(sys) = state.systems.get_mut(&old_system) {
                sys.ships.retain(|&s| s != ship_id);
            }
            if let Some(sys) = state.systems.get_mut(&linked.system_id) {
                if !sys.ships.contains(&ship_id) {
                    sys.ships.push(ship_id);
                }
            }
            let faction_id = state.ships[&ship_id].faction_id;
            if let Some(faction) = state.factions.get_mut(&faction_id) {
                faction.contacts.remove(&ship_id);
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::two_system_state;

    #[test]
    fn plan_route_finds_direct_jump() {
        let state = two_system_state();
        let faction_id = state.factions.keys().next().copied().unwrap();
        let start = state.systems.keys().min().copied().unwrap();
        let goal = state.systems.keys().max().copied().unwrap();
        let route = plan_route(&state, start, faction_id, goal, false, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert!(route.is_some());
        assert_eq!(route.unwrap().jump_points.len(), 1);
    }

    #[test]
    fn plan_route_same_system_is_trivial() {
        let state = two_system_state();
        let faction_id = state.factions.keys().next().copied().unwrap();
        let sys = state.systems.keys().next().copied().unwrap();
        let route = plan_route(&state, sys, faction_id, sys, false, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert_eq!(route.unwrap().eta_days, 0.0);
    }

    #[test]
    fn plan_route_respects_discovery_restriction() {
        let state = two_system_state();
        let faction_id = state.factions.keys().next().copied().unwrap();
        let start = state.systems.keys().min().copied().unwrap();
        let goal = state.systems.keys().max().copied().unwrap();
        let route = plan_route(&state, start, faction_id, goal, true, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert!(route.is_none(), "goal system not yet discovered");
    }

    #[test]
    fn step_movement_arrives_when_within_epsilon() {
        let mut pos = Point2::new(0.0, 0.0);
        let arrived = step_movement_toward(&mut pos, Point2::new(0.005, 0.0), 10.0, 1.0, 0.01);
        assert!(arrived);
        assert_eq!(pos, Point2::new(0.005, 0.0));
    }

    #[test]
    fn step_movement_partial_step_does_not_overshoot() {
        let mut pos = Point2::new(0.0, 0.0);
        let arrived = step_movement_toward(&mut pos, Point2::new(1000.0, 0.0), 1.0, 0.001, 0.01);
        assert!(!arrived);
        assert!(pos.x > 0.0 && pos.x < 1000.0);
    }

    #[test]
    fn bfs_reachable_covers_connected_systems() {
        let state = two_system_state();
        let start = state.systems.keys().min().copied().unwrap();
        let reachable = bfs_reachable(&state, start);
        assert_eq!(reachable.len(), state.systems.len());
    }

    #[test]
    fn plan_route_cached_reuses_entry_until_topology_changes() {
        let mut state = two_system_state();
        let faction_id = state.factions.keys().next().copied().unwrap();
        let start = state.systems.keys().min().copied().unwrap();
        let goal = state.systems.keys().max().copied().unwrap();
        let mut cache = RouteCache::new();

        let first = plan_route_cached(&state, &mut cache, start, faction_id, goal, false, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert!(first.is_some());
        assert_eq!(cache.entries.len(), 1);

        let second = plan_route_cached(&state, &mut cache, start, faction_id, goal, false, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert_eq!(first, second);
        assert_eq!(cache.entries.len(), 1, "second call should hit the cache, not insert again");

        let new_jp = state.ids.next();
        state.jump_points.insert(new_jp, crate::types::JumpPoint { id: new_jp, system_id: start, position: Point2::new(0.0, 0.0), linked_jump_id: new_jp });
        let third = plan_route_cached(&state, &mut cache, start, faction_id, goal, false, 10.0, Point2::new(0.0, 0.0), None, 0.05);
        assert!(third.is_some());
        assert_eq!(cache.entries.len(), 2, "topology change should produce a fresh cache entry");
    }
}
