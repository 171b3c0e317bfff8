//! Tick scheduling (component A). A "tick" is one `advance_hours` step: the
//! clock moves forward, every orbiting body is repositioned, the economy runs
//! once per crossed day boundary (or every step, if `enable_subday_economy`),
//! and every continuous pass (movement, order execution, sensors, heat,
//! combat) runs every step regardless of day boundary. `advance_until_event_hours`
//! layers a stop condition on top, running one step at a time so it can react
//! to an event the instant it is produced.

use crate::economy;
use crate::errors::RuntimeAnomaly;
use crate::id::Id;
use crate::navigation;
use crate::orbit;
use crate::sorted::sorted_keys;
use crate::types::{
    Content, EngineConfig, EventCategory, EventContext, EventLevel, SimEvent, State,
};
use std::collections::HashMap;

/// One stop trigger for [`advance_until_event_hours`]. Every `Some` filter must
/// match for an event to count as a hit; `message_contains` (when non-empty) is
/// matched ASCII-case-insensitively as a substring.
#[derive(Debug, Clone, Default)]
pub struct EventStopCondition {
    pub stop_on_info: bool,
    pub stop_on_warn: bool,
    pub stop_on_error: bool,
    pub filter_category: bool,
    pub category: Option<EventCategory>,
    pub faction_id: Option<Id>,
    pub system_id: Option<Id>,
    pub ship_id: Option<Id>,
    pub colony_id: Option<Id>,
    pub message_contains: String,
}

impl EventStopCondition {
    fn level_enabled(&self, level: EventLevel) -> bool {
        match level {
            EventLevel::Info => self.stop_on_info,
            EventLevel::Warn => self.stop_on_warn,
            EventLevel::Error => self.stop_on_error,
        }
    }

    #[must_use]
    pub fn matches(&self, event: &SimEvent) -> bool {
        if !self.level_enabled(event.level) {
            return false;
        }
        if self.filter_category {
            match self.category {
                Some(cat) if cat == event.category => {}
                _ => return false,
            }
        }
        if let Some(faction_id) = self.faction_id {
            if event.context.faction_id != Some(faction_id) {
                return false;
            }
        }
        if let Some(system_id) = self.system_id {
            if event.context.system_id != Some(system_id) {
                return false;
            }
        }
        if let Some(ship_id) = self.ship_id {
            if event.context.ship_id != Some(ship_id) {
                return false;
            }
        }
        if let Some(colony_id) = self.colony_id {
            if event.context.colony_id != Some(colony_id) {
                return false;
            }
        }
        if !self.message_contains.is_empty() {
            let haystack = event.message.to_ascii_lowercase();
            let needle = self.message_contains.to_ascii_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Result of [`advance_until_event_hours`]: how far the clock actually moved
/// and, if it stopped early, the event that triggered the stop.
#[derive(Debug, Clone)]
pub struct AdvanceResult {
    pub hours_advanced: u32,
    pub stopped_on_event: bool,
    pub triggering_event: Option<SimEvent>,
}

/// Repositions every body from its orbital elements at the new date. Computed
/// into a scratch map first since [`orbit::resolve_absolute_position`] walks
/// the parent chain through `&state.bodies` — it can't borrow that map
/// immutably while we're writing individual positions back into it.
fn resync_orbital_positions(state: &mut State) {
    let t_days = state.date.as_day_fraction();
    let mut resolved: HashMap<Id, crate::spatial::Point2> = HashMap::with_capacity(state.bodies.len());
    for body_id in sorted_keys(&state.bodies) {
        resolved.insert(body_id, orbit::resolve_absolute_position(&state.bodies, body_id, t_days));
    }
    for (body_id, position) in resolved {
        if let Some(body) = state.bodies.get_mut(&body_id) {
            body.position = position;
        }
    }
}

/// Drops wrecks older than `config.wrecks.decay_days`.
fn decay_wrecks(state: &mut State, config: &EngineConfig) {
    if !config.wrecks.enabled {
        return;
    }
    let today = state.date.day;
    state
        .wrecks
        .retain(|_, wreck| (today - wreck.created_day) as f64 <= config.wrecks.decay_days);
}

/// Runs every sub-pass for a single `step_hours`-sized tick, in the fixed order
/// the rest of this module's doc comment describes.
pub fn tick_one_tick_hours(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    step_hours: u32,
) {
    let old_date = state.date;
    state.date = state.date.advance_hours(step_hours);
    let crossed_day_boundary = state.date.day != old_date.day;
    let dt_days = f64::from(step_hours) / 24.0;

    resync_orbital_positions(state);

    let mut events: Vec<SimEvent> = Vec::new();

    if economy::should_run_economy(config.enable_subday_economy, crossed_day_boundary) {
        let economy_dt = economy::economy_dt_days(config.enable_subday_economy, step_hours);
        let multipliers = economy::compute_faction_multipliers(state, content);
        economy::mining::tick_mining(state, content, config, &multipliers, economy_dt, &mut events);
        economy::industry::tick_industry(state, content, &multipliers, economy_dt);
        economy::research::tick_research(state, content, &multipliers, economy_dt, &mut events);
        economy::shipyards::tick_shipyards(state, content, config, &multipliers, economy_dt, &mut events);
        economy::construction::tick_construction(state, content, &multipliers, economy_dt, &mut events);
        crate::terraform::tick_terraforming(state, config, economy_dt, &mut events);
        crate::ai::tick_ai(state, content, config, &mut events);
        crate::contracts::tick_contracts(state, config, economy_dt, &mut events);
    }

    if crossed_day_boundary {
        crate::procgen::tick_dynamic_poi(state, config, &mut events);
    }

    for ship_id in sorted_keys(&state.ships) {
        let has_movement_order = state
            .ship_orders
            .get(&ship_id)
            .and_then(|o| o.queue.front())
            .is_some_and(is_movement_order);
        if !has_movement_order {
            continue;
        }
        let complete = navigation::advance_ship_order(state, content, config, ship_id, dt_days);
        if complete {
            if let Some(orders) = state.ship_orders.get_mut(&ship_id) {
                orders.queue.pop_front();
                crate::orders::refill_from_repeat_template(orders);
            }
        }
    }

    crate::order_exec::tick_order_execution(state, content, config, dt_days, &mut events);
    crate::sensors::tick_sensors(state, content, config, &mut events);
    crate::heat::tick_heat(state, config, dt_days, &mut events);
    crate::combat::tick_combat(state, content, config, dt_days, &mut events);

    decay_wrecks(state, config);
    crate::design::prune_fleets(state);

    finalize_events(state, events, config.max_events);
}

fn is_movement_order(order: &crate::types::Order) -> bool {
    matches!(
        order,
        crate::types::Order::MoveToPoint { .. }
            | crate::types::Order::MoveToBody { .. }
            | crate::types::Order::TravelViaJump { .. }
    )
}

/// Assigns a strictly increasing `seq` to every event appended during the
/// tick, then truncates the log once it grows past `max_events + 128` back
/// down to `max_events` (oldest dropped first) so a long-running engine never
/// accumulates an unbounded event history.
fn finalize_events(state: &mut State, mut new_events: Vec<SimEvent>, max_events: usize) {
    for event in &mut new_events {
        event.seq = state.counters.next_event_seq;
        state.counters.next_event_seq += 1;
    }
    state.events.extend(new_events);
    if state.events.len() > max_events + 128 {
        let drop = state.events.len() - max_events;
        state.events.drain(0..drop);
    }
}

/// Advances the clock by exactly `hours`, in `step_hours`-sized ticks (the
/// last tick may be shorter). `step_hours` must be at least 1; callers
/// typically pass 24 for day-granularity sims or something smaller for
/// tighter combat resolution.
pub fn advance_hours(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    hours: u32,
    step_hours: u32,
) {
    let step = step_hours.max(1);
    let mut remaining = hours;
    while remaining > 0 {
        let this_step = remaining.min(step);
        tick_one_tick_hours(state, content, config, this_step);
        remaining -= this_step;
    }
}

/// Advances in `step_hours`-sized ticks, up to `max_hours`, stopping as soon as
/// any event produced during a tick satisfies `stop`. `step_hours` should be
/// small relative to the caller's tolerance for overshoot: a stop condition is
/// only checked against the events a whole tick produced, not mid-tick.
pub fn advance_until_event_hours(
    state: &mut State,
    content: &Content,
    config: &EngineConfig,
    max_hours: u32,
    stop: &EventStopCondition,
    step_hours: u32,
) -> AdvanceResult {
    let step = step_hours.max(1);
    let mut advanced = 0u32;
    while advanced < max_hours {
        let this_step = (max_hours - advanced).min(step);
        let seq_before = state.counters.next_event_seq;
        tick_one_tick_hours(state, content, config, this_step);
        advanced += this_step;

        if let Some(hit) = state
            .events
            .iter()
            .filter(|e| e.seq >= seq_before)
            .find(|e| stop.matches(e))
        {
            return AdvanceResult {
                hours_advanced: advanced,
                stopped_on_event: true,
                triggering_event: Some(hit.clone()),
            };
        }
    }
    AdvanceResult { hours_advanced: advanced, stopped_on_event: false, triggering_event: None }
}

/// Surfaces a would-be-silent data inconsistency as an `Error`-level event
/// instead of panicking; used by engine-level cleanup passes that find
/// dangling references content reload or a partial load can leave behind.
pub fn log_anomaly(events: &mut Vec<SimEvent>, day: i64, hour: u8, anomaly: &RuntimeAnomaly) {
    events.push(SimEvent {
        seq: 0,
        day,
        hour,
        level: EventLevel::Error,
        category: EventCategory::System,
        message: anomaly.to_string(),
        context: EventContext::default(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, two_system_state};
    use crate::types::{Order, ShipOrders};

    #[test]
    fn advance_hours_moves_the_clock() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        advance_hours(&mut state, &content, &config, 48, 24);
        assert_eq!(state.date.day, 2);
    }

    #[test]
    fn crossing_a_day_boundary_runs_the_economy_even_with_short_steps() {
        let mut state = two_system_state();
        let content = base_content();
        let mut config = EngineConfig::default();
        config.enable_subday_economy = false;
        advance_hours(&mut state, &content, &config, 24, 6);
        assert_eq!(state.date.day, 1);
    }

    #[test]
    fn advance_until_event_stops_at_first_matching_event() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        state.factions.get_mut(&faction_id).unwrap().research_queue = vec!["chemistry_1".to_string()];

        let stop = EventStopCondition {
            stop_on_info: true,
            message_contains: "completed research".to_string(),
            ..Default::default()
        };
        let result = advance_until_event_hours(&mut state, &content, &config, 24 * 400, &stop, 24);
        assert!(result.stopped_on_event);
        assert!(result.triggering_event.is_some());
    }

    #[test]
    fn advance_until_event_exhausts_budget_without_a_match() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let stop = EventStopCondition {
            stop_on_error: true,
            message_contains: "nonexistent marker string".to_string(),
            ..Default::default()
        };
        let result = advance_until_event_hours(&mut state, &content, &config, 48, &stop, 24);
        assert!(!result.stopped_on_event);
        assert_eq!(result.hours_advanced, 48);
    }

    #[test]
    fn idle_ship_with_no_orders_does_not_panic_through_a_tick() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let _ = ShipOrders::default();
        let _ = Order::WaitDays { days: 1.0 };
        advance_hours(&mut state, &content, &config, 24, 24);
    }
}
