//! Shared fixtures for unit and integration tests. Mirrors the shape of a
//! freshly-generated scenario without going through full procgen, so tests stay
//! fast and focused on the subsystem under test.

#![cfg(any(test, feature = "test-support"))]

use crate::id::Id;
use crate::orbit::OrbitalElements;
use crate::spatial::Point2;
use crate::types::*;
use ahash::AHashMap;
use std::collections::{HashMap, HashSet};

#[must_use]
pub fn minimal_content() -> Content {
    Content {
        content_version: "test".to_string(),
        techs: vec![],
        installations: AHashMap::new(),
        components: AHashMap::new(),
        minerals: vec![
            MineralDef { id: "Duranium".to_string(), name: "Duranium".to_string() },
            MineralDef { id: "Neutronium".to_string(), name: "Neutronium".to_string() },
        ],
        build_costs_per_ton: BuildCostPerTon {
            mineral_cost_per_ton: HashMap::from([
                ("Duranium".to_string(), 1.0),
                ("Neutronium".to_string(), 0.1),
            ]),
        },
        recipes: AHashMap::new(),
    }
}

#[must_use]
pub fn base_content() -> Content {
    let mut content = minimal_content();
    content.techs = vec![
        TechDef {
            id: "chemistry_1".to_string(),
            name: "Chemistry 1".to_string(),
            prereqs: vec![],
            cost_rp: 50.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        },
        TechDef {
            id: "nuclear_1".to_string(),
            name: "Nuclear 1".to_string(),
            prereqs: vec!["chemistry_1".to_string()],
            cost_rp: 100.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        },
        TechDef {
            id: "reactors_2".to_string(),
            name: "Reactors 2".to_string(),
            prereqs: vec!["nuclear_1".to_string()],
            cost_rp: 150.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        },
        TechDef {
            id: "materials_processing_1".to_string(),
            name: "Materials Processing 1".to_string(),
            prereqs: vec!["chemistry_1".to_string()],
            cost_rp: 80.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        },
        TechDef {
            id: "automation_1".to_string(),
            name: "Automation 1".to_string(),
            prereqs: vec!["reactors_2".to_string(), "materials_processing_1".to_string()],
            cost_rp: 200.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        },
    ];
    content.installations.insert(
        "mine_basic".to_string(),
        InstallationDef {
            id: "mine_basic".to_string(),
            name: "Basic Mine".to_string(),
            cp_per_day: 0.0,
            mineral_cost: HashMap::new(),
            mining_capacity_tons_per_day: 100.0,
            research_per_day: 0.0,
            weapon_damage: 0.0,
            weapon_range_mkm: 0.0,
            sensor_range_mkm: 0.0,
            yard_capacity: false,
            cp_only: false,
            recipe_id: None,
            industry_capacity_tons_per_day: 0.0,
        },
    );
    content.installations.insert(
        "factory_basic".to_string(),
        InstallationDef {
            id: "factory_basic".to_string(),
            name: "Basic Factory".to_string(),
            cp_per_day: 0.0,
            mineral_cost: HashMap::new(),
            mining_capacity_tons_per_day: 0.0,
            research_per_day: 0.0,
            weapon_damage: 0.0,
            weapon_range_mkm: 0.0,
            sensor_range_mkm: 0.0,
            yard_capacity: false,
            cp_only: false,
            recipe_id: Some("refine_duranium".to_string()),
            industry_capacity_tons_per_day: 50.0,
        },
    );
    content.recipes.insert(
        "refine_duranium".to_string(),
        RecipeDef {
            id: "refine_duranium".to_string(),
            inputs: HashMap::from([("Duranium".to_string(), 1.0)]),
            outputs: HashMap::from([("Neutronium".to_string(), 0.5)]),
        },
    );
    content
}

fn empty_faction(id: Id, name: &str, mode: ControlMode) -> Faction {
    Faction {
        id,
        name: name.to_string(),
        control_mode: mode,
        known_techs: vec![],
        research_queue: vec![],
        active_research: None,
        research_progress_points: 0.0,
        unlocked_components: HashSet::new(),
        unlocked_installations: HashSet::new(),
        discovered_systems: HashSet::new(),
        surveyed_jump_points: HashMap::new(),
        contacts: HashMap::new(),
        journal: vec![],
        trait_multipliers: HashMap::new(),
        ship_design_targets: HashMap::new(),
        ship_profiles: vec![],
        diplomacy: HashMap::new(),
        discovered_version: 0,
        surveyed_version: 0,
    }
}

/// Two star systems linked by a single jump point pair. The sole faction has
/// discovered only the first system, which exercises both unrestricted and
/// discovery-restricted route planning.
#[must_use]
pub fn two_system_state() -> State {
    let mut state = State::new(42);
    let faction_id = state.ids.next();
    let mut faction = empty_faction(faction_id, "Sol Directorate", ControlMode::Player);

    let sys_a = state.ids.next();
    let sys_b = state.ids.next();
    faction.discovered_systems.insert(sys_a);

    let jp_a = state.ids.next();
    let jp_b = state.ids.next();

    state.jump_points.insert(
        jp_a,
        JumpPoint { id: jp_a, system_id: sys_a, position: Point2::new(50.0, 0.0), linked_jump_id: jp_b },
    );
    state.jump_points.insert(
        jp_b,
        JumpPoint { id: jp_b, system_id: sys_b, position: Point2::new(-50.0, 0.0), linked_jump_id: jp_a },
    );

    state.systems.insert(
        sys_a,
        StarSystem {
            id: sys_a,
            name: "Sol".to_string(),
            galaxy_position: Point2::new(0.0, 0.0),
            bodies: vec![],
            jump_points: vec![jp_a],
            ships: vec![],
            region_id: None,
            nebula_density: 0.0,
            storm_interval_days: None,
        },
    );
    state.systems.insert(
        sys_b,
        StarSystem {
            id: sys_b,
            name: "Alpha Centauri".to_string(),
            galaxy_position: Point2::new(500.0, 0.0),
            bodies: vec![],
            jump_points: vec![jp_b],
            ships: vec![],
            region_id: None,
            nebula_density: 0.0,
            storm_interval_days: None,
        },
    );

    faction.surveyed_jump_points.insert(jp_a, 1.0);
    state.factions.insert(faction_id, faction);
    state
}

#[must_use]
pub fn basic_design(state: &mut State) -> Id {
    let id = state.ids.next();
    state.designs.insert(
        id,
        ShipDesign {
            id,
            name: "Scout".to_string(),
            component_ids: vec![],
            mass_tons: 500.0,
            speed_km_s: 10.0,
            sensor_range_mkm: 20.0,
            fuel_capacity: 1000.0,
            fuel_use_per_mkm: 0.1,
            cargo_capacity: 100.0,
            cargo_mining_rate: 10.0,
            weapon_damage: 0.0,
            weapon_range_mkm: 0.0,
            missile_damage: 0.0,
            missile_speed_km_s: 0.0,
            missile_launchers: 0,
            missile_reload_days: 0.0,
            pd_damage_per_day: 0.0,
            pd_range_mkm: 0.0,
            reactor_output: 10.0,
            power_draw_weapons: 0.0,
            power_draw_shields: 0.0,
            power_draw_sensors: 1.0,
            power_draw_engines: 1.0,
            max_hp: 100.0,
            max_shields: 0.0,
            shield_regen_per_day: 0.0,
            signature_multiplier: 1.0,
            colonist_capacity: 0.0,
            troop_capacity: 0.0,
            ecm: 0.0,
            eccm: 0.0,
        },
    );
    id
}

#[must_use]
pub fn spawn_ship(state: &mut State, faction_id: Id, system_id: Id, design_id: Id, pos: Point2) -> Id {
    let id = state.ids.next();
    let design = &state.designs[&design_id];
    let ship = Ship {
        id,
        faction_id,
        system_id,
        position: pos,
        velocity: Point2::new(0.0, 0.0),
        design_id,
        hp: design.max_hp,
        shields: design.max_shields,
        fuel: design.fuel_capacity,
        cargo: HashMap::new(),
        troops: 0.0,
        colonists: 0.0,
        missile_ammo: 0.0,
        heat: 0.0,
        heat_state: HeatBucket::Cold,
        maintenance_condition: 1.0,
        crew_grade_points: 100.0,
        automation: AutomationFlags::default(),
        power_policy: PowerPolicy { weapons_online: true, shields_online: true, sensors_online: true, engines_online: true },
        missile_cooldown_days: 0.0,
        boarding_cooldown_days: 0.0,
        name: format!("Ship {}", id.0),
    };
    state.ships.insert(id, ship);
    state.ship_orders.insert(id, ShipOrders::default());
    if let Some(sys) = state.systems.get_mut(&system_id) {
        sys.ships.push(id);
    }
    id
}

#[must_use]
pub fn spawn_colony(state: &mut State, faction_id: Id, body_id: Id) -> Id {
    let id = state.ids.next();
    state.colonies.insert(
        id,
        Colony {
            id,
            body_id,
            faction_id,
            population_millions: 1.0,
            minerals: HashMap::new(),
            mineral_reserves: HashMap::new(),
            installations: HashMap::new(),
            installation_auto_targets: HashMap::new(),
            construction_queue: vec![],
            shipyard_queue: vec![],
            troop_strength: 0.0,
            troop_training_queue: 0.0,
            ground_forces: 0.0,
            conditions: vec![],
        },
    );
    id
}

#[must_use]
pub fn spawn_body(state: &mut State, system_id: Id, deposits: HashMap<MineralId, f64>) -> Id {
    let id = state.ids.next();
    state.bodies.insert(
        id,
        Body {
            id,
            system_id,
            name: "Test Body".to_string(),
            kind: BodyKind::Planet,
            parent_body_id: None,
            elements: OrbitalElements {
                semi_major_axis_mkm: 150.0,
                eccentricity: 0.0,
                period_days: 365.0,
                argument_of_periapsis_rad: 0.0,
                mean_anomaly_phase_rad: 0.0,
            },
            position: Point2::new(150.0, 0.0),
            mass_earth: 1.0,
            radius_km: 6000.0,
            mineral_deposits: deposits,
            surface_temp_k: 288.0,
            atmosphere_atm: 1.0,
            terraforming: None,
        },
    );
    if let Some(sys) = state.systems.get_mut(&system_id) {
        sys.bodies.push(id);
    }
    id
}

#[must_use]
pub fn empty_faction_in(state: &mut State, name: &str, mode: ControlMode) -> Id {
    let id = state.ids.next();
    state.factions.insert(id, empty_faction(id, name, mode));
    id
}
