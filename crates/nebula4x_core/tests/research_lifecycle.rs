//! Integration test: faction research-queue repair (S3) plus a full
//! generate-spend-complete lifecycle across several days.

use nebula4x_core::ai::tick_ai;
use nebula4x_core::economy::{compute_faction_multipliers, research::tick_research};
use nebula4x_core::test_fixtures::{base_content, empty_faction_in, spawn_body, spawn_colony};
use nebula4x_core::types::{ControlMode, InstallationDef, StarSystem};
use nebula4x_core::spatial::Point2;
use nebula4x_core::EngineConfig;
use std::collections::HashMap;

/// S3: seeding `research_queue = ["automation_1"]` with no known techs, one AI
/// economy tick must leave the queue holding every missing prerequisite ahead
/// of `automation_1`, each before its dependent.
#[test]
fn ai_research_queue_repair_inserts_missing_prerequisites_in_order() {
    let content = base_content();
    let mut state = nebula4x_core::State::new(3);
    let faction = empty_faction_in(&mut state, "Explorers", ControlMode::AiPassive);
    state.factions.get_mut(&faction).unwrap().research_queue = vec!["automation_1".to_string()];

    let mut events = Vec::new();
    let config = EngineConfig::default();
    tick_ai(&mut state, &content, &config, &mut events);

    let queue = &state.factions[&faction].research_queue;
    assert!(queue.contains(&"chemistry_1".to_string()));
    assert!(queue.contains(&"nuclear_1".to_string()));
    assert!(queue.contains(&"reactors_2".to_string()));
    assert!(queue.contains(&"materials_processing_1".to_string()));
    assert!(queue.contains(&"automation_1".to_string()));

    let pos = |id: &str| queue.iter().position(|t| t == id).unwrap();
    assert!(pos("chemistry_1") < pos("nuclear_1"));
    assert!(pos("chemistry_1") < pos("materials_processing_1"));
    assert!(pos("nuclear_1") < pos("reactors_2"));
    assert!(pos("reactors_2") < pos("automation_1"));
    assert!(pos("materials_processing_1") < pos("automation_1"));
}

/// End to end: a colony with a research lab grinds through the whole
/// `chemistry_1 -> nuclear_1 -> reactors_2` chain given enough days, picking
/// up each prerequisite in turn as it becomes satisfied.
#[test]
fn full_research_lifecycle_completes_chained_prerequisites() {
    let mut content = base_content();
    content.installations.insert(
        "lab_basic".to_string(),
        InstallationDef {
            id: "lab_basic".to_string(),
            name: "Basic Lab".to_string(),
            cp_per_day: 0.0,
            mineral_cost: HashMap::new(),
            mining_capacity_tons_per_day: 0.0,
            research_per_day: 50.0,
            weapon_damage: 0.0,
            weapon_range_mkm: 0.0,
            sensor_range_mkm: 0.0,
            yard_capacity: false,
            cp_only: false,
            recipe_id: None,
            industry_capacity_tons_per_day: 0.0,
        },
    );

    let mut state = nebula4x_core::State::new(11);
    let faction = empty_faction_in(&mut state, "Sol Directorate", ControlMode::Player);
    let sys = state.ids.next();
    state.systems.insert(
        sys,
        StarSystem {
            id: sys,
            name: "Sol".to_string(),
            galaxy_position: Point2::new(0.0, 0.0),
            bodies: vec![],
            jump_points: vec![],
            ships: vec![],
            region_id: None,
            nebula_density: 0.0,
            storm_interval_days: None,
        },
    );
    let body = spawn_body(&mut state, sys, HashMap::new());
    let colony = spawn_colony(&mut state, faction, body);
    state.colonies.get_mut(&colony).unwrap().installations.insert("lab_basic".to_string(), 1);
    state.factions.get_mut(&faction).unwrap().research_queue =
        vec!["chemistry_1".to_string(), "nuclear_1".to_string(), "reactors_2".to_string()];

    let mut events = Vec::new();
    for _ in 0..10 {
        let multipliers = compute_faction_multipliers(&state, &content);
        tick_research(&mut state, &content, &multipliers, 1.0, &mut events);
    }

    let known = &state.factions[&faction].known_techs;
    assert!(known.contains(&"chemistry_1".to_string()));
    assert!(known.contains(&"nuclear_1".to_string()));
    assert!(known.contains(&"reactors_2".to_string()));
    assert_eq!(events.iter().filter(|e| e.category == nebula4x_core::EventCategory::Research).count(), 3);
}
