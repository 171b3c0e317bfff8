//! Content/scenario validation tests.
//!
//! These exercise `nebula4x_world::validate_content`, `validate_state`, and
//! `bootstrap_scenario` against the fixtures in
//! `nebula4x_core::test_fixtures` rather than a shipped JSON catalog, since
//! this workspace carries no `content/` directory of its own — a deployment
//! wires `load_content` up to wherever its catalog actually lives.

use nebula4x_core::procgen::GalaxyConfig;
use nebula4x_core::test_fixtures::base_content;
use nebula4x_world::{bootstrap_scenario, load_state, validate_content, validate_state};

#[test]
fn base_content_fixture_passes_validation() {
    validate_content(&base_content());
}

#[test]
fn bootstrap_scenario_produces_a_state_that_passes_validation() {
    let content = base_content();
    let config = GalaxyConfig { seed: 11, num_systems: 5, ..GalaxyConfig::default() };
    let (state, faction_id) = bootstrap_scenario(&content, &config, "Outer Reach Compact", nebula4x_core::ControlMode::Player);

    validate_state(&state, &content);
    assert!(state.factions.contains_key(&faction_id));
    assert!(!state.systems.is_empty());
}

#[test]
fn bootstrap_scenario_places_the_faction_in_a_real_system() {
    let content = base_content();
    let config = GalaxyConfig { seed: 22, num_systems: 8, ..GalaxyConfig::default() };
    let (state, faction_id) = bootstrap_scenario(&content, &config, "Compact", nebula4x_core::ControlMode::Player);

    let faction = &state.factions[&faction_id];
    assert_eq!(faction.control_mode, nebula4x_core::ControlMode::Player);
}

#[test]
fn different_seeds_produce_different_galaxies() {
    let content = base_content();
    let config_a = GalaxyConfig { seed: 1, num_systems: 5, ..GalaxyConfig::default() };
    let config_b = GalaxyConfig { seed: 2, num_systems: 5, ..GalaxyConfig::default() };
    let (state_a, _) = bootstrap_scenario(&content, &config_a, "A", nebula4x_core::ControlMode::Player);
    let (state_b, _) = bootstrap_scenario(&content, &config_b, "B", nebula4x_core::ControlMode::Player);
    assert_ne!(
        serde_json::to_string(&state_a).unwrap(),
        serde_json::to_string(&state_b).unwrap(),
        "distinct seeds should not produce byte-identical galaxies"
    );
}

#[test]
fn load_state_rejects_a_state_with_an_unknown_mineral() {
    let content = base_content();
    let config = GalaxyConfig { seed: 5, num_systems: 3, ..GalaxyConfig::default() };
    let (mut state, faction_id) = bootstrap_scenario(&content, &config, "Edgecase", nebula4x_core::ControlMode::Player);

    let sys = *state.systems.keys().next().unwrap();
    let body = nebula4x_core::test_fixtures::spawn_body(&mut state, sys, std::collections::HashMap::new());
    let colony = nebula4x_core::test_fixtures::spawn_colony(&mut state, faction_id, body);
    state.colonies.get_mut(&colony).unwrap().minerals.insert("Unobtainium".to_string(), 1.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_state.json");
    std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

    let result = std::panic::catch_unwind(|| load_state(path.to_str().unwrap(), &content));
    assert!(result.is_err() || result.unwrap().is_err(), "loading a state with an unknown mineral should fail");
}
