//! Content loading and scenario bootstrap shared between `nebula4x_cli` and
//! `nebula4x_daemon`.
//!
//! `nebula4x_core` knows nothing about the filesystem; this crate reads the
//! on-disk JSON catalog into a [`Content`], validates its cross-references
//! (panicking on an authoring mistake — this runs once at startup, not per
//! tick), and turns a [`GalaxyConfig`] plus that `Content` into an initial
//! [`State`] via `nebula4x_core::procgen`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use nebula4x_core::procgen::{generate_galaxy, place_starting_faction, GalaxyConfig};
use nebula4x_core::{Content, ControlMode, Id, State};

#[derive(Deserialize)]
struct TechsFile {
    content_version: String,
    techs: Vec<nebula4x_core::TechDef>,
}

#[derive(Deserialize)]
struct InstallationsFile {
    installations: Vec<nebula4x_core::InstallationDef>,
}

#[derive(Deserialize)]
struct ComponentsFile {
    components: Vec<nebula4x_core::ComponentDef>,
}

#[derive(Deserialize)]
struct MineralsFile {
    minerals: Vec<nebula4x_core::MineralDef>,
}

#[derive(Deserialize)]
struct RecipesFile {
    recipes: Vec<nebula4x_core::RecipeDef>,
}

/// Validates cross-references in loaded content, panicking on any authoring
/// error (missing referent, negative cost, duplicate id). This is a
/// load-time gate distinct from `nebula4x_control::reload_content_db`'s
/// `Result`-returning validation, which runs against a live engine and must
/// never panic.
#[allow(clippy::too_many_lines)]
pub fn validate_content(content: &Content) {
    let mineral_ids: HashSet<&str> = content.minerals.iter().map(|m| m.id.as_str()).collect();
    let tech_ids: HashSet<&str> = content.techs.iter().map(|t| t.id.as_str()).collect();

    let mut seen_techs = HashSet::new();
    for tech in &content.techs {
        assert!(seen_techs.insert(tech.id.as_str()), "duplicate tech id '{}'", tech.id);
        assert!(tech.cost_rp >= 0.0, "tech '{}' has a negative cost_rp", tech.id);
        for prereq in &tech.prereqs {
            assert!(tech_ids.contains(prereq.as_str()), "tech '{}' prereq '{}' is not a known tech id", tech.id, prereq);
        }
    }

    for inst in content.installations.values() {
        for (mineral, amount) in &inst.mineral_cost {
            assert!(*amount >= 0.0, "installation '{}' has a negative cost of {mineral}", inst.id);
            assert!(mineral_ids.contains(mineral.as_str()), "installation '{}' references unknown mineral '{mineral}'", inst.id);
        }
        if let Some(recipe_id) = &inst.recipe_id {
            assert!(content.recipes.contains_key(recipe_id), "installation '{}' references unknown recipe '{recipe_id}'", inst.id);
        }
    }

    for comp in content.components.values() {
        for (mineral, amount) in &comp.cost {
            assert!(*amount >= 0.0, "component '{}' has a negative cost of {mineral}", comp.id);
            assert!(mineral_ids.contains(mineral.as_str()), "component '{}' references unknown mineral '{mineral}'", comp.id);
        }
    }

    for (mineral, per_ton) in &content.build_costs_per_ton.mineral_cost_per_ton {
        assert!(*per_ton >= 0.0, "build_costs_per_ton has a negative cost of {mineral}");
        assert!(mineral_ids.contains(mineral.as_str()), "build_costs_per_ton references unknown mineral '{mineral}'");
    }

    for recipe in content.recipes.values() {
        for mineral in recipe.inputs.keys().chain(recipe.outputs.keys()) {
            assert!(mineral_ids.contains(mineral.as_str()), "recipe '{}' references unknown mineral '{mineral}'", recipe.id);
        }
    }
}

/// Validates that every mineral a loaded state's colonies or ship cargo
/// holds is still a known mineral id in `content`.
pub fn validate_state(state: &State, content: &Content) {
    let mineral_ids: HashSet<&str> = content.minerals.iter().map(|m| m.id.as_str()).collect();
    for colony in state.colonies.values() {
        for mineral in colony.minerals.keys() {
            assert!(mineral_ids.contains(mineral.as_str()), "colony {} holds unknown mineral '{mineral}'", colony.id);
        }
    }
    for ship in state.ships.values() {
        for mineral in ship.cargo.keys() {
            assert!(mineral_ids.contains(mineral.as_str()), "ship {} carries unknown mineral '{mineral}'", ship.id);
        }
    }
}

/// Reads the full content catalog from `content_dir`, one JSON file per
/// catalog (`techs.json`, `installations.json`, `components.json`,
/// `minerals.json`, `build_costs_per_ton.json`, `recipes.json`).
pub fn load_content(content_dir: &str) -> Result<Content> {
    let dir = Path::new(content_dir);
    let techs_file: TechsFile = read_json(&dir.join("techs.json"))?;
    let installations_file: InstallationsFile = read_json(&dir.join("installations.json"))?;
    let components_file: ComponentsFile = read_json(&dir.join("components.json"))?;
    let minerals_file: MineralsFile = read_json(&dir.join("minerals.json"))?;
    let build_costs_per_ton = read_json(&dir.join("build_costs_per_ton.json"))?;
    let recipes_file: RecipesFile = read_json(&dir.join("recipes.json"))?;

    let content = Content {
        content_version: techs_file.content_version,
        techs: techs_file.techs,
        installations: installations_file.installations.into_iter().map(|i| (i.id.clone(), i)).collect(),
        components: components_file.components.into_iter().map(|c| (c.id.clone(), c)).collect(),
        minerals: minerals_file.minerals,
        build_costs_per_ton,
        recipes: recipes_file.recipes.into_iter().map(|r| (r.id.clone(), r)).collect(),
    };
    validate_content(&content);
    Ok(content)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Generates a galaxy from `galaxy_config` and drops a single faction into
/// its lowest-id system (conventionally "home"). Pure given its inputs: the
/// same `(content, galaxy_config, faction_name, mode)` always produces the
/// same byte-identical state.
#[must_use]
pub fn bootstrap_scenario(content: &Content, galaxy_config: &GalaxyConfig, faction_name: &str, mode: ControlMode) -> (State, Id) {
    let mut state = generate_galaxy(galaxy_config, content);
    let home_system = *state.systems.keys().min().expect("generated galaxy has at least one system");
    let faction_id = place_starting_faction(&mut state, home_system, faction_name, mode);
    (state, faction_id)
}

/// Loads a saved state from `path`, validating its mineral references
/// against `content`.
pub fn load_state(path: &str, content: &Content) -> Result<State> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading state file: {path}"))?;
    let state: State = serde_json::from_str(&raw).with_context(|| format!("parsing state file: {path}"))?;
    validate_state(&state, content);
    Ok(state)
}

// ---------------------------------------------------------------------------
// Run directory utilities
// ---------------------------------------------------------------------------

/// Generates a timestamped run ID like `20260729_143022_seed42`.
#[must_use]
pub fn generate_run_id(seed: u64) -> String {
    let now = chrono::Utc::now();
    now.format(&format!("%Y%m%d_%H%M%S_seed{seed}")).to_string()
}

/// Creates the `runs/<run_id>/` directory tree, returning the path.
pub fn create_run_dir(run_id: &str) -> Result<std::path::PathBuf> {
    let dir = std::path::PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

/// Writes `run_info.json` into the run directory.
pub fn write_run_info(
    dir: &std::path::Path,
    run_id: &str,
    seed: u64,
    content_version: &str,
    runner_args: serde_json::Value,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "content_version": content_version,
        "args": runner_args,
    });
    let path = dir.join("run_info.json");
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula4x_core::test_fixtures::{base_content, minimal_content};

    #[test]
    fn valid_content_passes_validation() {
        validate_content(&minimal_content());
        validate_content(&base_content());
    }

    #[test]
    #[should_panic(expected = "is not a known tech id")]
    fn unknown_tech_prereq_panics() {
        let mut content = minimal_content();
        content.techs.push(nebula4x_core::TechDef {
            id: "tech_a".to_string(),
            name: "A".to_string(),
            prereqs: vec!["tech_nonexistent".to_string()],
            cost_rp: 10.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        });
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "references unknown mineral")]
    fn unknown_mineral_in_installation_cost_panics() {
        let mut content = minimal_content();
        content.installations.insert(
            "inst_test".to_string(),
            nebula4x_core::InstallationDef {
                id: "inst_test".to_string(),
                name: "Test".to_string(),
                cp_per_day: 1.0,
                mineral_cost: std::collections::HashMap::from([("Unobtainium".to_string(), 5.0)]),
                mining_capacity_tons_per_day: 0.0,
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
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "negative cost_rp")]
    fn negative_tech_cost_panics() {
        let mut content = minimal_content();
        content.techs.push(nebula4x_core::TechDef {
            id: "tech_bad".to_string(),
            name: "Bad".to_string(),
            prereqs: vec![],
            cost_rp: -5.0,
            unlocks_components: vec![],
            unlocks_installations: vec![],
            effects: vec![],
        });
        validate_content(&content);
    }

    #[test]
    fn bootstrap_scenario_is_deterministic_for_a_fixed_seed() {
        let content = base_content();
        let config = GalaxyConfig { seed: 7, num_systems: 6, ..GalaxyConfig::default() };
        let (state_a, _) = bootstrap_scenario(&content, &config, "Sol Directorate", ControlMode::Player);
        let (state_b, _) = bootstrap_scenario(&content, &config, "Sol Directorate", ControlMode::Player);
        assert_eq!(serde_json::to_string(&state_a).unwrap(), serde_json::to_string(&state_b).unwrap());
    }

    #[test]
    fn load_content_missing_file_errors() {
        let result = load_content("/tmp/nebula4x_nonexistent_dir_12345");
        assert!(result.is_err());
    }

    #[test]
    fn load_and_save_state_round_trips_through_disk() {
        let content = base_content();
        let config = GalaxyConfig { seed: 3, num_systems: 4, ..GalaxyConfig::default() };
        let (state, _) = bootstrap_scenario(&content, &config, "Explorers", ControlMode::Player);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let loaded = load_state(path.to_str().unwrap(), &content).unwrap();
        assert_eq!(loaded.date.day, state.date.day);
        assert_eq!(loaded.systems.len(), state.systems.len());
    }
}
