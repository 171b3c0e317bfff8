//! Content hot-reload (§6, §7). Validates the incoming catalog before
//! touching any state: a failing reload leaves both `state` and the engine's
//! previous content completely untouched. A passing reload recomputes every
//! design's derived stats and prunes faction unlocks that no longer resolve.

use nebula4x_core::design::recompute_all_designs;
use nebula4x_core::errors::ContentError;
use nebula4x_core::sorted::sorted_keys;
use nebula4x_core::{Content, State};

/// Outcome of [`crate::Engine::reload_content_db`].
#[derive(Debug, Clone, Default)]
pub struct ReloadResult {
    pub ok: bool,
    pub custom_designs_updated: u32,
    pub custom_designs_failed: u32,
    pub ships_updated: u32,
    pub factions_rebuilt: u32,
    pub warnings: Vec<String>,
    pub errors: Vec<ContentError>,
}

fn validate_content(content: &Content) -> Vec<ContentError> {
    let mut errors = Vec::new();
    let mineral_ids: std::collections::HashSet<&str> = content.minerals.iter().map(|m| m.id.as_str()).collect();

    let mut seen_techs = std::collections::HashSet::new();
    for tech in &content.techs {
        if !seen_techs.insert(tech.id.as_str()) {
            errors.push(ContentError::DuplicateId(tech.id.clone()));
        }
        if tech.cost_rp < 0.0 {
            errors.push(ContentError::NegativeCost(format!("tech {}", tech.id)));
        }
        for prereq in &tech.prereqs {
            if !content.techs.iter().any(|t| &t.id == prereq) {
                errors.push(ContentError::DanglingReference { from: format!("tech {}", tech.id), referent: prereq.clone() });
            }
        }
    }

    for id in sorted_keys_names(content.installations.keys()) {
        let inst = &content.installations[&id];
        if inst.cp_per_day < 0.0 {
            errors.push(ContentError::NegativeCost(format!("installation {id} cp_per_day")));
        }
        for (mineral, amount) in &inst.mineral_cost {
            if *amount < 0.0 {
                errors.push(ContentError::NegativeCost(format!("installation {id} cost of {mineral}")));
            }
            if !mineral_ids.contains(mineral.as_str()) {
                errors.push(ContentError::DanglingReference { from: format!("installation {id}"), referent: mineral.clone() });
            }
        }
        if let Some(recipe_id) = &inst.recipe_id {
            if !content.recipes.contains_key(recipe_id) {
                errors.push(ContentError::DanglingReference { from: format!("installation {id}"), referent: recipe_id.clone() });
            }
        }
    }

    for id in sorted_keys_names(content.components.keys()) {
        let comp = &content.components[&id];
        for (mineral, amount) in &comp.cost {
            if *amount < 0.0 {
                errors.push(ContentError::NegativeCost(format!("component {id} cost of {mineral}")));
            }
            if !mineral_ids.contains(mineral.as_str()) {
                errors.push(ContentError::DanglingReference { from: format!("component {id}"), referent: mineral.clone() });
            }
        }
    }

    for (per_ton_mineral, per_ton) in &content.build_costs_per_ton.mineral_cost_per_ton {
        if *per_ton < 0.0 {
            errors.push(ContentError::NegativeCost(format!("build cost per ton of {per_ton_mineral}")));
        }
        if !mineral_ids.contains(per_ton_mineral.as_str()) {
            errors.push(ContentError::DanglingReference { from: "build_costs_per_ton".to_string(), referent: per_ton_mineral.clone() });
        }
    }

    errors
}

/// Deterministic ordering helper so validation errors are produced in a
/// stable order across runs (the underlying maps are `AHashMap`s).
fn sorted_keys_names<'a, I: Iterator<Item = &'a String>>(keys: I) -> Vec<String> {
    let mut v: Vec<String> = keys.cloned().collect();
    v.sort();
    v
}

/// Validates `new_content`, then (only if valid) swaps it in, recomputes
/// every design, and prunes faction tech-unlock bookkeeping that no longer
/// resolves against the new catalog.
pub fn reload_content_db(state: &mut State, content: &mut Content, new_content: Content, validate_state: bool) -> ReloadResult {
    let errors = validate_content(&new_content);
    if !errors.is_empty() {
        return ReloadResult { ok: false, errors, ..ReloadResult::default() };
    }

    let mut warnings = Vec::new();
    let failed_designs = recompute_all_designs(state, &new_content);
    for design_id in &failed_designs {
        warnings.push(format!("design {design_id} no longer resolves any components; keeping its previous stats"));
    }
    let custom_designs_failed = failed_designs.len() as u32;
    let custom_designs_updated = state.designs.len() as u32 - custom_designs_failed;

    let ships_updated = state
        .ships
        .values()
        .filter(|s| !failed_designs.contains(&s.design_id))
        .count() as u32;

    let mut factions_rebuilt = 0u32;
    for faction_id in sorted_keys(&state.factions) {
        let faction = state.factions.get_mut(&faction_id).unwrap();
        let before_components = faction.unlocked_components.len();
        let before_installations = faction.unlocked_installations.len();
        faction.unlocked_components.retain(|c| new_content.components.contains_key(c));
        faction.unlocked_installations.retain(|i| new_content.installations.contains_key(i));
        if faction.unlocked_components.len() != before_components || faction.unlocked_installations.len() != before_installations {
            factions_rebuilt += 1;
            warnings.push(format!("faction {faction_id} lost unlocks no longer present in the reloaded catalog"));
        }
    }

    if validate_state {
        for colony_id in sorted_keys(&state.colonies) {
            let colony = &state.colonies[&colony_id];
            for (inst_id, _) in &colony.installations {
                if !new_content.installations.contains_key(inst_id) {
                    warnings.push(format!("colony {colony_id} has built installation '{inst_id}' absent from the reloaded catalog"));
                }
            }
        }
    }

    *content = new_content;

    ReloadResult {
        ok: true,
        custom_designs_updated,
        custom_designs_failed,
        ships_updated,
        factions_rebuilt,
        warnings,
        errors: Vec::new(),
    }
}
