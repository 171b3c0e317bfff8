//! Rate-limited consumption-chain industry (component E, §4.E).
//!
//! Each factory installation runs a single recipe, consuming inputs from the
//! colony's mineral stock at `industry_capacity_tons_per_day * count` and
//! emitting outputs proportionally. Throughput is clamped by whichever input
//! is scarcest, so a colony never goes negative on any mineral.

use crate::economy::{effective_multiplier, OutputMultiplier};
use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{Content, OutputClass, State};
use std::collections::HashMap;

/// Runs one industry pass over `dt_days`, mutating colony mineral stocks in
/// place. Recipes with no available input throughput simply produce nothing.
pub fn tick_industry(
    state: &mut State,
    content: &Content,
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    dt_days: f64,
) {
    if dt_days <= 0.0 {
        return;
    }

    for colony_id in sorted_keys(&state.colonies) {
        let colony = &state.colonies[&colony_id];
        let mult = effective_multiplier(multipliers, colony.faction_id, OutputClass::Industry);

        let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
        inst_ids.sort();

        let mut deltas: HashMap<String, f64> = HashMap::new();
        for inst_id in inst_ids {
            let count = colony.installations[inst_id];
            if count == 0 {
                continue;
            }
            let Some(def) = content.installations.get(inst_id) else { continue };
            let Some(recipe_id) = &def.recipe_id else { continue };
            let Some(recipe) = content.recipes.get(recipe_id) else { continue };
            if def.industry_capacity_tons_per_day <= 0.0 {
                continue;
            }

            let requested_units = def.industry_capacity_tons_per_day * f64::from(count) * mult * dt_days;
            if requested_units <= 0.0 {
                continue;
            }

            // Throughput is bounded by the scarcest input, scaled by the pending
            // deltas already queued this pass so stacked factories on the same
            // recipe don't overdraw a shared stockpile.
            let mut max_units = requested_units;
            let mut input_ids: Vec<&String> = recipe.inputs.keys().collect();
            input_ids.sort();
            for mineral in &input_ids {
                let per_unit = recipe.inputs[*mineral];
                if per_unit <= 0.0 {
                    continue;
                }
                let available = colony.stock_of(mineral) + deltas.get(*mineral).copied().unwrap_or(0.0);
                let affordable_units = available / per_unit;
                max_units = max_units.min(affordable_units.max(0.0));
            }
            if max_units <= 0.0 {
                continue;
            }

            for mineral in &input_ids {
                let per_unit = recipe.inputs[*mineral];
                *deltas.entry((*mineral).clone()).or_insert(0.0) -= per_unit * max_units;
            }
            let mut output_ids: Vec<&String> = recipe.outputs.keys().collect();
            output_ids.sort();
            for mineral in output_ids {
                let per_unit = recipe.outputs[mineral];
                *deltas.entry(mineral.clone()).or_insert(0.0) += per_unit * max_units;
            }
        }

        if deltas.is_empty() {
            continue;
        }
        let colony_mut = state.colonies.get_mut(&colony_id).unwrap();
        let mut mineral_ids: Vec<String> = deltas.keys().cloned().collect();
        mineral_ids.sort();
        for mineral in mineral_ids {
            let delta = deltas[&mineral];
            let entry = colony_mut.minerals.entry(mineral).or_insert(0.0);
            *entry = (*entry + delta).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::compute_faction_multipliers;
    use crate::test_fixtures::{base_content, empty_faction_in, spawn_body, spawn_colony};
    use crate::types::{ControlMode, State};
    use std::collections::HashMap;

    #[test]
    fn recipe_converts_input_to_output_without_going_negative() {
        let content = base_content();
        let mut state = State::new(1);
        let faction = empty_faction_in(&mut state, "Test", ControlMode::Player);
        let sys = state.ids.next();
        state.systems.insert(
            sys,
            crate::types::StarSystem {
                id: sys,
                name: "Sys".to_string(),
                galaxy_position: crate::spatial::Point2::new(0.0, 0.0),
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
        state.colonies.get_mut(&colony).unwrap().installations.insert("factory_basic".to_string(), 1);
        state.colonies.get_mut(&colony).unwrap().minerals.insert("Duranium".to_string(), 10.0);

        let multipliers = compute_faction_multipliers(&state, &content);
        tick_industry(&mut state, &content, &multipliers, 1.0);

        let colony = &state.colonies[&colony];
        assert!(colony.stock_of("Duranium") < 10.0);
        assert!(colony.stock_of("Duranium") >= 0.0);
        assert!(colony.stock_of("Neutronium") > 0.0);
    }

    #[test]
    fn no_input_means_no_production() {
        let content = base_content();
        let mut state = State::new(1);
        let faction = empty_faction_in(&mut state, "Test", ControlMode::Player);
        let sys = state.ids.next();
        state.systems.insert(
            sys,
            crate::types::StarSystem {
                id: sys,
                name: "Sys".to_string(),
                galaxy_position: crate::spatial::Point2::new(0.0, 0.0),
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
        state.colonies.get_mut(&colony).unwrap().installations.insert("factory_basic".to_string(), 1);

        let multipliers = compute_faction_multipliers(&state, &content);
        tick_industry(&mut state, &content, &multipliers, 1.0);

        let colony = &state.colonies[&colony];
        assert_eq!(colony.stock_of("Neutronium"), 0.0);
    }
}
