//! Installation construction queue (component E, §4.E). Non-blocking: an
//! order that cannot currently pay its minerals is skipped rather than
//! stalling every order behind it.

use crate::economy::{effective_multiplier, OutputMultiplier};
use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{
    Colony, Content, ConstructionQueueEntry, EventCategory, EventContext, EventLevel, OutputClass,
    SimEvent, State,
};
use std::collections::HashMap;

fn cp_budget_for(colony: &Colony, content: &Content, mult: f64, dt_days: f64) -> f64 {
    let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
    inst_ids.sort();
    let mut budget = 0.0;
    for inst_id in inst_ids {
        let count = colony.installations[inst_id];
        if count == 0 {
            continue;
        }
        let Some(def) = content.installations.get(inst_id) else { continue };
        if def.cp_per_day <= 0.0 {
            continue;
        }
        budget += def.cp_per_day * f64::from(count) * mult * dt_days;
    }
    budget
}

fn can_afford(colony: &Colony, cost: &HashMap<String, f64>) -> bool {
    cost.iter().all(|(m, amount)| colony.stock_of(m) >= *amount - 1e-9)
}

fn pay(colony: &mut Colony, cost: &HashMap<String, f64>) {
    for (m, amount) in cost {
        let entry = colony.minerals.entry(m.clone()).or_insert(0.0);
        *entry = (*entry - amount).max(0.0);
    }
}

/// Runs one construction pass for `dt_days`. Queue entries are attempted in
/// order; an entry that cannot pay its minerals this tick is skipped (not
/// blocked) so later entries still get a chance at the same CP budget.
pub fn tick_construction(
    state: &mut State,
    content: &Content,
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    dt_days: f64,
    events: &mut Vec<SimEvent>,
) {
    if dt_days <= 0.0 {
        return;
    }
    for colony_id in sorted_keys(&state.colonies) {
        let colony = state.colonies.get(&colony_id).unwrap();
        let mult = effective_multiplier(multipliers, colony.faction_id, OutputClass::Construction);
        let mut cp_budget = cp_budget_for(colony, content, mult, dt_days);
        if cp_budget <= 0.0 && colony.construction_queue.iter().all(|e| e.minerals_paid) {
            continue;
        }

        let mut completed_indices = Vec::new();
        let queue_len = state.colonies[&colony_id].construction_queue.len();
        for i in 0..queue_len {
            let colony = state.colonies.get_mut(&colony_id).unwrap();
            let Some(entry) = colony.construction_queue.get(i).cloned() else { continue };
            let Some(def) = content.installations.get(&entry.installation_id).cloned() else {
                continue;
            };

            let mut entry = entry;
            if !entry.minerals_paid {
                if def.mineral_cost.is_empty() || can_afford(colony, &def.mineral_cost) {
                    pay(colony, &def.mineral_cost);
                    entry.minerals_paid = true;
                    entry.cp_remaining = def.cp_per_day.max(1.0) * 0.0 + entry.cp_remaining;
                } else {
                    colony.construction_queue[i] = entry;
                    continue;
                }
            }
            if cp_budget <= 0.0 {
                colony.construction_queue[i] = entry;
                continue;
            }
            let spend = cp_budget.min(entry.cp_remaining);
            entry.cp_remaining -= spend;
            cp_budget -= spend;
            if entry.cp_remaining <= 1e-9 {
                *colony.installations.entry(entry.installation_id.clone()).or_insert(0) += 1;
                events.push(SimEvent {
                    seq: 0,
                    day: state.date.day,
                    hour: state.date.hour_of_day,
                    level: EventLevel::Info,
                    category: EventCategory::Construction,
                    message: format!("colony {colony_id} completed installation '{}'", entry.installation_id),
                    context: EventContext { colony_id: Some(colony_id), ..Default::default() },
                });
                entry.quantity_remaining = entry.quantity_remaining.saturating_sub(1);
                if entry.quantity_remaining == 0 {
                    completed_indices.push(i);
                } else {
                    entry.minerals_paid = false;
                    entry.cp_remaining = def.cp_per_day.max(1.0);
                    colony.construction_queue[i] = entry;
                }
            } else {
                colony.construction_queue[i] = entry;
            }
        }
        completed_indices.sort_unstable();
        for &i in completed_indices.iter().rev() {
            state.colonies.get_mut(&colony_id).unwrap().construction_queue.remove(i);
        }
    }
}

/// Enqueues `quantity` units of `installation_id`, `auto_queued` marking
/// whether this came from the AI/auto-build pass (so it can be cancelled
/// before being started, but never once minerals are paid).
pub fn enqueue_installation_build(colony: &mut Colony, content: &Content, installation_id: &str, quantity: u32, auto_queued: bool) {
    if quantity == 0 || !content.installations.contains_key(installation_id) {
        return;
    }
    let cp_per_day = content.installations[installation_id].cp_per_day.max(1.0);
    colony.construction_queue.push(ConstructionQueueEntry {
        installation_id: installation_id.to_string(),
        quantity_remaining: quantity,
        minerals_paid: false,
        cp_remaining: cp_per_day,
        auto_queued,
    });
}

/// Trims not-yet-started auto-queued entries and tops up to `target` count
/// (current installations + manually queued + already-auto-queued), mirroring
/// the ship auto-target logic in `shipyards`.
pub fn sync_auto_build_target(colony: &mut Colony, content: &Content, installation_id: &str, target: u32) {
    let have_built = colony.installations.get(installation_id).copied().unwrap_or(0);
    let pending: u32 = colony
        .construction_queue
        .iter()
        .filter(|e| e.installation_id == installation_id)
        .map(|e| e.quantity_remaining)
        .sum();
    let have = have_built + pending;
    if have > target {
        let mut excess = have - target;
        colony.construction_queue.retain_mut(|e| {
            if excess == 0 || e.installation_id != installation_id || e.minerals_paid {
                return true;
            }
            if e.quantity_remaining <= excess {
                excess -= e.quantity_remaining;
                false
            } else {
                e.quantity_remaining -= excess;
                excess = 0;
                true
            }
        });
    } else if have < target {
        enqueue_installation_build(colony, content, installation_id, target - have, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::compute_faction_multipliers;
    use crate::test_fixtures::{base_content, empty_faction_in, spawn_body, spawn_colony};
    use crate::types::ControlMode;

    fn setup() -> (State, Content, Id) {
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
        let body = spawn_body(&mut state, sys, std::collections::HashMap::new());
        let colony = spawn_colony(&mut state, faction, body);
        (state, content, colony)
    }

    #[test]
    fn non_blocking_queue_skips_unaffordable_entry_and_runs_next() {
        let (mut state, mut content, colony) = setup();
        content.installations.insert(
            "expensive".to_string(),
            crate::types::InstallationDef {
                id: "expensive".to_string(),
                name: "Expensive".to_string(),
                cp_per_day: 10.0,
                mineral_cost: std::collections::HashMap::from([("Duranium".to_string(), 1000.0)]),
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
        let c = state.colonies.get_mut(&colony).unwrap();
        c.installations.insert("genericbuilder".to_string(), 1);
        content.installations.insert("genericbuilder".to_string(), crate::types::InstallationDef {
            id: "genericbuilder".to_string(), name: "Builder".to_string(), cp_per_day: 20.0,
            mineral_cost: std::collections::HashMap::new(), mining_capacity_tons_per_day: 0.0,
            research_per_day: 0.0, weapon_damage: 0.0, weapon_range_mkm: 0.0, sensor_range_mkm: 0.0,
            yard_capacity: false, cp_only: false, recipe_id: None, industry_capacity_tons_per_day: 0.0,
        });
        enqueue_installation_build(c, &content, "expensive", 1, false);
        enqueue_installation_build(c, &content, "mine_basic", 1, false);

        let multipliers = compute_faction_multipliers(&state, &content);
        let mut events = Vec::new();
        for _ in 0..5 {
            tick_construction(&mut state, &content, &multipliers, 1.0, &mut events);
        }
        let c = &state.colonies[&colony];
        assert_eq!(c.installations.get("mine_basic").copied().unwrap_or(0), 1);
        assert!(c.construction_queue.iter().any(|e| e.installation_id == "expensive"));
    }
}
