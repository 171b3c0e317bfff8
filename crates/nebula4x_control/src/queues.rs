//! Colony-side queue editing: deleting or reordering a shipyard/construction
//! entry. Unlike the core economy passes these are explicit caller actions,
//! so an out-of-range index is a [`ValidationError`] rather than something to
//! silently skip. Refunds only ever return minerals already paid for the
//! entry's current unit of progress — never the cost of units not yet begun.

use nebula4x_core::errors::ValidationError;
use nebula4x_core::{Content, Id, State};

pub fn delete_shipyard_order(
    state: &mut State,
    content: &Content,
    colony_id: Id,
    index: usize,
    refund_minerals: bool,
) -> Result<(), ValidationError> {
    let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
    let len = colony.shipyard_queue.len();
    if index >= len {
        return Err(ValidationError::QueueIndexOutOfRange { index, len });
    }
    let entry = colony.shipyard_queue.remove(index);
    if refund_minerals {
        let Some(design) = state.designs.get(&entry.design_id) else { return Ok(()) };
        let paid_tons = (design.mass_tons - entry.tons_remaining).max(0.0);
        if paid_tons > 0.0 {
            let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
            for (mineral, per_ton) in &content.build_costs_per_ton.mineral_cost_per_ton {
                if *per_ton <= 0.0 {
                    continue;
                }
                *colony.minerals.entry(mineral.clone()).or_insert(0.0) += per_ton * paid_tons;
            }
        }
    }
    Ok(())
}

pub fn move_shipyard_order(state: &mut State, colony_id: Id, from: usize, to: usize) -> Result<(), ValidationError> {
    let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
    let len = colony.shipyard_queue.len();
    if from >= len || to >= len {
        return Err(ValidationError::QueueIndexOutOfRange { index: from.max(to), len });
    }
    let entry = colony.shipyard_queue.remove(from);
    colony.shipyard_queue.insert(to, entry);
    Ok(())
}

pub fn delete_construction_order(
    state: &mut State,
    content: &Content,
    colony_id: Id,
    index: usize,
    refund_minerals: bool,
) -> Result<(), ValidationError> {
    let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
    let len = colony.construction_queue.len();
    if index >= len {
        return Err(ValidationError::QueueIndexOutOfRange { index, len });
    }
    let entry = colony.construction_queue.remove(index);
    if refund_minerals && entry.minerals_paid {
        if let Some(def) = content.installations.get(&entry.installation_id) {
            let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
            for (mineral, amount) in &def.mineral_cost {
                *colony.minerals.entry(mineral.clone()).or_insert(0.0) += amount;
            }
        }
    }
    Ok(())
}

pub fn move_construction_order(state: &mut State, colony_id: Id, from: usize, to: usize) -> Result<(), ValidationError> {
    let colony = state.colonies.get_mut(&colony_id).ok_or(ValidationError::UnknownEntity(colony_id))?;
    let len = colony.construction_queue.len();
    if from >= len || to >= len {
        return Err(ValidationError::QueueIndexOutOfRange { index: from.max(to), len });
    }
    let entry = colony.construction_queue.remove(from);
    colony.construction_queue.insert(to, entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula4x_core::economy::{construction::enqueue_installation_build, shipyards::enqueue_new_build};
    use nebula4x_core::test_fixtures::{base_content, basic_design, empty_faction_in, spawn_body, spawn_colony};
    use nebula4x_core::types::ControlMode;

    fn setup() -> (State, Content, Id) {
        let content = base_content();
        let mut state = State::new(1);
        let faction = empty_faction_in(&mut state, "Test", ControlMode::Player);
        let sys = state.ids.next();
        state.systems.insert(
            sys,
            nebula4x_core::StarSystem {
                id: sys,
                name: "Sys".to_string(),
                galaxy_position: nebula4x_core::spatial::Point2::new(0.0, 0.0),
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
    fn deleting_a_paid_construction_entry_refunds_its_minerals() {
        let (mut state, content, colony) = setup();
        let colony_mut = state.colonies.get_mut(&colony).unwrap();
        colony_mut.minerals.insert("Duranium".to_string(), 100.0);
        enqueue_installation_build(colony_mut, &content, "mine_basic", 1, false);
        colony_mut.construction_queue[0].minerals_paid = true;
        let def = content.installations.get("mine_basic").unwrap();
        for (m, amount) in &def.mineral_cost {
            let entry = colony_mut.minerals.entry(m.clone()).or_insert(0.0);
            *entry -= amount;
        }

        delete_construction_order(&mut state, &content, colony, 0, true).unwrap();
        let after = &state.colonies[&colony];
        assert!(after.construction_queue.is_empty());
        for (m, amount) in &def.mineral_cost {
            assert!((after.stock_of(m) - 100.0).abs() < 1e-9, "mineral {m} not refunded: got {}", after.stock_of(m));
            let _ = amount;
        }
    }

    #[test]
    fn deleting_an_unpaid_entry_refunds_nothing() {
        let (mut state, content, colony) = setup();
        let colony_mut = state.colonies.get_mut(&colony).unwrap();
        enqueue_installation_build(colony_mut, &content, "mine_basic", 1, false);
        delete_construction_order(&mut state, &content, colony, 0, true).unwrap();
        assert_eq!(state.colonies[&colony].stock_of("Duranium"), 0.0);
    }

    #[test]
    fn move_shipyard_order_reorders_the_queue() {
        let (mut state, _content, colony) = setup();
        let mut design_state = State::new(2);
        let design = basic_design(&mut design_state);
        state.designs.insert(design, design_state.designs[&design].clone());
        enqueue_new_build(&mut state, colony, design, 2, false);
        move_shipyard_order(&mut state, colony, 0, 1).unwrap();
        assert_eq!(state.colonies[&colony].shipyard_queue.len(), 2);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (mut state, content, colony) = setup();
        assert!(delete_construction_order(&mut state, &content, colony, 0, false).is_err());
    }
}
