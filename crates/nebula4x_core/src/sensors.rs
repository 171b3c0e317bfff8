//! Per-faction fog of war (component F, §4.F): sensor detection, contact
//! snapshots with two-point velocity extrapolation, alliance intel sharing,
//! and stale-contact pruning.
//!
//! Detection runs per system in sorted order, each detecting faction's ships
//! sorted by id, each candidate target sorted by id — the iteration order
//! itself never affects the result (every candidate is evaluated against
//! every detector independently) but keeps the emitted event sequence
//! reproducible.

use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{
    Contact, ContactSnapshot, Content, EngineConfig, EventCategory, EventContext, EventLevel,
    SimEvent, State,
};
use std::collections::HashMap;

/// Best sensor range among a faction's own ships in a system, attenuated by
/// the system's nebula density. Ships with a design that no longer resolves
/// contribute nothing rather than panicking.
fn best_sensor_range(state: &State, faction_id: Id, system_id: Id, nebula_density: f64, config: &EngineConfig) -> f64 {
    let mut best = 0.0_f64;
    for ship_id in sorted_keys(&state.ships) {
        let ship = &state.ships[&ship_id];
        if ship.faction_id != faction_id || ship.system_id != system_id {
            continue;
        }
        let Some(design) = state.designs.get(&ship.design_id) else { continue };
        if !ship.power_policy.sensors_online {
            continue;
        }
        let effective = design.sensor_range_mkm * crate::heat::sensor_multiplier(ship.heat_state, config);
        best = best.max(effective);
    }
    let nebula_mult = (1.0 - 0.65 * nebula_density).max(0.25);
    best * nebula_mult
}

fn effective_signature(signature_multiplier: f64, cap: f64) -> f64 {
    signature_multiplier.max(0.01).min(cap.max(0.01))
}

/// Runs one sensor pass: for each system, each faction with ships present
/// scans every other faction's ships for detection, updates contacts (with
/// extrapolation history preserved across a tick where the target wasn't
/// seen), shares fresh detections with allies, and prunes contacts older
/// than `contact_max_age_days`.
pub fn tick_sensors(state: &mut State, content: &Content, config: &EngineConfig, events: &mut Vec<SimEvent>) {
    let today = state.date.day;
    let hour = state.date.hour_of_day;

    // (detecting_faction, target_ship) -> new snapshot, computed before any
    // mutation so detection itself reads a consistent pre-tick state.
    let mut detections: Vec<(Id, Id, ContactSnapshot, String, Id, Id)> = Vec::new();

    for system_id in sorted_keys(&state.systems) {
        let system = &state.systems[&system_id];
        let nebula_density = system.nebula_density;
        let ships_here = sorted_keys(&state.ships)
            .into_iter()
            .filter(|s| state.ships[s].system_id == system_id)
            .collect::<Vec<_>>();
        if ships_here.is_empty() {
            continue;
        }
        let faction_ids: Vec<Id> = {
            let mut v: Vec<Id> = ships_here.iter().map(|s| state.ships[s].faction_id).collect();
            v.sort_unstable();
            v.dedup();
            v
        };

        for &detector_faction in &faction_ids {
            let range = best_sensor_range(state, detector_faction, system_id, nebula_density, config);
            if range <= 0.0 {
                continue;
            }
            for &target_id in &ships_here {
                let target = &state.ships[&target_id];
                if target.faction_id == detector_faction {
                    continue;
                }
                let Some(target_design) = state.designs.get(&target.design_id) else { continue };
                let signature = effective_signature(target_design.signature_multiplier, config.sensor_max_signature_multiplier);
                let effective_range = range / signature;

                // Closest owned ship determines detection distance.
                let mut detected = false;
                for &own_id in &ships_here {
                    let own = &state.ships[&own_id];
                    if own.faction_id != detector_faction {
                        continue;
                    }
                    if own.position.distance_to(target.position) <= effective_range {
                        detected = true;
                        break;
                    }
                }
                if !detected {
                    continue;
                }
                detections.push((
                    detector_faction,
                    target_id,
                    ContactSnapshot { day: today, system_id, position: target.position },
                    target.name.clone(),
                    target.design_id,
                    target.faction_id,
                ));
            }
        }
    }

    let _ = content;
    for (detector_faction, target_id, snapshot, name, design_id, target_faction) in detections {
        apply_detection(state, detector_faction, target_id, snapshot, &name, design_id, target_faction, events);
    }

    share_with_allies(state);
    prune_stale_contacts(state, config.contact_max_age_days, today, hour, events);
}

fn apply_detection(
    state: &mut State,
    faction_id: Id,
    target_id: Id,
    snapshot: ContactSnapshot,
    name: &str,
    design_id: Id,
    target_faction: Id,
    events: &mut Vec<SimEvent>,
) {
    let Some(faction) = state.factions.get_mut(&faction_id) else { return };
    let is_new = !faction.contacts.contains_key(&target_id);
    let previous = faction.contacts.get(&target_id).map(|c| c.last_seen);
    faction.contacts.insert(
        target_id,
        Contact {
            ship_id: target_id,
            last_seen: snapshot,
            last_seen_name: name.to_string(),
            last_seen_design_id: design_id,
            last_seen_faction_id: target_faction,
            previous_seen: previous,
        },
    );
    if is_new {
        events.push(SimEvent {
            seq: 0,
            day: snapshot.day,
            hour: state.date.hour_of_day,
            level: EventLevel::Info,
            category: EventCategory::Sensors,
            message: format!("faction {faction_id} detected new contact '{name}'"),
            context: EventContext { faction_id: Some(faction_id), ship_id: Some(target_id), system_id: Some(snapshot.system_id), ..Default::default() },
        });
    }
}

/// Allied factions see each other's freshest sightings: for every pair of
/// mutually allied factions, the newer of the two contact records wins.
fn share_with_allies(state: &mut State) {
    let faction_ids = sorted_keys(&state.factions);
    for &a in &faction_ids {
        for &b in &faction_ids {
            if a >= b {
                continue;
            }
            let allied = state.factions[&a].is_allied_with(b) && state.factions[&b].is_allied_with(a);
            if !allied {
                continue;
            }
            let mut target_ids: Vec<Id> = state.factions[&a]
                .contacts
                .keys()
                .chain(state.factions[&b].contacts.keys())
                .copied()
                .collect();
            target_ids.sort_unstable();
            target_ids.dedup();
            for target_id in target_ids {
                let ca = state.factions[&a].contacts.get(&target_id).cloned();
                let cb = state.factions[&b].contacts.get(&target_id).cloned();
                let newest = match (ca, cb) {
                    (Some(x), Some(y)) => Some(if x.last_seen.day >= y.last_seen.day { x } else { y }),
                    (Some(x), None) => Some(x),
                    (None, Some(y)) => Some(y),
                    (None, None) => None,
                };
                let Some(newest) = newest else { continue };
                state.factions.get_mut(&a).unwrap().contacts.insert(target_id, newest.clone());
                state.factions.get_mut(&b).unwrap().contacts.insert(target_id, newest);
            }
        }
    }
}

/// Drops contacts older than `max_age_days` and contacts whose ship no longer
/// exists in `state.ships` (destroyed or captured-and-merged away).
fn prune_stale_contacts(state: &mut State, max_age_days: f64, today: i64, hour: u8, events: &mut Vec<SimEvent>) {
    for faction_id in sorted_keys(&state.factions) {
        let ships = &state.ships;
        let faction = state.factions.get_mut(&faction_id).unwrap();
        let mut dropped = Vec::new();
        faction.contacts.retain(|ship_id, contact| {
            let age = (today - contact.last_seen.day) as f64;
            let keep = age <= max_age_days && ships.contains_key(ship_id);
            if !keep {
                dropped.push(*ship_id);
            }
            keep
        });
        for ship_id in dropped {
            events.push(SimEvent {
                seq: 0,
                day: today,
                hour,
                level: EventLevel::Warn,
                category: EventCategory::Sensors,
                message: format!("faction {faction_id} lost contact on ship {ship_id}"),
                context: EventContext { faction_id: Some(faction_id), ship_id: Some(ship_id), ..Default::default() },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Point2;
    use crate::test_fixtures::{base_content, basic_design, empty_faction_in, spawn_ship, two_system_state};
    use crate::types::ControlMode;

    #[test]
    fn ship_within_range_is_detected_and_tracked() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_a = *state.factions.keys().next().unwrap();
        let faction_b = empty_faction_in(&mut state, "Rival", ControlMode::Player);
        let sys_a = *state.systems.keys().next().unwrap();
        let design_id = basic_design(&mut state);
        spawn_ship(&mut state, faction_a, sys_a, design_id, Point2::new(0.0, 0.0));
        spawn_ship(&mut state, faction_b, sys_a, design_id, Point2::new(5.0, 0.0));

        let mut events = Vec::new();
        tick_sensors(&mut state, &content, &config, &mut events);

        assert_eq!(state.factions[&faction_a].contacts.len(), 1);
        assert!(events.iter().any(|e| e.category == EventCategory::Sensors));
    }

    #[test]
    fn ship_out_of_range_is_not_detected() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_a = *state.factions.keys().next().unwrap();
        let faction_b = empty_faction_in(&mut state, "Rival", ControlMode::Player);
        let sys_a = *state.systems.keys().next().unwrap();
        let design_id = basic_design(&mut state);
        spawn_ship(&mut state, faction_a, sys_a, design_id, Point2::new(0.0, 0.0));
        spawn_ship(&mut state, faction_b, sys_a, design_id, Point2::new(10_000.0, 0.0));

        let mut events = Vec::new();
        tick_sensors(&mut state, &content, &config, &mut events);

        assert!(state.factions[&faction_a].contacts.is_empty());
    }

    #[test]
    fn extrapolated_velocity_uses_two_point_history() {
        let mut state = two_system_state();
        let content = base_content();
        let config = EngineConfig::default();
        let faction_a = *state.factions.keys().next().unwrap();
        let faction_b = empty_faction_in(&mut state, "Rival", ControlMode::Player);
        let sys_a = *state.systems.keys().next().unwrap();
        let design_id = basic_design(&mut state);
        spawn_ship(&mut state, faction_a, sys_a, design_id, Point2::new(0.0, 0.0));
        let target = spawn_ship(&mut state, faction_b, sys_a, design_id, Point2::new(5.0, 0.0));

        let mut events = Vec::new();
        tick_sensors(&mut state, &content, &config, &mut events);
        state.date.day += 1;
        state.ships.get_mut(&target).unwrap().position = Point2::new(15.0, 0.0);
        tick_sensors(&mut state, &content, &config, &mut events);

        let contact = &state.factions[&faction_a].contacts[&target];
        let velocity = contact.extrapolated_velocity().expect("should have two snapshots");
        assert!((velocity.x - 10.0).abs() < 1e-9);
    }
}
