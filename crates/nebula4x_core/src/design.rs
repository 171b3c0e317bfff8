//! Operations on the data model (component B, §4.B): design derivation,
//! ship-to-design clamping, and the reference-cleanup sweeps that keep the
//! entity graph free of dangling ids after destruction.

use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{Content, Fleet, Ship, ShipDesign, State};

/// Folds a component list's contributions into an aggregate [`ShipDesign`].
/// Every contribution is additive — mass, hp, shields, weapon stats, sensor
/// range, and so on all sum across the hull's components, same as a
/// component-based hull with no single "best of" slots.
#[must_use]
pub fn derive_stats(id: Id, name: &str, component_ids: &[String], content: &Content) -> ShipDesign {
    let mut d = ShipDesign {
        id,
        name: name.to_string(),
        component_ids: component_ids.to_vec(),
        mass_tons: 0.0,
        speed_km_s: 0.0,
        sensor_range_mkm: 0.0,
        fuel_capacity: 0.0,
        fuel_use_per_mkm: 0.0,
        cargo_capacity: 0.0,
        cargo_mining_rate: 0.0,
        weapon_damage: 0.0,
        weapon_range_mkm: 0.0,
        missile_damage: 0.0,
        missile_speed_km_s: 0.0,
        missile_launchers: 0,
        missile_reload_days: 0.0,
        pd_damage_per_day: 0.0,
        pd_range_mkm: 0.0,
        reactor_output: 0.0,
        power_draw_weapons: 0.0,
        power_draw_shields: 0.0,
        power_draw_sensors: 0.0,
        power_draw_engines: 0.0,
        max_hp: 0.0,
        max_shields: 0.0,
        shield_regen_per_day: 0.0,
        signature_multiplier: 0.0,
        colonist_capacity: 0.0,
        troop_capacity: 0.0,
        ecm: 0.0,
        eccm: 0.0,
    };
    let mut signature_terms = 0u32;
    for cid in component_ids {
        let Some(def) = content.components.get(cid) else { continue };
        d.mass_tons += def.mass_tons;
        let c = &def.contributes;
        d.speed_km_s += c.speed_km_s;
        d.sensor_range_mkm += c.sensor_range_mkm;
        d.fuel_capacity += c.fuel_capacity;
        d.fuel_use_per_mkm += c.fuel_use_per_mkm;
        d.cargo_capacity += c.cargo_capacity;
        d.cargo_mining_rate += c.cargo_mining_rate;
        d.weapon_damage += c.weapon_damage;
        d.weapon_range_mkm += c.weapon_range_mkm;
        d.missile_damage += c.missile_damage;
        d.missile_speed_km_s += c.missile_speed_km_s;
        d.missile_launchers += c.missile_launchers;
        d.missile_reload_days += c.missile_reload_days;
        d.pd_damage_per_day += c.pd_damage_per_day;
        d.pd_range_mkm += c.pd_range_mkm;
        d.reactor_output += c.reactor_output;
        d.power_draw_weapons += if c.weapon_damage > 0.0 { c.power_draw } else { 0.0 };
        d.power_draw_shields += if c.shields > 0.0 || c.shield_regen_per_day > 0.0 { c.power_draw } else { 0.0 };
        d.power_draw_sensors += if c.sensor_range_mkm > 0.0 { c.power_draw } else { 0.0 };
        d.power_draw_engines += if c.speed_km_s > 0.0 { c.power_draw } else { 0.0 };
        d.max_hp += c.hp;
        d.max_shields += c.shields;
        d.shield_regen_per_day += c.shield_regen_per_day;
        if c.signature_multiplier > 0.0 {
            d.signature_multiplier += c.signature_multiplier;
            signature_terms += 1;
        }
        d.colonist_capacity += c.colonist_capacity;
        d.troop_capacity += c.troop_capacity;
        d.ecm += c.ecm;
        d.eccm += c.eccm;
    }
    d.signature_multiplier = if signature_terms > 0 {
        d.signature_multiplier / f64::from(signature_terms)
    } else {
        1.0
    };
    if d.max_hp <= 0.0 {
        d.max_hp = 1.0;
    }
    d
}

/// Recomputes every custom design's derived stats after a content reload.
/// Designs whose component list no longer resolves any components keep their
/// previously stored summary untouched (the content-reload-warning case in
/// §7) rather than collapsing to a zeroed-out hull.
pub fn recompute_all_designs(state: &mut State, content: &Content) -> Vec<Id> {
    let mut failed = Vec::new();
    for design_id in sorted_keys(&state.designs) {
        let (name, component_ids) = {
            let d = &state.designs[&design_id];
            (d.name.clone(), d.component_ids.clone())
        };
        if component_ids.iter().all(|c| !content.components.contains_key(c)) && !component_ids.is_empty() {
            failed.push(design_id);
            continue;
        }
        let recomputed = derive_stats(design_id, &name, &component_ids, content);
        state.designs.insert(design_id, recomputed);
    }
    failed
}

/// Clamps a ship's mutable fields to its design's caps, initializing sentinel
/// `-1.0` values (used by scenario/procgen authoring shorthand for "full") to
/// the design's capacity.
pub fn apply_design_to_ship(ship: &mut Ship, design: &ShipDesign) {
    if ship.hp < 0.0 {
        ship.hp = design.max_hp;
    }
    if ship.shields < 0.0 {
        ship.shields = design.max_shields;
    }
    if ship.fuel < 0.0 {
        ship.fuel = design.fuel_capacity;
    }
    if ship.troops < 0.0 {
        ship.troops = design.troop_capacity;
    }
    if ship.colonists < 0.0 {
        ship.colonists = design.colonist_capacity;
    }
    if ship.missile_ammo < 0.0 {
        ship.missile_ammo = f64::from(design.missile_launchers) * 10.0;
    }
    ship.hp = ship.hp.clamp(0.0, design.max_hp.max(ship.hp.min(design.max_hp)));
    ship.hp = ship.hp.min(design.max_hp);
    ship.shields = ship.shields.clamp(0.0, design.max_shields);
    ship.fuel = ship.fuel.clamp(0.0, design.fuel_capacity);
    ship.troops = ship.troops.clamp(0.0, design.troop_capacity);
    ship.colonists = ship.colonists.clamp(0.0, design.colonist_capacity);
}

/// Removes stale ship references from fleets, enforces membership uniqueness,
/// repairs leaders, and erases fleets left with no members.
pub fn prune_fleets(state: &mut State) {
    let mut to_remove = Vec::new();
    for fleet_id in sorted_keys(&state.fleets) {
        let fleet = state.fleets.get_mut(&fleet_id).unwrap();
        fleet.ship_ids.retain(|s| state.ships.contains_key(s));
        fleet.ship_ids.sort_unstable();
        fleet.ship_ids.dedup();
        if fleet.ship_ids.is_empty() {
            to_remove.push(fleet_id);
            continue;
        }
        if !fleet.ship_ids.contains(&fleet.leader_id) {
            fleet.leader_id = fleet.ship_ids[0];
        }
    }
    for id in to_remove {
        state.fleets.remove(&id);
    }
    // Enforce at-most-one-fleet membership: if a ship appears in more than one
    // fleet (can only happen via a bug elsewhere), keep the lowest fleet id.
    let mut owner: std::collections::HashMap<Id, Id> = std::collections::HashMap::new();
    for fleet_id in sorted_keys(&state.fleets) {
        let ship_ids = state.fleets[&fleet_id].ship_ids.clone();
        for ship_id in ship_ids {
            owner.entry(ship_id).or_insert(fleet_id);
        }
    }
    for fleet_id in sorted_keys(&state.fleets) {
        let fleet = state.fleets.get_mut(&fleet_id).unwrap();
        fleet.ship_ids.retain(|s| owner.get(s) == Some(&fleet_id));
        if fleet.ship_ids.is_empty() {
            continue;
        }
        if !fleet.ship_ids.contains(&fleet.leader_id) {
            fleet.leader_id = fleet.ship_ids[0];
        }
    }
    state.fleets.retain(|_, f| !f.ship_ids.is_empty());
}

/// Called after a ship is destroyed: removes it from its system's ship list,
/// its fleet, every faction's orders/contacts, and any wreck-origin linkage
/// that would otherwise dangle. Does not remove the ship's own `State.ships`
/// entry — the caller does that.
pub fn purge_ship_references(state: &mut State, ship_id: Id, system_id: Id) {
    if let Some(sys) = state.systems.get_mut(&system_id) {
        sys.ships.retain(|&s| s != ship_id);
    }
    state.ship_orders.remove(&ship_id);
    for fleet in state.fleets.values_mut() {
        fleet.ship_ids.retain(|&s| s != ship_id);
    }
    for faction in state.factions.values_mut() {
        faction.contacts.remove(&ship_id);
    }
    prune_fleets(state);
}

#[must_use]
pub fn is_fleet_member(fleet: &Fleet, ship_id: Id) -> bool {
    fleet.ship_ids.binary_search(&ship_id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, basic_design, two_system_state};
    use crate::types::{AutomationFlags, HeatBucket, Order, PowerPolicy, ShipOrders};
    use crate::spatial::Point2;

    #[test]
    fn derive_stats_sums_component_contributions() {
        let mut content = base_content();
        content.components.insert(
            "hull_light".to_string(),
            crate::types::ComponentDef {
                id: "hull_light".to_string(),
                name: "Light Hull".to_string(),
                mass_tons: 200.0,
                cost: std::collections::HashMap::new(),
                contributes: crate::types::ComponentContribution { hp: 50.0, ..Default::default() },
            },
        );
        content.components.insert(
            "engine_basic".to_string(),
            crate::types::ComponentDef {
                id: "engine_basic".to_string(),
                name: "Basic Engine".to_string(),
                mass_tons: 50.0,
                cost: std::collections::HashMap::new(),
                contributes: crate::types::ComponentContribution { speed_km_s: 5.0, power_draw: 2.0, ..Default::default() },
            },
        );
        let design = derive_stats(Id(1), "Frigate", &["hull_light".to_string(), "engine_basic".to_string()], &content);
        assert_eq!(design.mass_tons, 250.0);
        assert_eq!(design.max_hp, 50.0);
        assert_eq!(design.speed_km_s, 5.0);
    }

    #[test]
    fn apply_design_clamps_hp_and_fills_sentinels() {
        let mut state = two_system_state();
        let design_id = basic_design(&mut state);
        let design = state.designs[&design_id].clone();
        let mut ship = Ship {
            id: Id(99),
            faction_id: Id(1),
            system_id: Id(2),
            position: Point2::new(0.0, 0.0),
            velocity: Point2::new(0.0, 0.0),
            design_id,
            hp: -1.0,
            shields: -1.0,
            fuel: -1.0,
            cargo: std::collections::HashMap::new(),
            troops: -1.0,
            colonists: -1.0,
            missile_ammo: -1.0,
            heat: 0.0,
            heat_state: HeatBucket::Cold,
            maintenance_condition: 1.0,
            crew_grade_points: 0.0,
            automation: AutomationFlags::default(),
            power_policy: PowerPolicy::default(),
            missile_cooldown_days: 0.0,
            boarding_cooldown_days: 0.0,
            name: "Test".to_string(),
        };
        apply_design_to_ship(&mut ship, &design);
        assert_eq!(ship.hp, design.max_hp);
        assert_eq!(ship.fuel, design.fuel_capacity);
        let _ = Order::WaitDays { days: 1.0 };
        let _ = ShipOrders::default();
    }

    #[test]
    fn prune_fleets_drops_empty_and_repairs_leader() {
        let mut state = two_system_state();
        let fleet_id = Id(500);
        state.fleets.insert(fleet_id, Fleet { id: fleet_id, faction_id: Id(1), ship_ids: vec![Id(999)], leader_id: Id(999), formation: crate::types::Formation::Line, spacing_mkm: 1.0 });
        prune_fleets(&mut state);
        assert!(!state.fleets.contains_key(&fleet_id));
    }
}
