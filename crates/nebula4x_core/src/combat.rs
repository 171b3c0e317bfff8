//! Tick combat (component G, §4.G): continuous missile salvos with point
//! defense, beam fire with an ECM/ECCM-aware hit-chance model, colony
//! batteries, damage application, wrecks, boarding, and crew experience.
//!
//! Runs once per tick with `dt_days` already clamped to `[0, 10]` by the
//! caller. Every sub-pass walks factions/ships/salvos in sorted-id order so
//! two engines seeded alike produce byte-identical combat logs.

use crate::design::purge_ship_references;
use crate::id::Id;
use crate::rng::HashRng;
use crate::sorted::sorted_keys;
use crate::spatial::Point2;
use crate::types::{
    Content, EngineConfig, EventCategory, EventContext, EventLevel, HeatBucket, MissileSalvo,
    Order, ShipDesign, SimEvent, State, Wreck, WreckKind,
};
use std::collections::HashMap;

fn weapon_multiplier(heat: HeatBucket, config: &EngineConfig) -> f64 {
    match heat {
        HeatBucket::Cold | HeatBucket::Warm => 1.0,
        HeatBucket::Hot => (1.0 + config.ship_heat.min_weapon_multiplier) / 2.0,
        HeatBucket::Critical => config.ship_heat.min_weapon_multiplier,
    }
}

/// `t`-interval of the parametric segment `p0 + t*(p1-p0)`, `t in [0,1]`, that
/// lies inside the circle `(center, radius)`. Empty (`None`) if it never
/// enters, or enters only at a single point.
fn segment_circle_overlap(p0: Point2, p1: Point2, center: Point2, radius: f64) -> Option<(f64, f64)> {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let fx = p0.x - center.x;
    let fy = p0.y - center.y;
    let a = dx * dx + dy * dy;
    let b = 2.0 * (fx * dx + fy * dy);
    let c = fx * fx + fy * fy - radius * radius;
    if a <= 1e-12 {
        return if c <= 0.0 { Some((0.0, 1.0)) } else { None };
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t0 = ((-b - sqrt_disc) / (2.0 * a)).clamp(0.0, 1.0);
    let t1 = ((-b + sqrt_disc) / (2.0 * a)).clamp(0.0, 1.0);
    if t1 <= t0 {
        None
    } else {
        Some((t0, t1))
    }
}

fn lerp(p0: Point2, p1: Point2, t: f64) -> Point2 {
    Point2::new(p0.x + (p1.x - p0.x) * t, p0.y + (p1.y - p0.y) * t)
}

struct DamageBook {
    incoming: HashMap<Id, f64>,
    attackers: HashMap<Id, Vec<Id>>,
    crew_intensity: HashMap<Id, f64>,
}

impl DamageBook {
    fn new() -> Self {
        DamageBook { incoming: HashMap::new(), attackers: HashMap::new(), crew_intensity: HashMap::new() }
    }

    fn credit(&mut self, target: Id, attacker: Id, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        *self.incoming.entry(target).or_insert(0.0) += amount;
        let list = self.attackers.entry(target).or_default();
        if !list.contains(&attacker) {
            list.push(attacker);
        }
        *self.crew_intensity.entry(attacker).or_insert(0.0) += amount;
        *self.crew_intensity.entry(target).or_insert(0.0) += amount;
    }
}

/// Runs the full combat tick: missile flight/PD, beam fire, colony batteries,
/// new missile launches, damage application (with wreck spawn on
/// destruction), boarding, and crew-experience accrual.
pub fn tick_combat(state: &mut State, content: &Content, config: &EngineConfig, dt_days: f64, events: &mut Vec<SimEvent>) {
    if !config.enable_combat || dt_days <= 0.0 {
        return;
    }
    let mut book = DamageBook::new();

    advance_missile_salvos(state, dt_days, &mut book, events);
    resolve_beam_fire(state, content, config, dt_days, &mut book);
    resolve_colony_batteries(state, content, config, dt_days, &mut book);
    launch_missiles(state, content, config, events);
    apply_damage(state, content, config, &mut book, events);
    resolve_boarding(state, content, config, events);
    apply_crew_experience(state, config, &book);
}

/// Length of the union of `(t0, t1)` intervals, `t` already clamped to
/// `[0, 1]` by `segment_circle_overlap`. Merges overlapping spans so a
/// defender engaged by two salvos at once isn't credited double coverage.
fn union_length(mut intervals: Vec<(f64, f64)>) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut total = 0.0;
    let (mut cur_start, mut cur_end) = intervals[0];
    for &(t0, t1) in &intervals[1..] {
        if t0 > cur_end {
            total += cur_end - cur_start;
            cur_start = t0;
            cur_end = t1;
        } else {
            cur_end = cur_end.max(t1);
        }
    }
    total += cur_end - cur_start;
    total
}

fn advance_missile_salvos(state: &mut State, dt_days: f64, book: &mut DamageBook, events: &mut Vec<SimEvent>) {
    let salvo_ids = sorted_keys(&state.missile_salvos);
    let mut working: Vec<(Id, MissileSalvo, Point2, Point2)> = Vec::new();
    let mut to_remove = Vec::new();

    for &salvo_id in &salvo_ids {
        let mut salvo = state.missile_salvos[&salvo_id].clone();
        let target_ok = state.ships.get(&salvo.target_ship_id).is_some_and(|t| t.system_id == salvo.system_id);
        if !target_ok {
            to_remove.push(salvo_id);
            continue;
        }
        let eta_before = salvo.remaining_eta_days.max(0.0);
        let progress_before = if salvo.total_eta_days > 0.0 { 1.0 - eta_before / salvo.total_eta_days } else { 1.0 };
        salvo.remaining_eta_days -= dt_days;
        let eta_after = salvo.remaining_eta_days.max(0.0);
        let progress_after = if salvo.total_eta_days > 0.0 { 1.0 - eta_after / salvo.total_eta_days } else { 1.0 };
        let p0 = lerp(salvo.launch_pos, salvo.target_snapshot_pos, progress_before.clamp(0.0, 1.0));
        let p1 = lerp(salvo.launch_pos, salvo.target_snapshot_pos, progress_after.clamp(0.0, 1.0));
        working.push((salvo_id, salvo, p0, p1));
    }

    intercept_with_point_defense(state, dt_days, &mut working);

    for (salvo_id, salvo, _, _) in working {
        if salvo.remaining_eta_days <= 0.0 {
            if salvo.remaining_damage > 1e-9 {
                book.credit(salvo.target_ship_id, salvo.attacker_ship_id, salvo.remaining_damage);
            } else {
                events.push(SimEvent {
                    seq: 0,
                    day: state.date.day,
                    hour: state.date.hour_of_day,
                    level: EventLevel::Info,
                    category: EventCategory::Combat,
                    message: format!("salvo {salvo_id} fully intercepted before reaching ship {}", salvo.target_ship_id),
                    context: EventContext { system_id: Some(salvo.system_id), ship_id: Some(salvo.target_ship_id), ..Default::default() },
                });
            }
            to_remove.push(salvo_id);
        } else {
            state.missile_salvos.insert(salvo_id, salvo);
        }
    }
    for id in to_remove {
        state.missile_salvos.remove(&id);
    }
}

/// Point defense over every salvo in flight this tick, not just one at a
/// time: a defender's daily budget is shared across every salvo that clips
/// its disc, scaled by `union_u` (the fraction of the tick during which
/// *any* salvo was in range) rather than the full `dt_days`, then split
/// among those salvos in proportion to each one's individual exposure.
fn intercept_with_point_defense(state: &State, dt_days: f64, working: &mut [(Id, MissileSalvo, Point2, Point2)]) {
    let mut defender_segments: HashMap<Id, Vec<(usize, f64, f64)>> = HashMap::new();
    for ship_id in sorted_keys(&state.ships) {
        let ship = &state.ships[&ship_id];
        let Some(design) = state.designs.get(&ship.design_id) else { continue };
        if design.pd_damage_per_day <= 0.0 || !ship.power_policy.weapons_online {
            continue;
        }
        for (idx, (_, salvo, p0, p1)) in working.iter().enumerate() {
            if ship.system_id != salvo.system_id || ship.faction_id != salvo.defender_faction_id {
                continue;
            }
            if let Some((t0, t1)) = segment_circle_overlap(*p0, *p1, ship.position, design.pd_range_mkm) {
                defender_segments.entry(ship_id).or_default().push((idx, t0, t1));
            }
        }
    }

    let mut intercept_by_index: HashMap<usize, f64> = HashMap::new();
    for (ship_id, segments) in &defender_segments {
        let sum_exposure: f64 = segments.iter().map(|(_, t0, t1)| t1 - t0).sum();
        if sum_exposure <= 0.0 {
            continue;
        }
        let ship = &state.ships[ship_id];
        let design = &state.designs[&ship.design_id];
        let crew_mult = 1.0 + ship.crew_grade_bonus();
        let union_u = union_length(segments.iter().map(|(_, t0, t1)| (*t0, *t1)).collect());
        let budget = design.pd_damage_per_day * dt_days * crew_mult * ship.maintenance_condition * union_u;
        for &(idx, t0, t1) in segments {
            let exposure = t1 - t0;
            *intercept_by_index.entry(idx).or_insert(0.0) += budget * (exposure / sum_exposure);
        }
    }

    for (idx, total_intercept) in intercept_by_index {
        let salvo = &mut working[idx].1;
        salvo.remaining_damage = (salvo.remaining_damage - total_intercept).max(0.0);
    }
}

fn is_boarding_eligible(target_ship: &crate::types::Ship, target_design: &ShipDesign, config: &EngineConfig) -> bool {
    config.boarding.enabled
        && target_ship.hp / target_design.max_hp.max(1.0) <= config.boarding.target_hp_fraction
        && (!config.boarding.require_shields_down || target_ship.shields <= 1e-9)
}

fn select_beam_target(state: &State, attacker_id: Id, config: &EngineConfig) -> Option<Id> {
    let attacker = &state.ships[&attacker_id];
    let design = state.designs.get(&attacker.design_id)?;
    if let Some(order) = state.ship_orders.get(&attacker_id).and_then(|o| o.queue.front()) {
        if let Order::AttackShip { target_id, .. } = order {
            if let Some(target) = state.ships.get(target_id) {
                if target.system_id == attacker.system_id {
                    let dist = attacker.position.distance_to(target.position);
                    if dist <= design.weapon_range_mkm {
                        if let Some(target_design) = state.designs.get(&target.design_id) {
                            if !is_boarding_eligible(target, target_design, config) {
                                return Some(*target_id);
                            }
                        }
                    }
                }
            }
        }
    }
    let mut best: Option<(Id, f64)> = None;
    for ship_id in sorted_keys(&state.ships) {
        let target = &state.ships[&ship_id];
        if target.faction_id == attacker.faction_id || target.system_id != attacker.system_id {
            continue;
        }
        let is_hostile = state.factions.get(&attacker.faction_id)
            .is_some_and(|f| f.diplomatic_status_with(target.faction_id) == crate::types::DiplomaticStatus::Hostile);
        let is_detected = state.factions.get(&attacker.faction_id).is_some_and(|f| f.contacts.contains_key(&ship_id));
        if !is_hostile && !is_detected {
            continue;
        }
        let dist = attacker.position.distance_to(target.position);
        if dist > design.weapon_range_mkm {
            continue;
        }
        if best.as_ref().is_none_or(|(_, d)| dist < *d) {
            best = Some((ship_id, dist));
        }
    }
    best.map(|(id, _)| id)
}

fn beam_hit_chance(
    cfg: &crate::types::BeamHitChanceConfig,
    dist: f64,
    range: f64,
    sensor_mkm: f64,
    ecm: f64,
    eccm: f64,
    signature: f64,
    transverse_velocity: f64,
    crew_bonus: f64,
) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    let range_factor = 1.0 - cfg.range_penalty_at_max * (dist / range).powi(2);
    let tracking_angle = cfg.tracking_ref_ang_per_day
        * (sensor_mkm.max(cfg.tracking_min_sensor_range_mkm) / cfg.tracking_reference_sensor_range_mkm)
        * (1.0 + eccm) / (1.0 + ecm)
        * signature.max(0.01).powf(cfg.signature_exponent);
    let relative_angular = if dist > 1e-9 { transverse_velocity.abs() / dist } else { 0.0 };
    let tracking_factor = if tracking_angle > 1e-9 {
        1.0 / (1.0 + (relative_angular / tracking_angle).powi(2))
    } else {
        0.0
    };
    (cfg.base * range_factor * tracking_factor * (1.0 + crew_bonus)).clamp(cfg.min, 1.0)
}

fn resolve_beam_fire(state: &State, _content: &Content, config: &EngineConfig, dt_days: f64, book: &mut DamageBook) {
    for attacker_id in sorted_keys(&state.ships) {
        let attacker = &state.ships[&attacker_id];
        let Some(design) = state.designs.get(&attacker.design_id) else { continue };
        if design.weapon_damage <= 0.0 || !attacker.power_policy.weapons_online {
            continue;
        }
        let Some(target_id) = select_beam_target(state, attacker_id, config) else { continue };
        let target = &state.ships[&target_id];
        let Some(target_design) = state.designs.get(&target.design_id) else { continue };
        let dist = attacker.position.distance_to(target.position);
        let transverse = target.velocity.x.hypot(target.velocity.y);
        let hit = beam_hit_chance(
            &config.beam_hit_chance,
            dist,
            design.weapon_range_mkm,
            design.sensor_range_mkm,
            target_design.ecm,
            design.eccm,
            target_design.signature_multiplier,
            transverse,
            attacker.crew_grade_bonus(),
        );
        let mult = weapon_multiplier(attacker.heat_state, config) * attacker.maintenance_condition;
        let damage = design.weapon_damage * mult * dt_days * hit;
        book.credit(target_id, attacker_id, damage);
    }
}

fn resolve_colony_batteries(state: &State, content: &Content, config: &EngineConfig, dt_days: f64, book: &mut DamageBook) {
    for colony_id in sorted_keys(&state.colonies) {
        let colony = &state.colonies[&colony_id];
        let mut total_damage = 0.0;
        let mut range = 0.0_f64;
        let mut sensor = 0.0_f64;
        let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
        inst_ids.sort();
        for inst_id in inst_ids {
            let count = colony.installations[inst_id];
            let Some(def) = content.installations.get(inst_id) else { continue };
            if def.weapon_damage <= 0.0 || count == 0 {
                continue;
            }
            total_damage += def.weapon_damage * f64::from(count);
            range = range.max(def.weapon_range_mkm);
            sensor = sensor.max(def.sensor_range_mkm);
        }
        if total_damage <= 0.0 {
            continue;
        }
        let Some(body) = state.bodies.get(&colony.body_id) else { continue };
        let mut best: Option<(Id, f64)> = None;
        for ship_id in sorted_keys(&state.ships) {
            let target = &state.ships[&ship_id];
            if target.faction_id == colony.faction_id || target.system_id != body.system_id {
                continue;
            }
            let is_hostile = state.factions.get(&colony.faction_id)
                .is_some_and(|f| f.diplomatic_status_with(target.faction_id) == crate::types::DiplomaticStatus::Hostile);
            if !is_hostile {
                continue;
            }
            let dist = body.position.distance_to(target.position);
            if dist > range {
                continue;
            }
            if best.as_ref().is_none_or(|(_, d)| dist < *d) {
                best = Some((ship_id, dist));
            }
        }
        let Some((target_id, dist)) = best else { continue };
        let target = &state.ships[&target_id];
        let Some(target_design) = state.designs.get(&target.design_id) else { continue };
        let transverse = target.velocity.x.hypot(target.velocity.y);
        let hit = beam_hit_chance(&config.beam_hit_chance, dist, range, sensor, target_design.ecm, 0.0, target_design.signature_multiplier, transverse, 0.0);
        book.credit(target_id, colony.id, total_damage * dt_days * hit);
    }
}

fn launch_missiles(state: &mut State, content: &Content, config: &EngineConfig, events: &mut Vec<SimEvent>) {
    let _ = content;
    for attacker_id in sorted_keys(&state.ships) {
        let attacker = state.ships[&attacker_id].clone();
        if attacker.missile_cooldown_days > 1e-9 {
            continue;
        }
        let Some(design) = state.designs.get(&attacker.design_id).cloned() else { continue };
        if design.missile_launchers == 0 || design.missile_damage <= 0.0 || !attacker.power_policy.weapons_online {
            continue;
        }
        let Some(target_id) = select_beam_target(state, attacker_id, config) else { continue };
        let target = state.ships[&target_id].clone();
        let dist = attacker.position.distance_to(target.position);
        if design.missile_speed_km_s <= 0.0 {
            continue;
        }
        let fired_launchers = if attacker.missile_ammo >= 0.0 {
            (f64::from(design.missile_launchers)).min(attacker.missile_ammo).floor().max(0.0)
        } else {
            f64::from(design.missile_launchers)
        };
        if fired_launchers <= 0.0 {
            continue;
        }
        let scale = fired_launchers / f64::from(design.missile_launchers).max(1.0);
        let salvo_id = state.ids.next();
        let eta = (dist / design.missile_speed_km_s).max(0.01);
        state.missile_salvos.insert(
            salvo_id,
            MissileSalvo {
                id: salvo_id,
                attacker_ship_id: attacker_id,
                target_ship_id: target_id,
                attacker_faction_id: attacker.faction_id,
                defender_faction_id: target.faction_id,
                system_id: attacker.system_id,
                launch_pos: attacker.position,
                target_snapshot_pos: target.position,
                total_eta_days: eta,
                remaining_eta_days: eta,
                initial_damage: design.missile_damage * scale,
                remaining_damage: design.missile_damage * scale,
            },
        );
        let ship = state.ships.get_mut(&attacker_id).unwrap();
        if ship.missile_ammo >= 0.0 {
            ship.missile_ammo -= fired_launchers;
        }
        ship.missile_cooldown_days = design.missile_reload_days * (1.0 - attacker.crew_grade_bonus());
        events.push(SimEvent {
            seq: 0,
            day: state.date.day,
            hour: state.date.hour_of_day,
            level: EventLevel::Info,
            category: EventCategory::Combat,
            message: format!("ship {attacker_id} launched a missile salvo at ship {target_id}"),
            context: EventContext { ship_id: Some(attacker_id), system_id: Some(attacker.system_id), ..Default::default() },
        });
    }
}

fn wreck_minerals_for(ship: &crate::types::Ship, design: &ShipDesign, content: &Content, config: &EngineConfig) -> HashMap<String, f64> {
    let mut minerals: HashMap<String, f64> = HashMap::new();
    for (mineral, amount) in &ship.cargo {
        *minerals.entry(mineral.clone()).or_insert(0.0) += amount * config.wrecks.cargo_salvage_fraction;
    }
    let table = &content.build_costs_per_ton.mineral_cost_per_ton;
    let duranium_rate = table.get("Duranium").copied().unwrap_or(1.0);
    let neutronium_rate = table.get("Neutronium").copied().unwrap_or(0.1);
    let hull_value = design.mass_tons * config.wrecks.hull_salvage_fraction;
    *minerals.entry("Duranium".to_string()).or_insert(0.0) += hull_value * duranium_rate;
    *minerals.entry("Neutronium".to_string()).or_insert(0.0) += hull_value * neutronium_rate;
    minerals
}

fn apply_damage(state: &mut State, content: &Content, config: &EngineConfig, book: &mut DamageBook, events: &mut Vec<SimEvent>) {
    let mut target_ids: Vec<Id> = book.incoming.keys().copied().collect();
    target_ids.sort_unstable();
    let mut destroyed = Vec::new();

    for target_id in target_ids {
        let Some(ship) = state.ships.get_mut(&target_id) else { continue };
        let mut damage = book.incoming[&target_id];
        let shield_absorbed = damage.min(ship.shields);
        ship.shields -= shield_absorbed;
        damage -= shield_absorbed;
        ship.hp -= damage;

        let mut attacker_ids = book.attackers.get(&target_id).cloned().unwrap_or_default();
        attacker_ids.sort_unstable();
        attacker_ids.dedup();
        events.push(SimEvent {
            seq: 0,
            day: state.date.day,
            hour: state.date.hour_of_day,
            level: EventLevel::Info,
            category: EventCategory::Combat,
            message: format!("ship {target_id} took {:.1} damage from {:?}", book.incoming[&target_id], attacker_ids),
            context: EventContext { ship_id: Some(target_id), ..Default::default() },
        });

        if ship.hp <= 0.0 {
            destroyed.push(target_id);
        }
    }

    for target_id in destroyed {
        let Some(ship) = state.ships.get(&target_id).cloned() else { continue };
        let Some(design) = state.designs.get(&ship.design_id).cloned() else {
            state.ships.remove(&target_id);
            purge_ship_references(state, target_id, ship.system_id);
            continue;
        };
        if config.wrecks.enabled {
            let wreck_id = state.ids.next();
            let minerals = wreck_minerals_for(&ship, &design, content, config);
            state.wrecks.insert(
                wreck_id,
                Wreck {
                    id: wreck_id,
                    system_id: ship.system_id,
                    position: ship.position,
                    minerals,
                    origin_ship_id: Some(ship.id),
                    origin_faction_id: Some(ship.faction_id),
                    origin_design_id: Some(ship.design_id),
                    created_day: state.date.day,
                    kind: WreckKind::ShipDebris,
                },
            );
        }
        events.push(SimEvent {
            seq: 0,
            day: state.date.day,
            hour: state.date.hour_of_day,
            level: EventLevel::Warn,
            category: EventCategory::Combat,
            message: format!("ship {target_id} ({}) destroyed", ship.name),
            context: EventContext { ship_id: Some(target_id), system_id: Some(ship.system_id), faction_id: Some(ship.faction_id), ..Default::default() },
        });
        state.ships.remove(&target_id);
        purge_ship_references(state, target_id, ship.system_id);
    }
}

fn resolve_boarding(state: &mut State, _content: &Content, config: &EngineConfig, events: &mut Vec<SimEvent>) {
    if !config.boarding.enabled {
        return;
    }
    let today = state.date.day;
    let mut candidates: Vec<(Id, Id)> = Vec::new();
    for attacker_id in sorted_keys(&state.ships) {
        let attacker = &state.ships[&attacker_id];
        if attacker.troops < config.boarding.min_attacker_troops || attacker.boarding_cooldown_days > 1e-9 {
            continue;
        }
        let Some(order) = state.ship_orders.get(&attacker_id).and_then(|o| o.queue.front()) else { continue };
        let Order::AttackShip { target_id, .. } = order else { continue };
        let Some(target) = state.ships.get(target_id) else { continue };
        if target.system_id != attacker.system_id {
            continue;
        }
        let Some(target_design) = state.designs.get(&target.design_id) else { continue };
        if !is_boarding_eligible(target, target_design, config) {
            continue;
        }
        let dist = attacker.position.distance_to(target.position);
        if dist > config.boarding.range_mkm {
            continue;
        }
        candidates.push((attacker_id, *target_id));
    }

    // Strongest boarder per target: highest attacker troops, id as tiebreak.
    let mut per_target: HashMap<Id, Id> = HashMap::new();
    for &(attacker_id, target_id) in &candidates {
        let troops = state.ships[&attacker_id].troops;
        match per_target.get(&target_id) {
            Some(&existing) if state.ships[&existing].troops >= troops => {}
            _ => {
                per_target.insert(target_id, attacker_id);
            }
        }
    }
    let mut target_ids: Vec<Id> = per_target.keys().copied().collect();
    target_ids.sort_unstable();

    for target_id in target_ids {
        let attacker_id = per_target[&target_id];
        let attacker_troops = state.ships[&attacker_id].troops;
        let attacker_crew = state.ships[&attacker_id].crew_grade_bonus();
        let target_troops = state.ships[&target_id].troops;
        let target_crew = state.ships[&target_id].crew_grade_bonus();
        let target_max_hp = state.designs.get(&state.ships[&target_id].design_id).map_or(1.0, |d| d.max_hp);

        let a_eff = attacker_troops * (1.0 + attacker_crew);
        let d_eff = (target_troops + config.boarding.defense_hp_factor * target_max_hp) * (1.0 + target_crew);
        let chance = if a_eff + d_eff > 0.0 { a_eff / (a_eff + d_eff) } else { 0.0 };

        let mut rng = HashRng::derive(
            (today as u64) ^ attacker_id.0.wrapping_mul(0x9E37_79B9) ^ target_id.0.wrapping_mul(0x85EB_CA6B),
            0xB0A2_D1E5,
        );
        let roll = rng.next_u01();
        let success = roll < chance;

        {
            let attacker = state.ships.get_mut(&attacker_id).unwrap();
            attacker.troops = (attacker.troops * (1.0 - config.boarding.attacker_casualty_fraction)).max(0.0);
            attacker.boarding_cooldown_days = attacker.boarding_cooldown_days.max(1.0);
        }
        if success {
            let target_faction_was = state.ships[&target_id].faction_id;
            let attacker_faction = state.ships[&attacker_id].faction_id;
            let target_system = state.ships[&target_id].system_id;
            {
                let target = state.ships.get_mut(&target_id).unwrap();
                target.troops = (target.troops * (1.0 - config.boarding.defender_casualty_fraction)).max(0.0);
                target.faction_id = attacker_faction;
            }
            purge_ship_references(state, target_id, target_system);
            state.ship_orders.insert(target_id, crate::types::ShipOrders::default());
            if let Some(sys) = state.systems.get_mut(&target_system) {
                if !sys.ships.contains(&target_id) {
                    sys.ships.push(target_id);
                }
            }
            if let Some(faction) = state.factions.get_mut(&attacker_faction) {
                faction.diplomacy.insert(target_faction_was, crate::types::DiplomaticStatus::Hostile);
            }
            if let Some(faction) = state.factions.get_mut(&target_faction_was) {
                faction.diplomacy.insert(attacker_faction, crate::types::DiplomaticStatus::Hostile);
            }
            events.push(SimEvent {
                seq: 0,
                day: today,
                hour: state.date.hour_of_day,
                level: EventLevel::Warn,
                category: EventCategory::Boarding,
                message: format!("ship {target_id} captured by faction {attacker_faction}"),
                context: EventContext { ship_id: Some(target_id), faction_id: Some(attacker_faction), ..Default::default() },
            });
        } else {
            let target = state.ships.get_mut(&target_id).unwrap();
            target.troops = (target.troops * (1.0 - config.boarding.defender_casualty_fraction)).max(0.0);
            if config.boarding.log_failures {
                events.push(SimEvent {
                    seq: 0,
                    day: today,
                    hour: state.date.hour_of_day,
                    level: EventLevel::Info,
                    category: EventCategory::Boarding,
                    message: format!("boarding of ship {target_id} by ship {attacker_id} failed"),
                    context: EventContext { ship_id: Some(target_id), ..Default::default() },
                });
            }
        }
    }
}

fn apply_crew_experience(state: &mut State, config: &EngineConfig, book: &DamageBook) {
    if !config.crew_experience.enabled {
        return;
    }
    let mut ship_ids: Vec<Id> = book.crew_intensity.keys().copied().collect();
    ship_ids.sort_unstable();
    for ship_id in ship_ids {
        let intensity = book.crew_intensity[&ship_id];
        let Some(ship) = state.ships.get_mut(&ship_id) else { continue };
        ship.crew_grade_points = (ship.crew_grade_points + intensity * config.crew_experience.combat_grade_points_per_damage)
            .clamp(0.0, config.crew_experience.grade_points_cap);
    }
}
