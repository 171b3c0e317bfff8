//! Galaxy generation and dynamic point-of-interest spawning (component F, §4.I).
//! `generate_galaxy` is a pure `(GalaxyConfig, &Content) -> State`: every random
//! draw flows through [`crate::rng::HashRng`] seeded from `config.seed`, so the
//! same config always produces byte-identical output regardless of platform.

use crate::id::Id;
use crate::orbit::OrbitalElements;
use crate::rng::{u01_from_u64, splitmix, HashRng};
use crate::sorted::sorted_keys;
use crate::spatial::Point2;
use crate::types::{
    Anomaly, AnomalyKind, Body, BodyKind, Colony, Content, ControlMode, EngineConfig,
    EventCategory, EventContext, EventLevel, Faction, JumpPoint, MineralId, Region, SimEvent,
    State, StarSystem, WreckKind,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalaxyShape {
    Disc,
    Spiral,
    Cluster,
    Filaments,
    Halo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStyle {
    Random,
    PoissonDisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpNetworkStyle {
    NearestNeighbors,
    PlanarProximity,
}

#[derive(Debug, Clone)]
pub struct GalaxyConfig {
    pub seed: u64,
    pub num_systems: u32,
    pub galaxy_shape: GalaxyShape,
    pub placement_style: PlacementStyle,
    pub placement_quality: u32,
    pub jump_network_style: JumpNetworkStyle,
    pub jump_density: f64,
    pub enable_regions: bool,
    pub num_regions: u32,
    pub enable_independents: bool,
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        GalaxyConfig {
            seed: 1,
            num_systems: 20,
            galaxy_shape: GalaxyShape::Disc,
            placement_style: PlacementStyle::PoissonDisk,
            placement_quality: 24,
            jump_network_style: JumpNetworkStyle::PlanarProximity,
            jump_density: 1.3,
            enable_regions: true,
            num_regions: 4,
            enable_independents: false,
        }
    }
}

const GALAXY_RADIUS_MKM: f64 = 5000.0;
const MIN_SYSTEM_SEPARATION_MKM: f64 = 180.0;

const SYSTEM_NAME_BANK: &[&str] = &[
    "Sol", "Alpha Centauri", "Barnard's Star", "Wolf", "Lalande", "Sirius", "Procyon", "Tau Ceti",
    "Epsilon Eridani", "Altair", "Vega", "Arcturus", "Capella", "Rigel", "Betelgeuse", "Antares",
    "Fomalhaut", "Deneb", "Pollux", "Castor", "Achernar", "Canopus", "Spica", "Regulus", "Aldebaran",
    "Hadar", "Mimosa", "Shaula", "Bellatrix", "Elnath", "Miaplacidus", "Alnilam", "Alnitak", "Mintaka",
    "Polaris", "Kochab", "Thuban", "Gacrux", "Acrux", "Mira",
];
const BODY_SUFFIXES: &[&str] = &["I", "II", "III", "IV", "V", "VI", "VII", "VIII"];
const THEME_TAGS: &[&str] = &["Frontier", "Core", "Borderlands", "Deep Space", "Rimward"];

fn name_for_system(index: u32) -> String {
    SYSTEM_NAME_BANK
        .get(index as usize)
        .map_or_else(|| format!("System {index}"), |n| (*n).to_string())
}

fn name_for_body(system_name: &str, index: usize) -> String {
    let suffix = BODY_SUFFIXES.get(index).copied().unwrap_or("X");
    format!("{system_name} {suffix}")
}

/// Draws a point inside `[-radius, radius]^2` restricted to the configured
/// shape, via rejection sampling against the shape's density function.
fn draw_shaped_point(rng: &mut HashRng, shape: GalaxyShape, radius: f64) -> Point2 {
    for _ in 0..64 {
        let x = rng.range(-radius, radius);
        let y = rng.range(-radius, radius);
        let r = (x * x + y * y).sqrt() / radius;
        if r > 1.0 {
            continue;
        }
        let theta = y.atan2(x);
        let accept = match shape {
            GalaxyShape::Disc => true,
            GalaxyShape::Halo => rng.next_u01() < r,
            GalaxyShape::Cluster => rng.next_u01() < (1.0 - r).powi(2),
            GalaxyShape::Spiral => {
                let arm_count = 2.0;
                let twist = 3.0;
                let arm_phase = (theta - twist * r * std::f64::consts::TAU).rem_euclid(std::f64::consts::TAU / arm_count);
                let arm_width = 0.5;
                rng.next_u01() < (1.0 - (arm_phase / (std::f64::consts::TAU / arm_count) - 0.5).abs() * 2.0 / arm_width).max(0.05)
            }
            GalaxyShape::Filaments => {
                let filament_count = 5.0;
                let phase = (theta * filament_count).rem_euclid(std::f64::consts::TAU);
                let dist_from_filament = (phase - std::f64::consts::PI).abs() / std::f64::consts::PI;
                rng.next_u01() < (1.0 - dist_from_filament).max(0.05)
            }
        };
        if accept {
            return Point2::new(x, y);
        }
    }
    Point2::new(0.0, 0.0)
}

/// Poisson-disk-like placement: rejection sampling at up to `quality` tries
/// per accepted point, rejecting candidates closer than `min_sep` to any
/// already-placed point.
fn place_systems(
    rng: &mut HashRng,
    count: u32,
    shape: GalaxyShape,
    style: PlacementStyle,
    quality: u32,
) -> Vec<Point2> {
    let mut placed: Vec<Point2> = Vec::new();
    for _ in 0..count {
        let tries = if style == PlacementStyle::PoissonDisk { quality.max(1) } else { 1 };
        let mut best: Option<Point2> = None;
        let mut best_min_dist = -1.0_f64;
        for _ in 0..tries {
            let candidate = draw_shaped_point(rng, shape, GALAXY_RADIUS_MKM);
            let min_dist = placed
                .iter()
                .map(|p| p.distance_to(candidate))
                .fold(f64::INFINITY, f64::min);
            if style != PlacementStyle::PoissonDisk {
                best = Some(candidate);
                break;
            }
            if min_dist > best_min_dist {
                best_min_dist = min_dist;
                best = Some(candidate);
            }
            if min_dist >= MIN_SYSTEM_SEPARATION_MKM {
                break;
            }
        }
        placed.push(best.unwrap_or_else(|| draw_shaped_point(rng, shape, GALAXY_RADIUS_MKM)));
    }
    placed
}

/// Builds a connected jump-point graph over `positions` (indices 0..n).
/// `PlanarProximity` builds a minimum-spanning tree first (guaranteeing
/// connectivity with no edge crossings among MST edges, a Delaunay-adjacent
/// planarity guarantee this engine approximates rather than computing a full
/// triangulation for), then adds nearest-neighbor edges up to `jump_density *
/// n` total, skipping any candidate that would cross an already-accepted
/// edge. `NearestNeighbors` skips the crossing check.
fn build_jump_edges(
    positions: &[Point2],
    style: JumpNetworkStyle,
    jump_density: f64,
) -> Vec<(usize, usize)> {
    let n = positions.len();
    if n < 2 {
        return Vec::new();
    }

    fn segments_cross(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> bool {
        fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        }
        let d1 = cross(b0, b1, a0);
        let d2 = cross(b0, b1, a1);
        let d3 = cross(a0, a1, b0);
        let d4 = cross(a0, a1, b1);
        ((d1 > 0.0) != (d2 > 0.0)) && ((d3 > 0.0) != (d4 > 0.0))
    }

    // Prim's MST for guaranteed connectivity.
    let mut in_tree = vec![false; n];
    let mut best_cost = vec![f64::INFINITY; n];
    let mut best_from = vec![usize::MAX; n];
    let mut edges: Vec<(usize, usize)> = Vec::new();
    best_cost[0] = 0.0;
    for _ in 0..n {
        let mut u = usize::MAX;
        let mut u_cost = f64::INFINITY;
        for i in 0..n {
            if !in_tree[i] && best_cost[i] < u_cost {
                u_cost = best_cost[i];
                u = i;
            }
        }
        if u == usize::MAX {
            break;
        }
        in_tree[u] = true;
        if best_from[u] != usize::MAX {
            edges.push((best_from[u], u));
        }
        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let d = positions[u].distance_to(positions[v]);
            if d < best_cost[v] {
                best_cost[v] = d;
                best_from[v] = u;
            }
        }
    }

    let target_edges = ((n as f64) * jump_density).round().max(edges.len() as f64) as usize;
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if edges.contains(&(i, j)) || edges.contains(&(j, i)) {
                continue;
            }
            candidates.push((positions[i].distance_to(positions[j]), i, j));
        }
    }
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    for (_, i, j) in candidates {
        if edges.len() >= target_edges {
            break;
        }
        if style == JumpNetworkStyle::PlanarProximity {
            let crosses = edges.iter().any(|&(a, b)| {
                a != i && a != j && b != i && b != j
                    && segments_cross(positions[i], positions[j], positions[a], positions[b])
            });
            if crosses {
                continue;
            }
        }
        edges.push((i, j));
    }

    edges
}

fn pick_mineral_richness(region: Option<&Region>) -> (f64, f64) {
    region.map_or((1.0, 1.0), |r| (r.mineral_richness_multiplier, r.volatile_richness_multiplier))
}

fn generate_bodies(
    state: &mut State,
    rng: &mut HashRng,
    system_id: Id,
    system_name: &str,
    region: Option<&Region>,
    minerals: &[MineralId],
) -> Vec<Id> {
    let mut body_ids = Vec::new();
    let (mineral_mult, volatile_mult) = pick_mineral_richness(region);

    let star_id = state.ids.next();
    state.bodies.insert(
        star_id,
        Body {
            id: star_id,
            system_id,
            name: system_name.to_string(),
            kind: BodyKind::Star,
            parent_body_id: None,
            elements: OrbitalElements {
                semi_major_axis_mkm: 0.0,
                eccentricity: 0.0,
                period_days: 0.0,
                argument_of_periapsis_rad: 0.0,
                mean_anomaly_phase_rad: 0.0,
            },
            position: Point2::new(0.0, 0.0),
            mass_earth: rng.range(50_000.0, 400_000.0),
            radius_km: rng.range(400_000.0, 900_000.0),
            mineral_deposits: HashMap::new(),
            surface_temp_k: rng.range(4000.0, 8000.0),
            atmosphere_atm: 0.0,
            terraforming: None,
        },
    );
    body_ids.push(star_id);

    let num_planets = rng.range_int(2, 8);
    let mut semi_major = rng.range(40.0, 90.0);
    for i in 0..num_planets {
        semi_major += rng.range(40.0, 220.0);
        let kind = if rng.next_u01() < 0.25 { BodyKind::GasGiant } else { BodyKind::Planet };
        let mass = if kind == BodyKind::GasGiant { rng.range(20.0, 300.0) } else { rng.range(0.05, 3.0) };
        let temp = (288.0 * (150.0 / semi_major).sqrt()).clamp(30.0, 700.0);
        let mut deposits = HashMap::new();
        if !minerals.is_empty() {
            for mineral in minerals {
                let base = rng.range(0.0, 40_000.0);
                let richness = if mineral == "Neutronium" { volatile_mult } else { mineral_mult };
                let amount = base * richness;
                if amount > 1.0 {
                    deposits.insert(mineral.clone(), amount);
                }
            }
        }
        let body_id = state.ids.next();
        state.bodies.insert(
            body_id,
            Body {
                id: body_id,
                system_id,
                name: name_for_body(system_name, i as usize),
                kind,
                parent_body_id: Some(star_id),
                elements: OrbitalElements {
                    semi_major_axis_mkm: semi_major,
                    eccentricity: rng.range(0.0, 0.08),
                    period_days: semi_major.powf(1.5) * 5.0,
                    argument_of_periapsis_rad: rng.range(0.0, std::f64::consts::TAU),
                    mean_anomaly_phase_rad: rng.range(0.0, std::f64::consts::TAU),
                },
                position: Point2::new(semi_major, 0.0),
                mass_earth: mass,
                radius_km: if kind == BodyKind::GasGiant { rng.range(20_000.0, 70_000.0) } else { rng.range(2000.0, 8000.0) },
                mineral_deposits: deposits,
                surface_temp_k: temp,
                atmosphere_atm: if kind == BodyKind::GasGiant { 0.0 } else { rng.range(0.0, 1.5) },
                terraforming: None,
            },
        );
        body_ids.push(body_id);

        if kind != BodyKind::GasGiant && rng.next_u01() < 0.3 {
            let moon_id = state.ids.next();
            let mut moon_deposits = HashMap::new();
            if !minerals.is_empty() {
                for mineral in minerals {
                    let amount = rng.range(0.0, 8000.0) * mineral_mult;
                    if amount > 1.0 {
                        moon_deposits.insert(mineral.clone(), amount);
                    }
                }
            }
            state.bodies.insert(
                moon_id,
                Body {
                    id: moon_id,
                    system_id,
                    name: format!("{} Moon", name_for_body(system_name, i as usize)),
                    kind: BodyKind::Moon,
                    parent_body_id: Some(body_id),
                    elements: OrbitalElements {
                        semi_major_axis_mkm: rng.range(0.5, 3.0),
                        eccentricity: 0.0,
                        period_days: rng.range(3.0, 30.0),
                        argument_of_periapsis_rad: 0.0,
                        mean_anomaly_phase_rad: rng.range(0.0, std::f64::consts::TAU),
                    },
                    position: Point2::new(semi_major, 0.0),
                    mass_earth: mass * 0.02,
                    radius_km: rng.range(500.0, 2000.0),
                    mineral_deposits: moon_deposits,
                    surface_temp_k: temp,
                    atmosphere_atm: 0.0,
                    terraforming: None,
                },
            );
            body_ids.push(moon_id);
        }
    }

    let num_asteroids = rng.range_int(0, 5);
    for _ in 0..num_asteroids {
        let body_id = state.ids.next();
        let mut deposits = HashMap::new();
        for mineral in minerals {
            let amount = rng.range(1000.0, 20_000.0) * mineral_mult;
            deposits.insert(mineral.clone(), amount);
        }
        let sma = rng.range(200.0, 900.0);
        state.bodies.insert(
            body_id,
            Body {
                id: body_id,
                system_id,
                name: format!("{system_name} Belt {}", body_ids.len()),
                kind: BodyKind::Asteroid,
                parent_body_id: Some(star_id),
                elements: OrbitalElements {
                    semi_major_axis_mkm: sma,
                    eccentricity: rng.range(0.0, 0.3),
                    period_days: sma.powf(1.5) * 5.0,
                    argument_of_periapsis_rad: rng.range(0.0, std::f64::consts::TAU),
                    mean_anomaly_phase_rad: rng.range(0.0, std::f64::consts::TAU),
                },
                position: Point2::new(sma, 0.0),
                mass_earth: 0.0001,
                radius_km: rng.range(1.0, 50.0),
                mineral_deposits: deposits,
                surface_temp_k: 100.0,
                atmosphere_atm: 0.0,
                terraforming: None,
            },
        );
        body_ids.push(body_id);
    }

    body_ids
}

/// Generates a galaxy deterministically from `config`. Every subsystem draws
/// from the single seeded stream via purpose tags so reordering generation
/// steps would change output but a repeated call with the same config never
/// does.
#[must_use]
pub fn generate_galaxy(config: &GalaxyConfig, content: &Content) -> State {
    let mut state = State::new(config.seed);
    let mut rng = HashRng::derive(config.seed, 0x6A61_6C61);

    if config.enable_regions && config.num_regions > 0 {
        for i in 0..config.num_regions {
            let region_id = state.ids.next();
            state.regions.insert(
                region_id,
                Region {
                    id: region_id,
                    name: format!("{} Region", THEME_TAGS.get(i as usize % THEME_TAGS.len()).unwrap()),
                    ruins_density: rng.next_u01(),
                    pirate_risk: rng.next_u01(),
                    pirate_suppression: 0.0,
                    salvage_richness_multiplier: rng.range(0.5, 1.5),
                    mineral_richness_multiplier: rng.range(0.5, 2.0),
                    volatile_richness_multiplier: rng.range(0.5, 2.0),
                    theme_tag: THEME_TAGS.get(i as usize % THEME_TAGS.len()).unwrap().to_string(),
                },
            );
        }
    }
    let region_ids = sorted_keys(&state.regions);

    let positions = place_systems(&mut rng, config.num_systems, config.galaxy_shape, config.placement_style, config.placement_quality);
    let minerals: Vec<MineralId> = content.minerals.iter().map(|m| m.id.clone()).collect();

    let mut system_ids = Vec::with_capacity(positions.len());
    for (i, &pos) in positions.iter().enumerate() {
        let region_id = if region_ids.is_empty() {
            None
        } else {
            Some(region_ids[(i * 2654435761 + config.seed as usize) % region_ids.len()])
        };
        let system_id = state.ids.next();
        let name = name_for_system(i as u32);
        let region = region_id.and_then(|r| state.regions.get(&r));
        let body_ids = generate_bodies(&mut state, &mut rng, system_id, &name, region, &minerals);
        state.systems.insert(
            system_id,
            StarSystem {
                id: system_id,
                name,
                galaxy_position: pos,
                bodies: body_ids,
                jump_points: Vec::new(),
                ships: Vec::new(),
                region_id,
                nebula_density: rng.next_u01() * 0.6,
                storm_interval_days: if rng.next_u01() < 0.1 { Some(rng.range_int(20, 120) as u32) } else { None },
            },
        );
        system_ids.push(system_id);
    }

    let edges = build_jump_edges(&positions, config.jump_network_style, config.jump_density);
    for (a, b) in edges {
        let sys_a = system_ids[a];
        let sys_b = system_ids[b];
        let jp_a = state.ids.next();
        let jp_b = state.ids.next();
        let pos_a = Point2::new(
            (positions[b].x - positions[a].x).signum() * 30.0 + positions[a].x * 0.0,
            0.0,
        );
        let _ = pos_a;
        let offset = 30.0;
        let dir = Point2::new(positions[b].x - positions[a].x, positions[b].y - positions[a].y);
        let dist = (dir.x * dir.x + dir.y * dir.y).sqrt().max(1.0);
        let unit = Point2::new(dir.x / dist, dir.y / dist);
        state.jump_points.insert(
            jp_a,
            JumpPoint { id: jp_a, system_id: sys_a, position: Point2::new(unit.x * offset, unit.y * offset), linked_jump_id: jp_b },
        );
        state.jump_points.insert(
            jp_b,
            JumpPoint { id: jp_b, system_id: sys_b, position: Point2::new(-unit.x * offset, -unit.y * offset), linked_jump_id: jp_a },
        );
        state.systems.get_mut(&sys_a).unwrap().jump_points.push(jp_a);
        state.systems.get_mut(&sys_b).unwrap().jump_points.push(jp_b);
    }

    state
}

/// Bootstraps a single starting faction into `state`, placing its home colony
/// at the first body of `home_system_id` and marking that system (and its
/// directly-linked neighbors' jump points) as discovered/surveyed.
pub fn place_starting_faction(state: &mut State, home_system_id: Id, name: &str, mode: ControlMode) -> Id {
    let faction_id = state.ids.next();
    let mut faction = Faction {
        id: faction_id,
        name: name.to_string(),
        control_mode: mode,
        known_techs: Vec::new(),
        research_queue: Vec::new(),
        active_research: None,
        research_progress_points: 0.0,
        unlocked_components: std::collections::HashSet::new(),
        unlocked_installations: std::collections::HashSet::new(),
        discovered_systems: std::collections::HashSet::new(),
        surveyed_jump_points: HashMap::new(),
        contacts: HashMap::new(),
        journal: Vec::new(),
        trait_multipliers: HashMap::new(),
        ship_design_targets: HashMap::new(),
        ship_profiles: Vec::new(),
        diplomacy: HashMap::new(),
        discovered_version: 1,
        surveyed_version: 1,
    };
    faction.discovered_systems.insert(home_system_id);
    if let Some(system) = state.systems.get(&home_system_id) {
        for jp in &system.jump_points {
            faction.surveyed_jump_points.insert(*jp, 1.0);
        }
        if let Some(&home_body) = system.bodies.iter().find(|b| {
            state.bodies.get(b).is_some_and(|body| matches!(body.kind, BodyKind::Planet))
        }) {
            let colony_id = state.ids.next();
            state.colonies.insert(
                colony_id,
                Colony {
                    id: colony_id,
                    body_id: home_body,
                    faction_id,
                    population_millions: 50.0,
                    minerals: HashMap::new(),
                    mineral_reserves: HashMap::new(),
                    installations: HashMap::new(),
                    installation_auto_targets: HashMap::new(),
                    construction_queue: Vec::new(),
                    shipyard_queue: Vec::new(),
                    troop_strength: 100.0,
                    troop_training_queue: 0.0,
                    ground_forces: 100.0,
                    conditions: Vec::new(),
                },
            );
        }
    }
    state.factions.insert(faction_id, faction);
    faction_id
}

fn anomaly_kind_weights(region: Option<&Region>, nebula_density: f64) -> [(AnomalyKind, f64); 6] {
    let ruins = region.map_or(0.2, |r| r.ruins_density);
    [
        (AnomalyKind::Ruins, 1.0 + 3.0 * ruins),
        (AnomalyKind::Distress, 1.0),
        (AnomalyKind::Phenomenon, 1.0 + nebula_density),
        (AnomalyKind::Distortion, 0.5 + nebula_density),
        (AnomalyKind::Xeno, 0.5 + ruins),
        (AnomalyKind::Signal, 1.0),
    ]
}

fn weighted_pick<T: Copy>(rng: &mut HashRng, items: &[(T, f64)]) -> T {
    let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return items[0].0;
    }
    let mut roll = rng.next_u01() * total;
    for &(item, weight) in items {
        roll -= weight.max(0.0);
        if roll <= 0.0 {
            return item;
        }
    }
    items[items.len() - 1].0
}

/// Runs the once-per-day dynamic-POI spawn pass (§4.I). Iterates systems in
/// sorted id order; each system's anomaly and cache rolls use the day and
/// system id folded into the shared PRNG stream via `splitmix`, so the same
/// `(day, system_id)` pair always produces the same roll regardless of how
/// many other systems were evaluated first.
pub fn tick_dynamic_poi(state: &mut State, config: &EngineConfig, events: &mut Vec<SimEvent>) {
    let cfg = &config.dynamic_poi;
    if !cfg.enabled {
        return;
    }
    let day = state.date.day;
    let hour = state.date.hour_of_day;

    let anomalies_total = state.anomalies.len() as u32;
    let caches_total = state.wrecks.values().filter(|w| w.kind == WreckKind::Cache).count() as u32;
    if anomalies_total >= cfg.max_anomalies_total && caches_total >= cfg.max_caches_total {
        return;
    }

    for system_id in sorted_keys(&state.systems) {
        let system = &state.systems[&system_id];
        let nebula = system.nebula_density;
        let region = system.region_id.and_then(|r| state.regions.get(&r));
        let ruins = region.map_or(0.2, |r| r.ruins_density);
        let pirate = region.map_or(0.2, |r| r.pirate_risk);
        let has_colony = state.colonies.values().any(|c| {
            state.bodies.get(&c.body_id).is_some_and(|b| b.system_id == system_id)
        });
        let existing_anomalies = state.anomalies.values().filter(|a| a.system_id == system_id).count() as f64;
        let existing_caches = state.wrecks.values().filter(|w| w.system_id == system_id && w.kind == WreckKind::Cache).count() as f64;

        let p_anomaly = cfg.anomaly_spawn_chance_per_system_per_day
            * (0.25 + 1.75 * ruins)
            * (0.90 + 0.25 * nebula)
            * (if has_colony { 0.35 } else { 1.0 })
            / (1.0 + 0.45 * existing_anomalies);
        let p_cache = cfg.cache_spawn_chance_per_system_per_day
            * (0.15 + 1.10 * pirate)
            * (0.80 + 0.20 * ruins)
            * (0.95 - 0.25 * nebula)
            / (1.0 + 0.55 * existing_caches)
            * (if has_colony { 0.60 } else { 1.0 });

        let anomaly_roll = u01_from_u64(splitmix(
            (day as u64) ^ system_id.0 ^ 0xA0A0_A0A0,
        ));
        let anomalies_per_system = state.anomalies.values().filter(|a| a.system_id == system_id).count() as u32;
        if anomalies_total < cfg.max_anomalies_total
            && anomalies_per_system < cfg.max_anomalies_per_system
            && anomaly_roll < p_anomaly
        {
            spawn_anomaly(state, system_id, region, nebula, day, events);
        }

        let cache_roll = u01_from_u64(splitmix(
            (day as u64) ^ system_id.0 ^ 0xCAC0_CAC0,
        ));
        let caches_per_system = state.wrecks.values().filter(|w| w.system_id == system_id && w.kind == WreckKind::Cache).count() as u32;
        if caches_total < cfg.max_caches_total
            && caches_per_system < cfg.max_caches_per_system
            && cache_roll < p_cache
        {
            spawn_cache(state, system_id, region, day, hour, events);
        }
    }
}

fn spawn_anomaly(
    state: &mut State,
    system_id: Id,
    region: Option<&Region>,
    nebula_density: f64,
    day: i64,
    events: &mut Vec<SimEvent>,
) {
    let mut rng = HashRng::derive(state.seed ^ (day as u64), system_id.0 ^ 0xA0A0_A0A0);
    let weights = anomaly_kind_weights(region, nebula_density);
    let kind = weighted_pick(&mut rng, &weights);

    let candidate_jp = state
        .jump_points
        .values()
        .filter(|jp| jp.system_id == system_id)
        .map(|jp| jp.position)
        .next()
        .unwrap_or(Point2::new(0.0, 0.0));

    let mut best_pos = candidate_jp;
    let mut best_score = f64::NEG_INFINITY;
    let existing: Vec<Point2> = state.anomalies.values().filter(|a| a.system_id == system_id).map(|a| a.position).collect();
    for _ in 0..8 {
        let offset = Point2::new(rng.range(-400.0, 400.0), rng.range(-400.0, 400.0));
        let candidate = Point2::new(candidate_jp.x + offset.x, candidate_jp.y + offset.y);
        let min_dist = existing.iter().map(|p| p.distance_to(candidate)).fold(f64::INFINITY, f64::min);
        let density_match = rng.next_u01();
        let local_gradient = rng.next_u01();
        let score = 0.4 * density_match + 0.3 * local_gradient + 0.3 * min_dist.min(500.0) / 500.0;
        if score > best_score {
            best_score = score;
            best_pos = candidate;
        }
    }

    let (investigation_days, research_reward, hazard_chance, hazard_damage) = match kind {
        AnomalyKind::Ruins => (rng.range(4.0, 18.0), rng.range(50.0, 300.0), 0.05, rng.range(5.0, 20.0)),
        AnomalyKind::Distress => (rng.range(1.0, 6.0), rng.range(10.0, 80.0), 0.1, rng.range(5.0, 30.0)),
        AnomalyKind::Phenomenon => (rng.range(2.0, 10.0), rng.range(20.0, 120.0), 0.02, rng.range(2.0, 10.0)),
        AnomalyKind::Distortion => (rng.range(3.0, 12.0), rng.range(20.0, 150.0), 0.15, rng.range(10.0, 40.0)),
        AnomalyKind::Xeno => (rng.range(5.0, 18.0), rng.range(80.0, 400.0), 0.08, rng.range(10.0, 50.0)),
        AnomalyKind::Signal => (rng.range(1.0, 8.0), rng.range(10.0, 60.0), 0.01, rng.range(1.0, 5.0)),
    };

    let origin_anomaly_id = if rng.next_u01() < 0.15 {
        state.anomalies.values().filter(|a| a.system_id == system_id && !a.resolved).map(|a| a.id).min()
    } else {
        None
    };
    let lead_depth = origin_anomaly_id
        .and_then(|id| state.anomalies.get(&id))
        .map_or(0, |a| a.lead_depth + 1);

    let id = state.ids.next();
    state.anomalies.insert(
        id,
        Anomaly {
            id,
            system_id,
            position: best_pos,
            kind,
            name: format!("{kind:?} Signal {id}"),
            investigation_days,
            research_reward,
            component_unlock_id: None,
            mineral_reward: HashMap::new(),
            hazard_chance,
            hazard_damage,
            resolved: false,
            resolver_faction_id: None,
            origin_anomaly_id,
            lead_depth,
        },
    );

    events.push(SimEvent {
        seq: 0,
        day,
        hour: state.date.hour_of_day,
        level: EventLevel::Info,
        category: EventCategory::Procgen,
        message: format!("anomaly '{kind:?}' detected in system {system_id}"),
        context: EventContext { system_id: Some(system_id), ..Default::default() },
    });
}

fn spawn_cache(state: &mut State, system_id: Id, region: Option<&Region>, day: i64, hour: u8, events: &mut Vec<SimEvent>) {
    let mut rng = HashRng::derive(state.seed ^ (day as u64), system_id.0 ^ 0xCAC0_CAC0);
    let richness = region.map_or(1.0, |r| r.salvage_richness_multiplier);
    let flavor = ["Pirate", "Ruins", "Drifting"][rng.range_int(0, 2) as usize];
    let pos = Point2::new(rng.range(-1500.0, 1500.0), rng.range(-1500.0, 1500.0));

    let mut minerals = HashMap::new();
    minerals.insert("Duranium".to_string(), rng.range(200.0, 2000.0) * richness);
    minerals.insert("Neutronium".to_string(), rng.range(20.0, 300.0) * richness);

    let id = state.ids.next();
    state.wrecks.insert(
        id,
        crate::types::Wreck {
            id,
            system_id,
            position: pos,
            minerals,
            origin_ship_id: None,
            origin_faction_id: None,
            origin_design_id: None,
            created_day: day,
            kind: WreckKind::Cache,
        },
    );

    events.push(SimEvent {
        seq: 0,
        day,
        hour,
        level: EventLevel::Info,
        category: EventCategory::Procgen,
        message: format!("{flavor} cache discovered in system {system_id}"),
        context: EventContext { system_id: Some(system_id), ..Default::default() },
    });
}
