//! The entity model: everything that lives inside [`State`], plus the static
//! [`Content`] catalogs and the [`EngineConfig`] knobs that parameterize a tick.
//! All cross-references are by [`Id`]; there are no pointers anywhere in this
//! module. `find`-style helpers on `State` are the only accessor pattern — see
//! `engine::State` methods — so that iteration order never leaks into behavior.

use crate::id::{Id, IdAllocator};
use crate::orbit::OrbitalElements;
use crate::spatial::Point2;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type MineralId = String;
pub type ComponentId = String;
pub type InstallationId = String;
pub type TechId = String;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Signed day count since an epoch, plus an hour-of-day in `[0,23]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimDate {
    pub day: i64,
    pub hour_of_day: u8,
}

impl SimDate {
    #[must_use]
    pub fn epoch() -> Self {
        SimDate { day: 0, hour_of_day: 0 }
    }

    #[must_use]
    pub fn advance_hours(self, hours: u32) -> SimDate {
        let total = i64::from(self.hour_of_day) + i64::from(hours);
        SimDate {
            day: self.day + total.div_euclid(24),
            hour_of_day: total.rem_euclid(24) as u8,
        }
    }

    #[must_use]
    pub fn as_day_fraction(self) -> f64 {
        self.day as f64 + f64::from(self.hour_of_day) / 24.0
    }
}

// ---------------------------------------------------------------------------
// Faction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Player,
    AiPassive,
    AiExplorer,
    AiPirate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiplomaticStatus {
    Neutral,
    Friendly,
    Allied,
    Hostile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipProfile {
    pub role: ShipRole,
    pub count_target: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipRole {
    Freighter,
    Surveyor,
    Combatant,
    Tanker,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    pub id: Id,
    pub name: String,
    pub control_mode: ControlMode,
    pub known_techs: Vec<TechId>,
    pub research_queue: Vec<TechId>,
    pub active_research: Option<TechId>,
    pub research_progress_points: f64,
    pub unlocked_components: HashSet<ComponentId>,
    pub unlocked_installations: HashSet<InstallationId>,
    pub discovered_systems: HashSet<Id>,
    /// Jump point id -> survey progress in `[0,1]`; presence means "surveyed" at 1.0.
    pub surveyed_jump_points: HashMap<Id, f64>,
    pub contacts: HashMap<Id, Contact>,
    pub journal: Vec<SimEvent>,
    pub trait_multipliers: HashMap<String, f64>,
    pub ship_design_targets: HashMap<Id, u32>,
    pub ship_profiles: Vec<ShipProfile>,
    pub diplomacy: HashMap<Id, DiplomaticStatus>,
    /// Version counters bumped whenever discovery/survey state changes, used as
    /// part of the route-cache key.
    pub discovered_version: u64,
    pub surveyed_version: u64,
}

impl Faction {
    #[must_use]
    pub fn diplomatic_status_with(&self, other: Id) -> DiplomaticStatus {
        self.diplomacy
            .get(&other)
            .copied()
            .unwrap_or(DiplomaticStatus::Neutral)
    }

    #[must_use]
    pub fn is_allied_with(&self, other: Id) -> bool {
        matches!(self.diplomatic_status_with(other), DiplomaticStatus::Allied)
    }
}

// ---------------------------------------------------------------------------
// Star systems & bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: Id,
    pub name: String,
    pub galaxy_position: Point2,
    pub bodies: Vec<Id>,
    pub jump_points: Vec<Id>,
    pub ships: Vec<Id>,
    pub region_id: Option<Id>,
    pub nebula_density: f64,
    pub storm_interval_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Star,
    Planet,
    Moon,
    GasGiant,
    Asteroid,
    Comet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformTarget {
    pub target_temp_k: f64,
    pub target_atm: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: Id,
    pub system_id: Id,
    pub name: String,
    pub kind: BodyKind,
    pub parent_body_id: Option<Id>,
    pub elements: OrbitalElements,
    pub position: Point2,
    pub mass_earth: f64,
    pub radius_km: f64,
    /// Empty map means legacy "unlimited" mining semantics.
    pub mineral_deposits: HashMap<MineralId, f64>,
    pub surface_temp_k: f64,
    pub atmosphere_atm: f64,
    pub terraforming: Option<TerraformTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpPoint {
    pub id: Id,
    pub system_id: Id,
    pub position: Point2,
    pub linked_jump_id: Id,
}

// ---------------------------------------------------------------------------
// Colony
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionQueueEntry {
    pub installation_id: InstallationId,
    pub quantity_remaining: u32,
    pub minerals_paid: bool,
    pub cp_remaining: f64,
    pub auto_queued: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipyardBuildOrder {
    pub design_id: Id,
    pub tons_remaining: f64,
    pub refit_ship_id: Option<Id>,
    pub auto_queued: bool,
    pub rally_order: Option<Box<Order>>,
    pub assign_fleet_id: Option<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionInstance {
    pub condition_id: Id,
    pub remaining_days: f64,
    pub severity: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colony {
    pub id: Id,
    pub body_id: Id,
    pub faction_id: Id,
    pub population_millions: f64,
    pub minerals: HashMap<MineralId, f64>,
    pub mineral_reserves: HashMap<MineralId, f64>,
    pub installations: HashMap<InstallationId, u32>,
    pub installation_auto_targets: HashMap<InstallationId, u32>,
    pub construction_queue: Vec<ConstructionQueueEntry>,
    pub shipyard_queue: Vec<ShipyardBuildOrder>,
    pub troop_strength: f64,
    pub troop_training_queue: f64,
    pub ground_forces: f64,
    pub conditions: Vec<ConditionInstance>,
}

impl Colony {
    #[must_use]
    pub fn stock_of(&self, mineral: &str) -> f64 {
        self.minerals.get(mineral).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn reserve_of(&self, mineral: &str) -> f64 {
        self.mineral_reserves.get(mineral).copied().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Ships & designs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AutomationFlags {
    pub auto_refuel: bool,
    pub auto_refuel_threshold: f64,
    pub auto_repair: bool,
    pub auto_repair_threshold: f64,
    pub auto_tanker: bool,
    pub auto_tanker_threshold: f64,
    pub auto_salvage: bool,
    pub auto_colonize: bool,
    pub auto_explore: bool,
    pub auto_freight: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PowerPolicy {
    pub weapons_online: bool,
    pub shields_online: bool,
    pub sensors_online: bool,
    pub engines_online: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeatBucket {
    Cold,
    Warm,
    Hot,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub id: Id,
    pub faction_id: Id,
    pub system_id: Id,
    pub position: Point2,
    pub velocity: Point2,
    pub design_id: Id,
    pub hp: f64,
    pub shields: f64,
    pub fuel: f64,
    pub cargo: HashMap<MineralId, f64>,
    pub troops: f64,
    pub colonists: f64,
    pub missile_ammo: f64,
    pub heat: f64,
    pub heat_state: HeatBucket,
    pub maintenance_condition: f64,
    pub crew_grade_points: f64,
    pub automation: AutomationFlags,
    pub power_policy: PowerPolicy,
    pub missile_cooldown_days: f64,
    pub boarding_cooldown_days: f64,
    pub name: String,
}

impl Ship {
    #[must_use]
    pub fn crew_grade_bonus(&self) -> f64 {
        ((self.crew_grade_points.max(0.0).sqrt() - 10.0) / 100.0).clamp(-0.25, 0.75)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipDesign {
    pub id: Id,
    pub name: String,
    pub component_ids: Vec<ComponentId>,
    pub mass_tons: f64,
    pub speed_km_s: f64,
    pub sensor_range_mkm: f64,
    pub fuel_capacity: f64,
    pub fuel_use_per_mkm: f64,
    pub cargo_capacity: f64,
    pub cargo_mining_rate: f64,
    pub weapon_damage: f64,
    pub weapon_range_mkm: f64,
    pub missile_damage: f64,
    pub missile_speed_km_s: f64,
    pub missile_launchers: u32,
    pub missile_reload_days: f64,
    pub pd_damage_per_day: f64,
    pub pd_range_mkm: f64,
    pub reactor_output: f64,
    pub power_draw_weapons: f64,
    pub power_draw_shields: f64,
    pub power_draw_sensors: f64,
    pub power_draw_engines: f64,
    pub max_hp: f64,
    pub max_shields: f64,
    pub shield_regen_per_day: f64,
    pub signature_multiplier: f64,
    pub colonist_capacity: f64,
    pub troop_capacity: f64,
    pub ecm: f64,
    pub eccm: f64,
}

// ---------------------------------------------------------------------------
// Fleets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formation {
    Line,
    Wedge,
    Sphere,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fleet {
    pub id: Id,
    pub faction_id: Id,
    pub ship_ids: Vec<Id>,
    pub leader_id: Id,
    pub formation: Formation,
    pub spacing_mkm: f64,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Order {
    WaitDays { days: f64 },
    MoveToPoint { target: Point2 },
    MoveToBody { body_id: Id },
    ColonizeBody { body_id: Id },
    OrbitBody { body_id: Id, duration_days: f64 },
    TravelViaJump { jump_point_id: Id },
    SurveyJumpPoint { jump_point_id: Id, transit_when_done: bool },
    AttackShip { target_id: Id, has_last_known: bool, last_known_pos: Point2 },
    EscortShip { target_id: Id, follow_distance_mkm: f64, restrict_to_discovered: bool },
    LoadMineral { mineral: MineralId, colony_id: Id },
    UnloadMineral { mineral: MineralId, colony_id: Id },
    LoadTroops { colony_id: Id, amount: f64 },
    UnloadTroops { colony_id: Id, amount: f64 },
    LoadColonists { colony_id: Id, amount: f64 },
    UnloadColonists { colony_id: Id, amount: f64 },
    InvadeColony { colony_id: Id },
    BombardColony { colony_id: Id, duration_days: f64, progress_days: f64 },
    TransferCargoToShip { target_ship_id: Id, mineral: MineralId, amount: f64 },
    TransferFuelToShip { target_ship_id: Id, amount: f64 },
    TransferTroopsToShip { target_ship_id: Id, amount: f64 },
    SalvageWreck { wreck_id: Id },
    MineBody { body_id: Id, stop_when_full: bool },
    InvestigateAnomaly { anomaly_id: Id },
    ScrapShip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipOrders {
    pub queue: std::collections::VecDeque<Order>,
    pub repeat: bool,
    pub repeat_count_remaining: i64,
    pub repeat_template: Vec<Order>,
}

// ---------------------------------------------------------------------------
// Combat entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissileSalvo {
    pub id: Id,
    pub attacker_ship_id: Id,
    pub target_ship_id: Id,
    pub attacker_faction_id: Id,
    pub defender_faction_id: Id,
    pub system_id: Id,
    pub launch_pos: Point2,
    pub target_snapshot_pos: Point2,
    pub total_eta_days: f64,
    pub remaining_eta_days: f64,
    pub initial_damage: f64,
    pub remaining_damage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WreckKind {
    ShipDebris,
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wreck {
    pub id: Id,
    pub system_id: Id,
    pub position: Point2,
    pub minerals: HashMap<MineralId, f64>,
    pub origin_ship_id: Option<Id>,
    pub origin_faction_id: Option<Id>,
    pub origin_design_id: Option<Id>,
    pub created_day: i64,
    pub kind: WreckKind,
}

// ---------------------------------------------------------------------------
// Anomalies & regions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    Ruins,
    Distress,
    Phenomenon,
    Distortion,
    Xeno,
    Signal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Id,
    pub system_id: Id,
    pub position: Point2,
    pub kind: AnomalyKind,
    pub name: String,
    pub investigation_days: f64,
    pub research_reward: f64,
    pub component_unlock_id: Option<ComponentId>,
    pub mineral_reward: HashMap<MineralId, f64>,
    pub hazard_chance: f64,
    pub hazard_damage: f64,
    pub resolved: bool,
    pub resolver_faction_id: Option<Id>,
    pub origin_anomaly_id: Option<Id>,
    pub lead_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: Id,
    pub name: String,
    pub ruins_density: f64,
    pub pirate_risk: f64,
    pub pirate_suppression: f64,
    pub salvage_richness_multiplier: f64,
    pub mineral_richness_multiplier: f64,
    pub volatile_richness_multiplier: f64,
    pub theme_tag: String,
}

// ---------------------------------------------------------------------------
// Contacts, contracts, treaties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub day: i64,
    pub system_id: Id,
    pub position: Point2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub ship_id: Id,
    pub last_seen: ContactSnapshot,
    pub last_seen_name: String,
    pub last_seen_design_id: Id,
    pub last_seen_faction_id: Id,
    pub previous_seen: Option<ContactSnapshot>,
}

impl Contact {
    /// Two-point velocity extrapolation; `None` if there is no previous snapshot
    /// or the ship changed systems since then.
    #[must_use]
    pub fn extrapolated_velocity(&self) -> Option<Point2> {
        let prev = self.previous_seen?;
        if prev.system_id != self.last_seen.system_id {
            return None;
        }
        let dt = (self.last_seen.day - prev.day) as f64;
        if dt <= 0.0 {
            return None;
        }
        Some(Point2::new(
            (self.last_seen.position.x - prev.position.x) / dt,
            (self.last_seen.position.y - prev.position.y) / dt,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    InvestigateAnomaly,
    SalvageWreck,
    SurveyJumpPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Offered,
    Accepted,
    Completed,
    Failed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Id,
    pub kind: ContractKind,
    pub status: ContractStatus,
    pub issuer_faction_id: Id,
    pub assignee_faction_id: Option<Id>,
    pub system_id: Id,
    pub target_id: Id,
    pub offered_day: i64,
    pub accepted_day: Option<i64>,
    pub resolved_day: Option<i64>,
    pub expires_day: i64,
    pub estimated_hops: u32,
    pub estimated_risk: f64,
    pub research_point_reward: f64,
    pub name: String,
    pub assigned_ship_id: Option<Id>,
    pub assigned_fleet_id: Option<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TreatyKind {
    Ceasefire,
    NonAggressionPact,
    ResearchAgreement,
    TradeAgreement,
    Alliance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Treaty {
    pub kind: TreatyKind,
    pub faction_a: Id,
    pub faction_b: Id,
    pub start_day: i64,
    pub duration_days: i64,
}

impl Treaty {
    #[must_use]
    pub fn normalized(kind: TreatyKind, a: Id, b: Id, start_day: i64, duration_days: i64) -> Self {
        let (a, b) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Treaty { kind, faction_a: a, faction_b: b, start_day, duration_days }
    }

    #[must_use]
    pub fn is_active(&self, today: i64) -> bool {
        self.duration_days <= 0 || today < self.start_day + self.duration_days
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    Movement,
    Economy,
    Research,
    Shipyard,
    Construction,
    Sensors,
    Combat,
    Boarding,
    Diplomacy,
    Procgen,
    Contract,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContext {
    pub faction_id: Option<Id>,
    pub system_id: Option<Id>,
    pub ship_id: Option<Id>,
    pub colony_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub seq: u64,
    pub day: i64,
    pub hour: u8,
    pub level: EventLevel,
    pub category: EventCategory,
    pub message: String,
    pub context: EventContext,
}

// ---------------------------------------------------------------------------
// Order templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderTemplate {
    pub name: String,
    pub orders: Vec<Order>,
}

// ---------------------------------------------------------------------------
// Top-level counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_seq: u64,
    pub next_journal_seq: u64,
}

// ---------------------------------------------------------------------------
// Content (static catalogs)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechDef {
    pub id: TechId,
    pub name: String,
    pub prereqs: Vec<TechId>,
    pub cost_rp: f64,
    pub unlocks_components: Vec<ComponentId>,
    pub unlocks_installations: Vec<InstallationId>,
    pub effects: Vec<TechEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutputClass {
    Mining,
    Industry,
    Research,
    Construction,
    Shipyard,
    Terraforming,
    TroopTraining,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TechEffect {
    FactionOutputBonus { class: OutputClass, fraction: f64 },
    FactionOutputMultiplier { class: OutputClass, multiplier: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationDef {
    pub id: InstallationId,
    pub name: String,
    pub cp_per_day: f64,
    pub mineral_cost: HashMap<MineralId, f64>,
    pub mining_capacity_tons_per_day: f64,
    pub research_per_day: f64,
    pub weapon_damage: f64,
    pub weapon_range_mkm: f64,
    pub sensor_range_mkm: f64,
    pub yard_capacity: bool,
    pub cp_only: bool,
    /// Recipe this installation runs, if it is a factory.
    pub recipe_id: Option<String>,
    pub industry_capacity_tons_per_day: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDef {
    pub id: ComponentId,
    pub name: String,
    pub mass_tons: f64,
    pub cost: HashMap<MineralId, f64>,
    pub contributes: ComponentContribution,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentContribution {
    pub hp: f64,
    pub shields: f64,
    pub shield_regen_per_day: f64,
    pub speed_km_s: f64,
    pub sensor_range_mkm: f64,
    pub fuel_capacity: f64,
    pub fuel_use_per_mkm: f64,
    pub cargo_capacity: f64,
    pub cargo_mining_rate: f64,
    pub weapon_damage: f64,
    pub weapon_range_mkm: f64,
    pub missile_damage: f64,
    pub missile_speed_km_s: f64,
    pub missile_launchers: u32,
    pub missile_reload_days: f64,
    pub pd_damage_per_day: f64,
    pub pd_range_mkm: f64,
    pub reactor_output: f64,
    pub power_draw: f64,
    pub signature_multiplier: f64,
    pub colonist_capacity: f64,
    pub troop_capacity: f64,
    pub ecm: f64,
    pub eccm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    pub id: String,
    pub inputs: HashMap<MineralId, f64>,
    pub outputs: HashMap<MineralId, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCostPerTon {
    pub mineral_cost_per_ton: HashMap<MineralId, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineralDef {
    pub id: MineralId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub content_version: String,
    pub techs: Vec<TechDef>,
    pub installations: AHashMap<InstallationId, InstallationDef>,
    pub components: AHashMap<ComponentId, ComponentDef>,
    pub minerals: Vec<MineralDef>,
    pub build_costs_per_ton: BuildCostPerTon,
    pub recipes: AHashMap<String, RecipeDef>,
}

impl Content {
    #[must_use]
    pub fn tech_by_id(&self, id: &str) -> Option<&TechDef> {
        self.techs.iter().find(|t| t.id == id)
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MiningScarcityConfig {
    pub enabled: bool,
    pub buffer_days: f64,
    pub need_boost: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WreckConfig {
    pub enabled: bool,
    pub cargo_salvage_fraction: f64,
    pub hull_salvage_fraction: f64,
    pub decay_days: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShipHeatConfig {
    pub enabled: bool,
    pub base_capacity_per_mass_ton: f64,
    pub generation_per_power_use_per_day: f64,
    pub base_dissipation_per_mass_ton_per_day: f64,
    pub penalty_start_fraction: f64,
    pub penalty_full_fraction: f64,
    pub damage_threshold_fraction: f64,
    pub damage_fraction_per_day_at_200pct: f64,
    pub min_speed_multiplier: f64,
    pub min_sensor_multiplier: f64,
    pub min_weapon_multiplier: f64,
    pub min_shield_multiplier: f64,
    pub signature_multiplier_per_fraction: f64,
    pub signature_multiplier_max: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub enabled: bool,
    pub max_offers_per_faction: u32,
    pub daily_new_offers_per_faction: u32,
    pub offer_expiry_days: i64,
    pub reward_base: f64,
    pub reward_per_hop: f64,
    pub reward_per_risk: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrewExperienceConfig {
    pub enabled: bool,
    pub initial_grade_points: f64,
    pub grade_points_cap: f64,
    pub combat_grade_points_per_damage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoardingConfig {
    pub enabled: bool,
    pub range_mkm: f64,
    pub min_attacker_troops: f64,
    pub target_hp_fraction: f64,
    pub require_shields_down: bool,
    pub attacker_casualty_fraction: f64,
    pub defender_casualty_fraction: f64,
    pub defense_hp_factor: f64,
    pub log_failures: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BeamHitChanceConfig {
    pub base: f64,
    pub min: f64,
    pub range_penalty_at_max: f64,
    pub tracking_ref_ang_per_day: f64,
    pub tracking_min_sensor_range_mkm: f64,
    pub tracking_reference_sensor_range_mkm: f64,
    pub signature_exponent: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerraformingConfig {
    pub enabled: bool,
    pub temp_k_per_point_day: f64,
    pub atm_per_point_day: f64,
    pub temp_tolerance_k: f64,
    pub atm_tolerance: f64,
    pub duranium_per_point: f64,
    pub neutronium_per_point: f64,
    pub split_points_between_axes: bool,
    pub scale_with_body_mass: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicPoiConfig {
    pub enabled: bool,
    pub max_anomalies_total: u32,
    pub max_anomalies_per_system: u32,
    pub max_caches_total: u32,
    pub max_caches_per_system: u32,
    pub anomaly_spawn_chance_per_system_per_day: f64,
    pub cache_spawn_chance_per_system_per_day: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutoFreightConfig {
    pub enabled: bool,
    pub multi_mineral: bool,
    pub min_transfer_tons: f64,
    pub max_take_fraction_of_surplus: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutoTankerConfig {
    pub enabled: bool,
    pub request_threshold: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub enable_combat: bool,
    pub enable_subday_economy: bool,
    pub enable_habitability: bool,
    pub mining_scarcity: MiningScarcityConfig,
    pub wrecks: WreckConfig,
    pub ship_heat: ShipHeatConfig,
    pub contracts: ContractsConfig,
    pub crew_experience: CrewExperienceConfig,
    pub boarding: BoardingConfig,
    pub beam_hit_chance: BeamHitChanceConfig,
    pub terraforming: TerraformingConfig,
    pub dynamic_poi: DynamicPoiConfig,
    pub auto_freight: AutoFreightConfig,
    pub auto_tanker: AutoTankerConfig,
    pub max_events: usize,
    pub emit_daily_events: bool,
    pub arrival_epsilon_mkm: f64,
    pub jump_delay_days: f64,
    pub jump_fuel_transfer_cost: f64,
    pub spatial_cell_size_mkm: f64,
    pub contact_max_age_days: f64,
    pub sensor_max_signature_multiplier: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            enable_combat: true,
            enable_subday_economy: true,
            enable_habitability: true,
            mining_scarcity: MiningScarcityConfig { enabled: true, buffer_days: 30.0, need_boost: 2.0 },
            wrecks: WreckConfig { enabled: true, cargo_salvage_fraction: 0.8, hull_salvage_fraction: 0.2, decay_days: 365.0 },
            ship_heat: ShipHeatConfig {
                enabled: true,
                base_capacity_per_mass_ton: 10.0,
                generation_per_power_use_per_day: 0.5,
                base_dissipation_per_mass_ton_per_day: 4.0,
                penalty_start_fraction: 0.6,
                penalty_full_fraction: 1.5,
                damage_threshold_fraction: 2.0,
                damage_fraction_per_day_at_200pct: 0.05,
                min_speed_multiplier: 0.25,
                min_sensor_multiplier: 0.25,
                min_weapon_multiplier: 0.25,
                min_shield_multiplier: 0.25,
                signature_multiplier_per_fraction: 0.3,
                signature_multiplier_max: 2.0,
            },
            contracts: ContractsConfig { enabled: true, max_offers_per_faction: 5, daily_new_offers_per_faction: 1, offer_expiry_days: 30, reward_base: 50.0, reward_per_hop: 10.0, reward_per_risk: 100.0 },
            crew_experience: CrewExperienceConfig { enabled: true, initial_grade_points: 100.0, grade_points_cap: 10_000.0, combat_grade_points_per_damage: 0.05 },
            boarding: BoardingConfig {
                enabled: true,
                range_mkm: 0.01,
                min_attacker_troops: 10.0,
                target_hp_fraction: 0.3,
                require_shields_down: true,
                attacker_casualty_fraction: 0.3,
                defender_casualty_fraction: 0.6,
                defense_hp_factor: 0.01,
                log_failures: true,
            },
            beam_hit_chance: BeamHitChanceConfig {
                base: 0.65,
                min: 0.02,
                range_penalty_at_max: 0.5,
                tracking_ref_ang_per_day: 1.0,
                tracking_min_sensor_range_mkm: 1.0,
                tracking_reference_sensor_range_mkm: 50.0,
                signature_exponent: 1.0,
            },
            terraforming: TerraformingConfig {
                enabled: true,
                temp_k_per_point_day: 0.05,
                atm_per_point_day: 0.002,
                temp_tolerance_k: 15.0,
                atm_tolerance: 0.1,
                duranium_per_point: 50.0,
                neutronium_per_point: 10.0,
                split_points_between_axes: true,
                scale_with_body_mass: true,
            },
            dynamic_poi: DynamicPoiConfig {
                enabled: true,
                max_anomalies_total: 200,
                max_anomalies_per_system: 4,
                max_caches_total: 200,
                max_caches_per_system: 4,
                anomaly_spawn_chance_per_system_per_day: 0.01,
                cache_spawn_chance_per_system_per_day: 0.01,
            },
            auto_freight: AutoFreightConfig { enabled: true, multi_mineral: true, min_transfer_tons: 10.0, max_take_fraction_of_surplus: 0.9 },
            auto_tanker: AutoTankerConfig { enabled: true, request_threshold: 0.5 },
            max_events: 5000,
            emit_daily_events: true,
            arrival_epsilon_mkm: 0.01,
            jump_delay_days: 0.05,
            jump_fuel_transfer_cost: 1.0,
            spatial_cell_size_mkm: 25.0,
            contact_max_age_days: 180.0,
            sensor_max_signature_multiplier: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// State (top-level world value)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub schema_version: u32,
    pub date: SimDate,
    pub ids: IdAllocator,
    pub counters: Counters,
    pub seed: u64,

    pub factions: HashMap<Id, Faction>,
    pub systems: HashMap<Id, StarSystem>,
    pub bodies: HashMap<Id, Body>,
    pub jump_points: HashMap<Id, JumpPoint>,
    pub colonies: HashMap<Id, Colony>,
    pub ships: HashMap<Id, Ship>,
    pub designs: HashMap<Id, ShipDesign>,
    pub fleets: HashMap<Id, Fleet>,
    pub ship_orders: HashMap<Id, ShipOrders>,
    pub order_templates: HashMap<Id, OrderTemplate>,
    pub missile_salvos: HashMap<Id, MissileSalvo>,
    pub wrecks: HashMap<Id, Wreck>,
    pub anomalies: HashMap<Id, Anomaly>,
    pub contracts: HashMap<Id, Contract>,
    pub treaties: Vec<Treaty>,
    pub regions: HashMap<Id, Region>,
    pub events: Vec<SimEvent>,
    pub score_history: Vec<(i64, HashMap<Id, f64>)>,
}

pub const SCHEMA_VERSION: u32 = 1;

impl State {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        State {
            schema_version: SCHEMA_VERSION,
            date: SimDate::epoch(),
            ids: IdAllocator::new(),
            counters: Counters::default(),
            seed,
            factions: HashMap::new(),
            systems: HashMap::new(),
            bodies: HashMap::new(),
            jump_points: HashMap::new(),
            colonies: HashMap::new(),
            ships: HashMap::new(),
            designs: HashMap::new(),
            fleets: HashMap::new(),
            ship_orders: HashMap::new(),
            order_templates: HashMap::new(),
            missile_salvos: HashMap::new(),
            wrecks: HashMap::new(),
            anomalies: HashMap::new(),
            contracts: HashMap::new(),
            treaties: Vec::new(),
            regions: HashMap::new(),
            events: Vec::new(),
            score_history: Vec::new(),
        }
    }

    /// Backfills fields missing from a legacy save: `surveyed_jump_points` from
    /// known-system jump points. `crew_grade_points`/`shields`/`fuel`/`missile_ammo`
    /// default to full capacity via serde defaults on `Ship`; `heat_state` is
    /// recomputed from `heat/capacity` on load rather than trusted from the save.
    pub fn backfill_legacy_fields(&mut self, content: &Content) {
        let _ = content;
        let system_jump_points: HashMap<Id, Vec<Id>> = self
            .systems
            .values()
            .map(|s| (s.id, s.jump_points.clone()))
            .collect();
        for faction in self.factions.values_mut() {
            for system_id in &faction.discovered_systems {
                if let Some(jps) = system_jump_points.get(system_id) {
                    for jp in jps {
                        faction.surveyed_jump_points.entry(*jp).or_insert(1.0);
                    }
                }
            }
        }
    }
}
