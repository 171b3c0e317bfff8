//! Research generation and queue advancement (component E, §4.E).
//!
//! Generation is summed per colony from research installations; spend is
//! applied to the faction's active tech, with research-agreement collaboration
//! folded in as a symmetric per-pair bonus before the spend loop.

use crate::economy::{effective_multiplier, OutputMultiplier};
use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{
    Content, EventCategory, EventContext, EventLevel, OutputClass, SimEvent, State, TreatyKind,
};
use std::collections::HashMap;

/// Research-partner assist: each partner faction that already knows the tech
/// boosts the spend rate on it by this fraction, stacking additively.
const TECH_HELP_BONUS_PER_PARTNER: f64 = 0.1;
/// Fraction of `min(gen_a, gen_b)` added as a symmetric collaboration bonus to
/// each `ResearchAgreement` pair, per day.
const RESEARCH_COLLAB_FRACTION: f64 = 0.2;

/// Sums each colony's research-installation output for a faction, in
/// installation-sorted order, scaled by the faction's research multiplier.
#[must_use]
pub fn faction_research_generation(
    state: &State,
    content: &Content,
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    dt_days: f64,
) -> HashMap<Id, f64> {
    let mut gen: HashMap<Id, f64> = HashMap::new();
    for colony_id in sorted_keys(&state.colonies) {
        let colony = &state.colonies[&colony_id];
        let mult = effective_multiplier(multipliers, colony.faction_id, OutputClass::Research);
        let mut inst_ids: Vec<&String> = colony.installations.keys().collect();
        inst_ids.sort();
        let mut total = 0.0;
        for inst_id in inst_ids {
            let count = colony.installations[inst_id];
            if count == 0 {
                continue;
            }
            let Some(def) = content.installations.get(inst_id) else { continue };
            total += def.research_per_day * f64::from(count) * mult * dt_days;
        }
        *gen.entry(colony.faction_id).or_insert(0.0) += total;
    }
    gen
}

fn research_agreement_partners(state: &State, faction_id: Id, today: i64) -> Vec<Id> {
    let mut partners = Vec::new();
    for treaty in &state.treaties {
        if treaty.kind != TreatyKind::ResearchAgreement || !treaty.is_active(today) {
            continue;
        }
        if treaty.faction_a == faction_id {
            partners.push(treaty.faction_b);
        } else if treaty.faction_b == faction_id {
            partners.push(treaty.faction_a);
        }
    }
    partners.sort_unstable();
    partners
}

/// Drops empty, known, or no-longer-existent tech ids from the queue.
fn clean_research_queue(state: &mut State, content: &Content, faction_id: Id) {
    let Some(faction) = state.factions.get_mut(&faction_id) else { return };
    faction.research_queue.retain(|t| {
        !t.is_empty() && !faction.known_techs.contains(t) && content.tech_by_id(t).is_some()
    });
}

fn prereqs_satisfied(content: &Content, known: &[String], tech_id: &str) -> bool {
    content
        .tech_by_id(tech_id)
        .is_some_and(|t| t.prereqs.iter().all(|p| known.contains(p)))
}

/// Applies a completed tech's unlock effects (components/installations) to the
/// faction and pushes it into `known_techs`.
fn complete_tech(state: &mut State, content: &Content, faction_id: Id, tech_id: &str, events: &mut Vec<SimEvent>) {
    let Some(tech) = content.tech_by_id(tech_id).cloned() else { return };
    let Some(faction) = state.factions.get_mut(&faction_id) else { return };
    if !faction.known_techs.contains(&tech_id.to_string()) {
        faction.known_techs.push(tech_id.to_string());
    }
    for c in &tech.unlocks_components {
        faction.unlocked_components.insert(c.clone());
    }
    for i in &tech.unlocks_installations {
        faction.unlocked_installations.insert(i.clone());
    }
    events.push(SimEvent {
        seq: 0,
        day: state.date.day,
        hour: state.date.hour_of_day,
        level: EventLevel::Info,
        category: EventCategory::Research,
        message: format!("faction {faction_id} completed research '{}'", tech.name),
        context: EventContext { faction_id: Some(faction_id), ..Default::default() },
    });
}

/// Runs the full research pass: generation, collaboration bonus, queue
/// cleaning, active-tech selection, and spend-to-completion loop (possibly
/// completing more than one tech in a single call if the RP budget allows).
pub fn tick_research(
    state: &mut State,
    content: &Content,
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    dt_days: f64,
    events: &mut Vec<SimEvent>,
) {
    if dt_days <= 0.0 {
        return;
    }
    let mut rp_budget = faction_research_generation(state, content, multipliers, dt_days);
    let today = state.date.day;

    // Symmetric collaboration bonus added per active ResearchAgreement pair.
    let faction_ids = sorted_keys(&state.factions);
    for &faction_id in &faction_ids {
        let gen_a = *rp_budget.get(&faction_id).unwrap_or(&0.0);
        for partner in research_agreement_partners(state, faction_id, today) {
            if partner <= faction_id {
                continue; // count each pair once
            }
            let gen_b = *rp_budget.get(&partner).unwrap_or(&0.0);
            let bonus = gen_a.min(gen_b) * RESEARCH_COLLAB_FRACTION;
            *rp_budget.entry(faction_id).or_insert(0.0) += bonus;
            *rp_budget.entry(partner).or_insert(0.0) += bonus;
        }
    }

    for &faction_id in &faction_ids {
        clean_research_queue(state, content, faction_id);
        let mut available = *rp_budget.get(&faction_id).unwrap_or(&0.0);
        if available <= 0.0 {
            continue;
        }
        loop {
            let faction = &state.factions[&faction_id];
            let active = faction.active_research.clone().or_else(|| {
                faction
                    .research_queue
                    .iter()
                    .find(|t| prereqs_satisfied(content, &faction.known_techs, t))
                    .cloned()
            });
            let Some(active_id) = active else { break };
            let Some(tech) = content.tech_by_id(&active_id).cloned() else { break };
            let partners = research_agreement_partners(state, faction_id, today);
            let known_partner_count = partners
                .iter()
                .filter(|p| state.factions.get(p).is_some_and(|f| f.known_techs.contains(&active_id)))
                .count();
            let assist_multiplier = 1.0 + TECH_HELP_BONUS_PER_PARTNER * known_partner_count as f64;

            let faction = state.factions.get_mut(&faction_id).unwrap();
            faction.active_research = Some(active_id.clone());
            let remaining_cost = (tech.cost_rp - faction.research_progress_points).max(0.0);
            let effective_remaining = remaining_cost / assist_multiplier;
            let spend = available.min(effective_remaining);
            faction.research_progress_points += spend * assist_multiplier;
            available -= spend;

            if faction.research_progress_points + 1e-9 >= tech.cost_rp {
                faction.research_progress_points = 0.0;
                faction.active_research = None;
                faction.research_queue.retain(|t| t != &active_id);
                complete_tech(state, content, faction_id, &active_id, events);
                if available <= 1e-9 {
                    break;
                }
                continue;
            }
            break;
        }
    }
}
