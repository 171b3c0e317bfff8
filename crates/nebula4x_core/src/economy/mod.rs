//! Colony economy tick (component E): mining, industry, research, shipyards,
//! construction. Each sub-pass iterates colonies/installations in sorted-id
//! order and folds faction output multipliers computed once per economy pass.

pub mod construction;
pub mod industry;
pub mod mining;
pub mod research;
pub mod shipyards;

use crate::id::Id;
use crate::sorted::sorted_keys;
use crate::types::{Content, OutputClass, State, TechEffect, TreatyKind};
use std::collections::HashMap;

/// Additive output bonus per active `TradeAgreement` partner, folded into every
/// output class (trade flows benefit the whole economy, not one sector).
const TRADE_AGREEMENT_BONUS_PER_PARTNER: f64 = 0.05;
/// Hard cap on the cumulative trade-agreement bonus regardless of partner count.
const TRADE_AGREEMENT_BONUS_CAP: f64 = 0.25;

fn trade_agreement_partner_count(state: &State, faction_id: Id, today: i64) -> usize {
    state
        .treaties
        .iter()
        .filter(|t| t.kind == TreatyKind::TradeAgreement && t.is_active(today))
        .filter(|t| t.faction_a == faction_id || t.faction_b == faction_id)
        .count()
}

/// Per-faction, per-output-class multiplier derived from known techs. Computed
/// once per economy pass and threaded through mining/industry/research/etc.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMultiplier {
    pub additive_bonus: f64,
    pub direct_multiplier: f64,
}

impl OutputMultiplier {
    #[must_use]
    pub fn resolve(&self) -> f64 {
        (1.0 + self.additive_bonus) * self.direct_multiplier
    }
}

/// Scans every faction's known techs for output-affecting effects, keyed by
/// `(faction_id, class)`. `OutputClass::All` entries apply to every class and are
/// folded in by callers via [`effective_multiplier`].
#[must_use]
pub fn compute_faction_multipliers(
    state: &State,
    content: &Content,
) -> HashMap<(Id, OutputClass), OutputMultiplier> {
    let mut result: HashMap<(Id, OutputClass), OutputMultiplier> = HashMap::new();
    for faction_id in sorted_keys(&state.factions) {
        let faction = &state.factions[&faction_id];
        let partner_count = trade_agreement_partner_count(state, faction_id, state.date.day);
        let trade_bonus = (TRADE_AGREEMENT_BONUS_PER_PARTNER * partner_count as f64).min(TRADE_AGREEMENT_BONUS_CAP);
        let mut entry_all = OutputMultiplier { additive_bonus: trade_bonus, direct_multiplier: 1.0 };
        let mut by_class: HashMap<OutputClass, OutputMultiplier> = HashMap::new();
        for tech_id in &faction.known_techs {
            let Some(tech) = content.tech_by_id(tech_id) else { continue };
            for effect in &tech.effects {
                match effect {
                    TechEffect::FactionOutputBonus { class, fraction } => {
                        if *class == OutputClass::All {
                            entry_all.additive_bonus += fraction;
                        } else {
                            by_class.entry(*class).or_insert(OutputMultiplier { additive_bonus: 0.0, direct_multiplier: 1.0 }).additive_bonus += fraction;
                        }
                    }
                    TechEffect::FactionOutputMultiplier { class, multiplier } => {
                        if *class == OutputClass::All {
                            entry_all.direct_multiplier *= multiplier;
                        } else {
                            by_class.entry(*class).or_insert(OutputMultiplier { additive_bonus: 0.0, direct_multiplier: 1.0 }).direct_multiplier *= multiplier;
                        }
                    }
                }
            }
        }
        for class in [
            OutputClass::Mining,
            OutputClass::Industry,
            OutputClass::Research,
            OutputClass::Construction,
            OutputClass::Shipyard,
            OutputClass::Terraforming,
            OutputClass::TroopTraining,
        ] {
            let specific = by_class.get(&class).copied().unwrap_or_default();
            result.insert(
                (faction_id, class),
                OutputMultiplier {
                    additive_bonus: specific.additive_bonus + entry_all.additive_bonus,
                    direct_multiplier: specific.direct_multiplier * entry_all.direct_multiplier,
                },
            );
        }
    }
    result
}

#[must_use]
pub fn effective_multiplier(
    multipliers: &HashMap<(Id, OutputClass), OutputMultiplier>,
    faction_id: Id,
    class: OutputClass,
) -> f64 {
    multipliers
        .get(&(faction_id, class))
        .map_or(1.0, OutputMultiplier::resolve)
}

/// Whether the economy sub-passes should run this tick, given the sub-day toggle
/// and whether a day boundary was just crossed.
#[must_use]
pub fn should_run_economy(enable_subday_economy: bool, crossed_day_boundary: bool) -> bool {
    enable_subday_economy || crossed_day_boundary
}

/// `dt_days` used by economy sub-passes for a single tick of `tick_hours` hours.
#[must_use]
pub fn economy_dt_days(enable_subday_economy: bool, tick_hours: u32) -> f64 {
    if enable_subday_economy {
        f64::from(tick_hours) / 24.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economy_dt_subday_scales_with_hours() {
        assert!((economy_dt_days(true, 6) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn economy_dt_daily_mode_is_always_one_day() {
        assert_eq!(economy_dt_days(false, 6), 1.0);
    }

    #[test]
    fn should_run_economy_daily_mode_requires_boundary() {
        assert!(!should_run_economy(false, false));
        assert!(should_run_economy(false, true));
        assert!(should_run_economy(true, false));
    }
}
