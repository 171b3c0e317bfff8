//! Diplomatic status and treaties between factions. Cross-cutting: orders
//! validate against it (`TreatyViolation`), the economy reads active treaties
//! for trade/research bonuses, AI avoids picking fights with allies.
//!
//! Status is stored per-faction (`Faction::diplomacy`) but always written
//! symmetrically — `a`'s view of `b` and `b`'s view of `a` are kept in lockstep
//! so a single `diplomatic_status_with` lookup from either side agrees.

use crate::errors::ValidationError;
use crate::id::Id;
use crate::types::{DiplomaticStatus, State, Treaty, TreatyKind};

/// Sets `a`'s and `b`'s view of each other to `status` in the same call, so
/// the relation can never observably desync.
pub fn set_diplomatic_status(
    state: &mut State,
    a: Id,
    b: Id,
    status: DiplomaticStatus,
) -> Result<(), ValidationError> {
    if !state.factions.contains_key(&a) {
        return Err(ValidationError::UnknownEntity(a));
    }
    if !state.factions.contains_key(&b) {
        return Err(ValidationError::UnknownEntity(b));
    }
    if a == b {
        return Ok(());
    }
    state.factions.get_mut(&a).unwrap().diplomacy.insert(b, status);
    state.factions.get_mut(&b).unwrap().diplomacy.insert(a, status);
    Ok(())
}

/// Proposes (immediately records — there is no acceptance handshake modeled)
/// a treaty between `a` and `b`. `duration_days <= 0` means indefinite.
pub fn propose_treaty(
    state: &mut State,
    kind: TreatyKind,
    a: Id,
    b: Id,
    duration_days: i64,
) -> Result<(), ValidationError> {
    if !state.factions.contains_key(&a) {
        return Err(ValidationError::UnknownEntity(a));
    }
    if !state.factions.contains_key(&b) {
        return Err(ValidationError::UnknownEntity(b));
    }
    if a == b {
        return Ok(());
    }
    let today = state.date.day;
    let treaty = Treaty::normalized(kind, a, b, today, duration_days);
    state.treaties.retain(|t| !(t.faction_a == treaty.faction_a && t.faction_b == treaty.faction_b && t.kind == kind));
    state.treaties.push(treaty);
    if kind == TreatyKind::Alliance {
        set_diplomatic_status(state, a, b, DiplomaticStatus::Allied)?;
    } else if matches!(state.factions[&a].diplomatic_status_with(b), DiplomaticStatus::Hostile) {
        set_diplomatic_status(state, a, b, DiplomaticStatus::Neutral)?;
    }
    Ok(())
}

/// Cancels every active treaty of `kind` between `a` and `b`. Does not itself
/// change diplomatic status — an alliance treaty lapsing doesn't automatically
/// make two factions hostile again, that's a separate call.
pub fn cancel_treaty(state: &mut State, kind: TreatyKind, a: Id, b: Id) {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    state.treaties.retain(|t| !(t.faction_a == lo && t.faction_b == hi && t.kind == kind));
}

/// Whether `faction_id` may build `installation_id`: either it's globally
/// available (content never gates it behind a tech) or the faction has
/// unlocked it via a completed tech.
#[must_use]
pub fn is_installation_buildable_for_faction(state: &State, faction_id: Id, installation_id: &str) -> bool {
    let globally_gated = state
        .factions
        .values()
        .any(|f| f.unlocked_installations.contains(installation_id));
    if !globally_gated {
        return true;
    }
    state
        .factions
        .get(&faction_id)
        .is_some_and(|f| f.unlocked_installations.contains(installation_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::two_system_state;
    use crate::types::ControlMode;

    #[test]
    fn set_status_is_symmetric() {
        let mut state = two_system_state();
        let a = *state.factions.keys().next().unwrap();
        let b = crate::test_fixtures::empty_faction_in(&mut state, "Rival", ControlMode::Player);
        set_diplomatic_status(&mut state, a, b, DiplomaticStatus::Hostile).unwrap();
        assert_eq!(state.factions[&a].diplomatic_status_with(b), DiplomaticStatus::Hostile);
        assert_eq!(state.factions[&b].diplomatic_status_with(a), DiplomaticStatus::Hostile);
    }

    #[test]
    fn alliance_treaty_sets_allied_status() {
        let mut state = two_system_state();
        let a = *state.factions.keys().next().unwrap();
        let b = crate::test_fixtures::empty_faction_in(&mut state, "Ally", ControlMode::Player);
        propose_treaty(&mut state, TreatyKind::Alliance, a, b, 0).unwrap();
        assert!(state.factions[&a].is_allied_with(b));
        assert_eq!(state.treaties.len(), 1);
    }

    #[test]
    fn cancel_treaty_removes_only_matching_kind() {
        let mut state = two_system_state();
        let a = *state.factions.keys().next().unwrap();
        let b = crate::test_fixtures::empty_faction_in(&mut state, "Partner", ControlMode::Player);
        propose_treaty(&mut state, TreatyKind::TradeAgreement, a, b, 0).unwrap();
        propose_treaty(&mut state, TreatyKind::ResearchAgreement, a, b, 0).unwrap();
        cancel_treaty(&mut state, TreatyKind::TradeAgreement, a, b);
        assert_eq!(state.treaties.len(), 1);
        assert_eq!(state.treaties[0].kind, TreatyKind::ResearchAgreement);
    }

    #[test]
    fn installation_buildable_when_ungated() {
        let state = two_system_state();
        let a = *state.factions.keys().next().unwrap();
        assert!(is_installation_buildable_for_faction(&state, a, "mine_basic"));
    }
}
