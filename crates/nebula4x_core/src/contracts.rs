//! Contract lifecycle: factions periodically get offered bounties against
//! dynamic points of interest (unresolved anomalies, wrecks, unsurveyed jump
//! points) in systems they've discovered. Offers expire if unaccepted;
//! accepted contracts resolve automatically once their target is resolved by
//! any means (not necessarily the assignee directly finishing the work).

use crate::id::Id;
use crate::rng::HashRng;
use crate::sorted::sorted_keys;
use crate::types::{
    Contract, ContractKind, ContractStatus, EngineConfig, EventCategory, EventContext, EventLevel, SimEvent, State,
};

fn candidate_targets(state: &State, faction_id: Id) -> Vec<(ContractKind, Id, Id)> {
    let Some(faction) = state.factions.get(&faction_id) else { return Vec::new() };
    let mut candidates = Vec::new();
    for anomaly_id in sorted_keys(&state.anomalies) {
        let anomaly = &state.anomalies[&anomaly_id];
        if !anomaly.resolved && faction.discovered_systems.contains(&anomaly.system_id) {
            candidates.push((ContractKind::InvestigateAnomaly, anomaly.system_id, anomaly_id));
        }
    }
    for wreck_id in sorted_keys(&state.wrecks) {
        let wreck = &state.wrecks[&wreck_id];
        if faction.discovered_systems.contains(&wreck.system_id) {
            candidates.push((ContractKind::SalvageWreck, wreck.system_id, wreck_id));
        }
    }
    for jp_id in sorted_keys(&state.jump_points) {
        let jp = &state.jump_points[&jp_id];
        if faction.discovered_systems.contains(&jp.system_id)
            && faction.surveyed_jump_points.get(&jp_id).copied().unwrap_or(0.0) < 1.0
        {
            candidates.push((ContractKind::SurveyJumpPoint, jp.system_id, jp_id));
        }
    }
    candidates
}

fn target_resolved(state: &State, kind: ContractKind, target_id: Id) -> bool {
    match kind {
        ContractKind::InvestigateAnomaly => state.anomalies.get(&target_id).is_none_or(|a| a.resolved),
        ContractKind::SalvageWreck => !state.wrecks.contains_key(&target_id),
        ContractKind::SurveyJumpPoint => true, // resolved lazily below against the assignee's faction
    }
}

pub fn tick_contracts(state: &mut State, config: &EngineConfig, dt_days: f64, events: &mut Vec<SimEvent>) {
    if !config.contracts.enabled {
        return;
    }
    let cfg = &config.contracts;
    let today = state.date.day;
    let hour = state.date.hour_of_day;

    for contract_id in sorted_keys(&state.contracts) {
        let contract = state.contracts[&contract_id].clone();
        if matches!(contract.status, ContractStatus::Completed | ContractStatus::Failed | ContractStatus::Expired) {
            continue;
        }
        if today > contract.expires_day {
            state.contracts.get_mut(&contract_id).unwrap().status = ContractStatus::Expired;
            continue;
        }
        if contract.status != ContractStatus::Accepted {
            continue;
        }
        let resolved = match contract.kind {
            ContractKind::SurveyJumpPoint => contract
                .assignee_faction_id
                .and_then(|f| state.factions.get(&f))
                .is_some_and(|f| f.surveyed_jump_points.get(&contract.target_id).copied().unwrap_or(0.0) >= 1.0),
            _ => target_resolved(state, contract.kind, contract.target_id),
        };
        if resolved {
            let c = state.contracts.get_mut(&contract_id).unwrap();
            c.status = ContractStatus::Completed;
            c.resolved_day = Some(today);
            if let Some(assignee) = contract.assignee_faction_id {
                if let Some(faction) = state.factions.get_mut(&assignee) {
                    faction.research_progress_points += contract.research_point_reward;
                }
                events.push(SimEvent {
                    seq: 0,
                    day: today,
                    hour,
                    level: EventLevel::Info,
                    category: EventCategory::Contract,
                    message: format!("faction {assignee} completed contract {contract_id}"),
                    context: EventContext { faction_id: Some(assignee), ..Default::default() },
                });
            }
        }
    }

    for faction_id in sorted_keys(&state.factions) {
        let offered_count = state
            .contracts
            .values()
            .filter(|c| c.issuer_faction_id == faction_id && c.status == ContractStatus::Offered)
            .count() as u32;
        if offered_count >= cfg.max_offers_per_faction {
            continue;
        }
        let mut rng = HashRng::derive(state.seed ^ (today as u64) ^ faction_id.0, 0xCD17_0FF5);
        let expected_new = f64::from(cfg.daily_new_offers_per_faction) * dt_days;
        if rng.next_u01() >= expected_new.min(1.0) {
            continue;
        }
        let candidates = candidate_targets(state, faction_id);
        let already_offered: std::collections::HashSet<Id> = state
            .contracts
            .values()
            .filter(|c| c.issuer_faction_id == faction_id)
            .map(|c| c.target_id)
            .collect();
        let Some(&(kind, system_id, target_id)) =
            candidates.iter().find(|(_, _, t)| !already_offered.contains(t))
        else {
            continue;
        };
        let estimated_hops = 1;
        let estimated_risk = state
            .systems
            .get(&system_id)
            .and_then(|s| s.region_id)
            .and_then(|r| state.regions.get(&r))
            .map_or(0.1, |r| r.pirate_risk);
        let reward = cfg.reward_base + cfg.reward_per_hop * f64::from(estimated_hops) + cfg.reward_per_risk * estimated_risk;
        let id = state.ids.next();
        state.contracts.insert(
            id,
            Contract {
                id,
                kind,
                status: ContractStatus::Offered,
                issuer_faction_id: faction_id,
                assignee_faction_id: None,
                system_id,
                target_id,
                offered_day: today,
                accepted_day: None,
                resolved_day: None,
                expires_day: today + cfg.offer_expiry_days,
                estimated_hops,
                estimated_risk,
                research_point_reward: reward,
                name: format!("{kind:?} contract {id}"),
                assigned_ship_id: None,
                assigned_fleet_id: None,
            },
        );
    }
}

/// Accepts an offered contract on behalf of `assignee_faction_id`. Rejects if
/// the contract is unknown or not currently offered.
pub fn accept_contract(
    state: &mut State,
    contract_id: Id,
    assignee_faction_id: Id,
    today: i64,
) -> Result<(), crate::errors::ValidationError> {
    let contract = state
        .contracts
        .get_mut(&contract_id)
        .ok_or(crate::errors::ValidationError::UnknownEntity(contract_id))?;
    if contract.status != ContractStatus::Offered {
        return Err(crate::errors::ValidationError::InvalidContractState(contract_id));
    }
    contract.status = ContractStatus::Accepted;
    contract.assignee_faction_id = Some(assignee_faction_id);
    contract.accepted_day = Some(today);
    Ok(())
}

/// Abandons an accepted contract, reopening it as a fresh offer (clears the
/// assignee/ship/fleet but keeps the original issuer and reward terms).
pub fn abandon_contract(state: &mut State, contract_id: Id) -> Result<(), crate::errors::ValidationError> {
    let contract = state
        .contracts
        .get_mut(&contract_id)
        .ok_or(crate::errors::ValidationError::UnknownEntity(contract_id))?;
    if contract.status != ContractStatus::Accepted {
        return Err(crate::errors::ValidationError::InvalidContractState(contract_id));
    }
    contract.status = ContractStatus::Offered;
    contract.assignee_faction_id = None;
    contract.accepted_day = None;
    contract.assigned_ship_id = None;
    contract.assigned_fleet_id = None;
    Ok(())
}

/// Assigns a specific ship to carry out an already-accepted contract; does not
/// itself issue any order, callers are expected to also route the ship there.
pub fn assign_contract_to_ship(state: &mut State, contract_id: Id, ship_id: Id) -> Result<(), crate::errors::ValidationError> {
    if !state.ships.contains_key(&ship_id) {
        return Err(crate::errors::ValidationError::UnknownEntity(ship_id));
    }
    let contract = state
        .contracts
        .get_mut(&contract_id)
        .ok_or(crate::errors::ValidationError::UnknownEntity(contract_id))?;
    if contract.status != ContractStatus::Accepted {
        return Err(crate::errors::ValidationError::InvalidContractState(contract_id));
    }
    contract.assigned_ship_id = Some(ship_id);
    contract.assigned_fleet_id = None;
    Ok(())
}

/// Assigns a fleet to carry out an already-accepted contract, clearing any
/// single-ship assignment.
pub fn assign_contract_to_fleet(state: &mut State, contract_id: Id, fleet_id: Id) -> Result<(), crate::errors::ValidationError> {
    if !state.fleets.contains_key(&fleet_id) {
        return Err(crate::errors::ValidationError::UnknownEntity(fleet_id));
    }
    let contract = state
        .contracts
        .get_mut(&contract_id)
        .ok_or(crate::errors::ValidationError::UnknownEntity(contract_id))?;
    if contract.status != ContractStatus::Accepted {
        return Err(crate::errors::ValidationError::InvalidContractState(contract_id));
    }
    contract.assigned_fleet_id = Some(fleet_id);
    contract.assigned_ship_id = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::two_system_state;

    #[test]
    fn expired_offer_transitions_to_expired_status() {
        let mut state = two_system_state();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        let id = state.ids.next();
        state.contracts.insert(
            id,
            Contract {
                id,
                kind: ContractKind::SalvageWreck,
                status: ContractStatus::Offered,
                issuer_faction_id: faction_id,
                assignee_faction_id: None,
                system_id: *state.systems.keys().next().unwrap(),
                target_id: Id(9999),
                offered_day: 0,
                accepted_day: None,
                resolved_day: None,
                expires_day: 1,
                estimated_hops: 1,
                estimated_risk: 0.1,
                research_point_reward: 10.0,
                name: "test".to_string(),
                assigned_ship_id: None,
                assigned_fleet_id: None,
            },
        );
        state.date.day = 5;
        let mut events = Vec::new();
        tick_contracts(&mut state, &config, 1.0, &mut events);
        assert_eq!(state.contracts[&id].status, ContractStatus::Expired);
    }

    #[test]
    fn accepted_contract_completes_when_wreck_is_gone() {
        let mut state = two_system_state();
        let config = EngineConfig::default();
        let faction_id = *state.factions.keys().next().unwrap();
        let id = state.ids.next();
        state.contracts.insert(
            id,
            Contract {
                id,
                kind: ContractKind::SalvageWreck,
                status: ContractStatus::Accepted,
                issuer_faction_id: faction_id,
                assignee_faction_id: Some(faction_id),
                system_id: *state.systems.keys().next().unwrap(),
                target_id: Id(9999),
                offered_day: 0,
                accepted_day: Some(0),
                resolved_day: None,
                expires_day: 30,
                estimated_hops: 1,
                estimated_risk: 0.1,
                research_point_reward: 10.0,
                name: "test".to_string(),
                assigned_ship_id: None,
                assigned_fleet_id: None,
            },
        );
        let mut events = Vec::new();
        tick_contracts(&mut state, &config, 1.0, &mut events);
        assert_eq!(state.contracts[&id].status, ContractStatus::Completed);
    }

    fn accepted_contract(state: &mut State, faction_id: Id) -> Id {
        let id = state.ids.next();
        state.contracts.insert(
            id,
            Contract {
                id,
                kind: ContractKind::SalvageWreck,
                status: ContractStatus::Accepted,
                issuer_faction_id: faction_id,
                assignee_faction_id: Some(faction_id),
                system_id: *state.systems.keys().next().unwrap(),
                target_id: Id(9999),
                offered_day: 0,
                accepted_day: Some(0),
                resolved_day: None,
                expires_day: 30,
                estimated_hops: 1,
                estimated_risk: 0.1,
                research_point_reward: 10.0,
                name: "test".to_string(),
                assigned_ship_id: None,
                assigned_fleet_id: None,
            },
        );
        id
    }

    #[test]
    fn abandon_contract_reopens_it_as_an_offer() {
        let mut state = two_system_state();
        let faction_id = *state.factions.keys().next().unwrap();
        let id = accepted_contract(&mut state, faction_id);
        abandon_contract(&mut state, id).unwrap();
        assert_eq!(state.contracts[&id].status, ContractStatus::Offered);
        assert!(state.contracts[&id].assignee_faction_id.is_none());
    }

    #[test]
    fn assigning_a_ship_clears_any_fleet_assignment() {
        let mut state = two_system_state();
        let faction_id = *state.factions.keys().next().unwrap();
        let id = accepted_contract(&mut state, faction_id);
        let sys = *state.systems.keys().next().unwrap();
        let design = crate::test_fixtures::basic_design(&mut state);
        let ship = crate::test_fixtures::spawn_ship(&mut state, faction_id, sys, design, crate::spatial::Point2::new(0.0, 0.0));
        state.contracts.get_mut(&id).unwrap().assigned_fleet_id = Some(Id(42));
        assign_contract_to_ship(&mut state, id, ship).unwrap();
        assert_eq!(state.contracts[&id].assigned_ship_id, Some(ship));
        assert!(state.contracts[&id].assigned_fleet_id.is_none());
    }
}
