//! Rule-based advisor alerts evaluated against the rolling metrics history.
//!
//! Each [`AlertRule`] is a pure predicate over recent [`MetricsSnapshot`]s.
//! [`AlertEngine`] tracks which rules are currently firing and emits
//! raised/cleared [`SimEvent`]s on state transitions only, so a steady
//! condition doesn't spam the event stream every sample.

use crate::analytics::MetricsSnapshot;
use nebula4x_core::{EventCategory, EventContext, EventLevel, SimEvent};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertDetail {
    pub id: String,
    pub severity: String,
    pub message: String,
    pub suggested_action: String,
}

type RuleFn = fn(&VecDeque<MetricsSnapshot>, &AlertEngine) -> bool;

struct AlertRule {
    id: &'static str,
    severity: &'static str,
    check: RuleFn,
    message: &'static str,
    suggested_action: &'static str,
}

const RULES: &[AlertRule] = &[
    AlertRule {
        id: "MINERAL_STOCKPILE_STALLED",
        severity: "Warning",
        check: |h, _| tail(h, 3).iter().all(|s| s.total_minerals_stockpiled_tons < 1.0 && s.ship_mining_count > 0) && h.len() >= 3,
        message: "Mineral stockpile flat despite active mining orders",
        suggested_action: "Check for depleted deposits or cargo ships stuck mid-transit",
    },
    AlertRule {
        id: "FLEET_IDLE_WITH_WORK",
        severity: "Warning",
        check: |h, _| latest(h).is_some_and(|s| s.ship_idle_count > 0),
        message: "Ships sitting idle while other alerts are active",
        suggested_action: "Assign idle ships to address active bottlenecks",
    },
    AlertRule {
        id: "POPULATION_DECLINE",
        severity: "Warning",
        check: |h, _| {
            let recent = tail(h, 5);
            let Some(newest) = recent.first() else { return false };
            let Some(oldest) = recent.last() else { return false };
            recent.len() >= 3 && newest.total_population_millions < oldest.total_population_millions * 0.95
        },
        message: "Colony population trending downward",
        suggested_action: "Check for bombardment, starvation, or troop losses",
    },
    AlertRule {
        id: "FLEET_ATTRITION_CRITICAL",
        severity: "Critical",
        check: |h, _| latest(h).is_some_and(|s| s.ship_count > 0 && s.avg_ship_hp_fraction < 0.3),
        message: "Average fleet hull integrity below 30%",
        suggested_action: "Withdraw damaged ships for repair or reinforce the engagement",
    },
    AlertRule {
        id: "RESEARCH_STALLED",
        severity: "Warning",
        check: |h, engine| {
            let recent = tail(h, 20);
            if recent.len() < 2 {
                return false;
            }
            let unchanged = max_u(&recent, |s| s.known_tech_count) == min_u(&recent, |s| s.known_tech_count);
            #[allow(clippy::cast_possible_truncation)]
            let all_unlocked = max_u(&recent, |s| s.known_tech_count) >= engine.total_techs as u32;
            unchanged && !all_unlocked
        },
        message: "No new technologies unlocked in 20+ samples",
        suggested_action: "Queue more research or bring treaty research bonuses online",
    },
    AlertRule {
        id: "HEAT_WARNING",
        severity: "Warning",
        check: |h, _| tail(h, 5).iter().all(|s| s.ships_hot_count > 0 || s.ships_critical_count > 0) && h.len() >= 5,
        message: "Ships running hot for 5+ consecutive samples",
        suggested_action: "Throttle back power policy or allow ships to cool in transit",
    },
    AlertRule {
        id: "HEAT_CRITICAL",
        severity: "Critical",
        check: |h, _| tail(h, 3).iter().all(|s| s.ships_critical_count > 0) && h.len() >= 3,
        message: "Ships at critical heat — taking wear damage",
        suggested_action: "Immediately reduce power draw or disengage from combat",
    },
    AlertRule {
        id: "MINERAL_THROUGHPUT_DROP",
        severity: "Warning",
        check: |h, _| {
            let recent = tail(h, 10);
            let longer = tail(h, 50);
            if recent.len() < 2 || longer.len() < 2 {
                return false;
            }
            let recent_delta = max_f(&recent, |s| s.total_minerals_stockpiled_tons) - min_f(&recent, |s| s.total_minerals_stockpiled_tons);
            let longer_delta = max_f(&longer, |s| s.total_minerals_stockpiled_tons) - min_f(&longer, |s| s.total_minerals_stockpiled_tons);
            longer_delta > 0.0 && recent_delta < longer_delta * 0.5
        },
        message: "Mineral accumulation rate dropped significantly",
        suggested_action: "Check for lost mining ships, depleted deposits, or combat disruption",
    },
];

fn latest(h: &VecDeque<MetricsSnapshot>) -> Option<&MetricsSnapshot> {
    h.back()
}

fn tail(h: &VecDeque<MetricsSnapshot>, n: usize) -> Vec<&MetricsSnapshot> {
    h.iter().rev().take(n).collect()
}

fn max_f(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> f32) -> f32 {
    snapshots.iter().map(|s| f(s)).fold(f32::NEG_INFINITY, f32::max)
}

fn min_f(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> f32) -> f32 {
    snapshots.iter().map(|s| f(s)).fold(f32::INFINITY, f32::min)
}

fn max_u(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> u32) -> u32 {
    snapshots.iter().map(|s| f(s)).max().unwrap_or(0)
}

fn min_u(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> u32) -> u32 {
    snapshots.iter().map(|s| f(s)).min().unwrap_or(0)
}

pub struct AlertEngine {
    active: HashSet<String>,
    total_techs: usize,
    next_seq: u64,
}

impl AlertEngine {
    #[must_use]
    pub fn new(total_techs: usize) -> Self {
        Self { active: HashSet::new(), total_techs, next_seq: 0 }
    }

    #[must_use]
    pub fn active_alert_ids(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    #[must_use]
    pub fn active_alert_details(&self) -> Vec<AlertDetail> {
        RULES
            .iter()
            .filter(|rule| self.active.contains(rule.id))
            .map(|rule| AlertDetail {
                id: rule.id.to_string(),
                severity: rule.severity.to_string(),
                message: rule.message.to_string(),
                suggested_action: rule.suggested_action.to_string(),
            })
            .collect()
    }

    /// Evaluates all rules against recent metrics history, returning events for
    /// any raised/cleared transitions. `day`/`hour` stamp the emitted events.
    pub fn evaluate(&mut self, history: &VecDeque<MetricsSnapshot>, day: i64, hour: u8) -> Vec<SimEvent> {
        let mut events = Vec::new();

        for rule in RULES {
            let fired = (rule.check)(history, self);
            let was_active = self.active.contains(rule.id);

            if fired && !was_active {
                if rule.id == "FLEET_IDLE_WITH_WORK" && self.active.is_empty() {
                    continue;
                }
                self.active.insert(rule.id.to_string());
                events.push(self.make_event(
                    day,
                    hour,
                    EventLevel::Warn,
                    format!("[{}] {} ({})", rule.id, rule.message, rule.suggested_action),
                ));
            } else if !fired && was_active {
                self.active.remove(rule.id);
                events.push(self.make_event(day, hour, EventLevel::Info, format!("[{}] cleared", rule.id)));
            }
        }

        events
    }

    fn make_event(&mut self, day: i64, hour: u8, level: EventLevel, message: String) -> SimEvent {
        let seq = self.next_seq;
        self.next_seq += 1;
        SimEvent { seq, day, hour, level, category: EventCategory::System, message, context: EventContext::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot(day: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            day,
            metrics_version: 1,
            faction_count: 0,
            system_count: 0,
            colony_count: 0,
            total_population_millions: 0.0,
            total_minerals_stockpiled_tons: 0.0,
            ship_count: 0,
            ship_idle_count: 0,
            ship_mining_count: 0,
            ship_transiting_count: 0,
            ship_combat_count: 0,
            avg_ship_hp_fraction: 1.0,
            avg_ship_fuel_fraction: 1.0,
            ships_hot_count: 0,
            ships_critical_count: 0,
            known_tech_count: 0,
            techs_total: 0,
            contact_count: 0,
            deposit_site_count: 0,
            depleted_deposit_count: 0,
            events_today_info: 0,
            events_today_warn: 0,
            events_today_error: 0,
        }
    }

    #[test]
    fn new_engine_has_no_active_alerts() {
        let engine = AlertEngine::new(5);
        assert!(engine.active_alert_ids().is_empty());
    }

    #[test]
    fn evaluate_with_empty_history_fires_nothing() {
        let history = VecDeque::new();
        let mut engine = AlertEngine::new(5);
        let events = engine.evaluate(&history, 1, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn evaluate_raises_and_clears_fleet_attrition() {
        let mut history = VecDeque::new();
        let mut engine = AlertEngine::new(5);

        let mut snap = empty_snapshot(1);
        snap.ship_count = 2;
        snap.avg_ship_hp_fraction = 0.1;
        history.push_back(snap);

        let events = engine.evaluate(&history, 1, 0);
        assert!(events.iter().any(|e| e.message.contains("FLEET_ATTRITION_CRITICAL")));
        assert!(engine.active_alert_ids().contains(&"FLEET_ATTRITION_CRITICAL".to_string()));

        let events = engine.evaluate(&history, 2, 0);
        assert!(events.is_empty(), "steady condition should not re-fire");

        history.clear();
        let mut snap = empty_snapshot(3);
        snap.ship_count = 2;
        snap.avg_ship_hp_fraction = 0.9;
        history.push_back(snap);

        let events = engine.evaluate(&history, 3, 0);
        assert!(events.iter().any(|e| e.message.contains("cleared")));
        assert!(!engine.active_alert_ids().contains(&"FLEET_ATTRITION_CRITICAL".to_string()));
    }

    #[test]
    fn fleet_idle_requires_other_active_alert() {
        let mut history = VecDeque::new();
        let mut engine = AlertEngine::new(5);

        let mut snap = empty_snapshot(1);
        snap.ship_idle_count = 2;
        history.push_back(snap);

        let events = engine.evaluate(&history, 1, 0);
        assert!(!events.iter().any(|e| e.message.contains("FLEET_IDLE_WITH_WORK")), "should not fire without other active alerts");
    }

    #[test]
    fn heat_critical_needs_consecutive_samples() {
        let mut history = VecDeque::new();
        let mut engine = AlertEngine::new(5);

        let mut snap = empty_snapshot(1);
        snap.ships_critical_count = 1;
        history.push_back(snap);

        let events = engine.evaluate(&history, 1, 0);
        assert!(!events.iter().any(|e| e.message.contains("HEAT_CRITICAL")), "one sample should not fire HEAT_CRITICAL");

        for day in 2..=3 {
            let mut snap = empty_snapshot(day);
            snap.ships_critical_count = 1;
            history.push_back(snap);
        }
        let events = engine.evaluate(&history, 3, 0);
        assert!(events.iter().any(|e| e.message.contains("HEAT_CRITICAL")), "3 consecutive samples should fire HEAT_CRITICAL");
    }

    #[test]
    fn active_alert_details_returns_full_info() {
        let mut history = VecDeque::new();
        let mut engine = AlertEngine::new(5);

        let mut snap = empty_snapshot(1);
        snap.ship_count = 2;
        snap.avg_ship_hp_fraction = 0.1;
        history.push_back(snap);
        engine.evaluate(&history, 1, 0);

        let details = engine.active_alert_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].id, "FLEET_ATTRITION_CRITICAL");
        assert!(!details[0].message.is_empty());
        assert_eq!(details[0].severity, "Critical");
    }
}
