//! Keplerian orbit integration for [`crate::types::Body`] positions. Pure function
//! of `(elements, time)`; no mutable state is carried between calls.

use crate::id::Id;
use crate::spatial::Point2;
use crate::types::Body;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: u32 = 12;
const CONVERGENCE_THRESHOLD: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub semi_major_axis_mkm: f64,
    pub eccentricity: f64,
    pub period_days: f64,
    pub argument_of_periapsis_rad: f64,
    pub mean_anomaly_phase_rad: f64,
}

/// Solves Kepler's equation `M = E - e*sin(E)` by Newton iteration.
#[must_use]
pub fn solve_eccentric_anomaly(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut e = if eccentricity < 0.8 { mean_anomaly } else { PI };
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let f = e - eccentricity * e.sin() - mean_anomaly;
        let f_prime = 1.0 - eccentricity * e.cos();
        if f_prime.abs() < f64::EPSILON {
            break;
        }
        let delta = f / f_prime;
        e -= delta;
        if delta.abs() < CONVERGENCE_THRESHOLD {
            break;
        }
    }
    e
}

/// Position of a body relative to its immediate parent, at time `t` days, in the
/// orbital plane rotated by the argument of periapsis.
#[must_use]
pub fn relative_position(elements: &OrbitalElements, t_days: f64) -> Point2 {
    if elements.period_days <= 0.0 {
        return Point2::new(0.0, 0.0);
    }
    let two_pi = 2.0 * PI;
    let mut mean_anomaly =
        elements.mean_anomaly_phase_rad + two_pi * t_days / elements.period_days;
    mean_anomaly = mean_anomaly.rem_euclid(two_pi);

    let e = solve_eccentric_anomaly(mean_anomaly, elements.eccentricity);
    let a = elements.semi_major_axis_mkm;
    let ecc = elements.eccentricity;
    let x = a * (e.cos() - ecc);
    let y = a * (1.0 - ecc * ecc).sqrt() * e.sin();

    let omega = elements.argument_of_periapsis_rad;
    let (sin_o, cos_o) = omega.sin_cos();
    Point2::new(x * cos_o - y * sin_o, x * sin_o + y * cos_o)
}

/// Walks a body's `parent_body_id` chain, summing each link's
/// `relative_position` at time `t_days`, until it reaches a body with no
/// parent (the system's anchor). A cycle in the parent chain (content error)
/// is broken by a visited-set guard: the cycle's own offset is dropped and
/// resolution stops at the repeated body instead of looping forever.
#[must_use]
pub fn resolve_absolute_position(bodies: &HashMap<Id, Body>, body_id: Id, t_days: f64) -> Point2 {
    let mut position = Point2::new(0.0, 0.0);
    let mut visited: HashSet<Id> = HashSet::new();
    let mut current = body_id;
    loop {
        if !visited.insert(current) {
            break;
        }
        let Some(body) = bodies.get(&current) else { break };
        let offset = relative_position(&body.elements, t_days);
        position.x += offset.x;
        position.y += offset.y;
        match body.parent_body_id {
            Some(parent) => current = parent,
            None => break,
        }
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BodyKind;

    fn leaf_body(id: Id, parent: Option<Id>, elements: OrbitalElements) -> Body {
        Body {
            id,
            system_id: Id(1),
            name: format!("body-{}", id.0),
            kind: BodyKind::Moon,
            parent_body_id: parent,
            elements,
            position: Point2::new(0.0, 0.0),
            mass_earth: 0.01,
            radius_km: 1000.0,
            mineral_deposits: HashMap::new(),
            surface_temp_k: 200.0,
            atmosphere_atm: 0.0,
            terraforming: None,
        }
    }

    #[test]
    fn resolves_through_parent_chain() {
        let star = leaf_body(Id(1), None, circular(0.0, 0.0));
        let planet = leaf_body(Id(2), Some(Id(1)), circular(150.0, 365.25));
        let moon = leaf_body(Id(3), Some(Id(2)), circular(1.0, 10.0));
        let mut bodies = HashMap::new();
        bodies.insert(Id(1), star);
        bodies.insert(Id(2), planet);
        bodies.insert(Id(3), moon);

        let planet_pos = relative_position(&bodies[&Id(2)].elements, 0.0);
        let moon_pos = relative_position(&bodies[&Id(3)].elements, 0.0);
        let expected = Point2::new(planet_pos.x + moon_pos.x, planet_pos.y + moon_pos.y);
        let resolved = resolve_absolute_position(&bodies, Id(3), 0.0);
        assert!((resolved.x - expected.x).abs() < 1e-9);
        assert!((resolved.y - expected.y).abs() < 1e-9);
    }

    #[test]
    fn cycle_in_parent_chain_terminates() {
        let mut a = leaf_body(Id(1), Some(Id(2)), circular(10.0, 100.0));
        let b = leaf_body(Id(2), Some(Id(1)), circular(20.0, 200.0));
        a.parent_body_id = Some(Id(2));
        let mut bodies = HashMap::new();
        bodies.insert(Id(1), a);
        bodies.insert(Id(2), b);

        let resolved = resolve_absolute_position(&bodies, Id(1), 0.0);
        assert!(resolved.x.is_finite() && resolved.y.is_finite());
    }

    #[test]
    fn missing_body_resolves_to_origin() {
        let bodies: HashMap<Id, Body> = HashMap::new();
        let resolved = resolve_absolute_position(&bodies, Id(99), 0.0);
        assert_eq!(resolved, Point2::new(0.0, 0.0));
    }

    fn circular(a: f64, period: f64) -> OrbitalElements {
        OrbitalElements {
            semi_major_axis_mkm: a,
            eccentricity: 0.0,
            period_days: period,
            argument_of_periapsis_rad: 0.0,
            mean_anomaly_phase_rad: 0.0,
        }
    }

    #[test]
    fn circular_orbit_radius_is_constant() {
        let elements = circular(150.0, 365.25);
        for day in [0.0, 10.0, 91.0, 182.0, 364.0] {
            let p = relative_position(&elements, day);
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 150.0).abs() < 1e-6, "day {day}: r={r}");
        }
    }

    #[test]
    fn quarter_period_is_quarter_turn_for_circular_orbit() {
        let elements = circular(100.0, 400.0);
        let start = relative_position(&elements, 0.0);
        let quarter = relative_position(&elements, 100.0);
        assert!((start.x - 100.0).abs() < 1e-6);
        assert!(start.y.abs() < 1e-6);
        assert!(quarter.x.abs() < 1e-6);
        assert!((quarter.y - 100.0).abs() < 1e-6);
    }

    #[test]
    fn eccentric_orbit_converges_and_is_deterministic() {
        let elements = OrbitalElements {
            semi_major_axis_mkm: 200.0,
            eccentricity: 0.6,
            period_days: 500.0,
            argument_of_periapsis_rad: 0.3,
            mean_anomaly_phase_rad: 1.1,
        };
        let a = relative_position(&elements, 123.456);
        let b = relative_position(&elements, 123.456);
        assert_eq!(a, b);
    }

    #[test]
    fn high_eccentricity_seeds_from_pi_and_still_converges() {
        let mean_anomaly = 0.01;
        let e = solve_eccentric_anomaly(mean_anomaly, 0.95);
        let residual = e - 0.95 * e.sin() - mean_anomaly;
        assert!(residual.abs() < 1e-8);
    }

    #[test]
    fn zero_period_collapses_to_origin() {
        let elements = OrbitalElements {
            semi_major_axis_mkm: 10.0,
            eccentricity: 0.1,
            period_days: 0.0,
            argument_of_periapsis_rad: 0.0,
            mean_anomaly_phase_rad: 0.0,
        };
        let p = relative_position(&elements, 5.0);
        assert_eq!(p, Point2::new(0.0, 0.0));
    }
}
