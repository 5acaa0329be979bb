use crate::domain::model::{
    Aspect, AspectKind, AspectSettings, Body, BodyPosition, BodyState, Phase, Sign,
};
use std::collections::BTreeMap;

/// Fold any angle onto the shortest separation, `[0, 180]`.
pub fn norm180(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    if a <= 180.0 {
        a
    } else {
        360.0 - a
    }
}

/// Shortest angular distance between two longitudes in degrees.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    norm180((a - b).abs())
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Closest aspect kind whose orb limit admits `angle`, with its orb.
pub fn closest_aspect(angle: f64, settings: &AspectSettings) -> Option<(AspectKind, f64)> {
    let mut best: Option<(AspectKind, f64)> = None;
    for kind in AspectKind::ALL {
        let orb = (angle - kind.ideal_angle()).abs();
        if orb > settings.orb_limit(kind) {
            continue;
        }
        // 平手時保留先出現的相位
        if best.map_or(true, |(_, best_orb)| orb < best_orb) {
            best = Some((kind, orb));
        }
    }
    best
}

/// Aspect a pair of sign indices would form if it were in sign, judged by
/// sign distance alone.
pub fn expected_by_sign(sign1: usize, sign2: usize) -> Option<AspectKind> {
    match sign1.abs_diff(sign2) % 12 {
        0 => Some(AspectKind::Conjunction),
        2 | 10 => Some(AspectKind::Sextile),
        3 | 9 => Some(AspectKind::Square),
        4 | 8 => Some(AspectKind::Trine),
        6 => Some(AspectKind::Opposition),
        _ => None,
    }
}

/// Applying when one day of the faster body's motion brings the pair closer
/// to exact.
pub fn phase_of(
    kind: AspectKind,
    orb: f64,
    (lon1, speed1): (f64, f64),
    (lon2, speed2): (f64, f64),
) -> Phase {
    let ((fast_lon, fast_speed), slow_lon) = if speed1.abs() > speed2.abs() {
        ((lon1, speed1), lon2)
    } else {
        ((lon2, speed2), lon1)
    };

    let projected = (fast_lon + fast_speed).rem_euclid(360.0);
    let future_angle = angular_distance(projected, slow_lon);

    if (future_angle - kind.ideal_angle()).abs() < orb {
        Phase::Applying
    } else {
        Phase::Separating
    }
}

pub fn tightness(orb: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 0.0;
    }
    (1.0 - orb / limit).max(0.0)
}

/// Pairwise aspects for one instant. Bodies are visited in name order, so
/// `body1 < body2` for every returned aspect.
pub fn calculate_aspects(
    states: &BTreeMap<Body, BodyState>,
    settings: &AspectSettings,
) -> Vec<Aspect> {
    let bodies: Vec<(&Body, &BodyState)> = states.iter().collect();
    let mut aspects = Vec::new();

    for (i, &(&body1, state1)) in bodies.iter().enumerate() {
        for &(&body2, state2) in bodies.iter().skip(i + 1) {
            let lon1 = state1.longitude_deg;
            let lon2 = state2.longitude_deg;
            let angle = angular_distance(lon1, lon2);

            let Some((kind, orb)) = closest_aspect(angle, settings) else {
                continue;
            };

            let phase = phase_of(
                kind,
                orb,
                (lon1, state1.speed_deg_per_day),
                (lon2, state2.speed_deg_per_day),
            );

            let sign_index1 = Sign::index_of(lon1);
            let sign_index2 = Sign::index_of(lon2);
            let out_of_sign = expected_by_sign(sign_index1, sign_index2) != Some(kind);

            let weight = (settings.body_weight(body1) + settings.body_weight(body2)) / 2.0;
            let importance =
                (tightness(orb, settings.orb_limit(kind)) * weight).min(1.0);

            let position = |state: &BodyState| BodyPosition {
                lon_deg: round_to(state.longitude_deg, 2),
                sign: Sign::from_longitude(state.longitude_deg),
                speed_deg_per_day: round_to(state.speed_deg_per_day, 3),
            };
            let positions =
                BTreeMap::from([(body1, position(state1)), (body2, position(state2))]);

            aspects.push(Aspect {
                body1,
                body2,
                aspect_name: kind,
                family: kind.family().to_string(),
                vibe: kind.vibe(),
                ideal_angle_deg: kind.ideal_angle(),
                angle_measured_deg: round_to(angle, 3),
                orb_deg: round_to(orb, 3),
                phase,
                out_of_sign,
                positions,
                importance_score: round_to(importance, 3),
            });
        }
    }

    aspects
}

/// Number of aspects per kind, for the daily sanity log.
pub fn aspect_counts(aspects: &[Aspect]) -> BTreeMap<AspectKind, usize> {
    let mut counts = BTreeMap::new();
    for aspect in aspects {
        *counts.entry(aspect.aspect_name).or_insert(0) += 1;
    }
    counts
}
