use crate::core::aspects::{round_to, tightness};
use crate::domain::model::AspectKind::{Opposition, Quincunx, Sextile, Square, Trine};
use crate::domain::model::{
    Aspect, AspectKind, AspectSettings, Body, Pattern, PatternEdge, PatternKind,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Strength penalty when any edge of a pattern is out of sign.
const OUT_OF_SIGN_PENALTY: f64 = 0.10;
/// Strength bonus when the Sun or Moon takes part.
const LUMINARY_BONUS: f64 = 0.05;

/// Day's aspects indexed by unordered body pair.
pub struct AspectGraph<'a> {
    by_pair: HashMap<(Body, Body), &'a Aspect>,
    bodies: Vec<Body>,
}

fn pair(a: Body, b: Body) -> (Body, Body) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl<'a> AspectGraph<'a> {
    pub fn new(aspects: &'a [Aspect]) -> Self {
        let mut by_pair = HashMap::new();
        let mut bodies = BTreeSet::new();
        for aspect in aspects {
            by_pair.insert(pair(aspect.body1, aspect.body2), aspect);
            bodies.insert(aspect.body1);
            bodies.insert(aspect.body2);
        }
        Self {
            by_pair,
            bodies: bodies.into_iter().collect(),
        }
    }

    /// Bodies taking part in at least one aspect, in name order.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn has(&self, a: Body, b: Body, kind: AspectKind) -> bool {
        self.edge(a, b, kind).is_some()
    }

    pub fn edge(&self, a: Body, b: Body, kind: AspectKind) -> Option<&'a Aspect> {
        self.by_pair
            .get(&pair(a, b))
            .copied()
            .filter(|aspect| aspect.aspect_name == kind)
    }

    fn triples(&self) -> impl Iterator<Item = [Body; 3]> + '_ {
        let b = &self.bodies;
        let n = b.len();
        (0..n).flat_map(move |i| {
            (i + 1..n).flat_map(move |j| (j + 1..n).map(move |k| [b[i], b[j], b[k]]))
        })
    }

    fn quads(&self) -> impl Iterator<Item = [Body; 4]> + '_ {
        let b = &self.bodies;
        let n = b.len();
        (0..n).flat_map(move |i| {
            (i + 1..n).flat_map(move |j| {
                (j + 1..n).flat_map(move |k| (k + 1..n).map(move |m| [b[i], b[j], b[k], b[m]]))
            })
        })
    }
}

/// Collects patterns, dropping repeats of the same type over the same members.
#[derive(Default)]
struct PatternSet {
    seen: HashSet<(PatternKind, Vec<Body>)>,
    patterns: Vec<Pattern>,
}

impl PatternSet {
    fn insert(&mut self, kind: PatternKind, members: &[Body], edges: Vec<PatternEdge>) {
        let mut members = members.to_vec();
        members.sort();
        if !self.seen.insert((kind, members.clone())) {
            return;
        }
        self.patterns.push(Pattern {
            pattern_type: kind,
            members,
            edges,
            pattern_score: kind.base_score(),
            has_out_of_sign: false,
            pattern_strength_score: 0.0,
        });
    }

    fn into_vec(self) -> Vec<Pattern> {
        self.patterns
    }
}

/// Two bodies in sextile, both quincunx a third (the apex).
pub fn detect_yods(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for [a1, a2, a3] in graph.triples() {
        for (a, b, apex) in [(a1, a2, a3), (a1, a3, a2), (a2, a3, a1)] {
            if graph.has(a, b, Sextile) && graph.has(a, apex, Quincunx) && graph.has(b, apex, Quincunx)
            {
                set.insert(
                    PatternKind::Yod,
                    &[a, b, apex],
                    vec![
                        PatternEdge::new(Sextile, a, b),
                        PatternEdge::new(Quincunx, a, apex),
                        PatternEdge::new(Quincunx, b, apex),
                    ],
                );
            }
        }
    }
    set.into_vec()
}

/// An opposition with both ends square to a third body.
pub fn detect_tsquares(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for [a, b, c] in graph.triples() {
        for (x, y, z) in [(a, b, c), (a, c, b), (b, c, a)] {
            if graph.has(x, y, Opposition) && graph.has(x, z, Square) && graph.has(y, z, Square) {
                set.insert(
                    PatternKind::TSquare,
                    &[x, y, z],
                    vec![
                        PatternEdge::new(Opposition, x, y),
                        PatternEdge::new(Square, x, z),
                        PatternEdge::new(Square, y, z),
                    ],
                );
            }
        }
    }
    set.into_vec()
}

fn is_grand_trine(graph: &AspectGraph, [a, b, c]: [Body; 3]) -> bool {
    graph.has(a, b, Trine) && graph.has(a, c, Trine) && graph.has(b, c, Trine)
}

fn trine_edges([a, b, c]: [Body; 3]) -> Vec<PatternEdge> {
    vec![
        PatternEdge::new(Trine, a, b),
        PatternEdge::new(Trine, a, c),
        PatternEdge::new(Trine, b, c),
    ]
}

pub fn detect_grand_trines(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for triple in graph.triples() {
        if is_grand_trine(graph, triple) {
            set.insert(PatternKind::GrandTrine, &triple, trine_edges(triple));
        }
    }
    set.into_vec()
}

/// A grand trine plus a fourth body opposite one corner and sextile to the
/// other two.
pub fn detect_kites(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for triple in graph.triples() {
        if !is_grand_trine(graph, triple) {
            continue;
        }
        let [a, b, c] = triple;
        for &d in graph.bodies() {
            if triple.contains(&d) {
                continue;
            }
            for (opposite, s1, s2) in [(a, b, c), (b, a, c), (c, a, b)] {
                if graph.has(d, opposite, Opposition)
                    && graph.has(d, s1, Sextile)
                    && graph.has(d, s2, Sextile)
                {
                    let mut edges = trine_edges(triple);
                    edges.extend([
                        PatternEdge::new(Opposition, d, opposite),
                        PatternEdge::new(Sextile, d, s1),
                        PatternEdge::new(Sextile, d, s2),
                    ]);
                    set.insert(PatternKind::Kite, &[a, b, c, d], edges);
                }
            }
        }
    }
    set.into_vec()
}

/// Ways to split four bodies into two pairs.
fn pairings([a, b, c, d]: [Body; 4]) -> [(Body, Body, Body, Body); 3] {
    [(a, c, b, d), (a, b, c, d), (a, d, b, c)]
}

/// Two oppositions whose ends are joined alternately by sextiles and trines.
pub fn detect_mystic_rectangles(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for quad in graph.quads() {
        for (x, y, u, v) in pairings(quad) {
            if !(graph.has(x, y, Opposition) && graph.has(u, v, Opposition)) {
                continue;
            }
            for (u, v) in [(u, v), (v, u)] {
                if graph.has(x, u, Sextile)
                    && graph.has(y, v, Sextile)
                    && graph.has(x, v, Trine)
                    && graph.has(y, u, Trine)
                {
                    set.insert(
                        PatternKind::MysticRectangle,
                        &quad,
                        vec![
                            PatternEdge::new(Opposition, x, y),
                            PatternEdge::new(Opposition, u, v),
                            PatternEdge::new(Sextile, x, u),
                            PatternEdge::new(Sextile, y, v),
                            PatternEdge::new(Trine, x, v),
                            PatternEdge::new(Trine, y, u),
                        ],
                    );
                }
            }
        }
    }
    set.into_vec()
}

/// Two oppositions with every end square to both ends of the other.
pub fn detect_grand_crosses(graph: &AspectGraph) -> Vec<Pattern> {
    let mut set = PatternSet::default();
    for quad in graph.quads() {
        for (x, y, u, v) in pairings(quad) {
            if graph.has(x, y, Opposition)
                && graph.has(u, v, Opposition)
                && graph.has(x, u, Square)
                && graph.has(u, y, Square)
                && graph.has(y, v, Square)
                && graph.has(v, x, Square)
            {
                set.insert(
                    PatternKind::GrandCross,
                    &quad,
                    vec![
                        PatternEdge::new(Opposition, x, y),
                        PatternEdge::new(Opposition, u, v),
                        PatternEdge::new(Square, x, u),
                        PatternEdge::new(Square, u, y),
                        PatternEdge::new(Square, y, v),
                        PatternEdge::new(Square, v, x),
                    ],
                );
            }
        }
    }
    set.into_vec()
}

/// Marks patterns that rely on at least one out-of-sign aspect.
pub fn flag_out_of_sign(patterns: &mut [Pattern], graph: &AspectGraph) {
    for pattern in patterns.iter_mut() {
        pattern.has_out_of_sign = pattern.edges.iter().any(|edge| {
            graph
                .edge(edge.body1, edge.body2, edge.aspect_name)
                .map(|aspect| aspect.out_of_sign)
                .unwrap_or(false)
        });
    }
}

/// Mean edge tightness, adjusted for out-of-sign edges and luminaries,
/// clamped to `[0, 1]`.
pub fn score_strength(patterns: &mut [Pattern], graph: &AspectGraph, settings: &AspectSettings) {
    for pattern in patterns.iter_mut() {
        if pattern.edges.is_empty() {
            pattern.pattern_strength_score = 0.0;
            continue;
        }

        let total: f64 = pattern
            .edges
            .iter()
            .map(|edge| {
                graph
                    .edge(edge.body1, edge.body2, edge.aspect_name)
                    .map(|aspect| tightness(aspect.orb_deg, settings.orb_limit(edge.aspect_name)))
                    .unwrap_or(0.0)
            })
            .sum();
        let mut score = total / pattern.edges.len() as f64;

        if pattern.has_out_of_sign {
            score -= OUT_OF_SIGN_PENALTY;
        }
        if pattern.members.iter().any(|body| body.is_luminary()) {
            score += LUMINARY_BONUS;
        }

        pattern.pattern_strength_score = round_to(score.clamp(0.0, 1.0), 3);
    }
}

/// Every supported pattern in the day's aspects, flagged and scored.
pub fn detect_patterns(aspects: &[Aspect], settings: &AspectSettings) -> Vec<Pattern> {
    let graph = AspectGraph::new(aspects);

    let mut patterns = Vec::new();
    patterns.extend(detect_yods(&graph));
    patterns.extend(detect_tsquares(&graph));
    patterns.extend(detect_grand_trines(&graph));
    patterns.extend(detect_kites(&graph));
    patterns.extend(detect_mystic_rectangles(&graph));
    patterns.extend(detect_grand_crosses(&graph));

    flag_out_of_sign(&mut patterns, &graph);
    score_strength(&mut patterns, &graph, settings);
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aspects::calculate_aspects;
    use crate::domain::model::BodyState;
    use std::collections::BTreeMap;

    fn aspects_for(longitudes: &[(Body, f64)]) -> Vec<Aspect> {
        let states: BTreeMap<Body, BodyState> = longitudes
            .iter()
            .map(|&(body, longitude_deg)| {
                (
                    body,
                    BodyState {
                        longitude_deg,
                        speed_deg_per_day: 0.5,
                    },
                )
            })
            .collect();
        calculate_aspects(&states, &AspectSettings::default())
    }

    fn kinds(patterns: &[Pattern]) -> Vec<PatternKind> {
        patterns.iter().map(|p| p.pattern_type).collect()
    }

    #[test]
    fn test_yod() {
        let aspects = aspects_for(&[(Body::Mars, 5.0), (Body::Venus, 65.0), (Body::Saturn, 215.0)]);
        let graph = AspectGraph::new(&aspects);
        let yods = detect_yods(&graph);
        assert_eq!(yods.len(), 1);
        assert_eq!(yods[0].members, vec![Body::Mars, Body::Saturn, Body::Venus]);
        assert_eq!(yods[0].edges[0], PatternEdge::new(Sextile, Body::Mars, Body::Venus));
        assert_eq!(yods[0].pattern_score, 0.8);
    }

    #[test]
    fn test_tsquare() {
        let aspects = aspects_for(&[(Body::Mars, 10.0), (Body::Jupiter, 190.0), (Body::Saturn, 100.0)]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        assert_eq!(kinds(&patterns), vec![PatternKind::TSquare]);
        assert_eq!(patterns[0].edges[0].aspect_name, Opposition);
        assert_eq!(patterns[0].pattern_score, 0.85);
    }

    #[test]
    fn test_grand_trine_and_kite() {
        let aspects = aspects_for(&[
            (Body::Mars, 15.0),
            (Body::Jupiter, 135.0),
            (Body::Saturn, 255.0),
            (Body::Venus, 195.0),
        ]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        assert_eq!(kinds(&patterns), vec![PatternKind::GrandTrine, PatternKind::Kite]);

        let kite = &patterns[1];
        assert_eq!(kite.members.len(), 4);
        assert_eq!(kite.edges.len(), 6);
        assert!(kite.edges.contains(&PatternEdge::new(Opposition, Body::Venus, Body::Mars)));
        assert_eq!(kite.pattern_score, 0.86);
    }

    #[test]
    fn test_mystic_rectangle() {
        let aspects = aspects_for(&[
            (Body::Mars, 10.0),
            (Body::Saturn, 190.0),
            (Body::Venus, 70.0),
            (Body::Jupiter, 250.0),
        ]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        assert_eq!(kinds(&patterns), vec![PatternKind::MysticRectangle]);
        let rect = &patterns[0];
        assert_eq!(
            rect.members,
            vec![Body::Jupiter, Body::Mars, Body::Saturn, Body::Venus]
        );
        let sextiles = rect.edges.iter().filter(|e| e.aspect_name == Sextile).count();
        let trines = rect.edges.iter().filter(|e| e.aspect_name == Trine).count();
        assert_eq!((sextiles, trines), (2, 2));
    }

    #[test]
    fn test_mystic_rectangle_in_either_orientation() {
        // Jupiter 與 Venus 對沖；Mars 和 Saturn 交換位置
        for (mars, saturn, sextile_partner) in [(190.0, 10.0, Body::Mars), (10.0, 190.0, Body::Saturn)] {
            let aspects = aspects_for(&[
                (Body::Jupiter, 250.0),
                (Body::Venus, 70.0),
                (Body::Mars, mars),
                (Body::Saturn, saturn),
            ]);
            let graph = AspectGraph::new(&aspects);
            let rects = detect_mystic_rectangles(&graph);
            assert_eq!(rects.len(), 1, "Mars at {}", mars);
            assert!(rects[0]
                .edges
                .contains(&PatternEdge::new(Sextile, Body::Jupiter, sextile_partner)));
            assert!(rects[0]
                .edges
                .contains(&PatternEdge::new(Opposition, Body::Jupiter, Body::Venus)));
        }
    }

    #[test]
    fn test_grand_cross_contains_tsquares() {
        let aspects = aspects_for(&[
            (Body::Mars, 20.0),
            (Body::Jupiter, 110.0),
            (Body::Saturn, 200.0),
            (Body::Uranus, 290.0),
        ]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        let crosses: Vec<_> = patterns
            .iter()
            .filter(|p| p.pattern_type == PatternKind::GrandCross)
            .collect();
        assert_eq!(crosses.len(), 1);
        assert_eq!(crosses[0].pattern_score, 0.88);
        // each corner with its two neighbours also forms a T-square
        let tsquares = patterns
            .iter()
            .filter(|p| p.pattern_type == PatternKind::TSquare)
            .count();
        assert_eq!(tsquares, 4);
    }

    #[test]
    fn test_no_patterns_without_aspects() {
        let patterns = detect_patterns(&[], &AspectSettings::default());
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_strength_score_exact_pattern_with_luminary() {
        let aspects = aspects_for(&[(Body::Sun, 10.0), (Body::Jupiter, 190.0), (Body::Saturn, 100.0)]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        assert_eq!(patterns.len(), 1);
        // exact edges give 1.0, the luminary bonus is clamped away
        assert_eq!(patterns[0].pattern_strength_score, 1.0);
        assert!(!patterns[0].has_out_of_sign);
    }

    #[test]
    fn test_strength_score_out_of_sign_penalty() {
        // Saturn at 89 is still in Gemini, so both of its squares are out of sign
        let aspects = aspects_for(&[(Body::Mars, 2.0), (Body::Jupiter, 184.0), (Body::Saturn, 89.0)]);
        let patterns = detect_patterns(&aspects, &AspectSettings::default());
        assert_eq!(kinds(&patterns), vec![PatternKind::TSquare]);
        let tsquare = &patterns[0];
        assert!(tsquare.has_out_of_sign);

        // tightness: opposition 1-2/8, squares 1-3/6 and 1-5/6
        let expected = ((0.75 + 0.5 + 1.0 / 6.0) / 3.0 - 0.10 * 1.0_f64).clamp(0.0, 1.0);
        assert!((tsquare.pattern_strength_score - round_to(expected, 3)).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&tsquare.pattern_strength_score));
    }
}
