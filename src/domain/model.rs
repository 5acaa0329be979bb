use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Bodies tracked by the ephemeris. Variants are declared in alphabetical
/// order so the derived `Ord` matches ordering by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Jupiter,
    Mars,
    Mercury,
    Moon,
    Neptune,
    Saturn,
    Sun,
    Uranus,
    Venus,
}

impl Body {
    pub const PLANETS: [Body; 7] = [
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
    ];

    pub const LUMINARIES: [Body; 2] = [Body::Sun, Body::Moon];

    pub fn name(self) -> &'static str {
        match self {
            Body::Jupiter => "jupiter",
            Body::Mars => "mars",
            Body::Mercury => "mercury",
            Body::Moon => "moon",
            Body::Neptune => "neptune",
            Body::Saturn => "saturn",
            Body::Sun => "sun",
            Body::Uranus => "uranus",
            Body::Venus => "venus",
        }
    }

    pub fn is_luminary(self) -> bool {
        matches!(self, Body::Sun | Body::Moon)
    }

    /// Tracked bodies sorted by name.
    pub fn tracked(include_sun_moon: bool) -> Vec<Body> {
        let mut bodies: Vec<Body> = Body::PLANETS.to_vec();
        if include_sun_moon {
            bodies.extend(Body::LUMINARIES);
        }
        bodies.sort();
        bodies
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Body {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jupiter" => Ok(Body::Jupiter),
            "mars" => Ok(Body::Mars),
            "mercury" => Ok(Body::Mercury),
            "moon" => Ok(Body::Moon),
            "neptune" => Ok(Body::Neptune),
            "saturn" => Ok(Body::Saturn),
            "sun" => Ok(Body::Sun),
            "uranus" => Ok(Body::Uranus),
            "venus" => Ok(Body::Venus),
            other => Err(format!("unknown body: {}", other)),
        }
    }
}

/// Aspect kinds in evaluation order; when two kinds fit a pair equally well
/// the earlier one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectKind {
    Conjunction,
    SemiSextile,
    SemiSquare,
    Sextile,
    Quintile,
    Square,
    Trine,
    Sesquiquadrate,
    Quincunx,
    Opposition,
}

impl AspectKind {
    pub const ALL: [AspectKind; 10] = [
        AspectKind::Conjunction,
        AspectKind::SemiSextile,
        AspectKind::SemiSquare,
        AspectKind::Sextile,
        AspectKind::Quintile,
        AspectKind::Square,
        AspectKind::Trine,
        AspectKind::Sesquiquadrate,
        AspectKind::Quincunx,
        AspectKind::Opposition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AspectKind::Conjunction => "conjunction",
            AspectKind::SemiSextile => "semi-sextile",
            AspectKind::SemiSquare => "semi-square",
            AspectKind::Sextile => "sextile",
            AspectKind::Quintile => "quintile",
            AspectKind::Square => "square",
            AspectKind::Trine => "trine",
            AspectKind::Sesquiquadrate => "sesquiquadrate",
            AspectKind::Quincunx => "quincunx",
            AspectKind::Opposition => "opposition",
        }
    }

    pub fn ideal_angle(self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::SemiSextile => 30.0,
            AspectKind::SemiSquare => 45.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Quintile => 72.0,
            AspectKind::Square => 90.0,
            AspectKind::Trine => 120.0,
            AspectKind::Sesquiquadrate => 135.0,
            AspectKind::Quincunx => 150.0,
            AspectKind::Opposition => 180.0,
        }
    }

    pub fn family(self) -> &'static str {
        match self {
            AspectKind::Conjunction => "1st-harmonic",
            AspectKind::Opposition => "2nd-harmonic",
            AspectKind::Trine => "3rd-harmonic",
            AspectKind::Square => "4th-harmonic",
            AspectKind::Quintile => "5th-harmonic",
            AspectKind::Sextile => "6th-harmonic",
            AspectKind::SemiSquare | AspectKind::Sesquiquadrate => "8th-harmonic",
            AspectKind::SemiSextile | AspectKind::Quincunx => "12th-harmonic",
        }
    }

    pub fn vibe(self) -> Vibe {
        match self {
            AspectKind::Trine | AspectKind::Sextile | AspectKind::Quintile => Vibe::Harmony,
            AspectKind::Opposition
            | AspectKind::Square
            | AspectKind::SemiSquare
            | AspectKind::Sesquiquadrate => Vibe::Tension,
            AspectKind::Conjunction | AspectKind::Quincunx | AspectKind::SemiSextile => {
                Vibe::Neutral
            }
        }
    }

    /// Orb limit in degrees used when the configuration does not override it.
    pub fn default_orb(self) -> f64 {
        match self {
            AspectKind::Conjunction | AspectKind::Opposition => 8.0,
            AspectKind::Trine | AspectKind::Square => 6.0,
            AspectKind::Sextile => 4.0,
            AspectKind::Quincunx => 3.0,
            AspectKind::Quintile
            | AspectKind::SemiSquare
            | AspectKind::SemiSextile
            | AspectKind::Sesquiquadrate => 2.0,
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AspectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AspectKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown aspect: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Neutral,
    Tension,
    Harmony,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Applying,
    Separating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl Sign {
    pub const ALL: [Sign; 12] = [
        Sign::Aries,
        Sign::Taurus,
        Sign::Gemini,
        Sign::Cancer,
        Sign::Leo,
        Sign::Virgo,
        Sign::Libra,
        Sign::Scorpio,
        Sign::Sagittarius,
        Sign::Capricorn,
        Sign::Aquarius,
        Sign::Pisces,
    ];

    /// Zero-based sign index of a longitude in degrees.
    pub fn index_of(longitude_deg: f64) -> usize {
        let lon = longitude_deg.rem_euclid(360.0);
        ((lon / 30.0).floor() as usize).min(11)
    }

    pub fn from_longitude(longitude_deg: f64) -> Sign {
        Sign::ALL[Sign::index_of(longitude_deg)]
    }
}

/// Reference frame for ecliptic longitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EclipticFrame {
    /// Mean ecliptic and equinox of J2000.0.
    #[default]
    J2000,
    /// True ecliptic and equinox of date (tropical zodiac).
    OfDate,
}

impl FromStr for EclipticFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "j2000" => Ok(EclipticFrame::J2000),
            "of-date" | "ofdate" | "date" => Ok(EclipticFrame::OfDate),
            other => Err(format!("unknown ecliptic frame: {}", other)),
        }
    }
}

/// Observer on the Earth's surface, geodetic degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl Default for Observer {
    fn default() -> Self {
        Self {
            latitude_deg: 0.0,
            longitude_deg: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unsupported output format: {}", other)),
        }
    }
}

/// Tunables for aspect detection and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct AspectSettings {
    pub include_sun_moon: bool,
    /// Orb applied to kinds without an entry in `orbs`.
    pub default_orb_deg: f64,
    pub orbs: BTreeMap<AspectKind, f64>,
    pub body_weights: BTreeMap<Body, f64>,
    pub frame: EclipticFrame,
    pub observer: Observer,
}

impl AspectSettings {
    pub fn orb_limit(&self, kind: AspectKind) -> f64 {
        self.orbs.get(&kind).copied().unwrap_or(self.default_orb_deg)
    }

    pub fn body_weight(&self, body: Body) -> f64 {
        self.body_weights.get(&body).copied().unwrap_or(1.0)
    }

    pub fn bodies(&self) -> Vec<Body> {
        Body::tracked(self.include_sun_moon)
    }
}

impl Default for AspectSettings {
    fn default() -> Self {
        let orbs = AspectKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.default_orb()))
            .collect();

        let body_weights = BTreeMap::from([
            (Body::Sun, 1.25),
            (Body::Moon, 1.25),
            (Body::Mercury, 1.0),
            (Body::Venus, 1.0),
            (Body::Mars, 1.05),
            (Body::Jupiter, 1.05),
            (Body::Saturn, 1.05),
            (Body::Uranus, 0.95),
            (Body::Neptune, 0.95),
        ]);

        Self {
            include_sun_moon: true,
            default_orb_deg: 8.0,
            orbs,
            body_weights,
            frame: EclipticFrame::default(),
            observer: Observer::default(),
        }
    }
}

/// Longitude and daily motion of one body at 00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub longitude_deg: f64,
    pub speed_deg_per_day: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPositions {
    pub date: NaiveDate,
    pub bodies: BTreeMap<Body, BodyState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub lon_deg: f64,
    pub sign: Sign,
    pub speed_deg_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub body1: Body,
    pub body2: Body,
    pub aspect_name: AspectKind,
    pub family: String,
    pub vibe: Vibe,
    pub ideal_angle_deg: f64,
    pub angle_measured_deg: f64,
    pub orb_deg: f64,
    pub phase: Phase,
    pub out_of_sign: bool,
    pub positions: BTreeMap<Body, BodyPosition>,
    pub importance_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Yod,
    #[serde(rename = "T-Square")]
    TSquare,
    #[serde(rename = "Grand Trine")]
    GrandTrine,
    Kite,
    #[serde(rename = "Mystic Rectangle")]
    MysticRectangle,
    #[serde(rename = "Grand Cross")]
    GrandCross,
}

impl PatternKind {
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::Yod => "Yod",
            PatternKind::TSquare => "T-Square",
            PatternKind::GrandTrine => "Grand Trine",
            PatternKind::Kite => "Kite",
            PatternKind::MysticRectangle => "Mystic Rectangle",
            PatternKind::GrandCross => "Grand Cross",
        }
    }

    /// Fixed prior attached to every detected pattern of this kind.
    pub fn base_score(self) -> f64 {
        match self {
            PatternKind::Yod => 0.8,
            PatternKind::TSquare => 0.85,
            PatternKind::GrandTrine => 0.8,
            PatternKind::Kite => 0.86,
            PatternKind::MysticRectangle => 0.84,
            PatternKind::GrandCross => 0.88,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternEdge {
    pub body1: Body,
    pub body2: Body,
    pub aspect_name: AspectKind,
}

impl PatternEdge {
    pub fn new(aspect_name: AspectKind, a: Body, b: Body) -> Self {
        let (body1, body2) = if a <= b { (a, b) } else { (b, a) };
        Self {
            body1,
            body2,
            aspect_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_type: PatternKind,
    pub members: Vec<Body>,
    pub edges: Vec<PatternEdge>,
    pub pattern_score: f64,
    pub has_out_of_sign: bool,
    pub pattern_strength_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAspects {
    pub date: NaiveDate,
    pub aspects: Vec<Aspect>,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub weekly_aspects: Vec<DailyAspects>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub report: WeeklyReport,
    pub aspect_count: usize,
    pub pattern_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_order_matches_names() {
        let bodies = Body::tracked(true);
        let mut names: Vec<&str> = bodies.iter().map(|b| b.name()).collect();
        let sorted = {
            let mut copy = names.clone();
            copy.sort();
            copy
        };
        assert_eq!(names, sorted);
        names.dedup();
        assert_eq!(names.len(), 9);
        assert_eq!(Body::tracked(false).len(), 7);
    }

    #[test]
    fn test_aspect_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&AspectKind::SemiSextile).unwrap();
        assert_eq!(json, "\"semi-sextile\"");
        assert_eq!("Sesquiquadrate".parse::<AspectKind>().unwrap(), AspectKind::Sesquiquadrate);
        assert!("biquintile".parse::<AspectKind>().is_err());
    }

    #[test]
    fn test_sign_from_longitude() {
        assert_eq!(Sign::from_longitude(0.0), Sign::Aries);
        assert_eq!(Sign::from_longitude(29.999), Sign::Aries);
        assert_eq!(Sign::from_longitude(30.0), Sign::Taurus);
        assert_eq!(Sign::from_longitude(359.9), Sign::Pisces);
        assert_eq!(Sign::from_longitude(-1.0), Sign::Pisces);
    }

    #[test]
    fn test_default_settings_fall_back_to_default_orb() {
        let mut settings = AspectSettings::default();
        assert_eq!(settings.orb_limit(AspectKind::Trine), 6.0);
        settings.orbs.remove(&AspectKind::Trine);
        assert_eq!(settings.orb_limit(AspectKind::Trine), 8.0);
        assert_eq!(settings.body_weight(Body::Sun), 1.25);
    }

    #[test]
    fn test_pattern_edge_sorts_bodies() {
        let edge = PatternEdge::new(AspectKind::Square, Body::Venus, Body::Mars);
        assert_eq!(edge.body1, Body::Mars);
        assert_eq!(edge.body2, Body::Venus);
    }

    #[test]
    fn test_pattern_kind_labels() {
        let json = serde_json::to_string(&PatternKind::MysticRectangle).unwrap();
        assert_eq!(json, "\"Mystic Rectangle\"");
        assert_eq!(PatternKind::TSquare.to_string(), "T-Square");
    }
}
