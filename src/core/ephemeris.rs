//! Apparent ecliptic longitudes. Planets come from VSOP87A (heliocentric,
//! J2000 ecliptic); the Moon comes from the Meeus lunar theory in `astro`.

use crate::domain::model::{Body, BodyState, EclipticFrame, Observer};
use crate::domain::ports::Ephemeris;
use crate::utils::error::{AspectError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use vsop87::vsop87a;

const J2000_JD: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const DAYS_PER_CENTURY: f64 = 36_525.0;
const AU_KM: f64 = 149_597_870.7;
const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6_378.137;
const EARTH_POLAR_RATIO: f64 = 0.996_647_19;
const LIGHT_TIME_DAYS_PER_AU: f64 = 0.005_775_518_3;
const ABERRATION_CONSTANT_DEG: f64 = 20.495_52 / 3600.0;
const OBLIQUITY_J2000_DEG: f64 = 23.439_291_1;

/// Years covered by the DE421 kernel the published reports were built with.
pub const FIRST_VALID_YEAR: i32 = 1900;
pub const LAST_VALID_YEAR: i32 = 2050;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    fn from_spherical(longitude_deg: f64, latitude_deg: f64, distance: f64) -> Self {
        let (lon, lat) = (longitude_deg.to_radians(), latitude_deg.to_radians());
        Self {
            x: distance * lat.cos() * lon.cos(),
            y: distance * lat.cos() * lon.sin(),
            z: distance * lat.sin(),
        }
    }

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    fn neg(self) -> Vec3 {
        Vec3 {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    fn longitude_deg(self) -> f64 {
        normalize_degrees(self.y.atan2(self.x).to_degrees())
    }

    fn latitude_deg(self) -> f64 {
        self.z.atan2((self.x * self.x + self.y * self.y).sqrt()).to_degrees()
    }
}

pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid 可能因浮點誤差回傳 360.0
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

fn julian_day(at: DateTime<Utc>) -> f64 {
    let seconds = at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + seconds / 86_400.0
}

/// Julian ephemeris day (TT) for a UTC instant.
fn julian_ephemeris_day(at: DateTime<Utc>) -> f64 {
    let delta_t = astro::time::delta_t(at.year(), at.month() as u8);
    julian_day(at) + delta_t / 86_400.0
}

/// Accumulated general precession in longitude since J2000.0, degrees.
fn precession_deg(t: f64) -> f64 {
    (5_028.796_195 * t + 1.105_434_8 * t * t) / 3600.0
}

/// Heliocentric position in the J2000 ecliptic, AU. `None` for the Sun and
/// Moon.
fn heliocentric(body: Body, jde: f64) -> Option<Vec3> {
    let c = match body {
        Body::Mercury => vsop87a::mercury(jde),
        Body::Venus => vsop87a::venus(jde),
        Body::Mars => vsop87a::mars(jde),
        Body::Jupiter => vsop87a::jupiter(jde),
        Body::Saturn => vsop87a::saturn(jde),
        Body::Uranus => vsop87a::uranus(jde),
        Body::Neptune => vsop87a::neptune(jde),
        Body::Sun | Body::Moon => return None,
    };
    Some(Vec3 {
        x: c.x,
        y: c.y,
        z: c.z,
    })
}

fn earth(jde: f64) -> Vec3 {
    let c = vsop87a::earth(jde);
    Vec3 {
        x: c.x,
        y: c.y,
        z: c.z,
    }
}

/// Geocentric Moon in the J2000 ecliptic, AU.
fn moon_geocentric(jde: f64, t: f64) -> Vec3 {
    let (point, distance_km) = astro::lunar::geocent_ecl_pos(jde);
    // 當日平春分 -> J2000
    let longitude = point.long.to_degrees() - precession_deg(t);
    Vec3::from_spherical(longitude, point.lat.to_degrees(), distance_km / AU_KM)
}

/// Observer offset from the geocenter in the ecliptic frame, AU.
fn observer_offset(observer: &Observer, at: DateTime<Utc>) -> Vec3 {
    let gmst = astro::time::mn_sidr(julian_day(at));
    let local_sidereal = gmst + observer.longitude_deg.to_radians();

    let lat = observer.latitude_deg.to_radians();
    let u = (EARTH_POLAR_RATIO * lat.tan()).atan();
    let rho_sin = EARTH_POLAR_RATIO * u.sin();
    let rho_cos = u.cos();

    let scale = EARTH_EQUATORIAL_RADIUS_KM / AU_KM;
    let x = scale * rho_cos * local_sidereal.cos();
    let y = scale * rho_cos * local_sidereal.sin();
    let z = scale * rho_sin;

    let (se, ce) = OBLIQUITY_J2000_DEG.to_radians().sin_cos();
    Vec3 {
        x,
        y: y * ce + z * se,
        z: -y * se + z * ce,
    }
}

/// Annual aberration in longitude for a body seen at `longitude`/`latitude`
/// while the Sun is at `sun_longitude`.
fn aberration_deg(longitude: f64, latitude: f64, sun_longitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos();
    if cos_lat.abs() < 1e-9 {
        return 0.0;
    }
    -ABERRATION_CONSTANT_DEG * (sun_longitude - longitude).to_radians().cos() / cos_lat
}

#[derive(Debug, Clone)]
pub struct AnalyticEphemeris {
    frame: EclipticFrame,
    observer: Option<Observer>,
}

impl AnalyticEphemeris {
    pub fn new(frame: EclipticFrame, observer: Observer) -> Self {
        Self {
            frame,
            observer: Some(observer),
        }
    }

    /// Positions as seen from the Earth's center.
    pub fn geocentric(frame: EclipticFrame) -> Self {
        Self {
            frame,
            observer: None,
        }
    }

    fn check_range(at: DateTime<Utc>) -> Result<()> {
        if !(FIRST_VALID_YEAR..=LAST_VALID_YEAR).contains(&at.year()) {
            return Err(out_of_range(&at.format("%Y-%m-%d").to_string()));
        }
        Ok(())
    }

    /// Geocentric vector in the J2000 ecliptic, light-time corrected for the
    /// planets. The flag tells whether annual aberration still applies.
    fn apparent_vector(&self, body: Body, jde: f64, t: f64) -> (Vec3, bool) {
        let earth_now = earth(jde);
        match heliocentric(body, jde) {
            Some(geometric) => {
                let light_time = geometric.sub(earth_now).norm() * LIGHT_TIME_DAYS_PER_AU;
                let retarded = heliocentric(body, jde - light_time).unwrap_or(geometric);
                (retarded.sub(earth_now), true)
            }
            None if body == Body::Moon => (moon_geocentric(jde, t), false),
            None => (earth_now.neg(), true),
        }
    }
}

/// Error for a date outside [`FIRST_VALID_YEAR`]..=[`LAST_VALID_YEAR`].
pub fn out_of_range(date: &str) -> AspectError {
    AspectError::EphemerisError {
        message: format!(
            "{} is outside the supported range {}-{}",
            date, FIRST_VALID_YEAR, LAST_VALID_YEAR
        ),
    }
}

impl Ephemeris for AnalyticEphemeris {
    fn longitude(&self, body: Body, at: DateTime<Utc>) -> Result<f64> {
        Self::check_range(at)?;
        let jde = julian_ephemeris_day(at);
        let t = (jde - J2000_JD) / DAYS_PER_CENTURY;

        let (mut vector, aberrated) = self.apparent_vector(body, jde, t);
        if let Some(observer) = &self.observer {
            vector = vector.sub(observer_offset(observer, at));
        }

        let mut longitude = vector.longitude_deg();
        if aberrated {
            let sun_longitude = earth(jde).neg().longitude_deg();
            longitude += aberration_deg(longitude, vector.latitude_deg(), sun_longitude);
        }

        if self.frame == EclipticFrame::OfDate {
            let (nutation_longitude, _) = astro::nutation::nutation(jde);
            longitude += precession_deg(t) + nutation_longitude.to_degrees();
        }

        let longitude = normalize_degrees(longitude);
        if !longitude.is_finite() {
            return Err(AspectError::EphemerisError {
                message: format!("non-finite longitude for {} at {}", body, at),
            });
        }
        Ok(longitude)
    }
}

/// Longitude at 00:00 UTC and mean daily motion over the following twelve
/// hours, wrapped so that crossing 0° Aries does not read as a jump.
pub fn daily_state<E: Ephemeris + ?Sized>(
    ephemeris: &E,
    body: Body,
    date: NaiveDate,
) -> Result<BodyState> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let midday = start + Duration::hours(12);

    let lon0 = ephemeris.longitude(body, start)?;
    let lon1 = ephemeris.longitude(body, midday)?;

    let mut delta = (lon1 - lon0 + 360.0).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }

    Ok(BodyState {
        longitude_deg: normalize_degrees(lon0),
        speed_deg_per_day: delta / 0.5,
    })
}
