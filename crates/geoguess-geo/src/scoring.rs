//! Haversine distance and the exponential score curve.

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance (km) at which the score has decayed to `1000 / e`.
pub const DECAY_KM: f64 = 2000.0;

/// Score for a perfect guess.
pub const MAX_SCORE: u32 = 1000;

/// Great-circle distance between two points, in kilometres.
///
/// Inputs are degrees and must already be in range; validation is the
/// caller's job (see [`Coordinate::new`](crate::Coordinate::new)). The
/// longitude difference goes through `sin²(Δλ/2)`, so a pair straddling the
/// antimeridian comes out short, not the long way round.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Points for a guess `distance_km` away from the target.
///
/// `round(1000 · e^(−d / 2000))`. Always an integer in `[0, 1000]`,
/// non-increasing in `d`, and exactly 1000 at zero.
pub fn score(distance_km: f64) -> u32 {
    score_with_decay(distance_km, DECAY_KM)
}

/// [`score`] with an explicit decay constant.
///
/// A NaN distance scores 0. Negative distances are treated as zero.
pub fn score_with_decay(distance_km: f64, decay_km: f64) -> u32 {
    if distance_km.is_nan() || decay_km <= 0.0 || decay_km.is_nan() {
        return 0;
    }
    let d = distance_km.max(0.0);
    let raw = (MAX_SCORE as f64 * (-d / decay_km).exp()).round();
    raw.clamp(0.0, MAX_SCORE as f64) as u32
}
