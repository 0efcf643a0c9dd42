//! Geometric utility functions for heading blends, guarded normalization and
//! color conversion.

use glam::{Quat, Vec3};
use rand::Rng;

/// Lengths below this are treated as zero before any normalization or division.
pub const EPSILON: f32 = 1e-6;

/// Normalizes `v`, returning `fallback` when `v` is too short to carry a direction.
///
/// # Arguments
///
/// * `v` - Vector to normalize
/// * `fallback` - Value returned for near-zero or non-finite input
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let length = v.length();
    if length.is_finite() && length > EPSILON {
        v / length
    } else {
        fallback
    }
}

/// Rotates the unit heading `forward` toward `desired` by the fraction `amount`
/// of the arc between them.
///
/// The blend is a quaternion slerp, so `amount = 1.0` snaps onto `desired` and
/// `amount = 0.0` leaves the heading unchanged. A near-zero `desired` carries no
/// direction and leaves the heading unchanged. The result is always unit length.
///
/// # Arguments
///
/// * `forward` - Current unit heading
/// * `desired` - Direction to turn toward (any length)
/// * `amount` - Blend fraction, clamped to `[0, 1]`
pub fn blend_heading(forward: Vec3, desired: Vec3, amount: f32) -> Vec3 {
    let target = normalize_or(desired, Vec3::ZERO);
    if target == Vec3::ZERO {
        return forward;
    }
    let amount = amount.clamp(0.0, 1.0);
    if amount <= 0.0 {
        return forward;
    }

    let arc = Quat::from_rotation_arc(forward, target);
    let partial = Quat::IDENTITY.slerp(arc, amount);
    normalize_or(partial * forward, forward)
}

/// Turns `forward` toward the point `target` as seen from `position`.
pub fn face_toward(forward: Vec3, position: Vec3, target: Vec3, amount: f32) -> Vec3 {
    blend_heading(forward, target - position, amount)
}

/// Vector whose components are uniform in `[-scale, scale)`.
pub fn random_signed_vec3<R: Rng + ?Sized>(rng: &mut R, scale: f32) -> Vec3 {
    Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    ) * scale
}

/// Uniformly distributed point inside a ball of the given radius.
pub fn random_in_ball<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    loop {
        let candidate = random_signed_vec3(rng, 1.0);
        if candidate.length_squared() <= 1.0 {
            return candidate * radius;
        }
    }
}

/// Uniformly distributed unit vector.
pub fn random_unit_vec3<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = random_in_ball(rng, 1.0);
        let unit = normalize_or(candidate, Vec3::ZERO);
        if unit != Vec3::ZERO {
            return unit;
        }
    }
}

/// Converts a hue in `[0, 1)` to a fully saturated, full value RGB triple.
pub fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = (hue.rem_euclid(1.0) * 6.0) % 6.0;
    let sector = h.floor();
    let f = h - sector;
    let (q, t) = (1.0 - f, f);

    match sector as u8 {
        0 => [1.0, t, 0.0],
        1 => [q, 1.0, 0.0],
        2 => [0.0, 1.0, t],
        3 => [0.0, q, 1.0],
        4 => [t, 0.0, 1.0],
        _ => [1.0, 0.0, q],
    }
}

/// Recovers the hue of an RGB triple. Achromatic input maps to hue 0.
pub fn rgb_to_hue(rgb: [f32; 3]) -> f32 {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta <= EPSILON {
        return 0.0;
    }

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    let hue = sector / 6.0;
    if hue >= 1.0 { 0.0 } else { hue }
}
