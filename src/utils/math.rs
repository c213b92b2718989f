//! Additional math helpers layered on top of `glam`.

use glam::{Quat, Vec3};

/// Projects `v` onto the plane through the origin with unit normal `normal`.
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Rotates `v` by `angle` radians around the unit `axis`.
pub fn rotate_about_axis(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    if angle.abs() < 1e-9 {
        return v;
    }
    Quat::from_axis_angle(axis, angle) * v
}

/// Moves `current` toward `target` by at most `max_delta`.
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// Pulls `value` toward zero by `delta`, snapping to zero inside the band.
pub fn decay_toward_zero(value: f32, delta: f32) -> f32 {
    if value > delta {
        value - delta
    } else if value < -delta {
        value + delta
    } else {
        0.0
    }
}

/// Returns true when every component of the vector is finite.
pub fn is_finite_vec(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approach_never_overshoots() {
        assert_eq!(approach(0.0, 1.0, 0.3), 0.3);
        assert_eq!(approach(0.9, 1.0, 0.3), 1.0);
        assert_eq!(approach(0.0, -1.0, 2.0), -1.0);
    }

    #[test]
    fn rotation_about_y_turns_x_into_minus_z() {
        let rotated = rotate_about_axis(Vec3::X, Vec3::Y, std::f32::consts::FRAC_PI_2);
        assert!((rotated - Vec3::NEG_Z).length() < 1e-5);
    }
}
