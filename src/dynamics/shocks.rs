//! Non-linear spring responses of shock beams.

use crate::core::shock::{Shock2Params, Shock3Params, ShockKind};

/// Geometry of a shock beam at the time of evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockSample {
    /// Rest length L.
    pub length: f32,
    /// Current length minus rest length (positive when extended).
    pub diff: f32,
    /// Rate of change of the length (positive when extending).
    pub velocity: f32,
    pub long_bound: f32,
    pub short_bound: f32,
    /// Baseline beam rates.
    pub k: f32,
    pub d: f32,
}

impl ShockSample {
    fn long_limit(&self) -> f32 {
        self.long_bound * self.length
    }

    fn short_limit(&self) -> f32 {
        self.short_bound * self.length
    }
}

/// Returns the `(k, d)` pair for the given shock kind.
///
/// Trigger shocks are not force shocks; they keep the baseline rates.
pub fn evaluate(kind: &ShockKind, sbd_spring: f32, sbd_damp: f32, s: &ShockSample) -> (f32, f32) {
    match kind {
        ShockKind::Shock1 => shock1(sbd_spring, sbd_damp, s),
        ShockKind::Shock2(params) => shock2(params, sbd_spring, sbd_damp, s),
        ShockKind::Shock3(params) => shock3(params, sbd_spring, sbd_damp, s),
        ShockKind::Trigger(_) => (s.k, s.d),
    }
}

fn shock1(sbd_spring: f32, sbd_damp: f32, s: &ShockSample) -> (f32, f32) {
    if s.diff > s.long_limit() || s.diff < -s.short_limit() {
        (sbd_spring, sbd_damp)
    } else {
        (s.k, s.d)
    }
}

fn progression(diff: f32, limit: f32) -> f32 {
    if limit <= 0.0 {
        return 1.0;
    }
    ((diff / limit) * (diff / limit)).min(1.0)
}

fn shock2(p: &Shock2Params, sbd_spring: f32, sbd_damp: f32, s: &ShockSample) -> (f32, f32) {
    let long_limit = s.long_limit();
    let short_limit = s.short_limit();
    let extending = s.diff > 0.0;

    let (mut k, mut d);
    if extending {
        let f = progression(s.diff, long_limit);
        k = p.spring_out + p.sprog_out * p.spring_out * f;
        d = p.damp_out + p.dprog_out * p.damp_out * f;
    } else {
        let f = progression(s.diff, short_limit);
        k = p.spring_in + p.sprog_in * p.spring_in * f;
        d = p.damp_in + p.dprog_in * p.damp_in * f;
    }

    if p.soft_bump {
        // Bump zone starts at 80 % of the bound; velocity against the
        // displacement flips to the rebound parameters.
        let rebound = (s.velocity > 0.0) != extending;
        if extending && s.diff > long_limit * 0.8 {
            let (sp, dp) = if rebound {
                (p.spring_in, p.damp_in)
            } else {
                (p.spring_out, p.damp_out)
            };
            let f = ((s.diff - long_limit * 0.8) / (long_limit * 0.2).max(f32::EPSILON)).min(1.0);
            k = k.max(sp + (sbd_spring - sp) * f * f);
            d = d.max(dp + (sbd_damp - dp) * f * f);
        } else if !extending && -s.diff > short_limit * 0.8 {
            let (sp, dp) = if rebound {
                (p.spring_out, p.damp_out)
            } else {
                (p.spring_in, p.damp_in)
            };
            let f = ((-s.diff - short_limit * 0.8) / (short_limit * 0.2).max(f32::EPSILON)).min(1.0);
            k = k.max(sp + (sbd_spring - sp) * f * f);
            d = d.max(dp + (sbd_damp - dp) * f * f);
        }
        if s.diff > long_limit || -s.diff > short_limit {
            k = k.max(sbd_spring);
            d = d.max(sbd_damp);
        }
    }

    (k, d)
}

/// Damping of a split-rate shock at a (clamped) speed `v > 0`.
pub fn split_damping(v: f32, split: f32, dslow: f32, dfast: f32) -> f32 {
    let v = v.clamp(0.15, 20.0);
    (dslow * v.min(split) + dfast * (v - split).max(0.0)) / v
}

fn shock3(p: &Shock3Params, sbd_spring: f32, sbd_damp: f32, s: &ShockSample) -> (f32, f32) {
    let long_limit = s.long_limit();
    let short_limit = s.short_limit();
    let v = s.velocity.abs();

    if s.diff > long_limit {
        let overshoot = ((s.diff - long_limit) / long_limit.max(f32::EPSILON)).min(1.0);
        let k = p.spring_out + (sbd_spring - p.spring_out) * overshoot;
        let d = p.damp_out + (sbd_damp - p.damp_out) * overshoot;
        (k, d)
    } else if s.diff < -short_limit {
        let overshoot = ((-s.diff - short_limit) / short_limit.max(f32::EPSILON)).min(1.0);
        let k = p.spring_in + (sbd_spring - p.spring_in) * overshoot;
        let d = p.damp_in + (sbd_damp - p.damp_in) * overshoot;
        (k, d)
    } else if s.velocity > 0.0 {
        (p.spring_out, split_damping(v, p.split_out, p.dslow_out, p.dfast_out))
    } else {
        (p.spring_in, split_damping(v, p.split_in, p.dslow_in, p.dfast_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(diff: f32, velocity: f32) -> ShockSample {
        ShockSample {
            length: 10.0,
            diff,
            velocity,
            long_bound: 0.1,
            short_bound: 0.1,
            k: 1e4,
            d: 100.0,
        }
    }

    #[test]
    fn shock1_switches_to_hard_bump_past_bound() {
        let (k, d) = evaluate(&ShockKind::Shock1, 1e6, 5e3, &sample(1.5, 0.0));
        assert_eq!(k, 1e6);
        assert_eq!(d, 5e3);
        let (k, _) = evaluate(&ShockKind::Shock1, 1e6, 5e3, &sample(0.5, 0.0));
        assert_eq!(k, 1e4);
    }

    #[test]
    fn shock2_stiffens_progressively() {
        let params = Shock2Params {
            spring_in: 1e4,
            damp_in: 100.0,
            sprog_in: 1.0,
            dprog_in: 1.0,
            spring_out: 1e4,
            damp_out: 100.0,
            sprog_out: 1.0,
            dprog_out: 1.0,
            soft_bump: false,
        };
        let kind = ShockKind::Shock2(params);
        let (k_small, _) = evaluate(&kind, 1e6, 1e4, &sample(0.1, 0.0));
        let (k_half, _) = evaluate(&kind, 1e6, 1e4, &sample(0.5, 0.0));
        let (k_full, _) = evaluate(&kind, 1e6, 1e4, &sample(2.0, 0.0));
        assert!(k_small < k_half && k_half < k_full);
        assert!((k_half - 1.25e4).abs() < 1e-2);
        assert_eq!(k_full, 2e4);
    }

    #[test]
    fn shock2_soft_bump_reaches_bump_rates_at_bound() {
        let params = Shock2Params {
            spring_in: 1e4,
            damp_in: 100.0,
            sprog_in: 0.0,
            dprog_in: 0.0,
            spring_out: 1e4,
            damp_out: 100.0,
            sprog_out: 0.0,
            dprog_out: 0.0,
            soft_bump: true,
        };
        let kind = ShockKind::Shock2(params);
        let (k_before, _) = evaluate(&kind, 1e6, 1e4, &sample(0.7, 1.0));
        let (k_zone, _) = evaluate(&kind, 1e6, 1e4, &sample(0.9, 1.0));
        let (k_past, d_past) = evaluate(&kind, 1e6, 1e4, &sample(1.2, 1.0));
        assert_eq!(k_before, 1e4);
        assert!(k_zone > 1e4 && k_zone < 1e6);
        assert_eq!((k_past, d_past), (1e6, 1e4));
    }

    #[test]
    fn split_damping_is_continuous() {
        let split = 1.0;
        let below = split_damping(split - 1e-4, split, 2000.0, 500.0);
        let above = split_damping(split + 1e-4, split, 2000.0, 500.0);
        assert!((below - above).abs() < 1.0);
    }

    #[test]
    fn shock3_interpolates_past_bound() {
        let params = Shock3Params {
            spring_in: 1e4,
            damp_in: 100.0,
            spring_out: 1e4,
            damp_out: 100.0,
            split_in: 1.0,
            dslow_in: 200.0,
            dfast_in: 50.0,
            split_out: 1.0,
            dslow_out: 200.0,
            dfast_out: 50.0,
        };
        let kind = ShockKind::Shock3(params);
        let (k_at, _) = evaluate(&kind, 1e6, 1e4, &sample(1.0, 0.0));
        let (k_just, _) = evaluate(&kind, 1e6, 1e4, &sample(1.001, 0.0));
        assert_eq!(k_at, 1e4);
        assert!((k_just - k_at) / 1e6 < 1e-3);
    }
}
