//! Rotation algebra
//!
//! Scalar-first Hamilton quaternions. An attitude quaternion `q` rotates
//! body-frame vectors into the world frame: `v_world = q ⊗ v_body ⊗ q*`.
//! The body-frame prediction of a world direction `r` is therefore
//! `q.conjugate().rotate(r)`.

use core::ops::Mul;

use micromath::F32Ext;

/// 3-vector, `[x, y, z]`
pub type Vector3 = [f32; 3];

/// Below this cross-product magnitude two unit directions count as
/// parallel or antiparallel.
const PARALLEL_EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis` (must be unit length)
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let half = 0.5 * angle;
        let s = half.sin();
        Self::new(half.cos(), axis[0] * s, axis[1] * s, axis[2] * s)
    }

    /// `[w, x, y, z]`
    pub const fn to_array(self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }

    pub const fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(self, other: Self) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Unit quaternion in the same direction, `None` for a zero or
    /// non-finite norm.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if !(n > 1e-6) || !n.is_finite() {
            return None;
        }
        let r = n.recip();
        Some(Self::new(self.w * r, self.x * r, self.y * r, self.z * r))
    }

    /// `q ⊗ (0, v) ⊗ q*`
    ///
    /// Exact for unit quaternions; the result scales with `|q|²` otherwise.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        let (q0, q1, q2, q3) = (self.w, self.x, self.y, self.z);
        let (x, y, z) = (v[0], v[1], v[2]);

        let ww = q0 * q0;
        let xx = q1 * q1;
        let yy = q2 * q2;
        let zz = q3 * q3;

        [
            x * (ww + xx - yy - zz) + y * (2. * (q1 * q2 - q0 * q3)) + z * (2. * (q1 * q3 + q0 * q2)),
            x * (2. * (q1 * q2 + q0 * q3)) + y * (ww - xx + yy - zz) + z * (2. * (q2 * q3 - q0 * q1)),
            x * (2. * (q1 * q3 - q0 * q2)) + y * (2. * (q2 * q3 + q0 * q1)) + z * (ww - xx - yy + zz),
        ]
    }

    /// Roll, pitch, yaw (ZYX) in radians
    pub fn to_euler(self) -> (f32, f32, f32) {
        let (q0, q1, q2, q3) = (self.w, self.x, self.y, self.z);

        let sinr_cosp = 2.0 * (q0 * q1 + q2 * q3);
        let cosr_cosp = 1.0 - 2.0 * (q1 * q1 + q2 * q2);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (q0 * q2 - q3 * q1);
        let pitch = if sinp.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (q0 * q3 + q1 * q2);
        let cosy_cosp = 1.0 - 2.0 * (q2 * q2 + q3 * q3);
        let yaw = siny_cosp.atan2(cosy_cosp);

        (roll, pitch, yaw)
    }
}

impl Mul for Quaternion {
    type Output = Self;

    /// Hamilton product; `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Self) -> Self {
        let (a0, a1, a2, a3) = (self.w, self.x, self.y, self.z);
        let (b0, b1, b2, b3) = (rhs.w, rhs.x, rhs.y, rhs.z);
        Self::new(
            a0 * b0 - a1 * b1 - a2 * b2 - a3 * b3,
            a0 * b1 + a1 * b0 + a2 * b3 - a3 * b2,
            a0 * b2 - a1 * b3 + a2 * b0 + a3 * b1,
            a0 * b3 + a1 * b2 - a2 * b1 + a3 * b0,
        )
    }
}

// ── Vector helpers ───────────────────────────────────────────────────────────

pub fn dot(a: Vector3, b: Vector3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vector3, b: Vector3) -> Vector3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(v: Vector3) -> f32 {
    dot(v, v).sqrt()
}

pub fn is_finite(v: Vector3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Unit vector in the direction of `v`, `None` if `v` is zero or not finite.
///
/// Scales by the largest component first so the squared norm neither
/// overflows nor underflows; any finite non-zero magnitude is accepted.
pub fn normalize(v: Vector3) -> Option<Vector3> {
    if !is_finite(v) {
        return None;
    }
    let m = v[0].abs().max(v[1].abs()).max(v[2].abs());
    if !(m > 0.0) {
        return None;
    }
    let s = [v[0] / m, v[1] / m, v[2] / m];
    let r = norm(s).recip();
    Some([s[0] * r, s[1] * r, s[2] * r])
}

/// Unit vector orthogonal to `v` (`v` must be non-zero)
fn any_orthogonal(v: Vector3) -> Vector3 {
    // Cross with the basis axis least aligned with v
    let (ax, ay, az) = (v[0].abs(), v[1].abs(), v[2].abs());
    let basis = if ax <= ay && ax <= az {
        [1.0, 0.0, 0.0]
    } else if ay <= az {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    };
    normalize(cross(v, basis)).unwrap_or([1.0, 0.0, 0.0])
}

/// Partial rotation that pulls the estimate `q` toward agreeing with an
/// observed direction.
///
/// `reference` is a unit direction in the world frame and `observed` the
/// same direction as measured in the body frame (unit length). Returns the
/// world-frame rotation `Δq` that, applied as `Δq * q`, rotates the
/// predicted direction `gain` of the way onto `observed`. `gain = 0` gives
/// the identity, `gain = 1` aligns them in one step.
///
/// Parallel directions yield the identity. Antiparallel directions yield a
/// rotation of `gain · π` about an axis orthogonal to `reference`.
pub fn corrective_rotation(q: Quaternion, reference: Vector3, observed: Vector3, gain: f32) -> Quaternion {
    let observed_world = q.rotate(observed);

    let axis = cross(observed_world, reference);
    let s = norm(axis);
    let c = dot(observed_world, reference);

    if s <= PARALLEL_EPS {
        if c >= 0.0 {
            return Quaternion::IDENTITY;
        }
        return Quaternion::from_axis_angle(any_orthogonal(reference), gain * core::f32::consts::PI);
    }

    let angle = s.atan2(c);
    let r = s.recip();
    Quaternion::from_axis_angle([axis[0] * r, axis[1] * r, axis[2] * r], gain * angle)
}
