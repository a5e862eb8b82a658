//! Placement of canonical-frame particles at an emitter in the lab frame.
//!
//! Axes: x is the cone axis, y is the polar axis, z is lateral. The latitude rotation acts on
//! `(x, y)`, the longitude + gantry rotation turns about y on `(z, x)`. Latitude 0 is the
//! equator and ±90° are the poles on the y axis. Position and direction always receive the
//! same rotation in the same order.

use glam::DVec3;

use crate::angles::SourceFrame;
use crate::config::Assembly;
use crate::phase_space::ParticleState;
use crate::Scalar;

/// Rotates the coordinate pair `(a, o)` by the angle whose sine and cosine are given.
#[inline]
pub fn rotate(a: Scalar, o: Scalar, sin: Scalar, cos: Scalar) -> (Scalar, Scalar) {
    (cos * a - sin * o, sin * a + cos * o)
}

/// Coordinate plane a [`Rotation`] acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Zx,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub sin: Scalar,
    pub cos: Scalar,
}

impl Rotation {
    pub fn from_angle(radians: Scalar) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { sin, cos }
    }

    pub fn inverse(self) -> Self {
        Self {
            sin: -self.sin,
            cos: self.cos,
        }
    }

    pub fn apply(self, v: DVec3, plane: Plane) -> DVec3 {
        match plane {
            Plane::Xy => {
                let (x, y) = rotate(v.x, v.y, self.sin, self.cos);
                DVec3::new(x, y, v.z)
            }
            Plane::Zx => {
                let (z, x) = rotate(v.z, v.x, self.sin, self.cos);
                DVec3::new(x, v.y, z)
            }
        }
    }

    /// Rotates position and direction together.
    pub fn apply_pair(self, position: DVec3, direction: DVec3, plane: Plane) -> (DVec3, DVec3) {
        (self.apply(position, plane), self.apply(direction, plane))
    }
}

impl SourceFrame {
    pub fn latitude_rotation(&self) -> Rotation {
        Rotation {
            sin: self.sin_lat,
            cos: self.cos_lat,
        }
    }

    /// Longitude rotation with the event's gantry angle added.
    pub fn azimuth_rotation(&self, gantry_angle: Scalar) -> Rotation {
        Rotation::from_angle(self.longitude_rad + gantry_angle)
    }
}

/// Maps a canonical-frame state into the lab frame for one emitter.
///
/// Steps: pull back along the cone axis by the isocentre radius, latitude rotation, azimuth
/// rotation, lab shift. Energy and weight are unchanged.
pub fn place(
    state: &ParticleState,
    frame: &SourceFrame,
    gantry_angle: Scalar,
    assembly: &Assembly,
) -> ParticleState {
    let position = state.position - DVec3::X * assembly.radius;

    let (position, direction) = frame
        .latitude_rotation()
        .apply_pair(position, state.direction, Plane::Xy);
    let (position, direction) = frame
        .azimuth_rotation(gantry_angle)
        .apply_pair(position, direction, Plane::Zx);

    ParticleState {
        weight: state.weight,
        energy: state.energy,
        position: position + assembly.shift,
        direction,
    }
}

/// Inverse of [`place`]: maps a lab-frame state back into the canonical cone frame.
pub fn unplace(
    state: &ParticleState,
    frame: &SourceFrame,
    gantry_angle: Scalar,
    assembly: &Assembly,
) -> ParticleState {
    let position = state.position - assembly.shift;

    let (position, direction) = frame
        .azimuth_rotation(gantry_angle)
        .inverse()
        .apply_pair(position, state.direction, Plane::Zx);
    let (position, direction) = frame
        .latitude_rotation()
        .inverse()
        .apply_pair(position, direction, Plane::Xy);

    ParticleState {
        weight: state.weight,
        energy: state.energy,
        position: position + DVec3::X * assembly.radius,
        direction,
    }
}
