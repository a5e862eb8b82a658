//! Assembly configuration: the user-facing settings and their validated hot-path form.

use std::path::PathBuf;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::Scalar;

/// Scalar settings of the source assembly as set by the command surface or a config file.
///
/// Every scalar starts out unset (`None`). Lengths are in millimetres, angles in degrees and
/// polar bounds are cosines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub iso_radius: Option<Scalar>,
    /// Collimator half-angle. Only used when the polar cosines are not given explicitly.
    pub src_angle: Option<Scalar>,
    pub polar_start: Option<Scalar>,
    pub polar_stop: Option<Scalar>,
    pub rot_start: Option<Scalar>,
    pub rot_stop: Option<Scalar>,
    pub shift_x: Option<Scalar>,
    pub shift_y: Option<Scalar>,
    pub shift_z: Option<Scalar>,
    pub source_table: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Validated assembly parameters consumed by the sampler and the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assembly {
    pub radius: Scalar,
    pub polar_start: Scalar,
    pub polar_stop: Scalar,
    /// Gantry range in radians.
    pub rot_start: Scalar,
    pub rot_stop: Scalar,
    pub shift: DVec3,
}

impl AssemblyConfig {
    /// Sets the collimator half-angle and derives the cone bounds from it: the sampler draws
    /// `cos_theta` between `cos(angle)` and `1`.
    pub fn set_src_angle(&mut self, degrees: Scalar) {
        self.src_angle = Some(degrees);
        self.polar_start = Some(degrees.to_radians().cos());
        self.polar_stop = Some(1.0);
    }

    pub fn set_shift(&mut self, shift: DVec3) {
        self.shift_x = Some(shift.x);
        self.shift_y = Some(shift.y);
        self.shift_z = Some(shift.z);
    }

    /// Overlays every value set in `other` on top of `self`.
    pub fn merge(&mut self, other: &AssemblyConfig) {
        fn pick<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        pick(&mut self.iso_radius, &other.iso_radius);
        pick(&mut self.src_angle, &other.src_angle);
        pick(&mut self.polar_start, &other.polar_start);
        pick(&mut self.polar_stop, &other.polar_stop);
        pick(&mut self.rot_start, &other.rot_start);
        pick(&mut self.rot_stop, &other.rot_stop);
        pick(&mut self.shift_x, &other.shift_x);
        pick(&mut self.shift_y, &other.shift_y);
        pick(&mut self.shift_z, &other.shift_z);
        pick(&mut self.source_table, &other.source_table);
        pick(&mut self.seed, &other.seed);
    }

    /// Checks that every scalar is set and in range, returning the hot-path form.
    pub fn resolve(&self) -> Result<Assembly> {
        let radius = required("iso_radius", self.iso_radius)?;
        if radius <= 0.0 {
            return Err(SourceError::InvalidValue {
                name: "iso_radius",
                value: radius,
                reason: "must be greater than zero",
            });
        }

        let (polar_start, polar_stop) = self.polar_bounds()?;
        let rot_start = required("rot_start", self.rot_start)?;
        let rot_stop = required("rot_stop", self.rot_stop)?;
        let shift = DVec3::new(
            required("shift_x", self.shift_x)?,
            required("shift_y", self.shift_y)?,
            required("shift_z", self.shift_z)?,
        );

        let assembly = Assembly {
            radius,
            polar_start,
            polar_stop,
            rot_start: rot_start.to_radians(),
            rot_stop: rot_stop.to_radians(),
            shift,
        };
        debug!(?assembly, "resolved assembly configuration");
        Ok(assembly)
    }

    fn polar_bounds(&self) -> Result<(Scalar, Scalar)> {
        let (start, stop) = match (self.polar_start, self.polar_stop, self.src_angle) {
            (Some(start), Some(stop), _) => (start, stop),
            (_, _, Some(angle)) => (angle.to_radians().cos(), 1.0),
            (None, _, None) => return Err(SourceError::Unset("polar_start")),
            (Some(_), None, None) => return Err(SourceError::Unset("polar_stop")),
        };
        for (name, value) in [("polar_start", start), ("polar_stop", stop)] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(SourceError::InvalidValue {
                    name,
                    value,
                    reason: "polar bounds are cosines and must lie in [-1, 1]",
                });
            }
        }
        Ok((start, stop))
    }
}

fn required(name: &'static str, value: Option<Scalar>) -> Result<Scalar> {
    match value {
        None => Err(SourceError::Unset(name)),
        Some(v) if !v.is_finite() => Err(SourceError::InvalidValue {
            name,
            value: v,
            reason: "must be finite",
        }),
        Some(v) => Ok(v),
    }
}

impl Assembly {
    /// True when every event uses the same gantry angle.
    pub fn gantry_is_fixed(&self) -> bool {
        self.rot_start == self.rot_stop
    }
}
