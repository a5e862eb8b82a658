//! Running tallies over emitted primaries, used for run summaries and cross-worker checks.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::emission::EmissionSink;
use crate::phase_space::ParticleState;
use crate::Scalar;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionTally {
    pub events: u64,
    pub primaries: u64,
    pub energy_sum: Scalar,
    pub weight_sum: Scalar,
    pub direction_sum: DVec3,
    /// Per-axis position bounds; `None` until a primary is recorded.
    pub position_min: Option<DVec3>,
    pub position_max: Option<DVec3>,
}

fn widen(
    bound: Option<DVec3>,
    other: Option<DVec3>,
    pick: fn(DVec3, DVec3) -> DVec3,
) -> Option<DVec3> {
    match (bound, other) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

impl EmissionTally {
    pub fn record_event(&mut self) {
        self.events += 1;
    }

    pub fn mean_energy(&self) -> Option<Scalar> {
        (self.primaries > 0).then(|| self.energy_sum / self.primaries as Scalar)
    }

    /// Mean emission direction; points at the isocentre for a symmetric assembly.
    pub fn mean_direction(&self) -> Option<DVec3> {
        (self.primaries > 0).then(|| self.direction_sum / self.primaries as Scalar)
    }

    pub fn merge(&mut self, other: &EmissionTally) {
        self.events += other.events;
        self.primaries += other.primaries;
        self.energy_sum += other.energy_sum;
        self.weight_sum += other.weight_sum;
        self.direction_sum += other.direction_sum;
        self.position_min = widen(self.position_min, other.position_min, DVec3::min);
        self.position_max = widen(self.position_max, other.position_max, DVec3::max);
    }
}

impl EmissionSink for EmissionTally {
    fn emit(&mut self, primary: &ParticleState) {
        self.primaries += 1;
        self.energy_sum += primary.energy;
        self.weight_sum += primary.weight;
        self.direction_sum += primary.direction;
        self.position_min = widen(self.position_min, Some(primary.position), DVec3::min);
        self.position_max = widen(self.position_max, Some(primary.position), DVec3::max);
    }
}
