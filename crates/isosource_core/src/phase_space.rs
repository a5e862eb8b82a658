//! Canonical-frame phase-space sampling.
//!
//! Every sampler returns particles at the origin of the cone frame, travelling around the +x
//! axis. Placement at an emitter happens later in [`crate::transform`].

use std::f64::consts::TAU;

use glam::DVec3;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::Assembly;
use crate::error::{Result, SourceError};
use crate::Scalar;

/// Co-60 gamma lines in MeV.
pub const CO60_LINES: [Scalar; 2] = [1.17, 1.33];

/// Phase-space state of one particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    pub weight: Scalar,
    pub energy: Scalar,
    pub position: DVec3,
    /// Unit vector.
    pub direction: DVec3,
}

impl ParticleState {
    pub fn new(energy: Scalar, position: DVec3, direction: DVec3) -> Self {
        Self {
            weight: 1.0,
            energy,
            position,
            direction,
        }
    }
}

/// Anything able to produce canonical-frame particles, one per call.
pub trait PhaseSpaceSource {
    fn sample(&mut self, rng: &mut dyn RngCore) -> ParticleState;
}

/// Discrete energy spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnergySpectrum {
    Monoenergetic(Scalar),
    /// Line energies with cumulative probabilities; the last entry is always 1.
    Lines {
        energies: Vec<Scalar>,
        cumulative: Vec<Scalar>,
    },
}

impl EnergySpectrum {
    /// Builds a line spectrum from `(energy, weight)` pairs. Weights are normalised.
    pub fn lines(lines: &[(Scalar, Scalar)]) -> Result<Self> {
        if lines.is_empty() {
            return Err(SourceError::Spectrum("at least one line is required"));
        }
        if lines
            .iter()
            .any(|&(e, w)| !e.is_finite() || !w.is_finite() || e < 0.0 || w < 0.0)
        {
            return Err(SourceError::Spectrum(
                "energies and weights must be finite and non-negative",
            ));
        }
        let total: Scalar = lines.iter().map(|&(_, w)| w).sum();
        if total <= 0.0 {
            return Err(SourceError::Spectrum("line weights sum to zero"));
        }

        let mut acc = 0.0;
        let mut cumulative = Vec::with_capacity(lines.len());
        for &(_, w) in lines {
            acc += w / total;
            cumulative.push(acc);
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self::Lines {
            energies: lines.iter().map(|&(e, _)| e).collect(),
            cumulative,
        })
    }

    /// Two-line Co-60 spectrum: 1.33 MeV and 1.17 MeV with equal probability.
    pub fn cobalt60() -> Self {
        Self::Lines {
            energies: vec![CO60_LINES[1], CO60_LINES[0]],
            cumulative: vec![0.5, 1.0],
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Scalar {
        match self {
            Self::Monoenergetic(energy) => *energy,
            Self::Lines {
                energies,
                cumulative,
            } => {
                let u: Scalar = rng.gen();
                let idx = cumulative.partition_point(|&c| c <= u);
                energies[idx.min(energies.len() - 1)]
            }
        }
    }
}

impl Default for EnergySpectrum {
    fn default() -> Self {
        Self::cobalt60()
    }
}

/// Uniform cone sampler around the +x axis.
///
/// `polar_start` and `polar_stop` are cosines of the bounding polar angles, so the larger
/// physical angle corresponds to `polar_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeSampler {
    pub polar_start: Scalar,
    pub polar_stop: Scalar,
    pub spectrum: EnergySpectrum,
}

impl ConeSampler {
    pub fn new(polar_start: Scalar, polar_stop: Scalar, spectrum: EnergySpectrum) -> Self {
        Self {
            polar_start,
            polar_stop,
            spectrum,
        }
    }

    pub fn from_assembly(assembly: &Assembly) -> Self {
        Self::new(
            assembly.polar_start,
            assembly.polar_stop,
            EnergySpectrum::default(),
        )
    }

    /// Draws a unit direction inside the cone.
    pub fn sample_direction(&self, rng: &mut dyn RngCore) -> DVec3 {
        let u: Scalar = rng.gen();
        let cos_theta = self.polar_start + (self.polar_stop - self.polar_start) * u;
        // (1 - c)(1 + c) keeps precision near c = ±1
        let sin_theta = ((1.0 - cos_theta) * (1.0 + cos_theta)).max(0.0).sqrt();
        let phi = TAU * rng.gen::<Scalar>();
        let (sin_phi, cos_phi) = phi.sin_cos();
        DVec3::new(cos_theta, sin_theta * sin_phi, sin_theta * cos_phi)
    }
}

impl PhaseSpaceSource for ConeSampler {
    fn sample(&mut self, rng: &mut dyn RngCore) -> ParticleState {
        let direction = self.sample_direction(rng);
        let energy = self.spectrum.sample(rng);
        ParticleState::new(energy, DVec3::ZERO, direction)
    }
}

/// Replays pre-recorded canonical states in order, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    states: Vec<ParticleState>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(states: Vec<ParticleState>) -> Result<Self> {
        if states.is_empty() {
            return Err(SourceError::Spectrum("replay source needs at least one state"));
        }
        Ok(Self { states, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl PhaseSpaceSource for ReplaySource {
    fn sample(&mut self, _rng: &mut dyn RngCore) -> ParticleState {
        let state = self.states[self.cursor];
        self.cursor = (self.cursor + 1) % self.states.len();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn cone_directions_are_unit_and_bounded() {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut sampler = ConeSampler::new(0.8, 0.95, EnergySpectrum::default());
        for _ in 0..4096 {
            let state = sampler.sample(&mut rng);
            assert!((state.direction.length() - 1.0).abs() < 1e-12);
            assert!(state.direction.x >= 0.8 - 1e-12 && state.direction.x <= 0.95 + 1e-12);
            assert_eq!(state.position, DVec3::ZERO);
            assert_eq!(state.weight, 1.0);
        }
    }

    #[test]
    fn reversed_bounds_sample_the_same_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let sampler = ConeSampler::new(0.95, 0.8, EnergySpectrum::Monoenergetic(1.0));
        for _ in 0..1024 {
            let dir = sampler.sample_direction(&mut rng);
            assert!(dir.x >= 0.8 - 1e-12 && dir.x <= 0.95 + 1e-12);
        }
    }

    #[test]
    fn closed_cone_points_along_axis() {
        let mut rng = StdRng::seed_from_u64(1);
        let sampler = ConeSampler::new(1.0, 1.0, EnergySpectrum::default());
        for _ in 0..64 {
            assert_eq!(sampler.sample_direction(&mut rng), DVec3::X);
        }

        let backwards = ConeSampler::new(-1.0, -1.0, EnergySpectrum::default());
        let dir = backwards.sample_direction(&mut rng);
        assert_eq!(dir.x, -1.0);
        assert_eq!(dir.y, 0.0);
        assert_eq!(dir.z, 0.0);
    }

    #[test]
    fn cobalt_spectrum_only_emits_its_two_lines() {
        let mut rng = StdRng::seed_from_u64(0x60);
        let spectrum = EnergySpectrum::cobalt60();
        let mut high = 0usize;
        let n = 20_000;
        for _ in 0..n {
            let e = spectrum.sample(&mut rng);
            assert!(e == 1.17 || e == 1.33, "unexpected line {e}");
            if e == 1.33 {
                high += 1;
            }
        }
        let fraction = high as f64 / n as f64;
        assert!((fraction - 0.5).abs() < 0.02, "1.33 MeV fraction {fraction}");
    }

    #[test]
    fn line_spectrum_validation() {
        assert!(EnergySpectrum::lines(&[]).is_err());
        assert!(EnergySpectrum::lines(&[(1.0, 0.0)]).is_err());
        assert!(EnergySpectrum::lines(&[(-1.0, 1.0)]).is_err());

        let spectrum = EnergySpectrum::lines(&[(0.5, 3.0), (2.0, 1.0)]).unwrap();
        match &spectrum {
            EnergySpectrum::Lines { cumulative, .. } => {
                assert!((cumulative[0] - 0.75).abs() < 1e-12);
                assert_eq!(cumulative[1], 1.0);
            }
            other => panic!("expected line spectrum, got {other:?}"),
        }
    }

    #[test]
    fn replay_source_wraps_around() {
        let a = ParticleState::new(1.0, DVec3::ZERO, DVec3::X);
        let b = ParticleState::new(2.0, DVec3::ZERO, DVec3::Y);
        let mut source = ReplaySource::new(vec![a, b]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let energies: Vec<_> = (0..5).map(|_| source.sample(&mut rng).energy).collect();
        assert_eq!(energies, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        assert!(ReplaySource::new(Vec::new()).is_err());
    }
}
