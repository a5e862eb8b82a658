//! Core emission logic for an isocentric multi-emitter source assembly, independent of any
//! transport engine or run shell.
//!
//! This crate hosts:
//! - the angle table and the per-source frame cache derived from it
//! - canonical-frame phase-space sampling (cone around the x axis)
//! - the assembly transform placing a canonical particle at each emitter in the lab frame
//! - the per-event emission driver and the command surface that configures it

pub mod angles;
pub mod config;
pub mod emission;
pub mod error;
pub mod messenger;
pub mod metrics;
pub mod phase_space;
pub mod transform;

/// Convenience re-export for the scalar type used across the source model.
pub type Scalar = f64;

pub fn version_string() -> &'static str {
    concat!("isosource_core ", env!("CARGO_PKG_VERSION"))
}

pub use angles::{SourceAngle, SourceFrame, SourceTable};
pub use config::{Assembly, AssemblyConfig};
pub use emission::{worker_rng, EmissionDriver, EmissionSink, FnSink, PrimaryGenerator};
pub use error::SourceError;
pub use phase_space::{ConeSampler, EnergySpectrum, ParticleState, PhaseSpaceSource, ReplaySource};
pub use transform::{place, unplace, Rotation};
