//! Per-event emission: one canonical sample, one placed primary per active source.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::angles::SourceTable;
use crate::config::{Assembly, AssemblyConfig};
use crate::error::Result;
use crate::phase_space::{ConeSampler, ParticleState, PhaseSpaceSource};
use crate::transform::place;
use crate::Scalar;

/// Seed used when the configuration does not provide one.
pub const DEFAULT_SEED: u64 = 0x5EED_5EED_5EED_5EED;

/// Receiver for emitted primaries, typically the transport engine's "new primary" entry point.
pub trait EmissionSink {
    fn emit(&mut self, primary: &ParticleState);
}

impl EmissionSink for Vec<ParticleState> {
    fn emit(&mut self, primary: &ParticleState) {
        self.push(*primary);
    }
}

/// Adapts a closure into an [`EmissionSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(&ParticleState)> EmissionSink for FnSink<F> {
    fn emit(&mut self, primary: &ParticleState) {
        (self.0)(primary)
    }
}

/// What a host run loop needs from a primary generator: the next event's primaries.
pub trait PrimaryGenerator {
    /// Emits one event's primaries into `sink` and returns how many were emitted.
    fn generate_primaries(&mut self, sink: &mut dyn EmissionSink) -> usize;
}

/// Owns everything needed to emit events for one worker.
pub struct EmissionDriver<S, R> {
    assembly: Assembly,
    sources: SourceTable,
    sampler: S,
    rng: R,
}

impl<R: RngCore> EmissionDriver<ConeSampler, R> {
    /// Driver with the default cone sampler built from the configured polar bounds.
    pub fn cone(config: &AssemblyConfig, sources: SourceTable, rng: R) -> Result<Self> {
        let assembly = config.resolve()?;
        let sampler = ConeSampler::from_assembly(&assembly);
        Ok(Self::with_assembly(assembly, sources, sampler, rng))
    }
}

impl<S: PhaseSpaceSource, R: RngCore> EmissionDriver<S, R> {
    /// Resolves `config` up front so a missing setting fails here and not mid-run.
    pub fn new(config: &AssemblyConfig, sources: SourceTable, sampler: S, rng: R) -> Result<Self> {
        let assembly = config.resolve()?;
        Ok(Self::with_assembly(assembly, sources, sampler, rng))
    }

    pub fn with_assembly(assembly: Assembly, sources: SourceTable, sampler: S, rng: R) -> Self {
        info!(
            sources = sources.len(),
            radius = assembly.radius,
            "emission driver ready"
        );
        Self {
            assembly,
            sources,
            sampler,
            rng,
        }
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    /// Swaps in a new source set between events.
    pub fn reload_sources(&mut self, sources: SourceTable) {
        debug!(previous = self.sources.len(), next = sources.len(), "reloading sources");
        self.sources = sources;
    }

    /// Applies a new configuration between events. On error the previous one stays active.
    pub fn reconfigure(&mut self, config: &AssemblyConfig) -> Result<()> {
        self.assembly = config.resolve()?;
        Ok(())
    }

    /// Draws this event's gantry angle, uniform in `[rot_start, rot_stop]`.
    pub fn sample_gantry_angle(&mut self) -> Scalar {
        let Assembly {
            rot_start,
            rot_stop,
            ..
        } = self.assembly;
        if self.assembly.gantry_is_fixed() {
            return rot_start;
        }
        let u: Scalar = self.rng.gen();
        rot_start + (rot_stop - rot_start) * u
    }

    /// Emits one event: a single canonical sample placed at every source in table order.
    pub fn emit_event(&mut self, sink: &mut dyn EmissionSink) -> usize {
        let gantry_angle = self.sample_gantry_angle();
        let state = self.sampler.sample(&mut self.rng);
        for frame in self.sources.frames() {
            let primary = place(&state, frame, gantry_angle, &self.assembly);
            sink.emit(&primary);
        }
        self.sources.len()
    }
}

impl<S: PhaseSpaceSource, R: RngCore> PrimaryGenerator for EmissionDriver<S, R> {
    fn generate_primaries(&mut self, sink: &mut dyn EmissionSink) -> usize {
        self.emit_event(sink)
    }
}

/// Generator for worker `worker`: every worker shares the seed but draws from its own stream.
pub fn worker_rng(seed: u64, worker: u64) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(worker);
    rng
}
