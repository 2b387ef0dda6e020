//! Particle field: flat position/color buffers with per-frame drift and reset
//!
//! Storage is two parallel `f32` arrays of length `3N`, laid out so they can
//! be uploaded to the GPU as-is. Particle `i` lives at offsets `3i..3i + 3`
//! in both. Particles are never added or removed after construction.

use crate::config::FieldConfig;
use crate::error::Result;
use crate::random::UnitSource;

/// Which buffers changed since the last successful upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub positions: bool,
    pub colors: bool,
}

impl DirtyFlags {
    pub const ALL: DirtyFlags = DirtyFlags {
        positions: true,
        colors: true,
    };

    pub fn any(self) -> bool {
        self.positions || self.colors
    }
}

pub struct ParticleField {
    positions: Vec<f32>,
    colors: Vec<f32>,
    dirty: DirtyFlags,
    extent: f32,
    drift_step: f32,
    color_jitter: f32,
    clamp_colors: bool,
}

impl ParticleField {
    /// Allocate `config.particle_count` particles with random positions in the
    /// working volume and random colors in `[0, 1)`.
    pub fn new<R: UnitSource + ?Sized>(config: &FieldConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let n = config.particle_count;
        let mut positions = Vec::with_capacity(n * 3);
        let mut colors = Vec::with_capacity(n * 3);
        for _ in 0..n {
            for _ in 0..3 {
                positions.push(rng.symmetric(config.extent));
            }
            for _ in 0..3 {
                colors.push(rng.next_unit());
            }
        }

        Ok(Self {
            positions,
            colors,
            dirty: DirtyFlags::ALL,
            extent: config.extent,
            drift_step: config.drift_step,
            color_jitter: config.color_jitter,
            clamp_colors: config.clamp_colors,
        })
    }

    /// Advance every particle by one frame.
    ///
    /// Per particle: drift x and y by `-drift_step`, resample the whole
    /// position if x or y fell strictly below `-extent`, then jitter each
    /// color channel.
    pub fn step<R: UnitSource + ?Sized>(&mut self, rng: &mut R) {
        let extent = self.extent;
        let jitter = self.color_jitter;

        for (pos, color) in self
            .positions
            .chunks_exact_mut(3)
            .zip(self.colors.chunks_exact_mut(3))
        {
            pos[0] -= self.drift_step;
            pos[1] -= self.drift_step;
            if pos[0] < -extent || pos[1] < -extent {
                pos[0] = rng.symmetric(extent);
                pos[1] = rng.symmetric(extent);
                pos[2] = rng.symmetric(extent);
            }

            for c in color.iter_mut() {
                *c += rng.symmetric(jitter);
                if self.clamp_colors {
                    *c = c.clamp(0.0, 1.0);
                }
            }
        }

        self.dirty = DirtyFlags::ALL;
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn position(&self, index: usize) -> [f32; 3] {
        let p = &self.positions[index * 3..index * 3 + 3];
        [p[0], p[1], p[2]]
    }

    pub fn color(&self, index: usize) -> [f32; 3] {
        let c = &self.colors[index * 3..index * 3 + 3];
        [c[0], c[1], c[2]]
    }

    /// Overwrite one particle's position.
    pub fn set_position(&mut self, index: usize, position: [f32; 3]) {
        self.positions[index * 3..index * 3 + 3].copy_from_slice(&position);
        self.dirty.positions = true;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Return the pending flags and clear them.
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.dirty)
    }

    /// Re-raise flags taken for an upload that did not happen.
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty.positions |= flags.positions;
        self.dirty.colors |= flags.colors;
    }
}
