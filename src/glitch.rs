//! Per-frame parameters for the digital glitch stage
//!
//! A strong glitch fires at a random trigger frame every 120 to 240 frames.
//! During the first fifth of each trigger window a milder glitch runs; the
//! rest of the window the stage passes the image through unchanged.

use std::f32::consts::PI;

use crate::random::UnitSource;

const TRIGGER_MIN: u32 = 120;
const TRIGGER_MAX: u32 = 240;

/// Shader uniforms for one frame of the glitch stage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlitchParams {
    pub bypass: bool,
    pub amount: f32,
    pub angle: f32,
    pub seed: f32,
    pub seed_x: f32,
    pub seed_y: f32,
    pub distortion_x: f32,
    pub distortion_y: f32,
    pub col_s: f32,
}

pub struct GlitchDriver {
    frame: u32,
    trigger: u32,
}

impl GlitchDriver {
    pub fn new<R: UnitSource + ?Sized>(rng: &mut R) -> Self {
        Self {
            frame: 0,
            trigger: next_trigger(rng),
        }
    }

    pub fn trigger(&self) -> u32 {
        self.trigger
    }

    pub fn next<R: UnitSource + ?Sized>(&mut self, rng: &mut R) -> GlitchParams {
        let mut params = GlitchParams {
            seed: rng.next_unit(),
            col_s: 0.05,
            ..GlitchParams::default()
        };

        let phase = self.frame % self.trigger;
        if phase == 0 {
            params.amount = rng.next_unit() / 30.0;
            params.angle = rng.symmetric(PI);
            params.seed_x = rng.symmetric(1.0);
            params.seed_y = rng.symmetric(1.0);
            params.distortion_x = rng.next_unit();
            params.distortion_y = rng.next_unit();
            self.frame = 0;
            self.trigger = next_trigger(rng);
        } else if phase < self.trigger / 5 {
            params.amount = rng.next_unit() / 90.0;
            params.angle = rng.symmetric(PI);
            params.distortion_x = rng.next_unit();
            params.distortion_y = rng.next_unit();
            params.seed_x = rng.symmetric(0.3);
            params.seed_y = rng.symmetric(0.3);
        } else {
            params.bypass = true;
        }

        self.frame += 1;
        params
    }
}

fn next_trigger<R: UnitSource + ?Sized>(rng: &mut R) -> u32 {
    let span = (TRIGGER_MAX - TRIGGER_MIN + 1) as f32;
    (TRIGGER_MIN + (rng.next_unit() * span) as u32).min(TRIGGER_MAX)
}
