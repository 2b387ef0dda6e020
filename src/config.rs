//! Runtime configuration, loadable from JSON

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};

/// Largest field the point buffers can address with a GL `i32` draw count.
pub const MAX_PARTICLES: usize = 10_000_000;

/// Longest toggle interval a browser `setInterval` accepts.
pub const MAX_INTERVAL_MS: u32 = i32::MAX as u32;

/// Particle field settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub particle_count: usize,
    /// Half-width of the working volume; positions live in `[-extent, extent]`.
    pub extent: f32,
    /// Per-frame decrement applied to x and y.
    pub drift_step: f32,
    /// Maximum per-frame change of each color channel.
    pub color_jitter: f32,
    /// Clamp colors to `[0, 1]` after jitter. Off by default: colors drift freely.
    pub clamp_colors: bool,
    /// Fixed seed for reproducible runs; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            particle_count: 1000,
            extent: 5.0,
            drift_step: 0.001,
            color_jitter: 0.005,
            clamp_colors: false,
            seed: None,
        }
    }
}

impl FieldConfig {
    pub fn validate(&self) -> Result<()> {
        if self.particle_count == 0 {
            return Err(FieldError::Config("particle_count must be at least 1".into()));
        }
        if self.particle_count > MAX_PARTICLES {
            return Err(FieldError::Config(format!(
                "particle_count must be at most {MAX_PARTICLES}, got {}",
                self.particle_count
            )));
        }
        positive("extent", self.extent)?;
        non_negative("drift_step", self.drift_step)?;
        non_negative("color_jitter", self.color_jitter)?;
        Ok(())
    }
}

/// Glitch cycle settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Wall-clock time between toggles.
    pub interval_ms: u32,
    /// Start with the glitch chain attached instead of waiting one interval.
    pub start_active: bool,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            interval_ms: 18_000,
            start_active: false,
        }
    }
}

impl EffectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(FieldError::Config("interval_ms must be non-zero".into()));
        }
        if self.interval_ms > MAX_INTERVAL_MS {
            return Err(FieldError::Config(format!(
                "interval_ms must be at most {MAX_INTERVAL_MS}, got {}",
                self.interval_ms
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub field: FieldConfig,
    pub effect: EffectConfig,
}

impl AppConfig {
    /// Parse and validate a JSON document. Missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.field.validate()?;
        self.effect.validate()
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FieldError::Config(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FieldError::Config(format!("{name} must be non-negative, got {value}")))
    }
}
