//! Simulation state, the render surface seam, and the running animation

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;

use crate::clock::{FrameClock, Timer};
use crate::config::AppConfig;
use crate::effect::{start_cycle, EffectPipeline, EffectScheduler};
use crate::error::Result;
use crate::particles::{DirtyFlags, ParticleField};
use crate::random::{seeded_rng, UnitSource};
use crate::scene::{CameraRig, DragDelta, SolidMotion};

/// Everything a surface needs to draw one frame.
pub struct FrameView<'a> {
    pub field: &'a ParticleField,
    /// Buffers that changed since the last successful draw.
    pub dirty: DirtyFlags,
    pub solids: &'a SolidMotion,
    pub camera: &'a CameraRig,
    pub timestamp_ms: f64,
}

/// Draws frames. Effect-chain control is the separate [`EffectPipeline`] seam.
pub trait RenderSurface {
    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()>;
}

/// State mutated by the frame callback and nothing else.
pub struct SimulationState<R: UnitSource = StdRng> {
    field: ParticleField,
    rng: R,
    solids: SolidMotion,
    camera: CameraRig,
    frames: u64,
    skipped: u64,
}

impl SimulationState<StdRng> {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let rng = seeded_rng(config.field.seed)?;
        Self::with_source(config, rng)
    }
}

impl<R: UnitSource> SimulationState<R> {
    pub fn with_source(config: &AppConfig, mut rng: R) -> Result<Self> {
        let field = ParticleField::new(&config.field, &mut rng)?;
        Ok(Self {
            field,
            rng,
            solids: SolidMotion::default(),
            camera: CameraRig::default(),
            frames: 0,
            skipped: 0,
        })
    }

    /// Advance one frame and draw it. A failed draw is skipped; the buffers
    /// stay dirty so the next successful draw uploads them.
    pub fn frame<S: RenderSurface + ?Sized>(&mut self, timestamp_ms: f64, surface: &mut S) {
        self.solids.advance();
        self.field.step(&mut self.rng);
        self.frames += 1;

        let dirty = self.field.take_dirty();
        let view = FrameView {
            field: &self.field,
            dirty,
            solids: &self.solids,
            camera: &self.camera,
            timestamp_ms,
        };
        if let Err(e) = surface.draw(&view) {
            self.skipped += 1;
            log::warn!("skipping frame {}: {e}", self.frames);
            self.field.mark_dirty(dirty);
        }
    }

    pub fn apply_drag(&mut self, delta: DragDelta) {
        self.camera.apply_drag(delta);
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn solids(&self) -> &SolidMotion {
        &self.solids
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    /// Frames simulated so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames whose draw failed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// A running frame loop plus effect cycle. Dropping it stops both.
pub struct Animation<C: FrameClock, T: Timer> {
    clock: C,
    timer: T,
    frame_handle: Option<C::Handle>,
    cycle_handle: Option<T::Handle>,
}

impl<C: FrameClock, T: Timer> Animation<C, T> {
    /// Cancel the frame loop and the pending toggle. Safe to call twice.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        if let Some(handle) = self.frame_handle.take() {
            self.clock.cancel(handle);
        }
        if let Some(handle) = self.cycle_handle.take() {
            self.timer.cancel(handle);
        }
        if was_running {
            log::info!("animation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.frame_handle.is_some() || self.cycle_handle.is_some()
    }
}

impl<C: FrameClock, T: Timer> Drop for Animation<C, T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Install the initial effect stages on `surface`, then start the frame loop
/// on `clock` and the effect cycle on `timer`.
pub fn launch<R, S, C, T>(
    state: Rc<RefCell<SimulationState<R>>>,
    scheduler: Rc<RefCell<EffectScheduler>>,
    surface: Rc<RefCell<S>>,
    mut clock: C,
    mut timer: T,
) -> Result<Animation<C, T>>
where
    R: UnitSource + 'static,
    S: RenderSurface + EffectPipeline + 'static,
    C: FrameClock,
    T: Timer,
{
    surface
        .borrow_mut()
        .set_stages(scheduler.borrow().initial_stages());

    log::info!(
        "launching {} particles, glitch toggles every {} ms",
        state.borrow().field().len(),
        scheduler.borrow().interval_ms()
    );

    let frame_surface = surface.clone();
    let frame_handle = clock.start(Box::new(move |timestamp_ms| {
        state
            .borrow_mut()
            .frame(timestamp_ms, &mut *frame_surface.borrow_mut());
    }))?;

    let cycle_handle = match start_cycle(&mut timer, scheduler, surface) {
        Ok(handle) => handle,
        Err(e) => {
            clock.cancel(frame_handle);
            return Err(e);
        }
    };

    Ok(Animation {
        clock,
        timer,
        frame_handle: Some(frame_handle),
        cycle_handle: Some(cycle_handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use crate::error::FieldError;
    use crate::random::ScriptedSource;

    struct FailingSurface;

    impl RenderSurface for FailingSurface {
        fn draw(&mut self, _frame: &FrameView<'_>) -> Result<()> {
            Err(FieldError::Surface("context lost".into()))
        }
    }

    #[derive(Default)]
    struct CountingSurface {
        draws: usize,
        uploads: usize,
    }

    impl RenderSurface for CountingSurface {
        fn draw(&mut self, frame: &FrameView<'_>) -> Result<()> {
            self.draws += 1;
            if frame.dirty.any() {
                self.uploads += 1;
            }
            Ok(())
        }
    }

    fn small_config() -> AppConfig {
        AppConfig {
            field: FieldConfig {
                particle_count: 8,
                seed: Some(3),
                ..FieldConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn failed_draw_keeps_buffers_dirty() {
        let mut state = SimulationState::from_config(&small_config()).unwrap();
        state.frame(0.0, &mut FailingSurface);
        assert_eq!(state.frames(), 1);
        assert_eq!(state.skipped(), 1);
        assert_eq!(state.field().dirty(), DirtyFlags::ALL);
    }

    #[test]
    fn successful_draw_clears_dirty() {
        let mut state = SimulationState::from_config(&small_config()).unwrap();
        let mut surface = CountingSurface::default();
        state.frame(0.0, &mut surface);
        state.frame(16.0, &mut surface);
        assert_eq!(surface.draws, 2);
        assert_eq!(surface.uploads, 2);
        assert!(!state.field().dirty().any());
    }

    #[test]
    fn frame_advances_solids() {
        let source = ScriptedSource::new(vec![0.25, 0.75]);
        let mut state = SimulationState::with_source(&small_config(), source).unwrap();
        state.frame(0.0, &mut CountingSurface::default());
        assert_eq!(state.solids().ring_y, crate::scene::SPIN_STEP);
    }

    #[test]
    fn huge_particle_count_is_a_config_error() {
        let config = AppConfig::from_json(r#"{ "field": { "seed": 1 } }"#).unwrap();
        let config = AppConfig {
            field: FieldConfig {
                particle_count: usize::MAX,
                ..config.field
            },
            ..config
        };
        let err = SimulationState::from_config(&config).err().unwrap();
        assert!(matches!(err, FieldError::Config(_)));
    }
}
