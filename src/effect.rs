//! Glitch effect cycle: a two-state machine that swaps the post-processing
//! stage list on a fixed wall-clock period.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::clock::Timer;
use crate::config::EffectConfig;
use crate::error::Result;

/// One step of the post-processing chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectStage {
    /// Render the scene into the offscreen target.
    Render,
    /// Digital glitch distortion.
    Glitch,
    /// Present the result to the screen.
    Output,
}

impl EffectStage {
    pub fn name(self) -> &'static str {
        match self {
            EffectStage::Render => "render",
            EffectStage::Glitch => "glitch",
            EffectStage::Output => "output",
        }
    }
}

impl fmt::Display for EffectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectState {
    On,
    Off,
}

const ON_STAGES: [EffectStage; 3] = [EffectStage::Render, EffectStage::Glitch, EffectStage::Output];
const OFF_STAGES: [EffectStage; 2] = [EffectStage::Render, EffectStage::Output];

impl EffectState {
    /// The complete stage list for this state.
    pub fn stages(self) -> &'static [EffectStage] {
        match self {
            EffectState::On => &ON_STAGES,
            EffectState::Off => &OFF_STAGES,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            EffectState::On => EffectState::Off,
            EffectState::Off => EffectState::On,
        }
    }
}

/// Something that holds an ordered list of effect stages.
///
/// Implementations replace the whole list at once so a draw never observes a
/// partially updated chain.
pub trait EffectPipeline {
    fn set_stages(&mut self, stages: &[EffectStage]);

    fn stages(&self) -> &[EffectStage];
}

/// A plain stage list, for hosts without a GPU.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageList(Vec<EffectStage>);

impl EffectPipeline for StageList {
    fn set_stages(&mut self, stages: &[EffectStage]) {
        self.0 = stages.to_vec();
    }

    fn stages(&self) -> &[EffectStage] {
        &self.0
    }
}

pub struct EffectScheduler {
    state: EffectState,
    start_active: bool,
    interval_ms: u32,
    toggles: u64,
}

impl EffectScheduler {
    pub fn new(config: &EffectConfig) -> Result<Self> {
        config.validate()?;
        let state = if config.start_active {
            EffectState::On
        } else {
            EffectState::Off
        };
        Ok(Self {
            state,
            start_active: config.start_active,
            interval_ms: config.interval_ms,
            toggles: 0,
        })
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Stages to install before the first firing. An inactive start runs with
    /// no chain at all until the effect is first enabled.
    pub fn initial_stages(&self) -> &'static [EffectStage] {
        if self.start_active {
            EffectState::On.stages()
        } else {
            &[]
        }
    }

    /// Flip the state and swap the matching stage list into `pipeline`.
    pub fn fire<P: EffectPipeline + ?Sized>(&mut self, pipeline: &mut P) -> EffectState {
        self.state = self.state.flipped();
        self.toggles += 1;
        pipeline.set_stages(self.state.stages());
        log::info!(
            "glitch effect {} ({})",
            if self.state == EffectState::On { "on" } else { "off" },
            StageNames(self.state.stages())
        );
        self.state
    }

    /// State the cycle is in `elapsed_ms` after start, assuming it runs
    /// uninterrupted.
    pub fn state_at(&self, elapsed_ms: u64) -> EffectState {
        let firings = elapsed_ms / u64::from(self.interval_ms);
        let initial = if self.start_active {
            EffectState::On
        } else {
            EffectState::Off
        };
        if firings % 2 == 0 {
            initial
        } else {
            initial.flipped()
        }
    }
}

struct StageNames(&'static [EffectStage]);

impl fmt::Display for StageNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

/// Register the scheduler on `timer` so it fires every interval against
/// `pipeline`. Cancel the returned handle to stop the cycle.
pub fn start_cycle<T, P>(
    timer: &mut T,
    scheduler: Rc<RefCell<EffectScheduler>>,
    pipeline: Rc<RefCell<P>>,
) -> Result<T::Handle>
where
    T: Timer,
    P: EffectPipeline + 'static,
{
    let interval = scheduler.borrow().interval_ms();
    timer.every(
        interval,
        Box::new(move || {
            scheduler.borrow_mut().fire(&mut *pipeline.borrow_mut());
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(start_active: bool) -> EffectScheduler {
        EffectScheduler::new(&EffectConfig {
            interval_ms: 18_000,
            start_active,
        })
        .unwrap()
    }

    #[test]
    fn off_then_on_then_off() {
        let mut s = scheduler(false);
        let mut pipeline = StageList::default();
        pipeline.set_stages(s.initial_stages());
        assert!(pipeline.stages().is_empty());

        assert_eq!(s.fire(&mut pipeline), EffectState::On);
        assert_eq!(
            pipeline.stages(),
            &[EffectStage::Render, EffectStage::Glitch, EffectStage::Output]
        );

        assert_eq!(s.fire(&mut pipeline), EffectState::Off);
        assert_eq!(pipeline.stages(), &[EffectStage::Render, EffectStage::Output]);
        assert_eq!(s.toggles(), 2);
    }

    #[test]
    fn reenable_does_not_accumulate_stages() {
        let mut s = scheduler(false);
        let mut pipeline = StageList::default();
        for _ in 0..9 {
            s.fire(&mut pipeline);
        }
        assert_eq!(s.state(), EffectState::On);
        assert_eq!(pipeline.stages().len(), 3);
    }

    #[test]
    fn timeline_alternates_per_interval() {
        let s = scheduler(false);
        for k in 0..4u64 {
            let off_start = 2 * k * 18_000;
            let on_start = (2 * k + 1) * 18_000;
            assert_eq!(s.state_at(off_start), EffectState::Off);
            assert_eq!(s.state_at(on_start - 1), EffectState::Off);
            assert_eq!(s.state_at(on_start), EffectState::On);
            assert_eq!(s.state_at(on_start + 17_999), EffectState::On);
        }
    }

    #[test]
    fn start_active_begins_with_full_chain() {
        let s = scheduler(true);
        assert_eq!(s.state(), EffectState::On);
        assert_eq!(s.initial_stages().len(), 3);
        assert_eq!(s.state_at(18_000), EffectState::Off);
    }

    #[test]
    fn stage_names_join() {
        assert_eq!(
            StageNames(EffectState::On.stages()).to_string(),
            "render -> glitch -> output"
        );
    }
}
