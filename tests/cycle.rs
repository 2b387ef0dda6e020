use std::cell::RefCell;
use std::rc::Rc;

use driftfield::effect::start_cycle;
use driftfield::{
    launch, AppConfig, EffectConfig, EffectPipeline, EffectScheduler, EffectStage, EffectState,
    FieldConfig, FieldError, FrameView, ManualFrameClock, ManualTimer, RenderSurface,
    SimulationState, StageList,
};

const ON: [EffectStage; 3] = [EffectStage::Render, EffectStage::Glitch, EffectStage::Output];
const OFF: [EffectStage; 2] = [EffectStage::Render, EffectStage::Output];

/// Records draws and every stage list it is handed.
#[derive(Default)]
struct RecordingSurface {
    draws: usize,
    fail: bool,
    stages: Vec<EffectStage>,
    history: Vec<Vec<EffectStage>>,
    drawn_with: Vec<Vec<EffectStage>>,
}

impl RenderSurface for RecordingSurface {
    fn draw(&mut self, _frame: &FrameView<'_>) -> driftfield::Result<()> {
        if self.fail {
            return Err(FieldError::Surface("lost".into()));
        }
        self.draws += 1;
        self.drawn_with.push(self.stages.clone());
        Ok(())
    }
}

impl EffectPipeline for RecordingSurface {
    fn set_stages(&mut self, stages: &[EffectStage]) {
        self.stages = stages.to_vec();
        self.history.push(self.stages.clone());
    }

    fn stages(&self) -> &[EffectStage] {
        &self.stages
    }
}

fn config() -> AppConfig {
    AppConfig {
        field: FieldConfig {
            particle_count: 16,
            seed: Some(1),
            ..FieldConfig::default()
        },
        effect: EffectConfig::default(),
    }
}

#[test]
fn timer_firings_swap_stage_lists() {
    let mut timer = ManualTimer::new();
    let scheduler = Rc::new(RefCell::new(
        EffectScheduler::new(&EffectConfig::default()).unwrap(),
    ));
    let pipeline = Rc::new(RefCell::new(StageList::default()));

    start_cycle(&mut timer, scheduler.clone(), pipeline.clone()).unwrap();
    assert!(pipeline.borrow().stages().is_empty());

    timer.advance(17_999);
    assert!(pipeline.borrow().stages().is_empty());
    assert_eq!(scheduler.borrow().state(), EffectState::Off);

    timer.advance(1);
    assert_eq!(pipeline.borrow().stages(), &ON);

    timer.advance(18_000);
    assert_eq!(pipeline.borrow().stages(), &OFF);
    assert_eq!(scheduler.borrow().toggles(), 2);
}

#[test]
fn state_follows_timeline_over_many_intervals() {
    let mut timer = ManualTimer::new();
    let scheduler = Rc::new(RefCell::new(
        EffectScheduler::new(&EffectConfig::default()).unwrap(),
    ));
    let pipeline = Rc::new(RefCell::new(StageList::default()));
    start_cycle(&mut timer, scheduler.clone(), pipeline).unwrap();

    // sample every 1.5 s for ten minutes
    for _ in 0..400 {
        timer.advance(1_500);
        let expected = scheduler.borrow().state_at(timer.now_ms());
        assert_eq!(scheduler.borrow().state(), expected, "at {} ms", timer.now_ms());
    }
}

#[test]
fn launch_runs_frames_and_cycle_until_stopped() {
    let config = config();
    let state = Rc::new(RefCell::new(SimulationState::from_config(&config).unwrap()));
    let scheduler = Rc::new(RefCell::new(EffectScheduler::new(&config.effect).unwrap()));
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let clock = ManualFrameClock::new();
    let timer = ManualTimer::new();

    let mut animation = launch(
        state.clone(),
        scheduler,
        surface.clone(),
        clock.clone(),
        timer.clone(),
    )
    .unwrap();
    assert!(animation.is_running());

    // initial empty chain installed before the first frame
    assert_eq!(surface.borrow().history, vec![Vec::<EffectStage>::new()]);

    clock.tick(16.0);
    clock.tick(32.0);
    assert_eq!(state.borrow().frames(), 2);
    assert_eq!(surface.borrow().draws, 2);

    timer.advance(18_000);
    clock.tick(48.0);
    assert_eq!(surface.borrow().drawn_with.last().unwrap(), &ON.to_vec());

    timer.advance(18_000);
    assert_eq!(surface.borrow().stages, OFF.to_vec());
    assert_eq!(
        surface.borrow().history,
        vec![Vec::new(), ON.to_vec(), OFF.to_vec()]
    );

    animation.stop();
    assert!(!animation.is_running());
    assert_eq!(clock.active(), 0);
    assert_eq!(timer.pending(), 0);

    clock.tick(64.0);
    timer.advance(100_000);
    assert_eq!(state.borrow().frames(), 3);
    assert_eq!(surface.borrow().history.len(), 3);

    // stopping twice is harmless
    animation.stop();
}

#[test]
fn failed_draws_keep_simulating() {
    let config = config();
    let state = Rc::new(RefCell::new(SimulationState::from_config(&config).unwrap()));
    let scheduler = Rc::new(RefCell::new(EffectScheduler::new(&config.effect).unwrap()));
    let surface = Rc::new(RefCell::new(RecordingSurface {
        fail: true,
        ..RecordingSurface::default()
    }));
    let clock = ManualFrameClock::new();

    let mut animation = launch(
        state.clone(),
        scheduler,
        surface.clone(),
        clock.clone(),
        ManualTimer::new(),
    )
    .unwrap();

    clock.tick(16.0);
    clock.tick(32.0);
    assert_eq!(state.borrow().frames(), 2);
    assert_eq!(state.borrow().skipped(), 2);
    assert!(state.borrow().field().dirty().any());

    surface.borrow_mut().fail = false;
    clock.tick(48.0);
    assert_eq!(surface.borrow().draws, 1);
    assert!(!state.borrow().field().dirty().any());

    animation.stop();
}

#[test]
fn start_active_installs_full_chain_first() {
    let mut config = config();
    config.effect.start_active = true;
    let state = Rc::new(RefCell::new(SimulationState::from_config(&config).unwrap()));
    let scheduler = Rc::new(RefCell::new(EffectScheduler::new(&config.effect).unwrap()));
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let timer = ManualTimer::new();

    let mut animation = launch(
        state,
        scheduler,
        surface.clone(),
        ManualFrameClock::new(),
        timer.clone(),
    )
    .unwrap();
    assert_eq!(surface.borrow().stages, ON.to_vec());

    timer.advance(18_000);
    assert_eq!(surface.borrow().stages, OFF.to_vec());
    animation.stop();
}

#[test]
fn dropping_animation_cancels_loop_and_cycle() {
    let config = config();
    let state = Rc::new(RefCell::new(SimulationState::from_config(&config).unwrap()));
    let scheduler = Rc::new(RefCell::new(EffectScheduler::new(&config.effect).unwrap()));
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let clock = ManualFrameClock::new();
    let timer = ManualTimer::new();

    let animation = launch(
        state.clone(),
        scheduler,
        surface.clone(),
        clock.clone(),
        timer.clone(),
    )
    .unwrap();
    clock.tick(16.0);
    assert_eq!(clock.active(), 1);
    assert_eq!(timer.pending(), 1);

    drop(animation);
    assert_eq!(clock.active(), 0);
    assert_eq!(timer.pending(), 0);

    clock.tick(32.0);
    timer.advance(36_000);
    assert_eq!(state.borrow().frames(), 1);
    assert_eq!(surface.borrow().history.len(), 1);
}
