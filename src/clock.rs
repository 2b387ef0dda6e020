//! Frame clock and repeating timer abstractions
//!
//! The browser implementations live in the `wasm` module. The manual ones
//! here run on virtual time so loops and toggles can be driven step by step.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{FieldError, Result};

/// Runs a callback once per display refresh until cancelled.
pub trait FrameClock {
    type Handle;

    /// The callback receives a timestamp in milliseconds.
    fn start(&mut self, callback: Box<dyn FnMut(f64)>) -> Result<Self::Handle>;

    fn cancel(&mut self, handle: Self::Handle);
}

/// Fires a callback every `interval_ms` until cancelled.
pub trait Timer {
    type Handle;

    fn every(&mut self, interval_ms: u32, callback: Box<dyn FnMut()>) -> Result<Self::Handle>;

    fn cancel(&mut self, handle: Self::Handle);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ManualHandle(u64);

struct FrameEntry {
    id: u64,
    // None while the callback is running
    callback: Option<Box<dyn FnMut(f64)>>,
}

#[derive(Default)]
struct FrameInner {
    next_id: u64,
    entries: Vec<FrameEntry>,
}

/// A frame clock that only fires when `tick` is called.
#[derive(Clone, Default)]
pub struct ManualFrameClock {
    inner: Rc<RefCell<FrameInner>>,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one refresh to every registered callback.
    pub fn tick(&self, timestamp_ms: f64) {
        let ids: Vec<u64> = self.inner.borrow().entries.iter().map(|e| e.id).collect();
        for id in ids {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .entries
                    .iter_mut()
                    .find(|e| e.id == id)
                    .and_then(|e| e.callback.take())
            };
            let Some(mut callback) = taken else { continue };
            callback(timestamp_ms);
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
                entry.callback = Some(callback);
            }
        }
    }

    /// Number of live callbacks.
    pub fn active(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl FrameClock for ManualFrameClock {
    type Handle = ManualHandle;

    fn start(&mut self, callback: Box<dyn FnMut(f64)>) -> Result<ManualHandle> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(FrameEntry {
            id,
            callback: Some(callback),
        });
        Ok(ManualHandle(id))
    }

    fn cancel(&mut self, handle: ManualHandle) {
        self.inner.borrow_mut().entries.retain(|e| e.id != handle.0);
    }
}

struct TimerEntry {
    id: u64,
    interval_ms: u64,
    due_ms: u64,
    callback: Option<Box<dyn FnMut()>>,
}

#[derive(Default)]
struct TimerInner {
    now_ms: u64,
    next_id: u64,
    entries: Vec<TimerEntry>,
}

/// A repeating timer on virtual time, advanced explicitly.
#[derive(Clone, Default)]
pub struct ManualTimer {
    inner: Rc<RefCell<TimerInner>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// Move virtual time forward, firing every deadline reached on the way in
    /// deadline order.
    pub fn advance(&self, ms: u64) {
        let target = self.now_ms() + ms;
        loop {
            let next = {
                let inner = self.inner.borrow();
                inner
                    .entries
                    .iter()
                    .filter(|e| e.due_ms <= target && e.callback.is_some())
                    .min_by_key(|e| (e.due_ms, e.id))
                    .map(|e| e.id)
            };
            let Some(id) = next else { break };

            let taken = {
                let mut inner = self.inner.borrow_mut();
                let mut due = None;
                let mut callback = None;
                if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
                    due = Some(entry.due_ms);
                    entry.due_ms += entry.interval_ms;
                    callback = entry.callback.take();
                }
                if let Some(due) = due {
                    inner.now_ms = due;
                }
                callback
            };
            let Some(mut callback) = taken else { continue };
            callback();

            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
                entry.callback = Some(callback);
            }
        }
        self.inner.borrow_mut().now_ms = target;
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl Timer for ManualTimer {
    type Handle = ManualHandle;

    fn every(&mut self, interval_ms: u32, callback: Box<dyn FnMut()>) -> Result<ManualHandle> {
        if interval_ms == 0 {
            return Err(FieldError::Platform("timer interval must be non-zero".into()));
        }
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let due_ms = inner.now_ms + u64::from(interval_ms);
        inner.entries.push(TimerEntry {
            id,
            interval_ms: u64::from(interval_ms),
            due_ms,
            callback: Some(callback),
        });
        Ok(ManualHandle(id))
    }

    fn cancel(&mut self, handle: ManualHandle) {
        self.inner.borrow_mut().entries.retain(|e| e.id != handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn timer_fires_on_each_deadline() {
        let mut timer = ManualTimer::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let clock = timer.clone();
        let sink = hits.clone();
        timer
            .every(100, Box::new(move || sink.borrow_mut().push(clock.now_ms())))
            .unwrap();

        timer.advance(99);
        assert!(hits.borrow().is_empty());
        timer.advance(1);
        timer.advance(250);
        assert_eq!(*hits.borrow(), vec![100, 200, 300]);
        assert_eq!(timer.now_ms(), 350);
    }

    #[test]
    fn timer_cancel_stops_firing() {
        let mut timer = ManualTimer::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let handle = timer.every(10, Box::new(move || c.set(c.get() + 1))).unwrap();
        timer.advance(25);
        timer.cancel(handle);
        timer.advance(100);
        assert_eq!(count.get(), 2);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn timer_callback_may_cancel_itself() {
        let timer = ManualTimer::new();
        let count = Rc::new(Cell::new(0));
        let handle_slot: Rc<Cell<Option<ManualHandle>>> = Rc::new(Cell::new(None));

        let mut inner_timer = timer.clone();
        let c = count.clone();
        let slot = handle_slot.clone();
        let handle = timer
            .clone()
            .every(
                5,
                Box::new(move || {
                    c.set(c.get() + 1);
                    if let Some(h) = slot.take() {
                        inner_timer.cancel(h);
                    }
                }),
            )
            .unwrap();
        handle_slot.set(Some(handle));

        timer.advance(50);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn zero_interval_rejected() {
        let mut timer = ManualTimer::new();
        assert!(timer.every(0, Box::new(|| {})).is_err());
    }

    #[test]
    fn frame_clock_ticks_until_cancelled() {
        let mut clock = ManualFrameClock::new();
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let sink = stamps.clone();
        let handle = clock
            .start(Box::new(move |t| sink.borrow_mut().push(t)))
            .unwrap();

        clock.tick(16.0);
        clock.tick(32.0);
        clock.cancel(handle);
        clock.tick(48.0);

        assert_eq!(*stamps.borrow(), vec![16.0, 32.0]);
        assert_eq!(clock.active(), 0);
    }
}
