use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::window;

use crate::clock::{FrameClock, Timer};
use crate::error::{FieldError, Result};

fn platform(e: JsValue) -> FieldError {
    FieldError::Platform(format!("{e:?}"))
}

fn browser_window() -> Result<web_sys::Window> {
    window().ok_or_else(|| FieldError::Platform("no window".into()))
}

type FrameSlot = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// `requestAnimationFrame` loop.
pub struct AnimationFrameClock;

pub struct FrameLoopHandle {
    request_id: Rc<Cell<Option<i32>>>,
    slot: FrameSlot,
}

impl FrameClock for AnimationFrameClock {
    type Handle = FrameLoopHandle;

    fn start(&mut self, mut callback: Box<dyn FnMut(f64)>) -> Result<FrameLoopHandle> {
        let window = browser_window()?;

        // `slot` holds the animation-frame closure so it can re-request
        // itself. Cancelling empties the slot, which drops the closure and
        // breaks the reference cycle.
        let slot: FrameSlot = Rc::new(RefCell::new(None));
        let request_id = Rc::new(Cell::new(None));

        let next_slot = slot.clone();
        let next_id = request_id.clone();
        let loop_window = window.clone();
        *slot.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
            callback(timestamp);

            // schedule next
            let requested = next_slot
                .borrow()
                .as_ref()
                .map(|f| loop_window.request_animation_frame(f.as_ref().unchecked_ref()));
            match requested {
                Some(Ok(id)) => next_id.set(Some(id)),
                Some(Err(e)) => {
                    log::error!("requestAnimationFrame failed, frame loop halted: {e:?}");
                    next_id.set(None);
                }
                None => next_id.set(None),
            }
        }) as Box<dyn FnMut(f64)>));

        let id = {
            let f = slot.borrow();
            let f = f
                .as_ref()
                .ok_or_else(|| FieldError::Platform("frame closure missing".into()))?;
            window
                .request_animation_frame(f.as_ref().unchecked_ref())
                .map_err(platform)?
        };
        request_id.set(Some(id));

        Ok(FrameLoopHandle { request_id, slot })
    }

    fn cancel(&mut self, handle: FrameLoopHandle) {
        if let (Some(id), Some(window)) = (handle.request_id.take(), window()) {
            if let Err(e) = window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame failed: {e:?}");
            }
        }
        handle.slot.borrow_mut().take();
    }
}

/// `setInterval` timer.
pub struct IntervalTimer;

pub struct IntervalHandle {
    id: i32,
    _closure: Closure<dyn FnMut()>,
}

impl Timer for IntervalTimer {
    type Handle = IntervalHandle;

    fn every(&mut self, interval_ms: u32, callback: Box<dyn FnMut()>) -> Result<IntervalHandle> {
        let timeout = i32::try_from(interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| FieldError::Platform(format!("bad interval {interval_ms} ms")))?;

        let closure = Closure::wrap(callback);
        let id = browser_window()?
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                timeout,
            )
            .map_err(platform)?;

        Ok(IntervalHandle {
            id,
            _closure: closure,
        })
    }

    fn cancel(&mut self, handle: IntervalHandle) {
        if let Some(window) = window() {
            window.clear_interval_with_handle(handle.id);
        }
    }
}
