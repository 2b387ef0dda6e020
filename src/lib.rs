//! driftfield: a drifting particle field with a periodic glitch effect
//!
//! The simulation core (particle buffers, effect cycle, clocks) is platform
//! neutral and runs under `cargo test` on the host. The WebGL2 surface and
//! browser clocks are compiled only for wasm32.

pub mod animation;
pub mod clock;
pub mod config;
pub mod effect;
pub mod error;
pub mod geometry;
pub mod glitch;
pub mod particles;
pub mod random;
pub mod scene;

pub use animation::{launch, Animation, FrameView, RenderSurface, SimulationState};
pub use clock::{FrameClock, ManualFrameClock, ManualTimer, Timer};
pub use config::{AppConfig, EffectConfig, FieldConfig};
pub use effect::{EffectPipeline, EffectScheduler, EffectStage, EffectState, StageList};
pub use error::{FieldError, Result};
pub use particles::{DirtyFlags, ParticleField};
pub use random::{ScriptedSource, UnitSource};

// Only compile wasm-specific code when targeting wasm32.
#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{Document, HtmlCanvasElement, MouseEvent};

    use crate::animation::{self, Animation, SimulationState};
    use crate::config::AppConfig;
    use crate::effect::{EffectPipeline, EffectScheduler};
    use crate::error::FieldError;
    use crate::scene::DragDelta;

    mod clock;
    mod render;
    mod shaders;

    use clock::{AnimationFrameClock, IntervalTimer};
    use render::WebGlSurface;

    const CONFIG_ELEMENT_ID: &str = "driftfield-config";

    impl From<FieldError> for JsValue {
        fn from(e: FieldError) -> Self {
            JsValue::from_str(&e.to_string())
        }
    }

    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).ok();
        Ok(())
    }

    fn read_config(document: &Document) -> Result<AppConfig, FieldError> {
        match document
            .get_element_by_id(CONFIG_ELEMENT_ID)
            .and_then(|el| el.text_content())
        {
            Some(text) if !text.trim().is_empty() => AppConfig::from_json(&text),
            _ => Ok(AppConfig::default()),
        }
    }

    type MouseClosure = Closure<dyn FnMut(MouseEvent)>;

    /// Mouse listeners that turn drags into camera moves.
    struct DragListeners {
        document: Document,
        listeners: Vec<(&'static str, MouseClosure)>,
    }

    impl DragListeners {
        fn attach(
            document: &Document,
            state: Rc<RefCell<SimulationState>>,
        ) -> Result<Self, JsValue> {
            let last: Rc<Cell<Option<(i32, i32)>>> = Rc::new(Cell::new(None));

            let down = {
                let last = last.clone();
                Closure::wrap(Box::new(move |e: MouseEvent| {
                    last.set(Some((e.client_x(), e.client_y())));
                }) as Box<dyn FnMut(MouseEvent)>)
            };
            let up = {
                let last = last.clone();
                Closure::wrap(Box::new(move |_: MouseEvent| last.set(None))
                    as Box<dyn FnMut(MouseEvent)>)
            };
            let moved = Closure::wrap(Box::new(move |e: MouseEvent| {
                if let Some((px, py)) = last.get() {
                    let (x, y) = (e.client_x(), e.client_y());
                    state.borrow_mut().apply_drag(DragDelta {
                        dx: (x - px) as f32,
                        dy: (y - py) as f32,
                    });
                    last.set(Some((x, y)));
                }
            }) as Box<dyn FnMut(MouseEvent)>);

            let drag = Self {
                document: document.clone(),
                listeners: vec![("mousedown", down), ("mouseup", up), ("mousemove", moved)],
            };
            for (event, closure) in &drag.listeners {
                document
                    .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
            }
            Ok(drag)
        }

        fn detach(&mut self) {
            for (event, closure) in self.listeners.drain(..) {
                self.document
                    .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
                    .ok();
            }
        }
    }

    impl Drop for DragListeners {
        fn drop(&mut self) {
            self.detach();
        }
    }

    /// Keeps the canvas sized to the window.
    struct ResizeListener {
        window: web_sys::Window,
        closure: Option<Closure<dyn FnMut()>>,
    }

    impl ResizeListener {
        fn attach(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> Result<Self, JsValue> {
            fit_to_window(canvas);
            let canvas = canvas.clone();
            let closure = Closure::wrap(Box::new(move || fit_to_window(&canvas)) as Box<dyn FnMut()>);
            window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
            Ok(Self {
                window: window.clone(),
                closure: Some(closure),
            })
        }

        fn detach(&mut self) {
            if let Some(closure) = self.closure.take() {
                self.window
                    .remove_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
                    .ok();
            }
        }
    }

    impl Drop for ResizeListener {
        fn drop(&mut self) {
            self.detach();
        }
    }

    #[wasm_bindgen]
    pub struct App {
        animation: Animation<AnimationFrameClock, IntervalTimer>,
        state: Rc<RefCell<SimulationState>>,
        surface: Rc<RefCell<WebGlSurface>>,
        drag: DragListeners,
        resize: ResizeListener,
    }

    // Listeners must be removed before their closures are freed.
    impl Drop for App {
        fn drop(&mut self) {
            self.stop();
        }
    }

    #[wasm_bindgen]
    impl App {
        /// Cancel the frame loop, the glitch timer and the input listeners.
        pub fn stop(&mut self) {
            self.animation.stop();
            self.drag.detach();
            self.resize.detach();
        }

        #[wasm_bindgen(js_name = isRunning)]
        pub fn is_running(&self) -> bool {
            self.animation.is_running()
        }

        /// Names of the effect stages currently installed.
        #[wasm_bindgen(js_name = effectStages)]
        pub fn effect_stages(&self) -> js_sys::Array {
            self.surface
                .borrow()
                .stages()
                .iter()
                .map(|stage| JsValue::from_str(stage.name()))
                .collect()
        }

        /// Frames simulated since launch.
        pub fn frames(&self) -> f64 {
            self.state.borrow().frames() as f64
        }
    }

    fn fit_to_window(canvas: &HtmlCanvasElement) {
        if let Some(window) = web_sys::window() {
            let w = window.inner_width().ok().and_then(|v| v.as_f64());
            let h = window.inner_height().ok().and_then(|v| v.as_f64());
            if let (Some(w), Some(h)) = (w, h) {
                canvas.set_width(w as u32);
                canvas.set_height(h as u32);
            }
        }
    }

    /// Start the particle field on the canvas with element id `canvas_id`.
    #[wasm_bindgen]
    pub fn launch(canvas_id: &str) -> Result<App, JsValue> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or("canvas not found")?
            .dyn_into::<HtmlCanvasElement>()?;

        let config = read_config(&document)?;
        log::info!(
            "seed: {}",
            config
                .field
                .seed
                .map_or_else(|| "os entropy".to_string(), |s| s.to_string())
        );

        // Resize canvas to fit window
        let resize = ResizeListener::attach(&window, &canvas)?;

        let state = Rc::new(RefCell::new(SimulationState::from_config(&config)?));
        let scheduler = Rc::new(RefCell::new(EffectScheduler::new(&config.effect)?));
        let surface = Rc::new(RefCell::new(WebGlSurface::new(canvas, config.field.seed)?));

        let animation = animation::launch(
            state.clone(),
            scheduler,
            surface.clone(),
            AnimationFrameClock,
            IntervalTimer,
        )?;
        // on error `animation` drops here, which stops it
        let drag = DragListeners::attach(&document, state.clone())?;

        Ok(App {
            animation,
            state,
            surface,
            drag,
            resize,
        })
    }
}
