//! Glue between the window thread and the engine thread.
//!
//! The engine runs on its own thread inside a current-thread tokio runtime.
//! Input goes to it over a channel; rendered models come back through a
//! [`SharedModel`] slot plus a redraw wake-up on the event loop. Each
//! published model carries a generation, and the window thread reports the
//! generation it presented so the engine can wait for a frame to be shown.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use kurbo::Point;
use regionsnap_core::authority::BoxFuture;
use regionsnap_core::{
    ButtonEdge, EngineExit, InputEvent, OverlayEngine, OverlaySurface, PointerButton, RenderModel,
    ScreenSize, WsAuthority,
};
use tokio::sync::{mpsc, watch};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::EventLoopProxy;
use winit::keyboard::{Key, NamedKey};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Events the engine thread posts to the window thread.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A new model is in the slot.
    Redraw,
    /// The engine returned.
    EngineStopped(EngineExit),
    /// The engine could not reach the authority.
    EngineFailed(String),
}

/// A model handed to the window thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Published {
    /// Starts at 1 and grows with every publish.
    pub generation: u64,
    pub model: RenderModel,
}

/// Latest render model, shared between threads.
#[derive(Debug, Clone)]
pub struct SharedModel {
    slot: Arc<Mutex<Option<Published>>>,
    /// Highest generation the window has put on screen.
    presented: Arc<watch::Sender<u64>>,
}

impl Default for SharedModel {
    fn default() -> Self {
        let (presented, _) = watch::channel(0);
        Self {
            slot: Arc::default(),
            presented: Arc::new(presented),
        }
    }
}

impl SharedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the model. Returns its generation.
    pub fn publish(&self, model: RenderModel) -> u64 {
        match self.slot.lock() {
            Ok(mut slot) => {
                let generation = slot.map_or(1, |p| p.generation + 1);
                *slot = Some(Published { generation, model });
                generation
            }
            Err(e) => {
                log::error!("Model slot poisoned: {}", e);
                0
            }
        }
    }

    /// Most recent model, if any has been published.
    pub fn latest(&self) -> Option<Published> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }

    /// Record that `generation` is on screen.
    pub fn mark_presented(&self, generation: u64) {
        self.presented.send_if_modified(|shown| {
            if generation > *shown {
                *shown = generation;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once `generation`, or a later one, has been presented.
    pub fn wait_presented(&self, generation: u64) -> BoxFuture<'static, ()> {
        let mut shown = self.presented.subscribe();
        Box::pin(async move {
            if shown.wait_for(|g| *g >= generation).await.is_err() {
                log::debug!("Window gone before frame {} was presented", generation);
            }
        })
    }
}

/// Engine-side surface: publishes each model and wakes the window.
pub struct WindowSurface {
    shared: SharedModel,
    proxy: EventLoopProxy<HostEvent>,
    /// Generation of the last model published.
    generation: u64,
}

impl WindowSurface {
    pub fn new(shared: SharedModel, proxy: EventLoopProxy<HostEvent>) -> Self {
        Self {
            shared,
            proxy,
            generation: 0,
        }
    }
}

impl OverlaySurface for WindowSurface {
    fn apply(&mut self, model: &RenderModel) {
        self.generation = self.shared.publish(*model);
        if self.proxy.send_event(HostEvent::Redraw).is_err() {
            log::debug!("Event loop gone, dropping redraw");
        }
    }

    fn presented(&mut self) -> BoxFuture<'static, ()> {
        self.shared.wait_presented(self.generation)
    }
}

/// Running engine thread.
pub struct EngineHandle {
    inputs: mpsc::UnboundedSender<InputEvent>,
    thread: JoinHandle<()>,
}

impl EngineHandle {
    /// Hand a raw input event to the engine.
    pub fn send(&self, event: InputEvent) {
        if self.inputs.send(event).is_err() {
            log::debug!("Engine stopped, input dropped");
        }
    }

    /// Close the input channel and wait for the engine thread.
    pub fn shutdown(self) {
        drop(self.inputs);
        if self.thread.join().is_err() {
            log::error!("Engine thread panicked");
        }
    }
}

/// Start the engine thread.
///
/// The thread connects to the configured authority, runs the engine until
/// it stops and reports the outcome through `proxy`.
pub fn spawn_engine(
    config: &AppConfig,
    viewport: ScreenSize,
    shared: SharedModel,
    proxy: EventLoopProxy<HostEvent>,
) -> AppResult<EngineHandle> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Runtime(e.to_string()))?;

    let (inputs, input_rx) = mpsc::unbounded_channel();
    let url = config.authority_url.clone();
    let engine_config = config.engine;

    let thread = std::thread::Builder::new()
        .name("regionsnap-engine".into())
        .spawn(move || {
            let outcome = runtime.block_on(async {
                let (authority, notifications) =
                    WsAuthority::connect(&url, engine_config.request_timeout()).await?;
                let surface = WindowSurface::new(shared, proxy.clone());
                let engine = OverlayEngine::new(engine_config, authority, surface, viewport);
                Ok::<_, regionsnap_core::AuthorityError>(engine.run(input_rx, notifications).await)
            });

            let event = match outcome {
                Ok(exit) => {
                    log::info!("Engine stopped: {:?}", exit);
                    HostEvent::EngineStopped(exit)
                }
                Err(e) => {
                    log::error!("Engine failed: {}", e);
                    HostEvent::EngineFailed(e.to_string())
                }
            };
            let _ = proxy.send_event(event);
        })
        .map_err(|e| AppError::Runtime(e.to_string()))?;

    Ok(EngineHandle { inputs, thread })
}

/// Translate a window event into engine input.
pub fn translate(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::PointerMoved {
            position: Point::new(position.x, position.y),
        }),
        WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::Button {
            button: pointer_button(*button),
            edge: button_edge(*state),
        }),
        WindowEvent::KeyboardInput { event, .. }
            if event.state == ElementState::Pressed && !event.repeat =>
        {
            key_name(&event.logical_key).map(InputEvent::KeyPressed)
        }
        WindowEvent::Resized(size) => screen_size(*size).map(InputEvent::Resized),
        _ => None,
    }
}

fn pointer_button(button: MouseButton) -> PointerButton {
    match button {
        MouseButton::Left => PointerButton::Left,
        MouseButton::Right => PointerButton::Right,
        MouseButton::Middle => PointerButton::Middle,
        _ => PointerButton::Other,
    }
}

fn button_edge(state: ElementState) -> ButtonEdge {
    match state {
        ElementState::Pressed => ButtonEdge::Down,
        ElementState::Released => ButtonEdge::Up,
    }
}

fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Named(NamedKey::Enter) => Some("Enter".to_string()),
        Key::Named(NamedKey::Escape) => Some("Escape".to_string()),
        Key::Named(other) => Some(format!("{:?}", other)),
        Key::Character(text) => Some(text.to_string()),
        _ => None,
    }
}

/// Viewport size for a physical window size; `None` while minimized.
pub(crate) fn screen_size(size: PhysicalSize<u32>) -> Option<ScreenSize> {
    if size.width == 0 || size.height == 0 {
        return None;
    }
    Some(ScreenSize::new(size.width as f64, size.height as f64))
}
