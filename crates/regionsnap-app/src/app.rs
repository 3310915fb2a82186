//! Overlay window and its lifecycle.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regionsnap_core::{RenderModel, ScreenSize};
use regionsnap_render::PixelRenderer;
use softbuffer::{Context, Surface};
use winit::application::ApplicationHandler;
use winit::event::{StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::{Fullscreen, Window, WindowId, WindowLevel};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::host::{self, EngineHandle, HostEvent, SharedModel};

/// Runtime state, present once the window exists.
struct OverlayState {
    window: Arc<Window>,
    surface: Surface<Arc<Window>, Arc<Window>>,
    _context: Context<Arc<Window>>,
    engine: Option<EngineHandle>,
}

/// The overlay application.
pub struct OverlayApp {
    config: AppConfig,
    proxy: EventLoopProxy<HostEvent>,
    shared: SharedModel,
    renderer: PixelRenderer,
    state: Option<OverlayState>,
    /// Whether the ants are marching and the window needs periodic redraws.
    animating: bool,
    /// First fatal error; returned from [`run`].
    error: Option<AppError>,
}

impl OverlayApp {
    pub fn new(config: AppConfig, proxy: EventLoopProxy<HostEvent>) -> Self {
        let renderer = PixelRenderer::new().with_palette(config.palette());
        Self {
            config,
            proxy,
            shared: SharedModel::new(),
            renderer,
            state: None,
            animating: false,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        log::error!("{}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> AppResult<OverlayState> {
        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_fullscreen(Some(Fullscreen::Borderless(event_loop.primary_monitor())))
            .with_transparent(true)
            .with_decorations(false)
            .with_window_level(WindowLevel::AlwaysOnTop);

        let window = Arc::new(event_loop.create_window(attrs)?);
        let context = Context::new(window.clone())?;
        let surface = Surface::new(&context, window.clone())?;

        let viewport = host::screen_size(window.inner_size()).unwrap_or_default();
        log::info!("Overlay window created: {}x{}", viewport.w, viewport.h);

        let engine =
            host::spawn_engine(&self.config, viewport, self.shared.clone(), self.proxy.clone())?;

        Ok(OverlayState {
            window,
            surface,
            _context: context,
            engine: Some(engine),
        })
    }

    fn redraw(&mut self) -> AppResult<()> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };

        let size = state.window.inner_size();
        let published = self.shared.latest();
        let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            // Nothing can be shown while minimized.
            if let Some(published) = published {
                self.shared.mark_presented(published.generation);
            }
            return Ok(());
        };

        let model = match published {
            Some(published) => published.model,
            None => RenderModel::dim_all(ScreenSize::new(size.width as f64, size.height as f64)),
        };

        state.surface.resize(width, height)?;
        let mut buffer = state.surface.buffer_mut()?;
        self.renderer
            .rasterize(&model, &mut buffer, width.get(), height.get())
            .map_err(|e| AppError::Surface(e.to_string()))?;
        state.window.pre_present_notify();
        buffer.present()?;
        if let Some(published) = published {
            self.shared.mark_presented(published.generation);
        }

        self.animating = model.style.is_animated();
        if self.animating {
            self.renderer.advance_animation();
        }
        Ok(())
    }

    fn animation_interval(&self) -> Duration {
        self.config.engine.frame_interval().max(Duration::from_millis(1))
    }

    /// Join an engine thread that has already reported its exit.
    fn shutdown_engine(&mut self) {
        if let Some(engine) = self.state.as_mut().and_then(|s| s.engine.take()) {
            engine.shutdown();
        }
    }
}

impl ApplicationHandler<HostEvent> for OverlayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => {
                log::info!("Overlay window closed");
                // Closes the engine's input. Not joined: it may still be connecting.
                if let Some(state) = self.state.as_mut() {
                    state.engine.take();
                }
                event_loop.exit();
                return;
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
                return;
            }
            WindowEvent::Resized(_) => {
                if let Some(state) = &self.state {
                    state.window.request_redraw();
                }
            }
            _ => {}
        }

        if let Some(input) = host::translate(&event) {
            if let Some(engine) = self.state.as_ref().and_then(|s| s.engine.as_ref()) {
                engine.send(input);
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        match event {
            HostEvent::Redraw => {
                if let Some(state) = &self.state {
                    state.window.request_redraw();
                }
            }
            HostEvent::EngineStopped(exit) => {
                log::info!("Engine finished ({:?}), closing overlay", exit);
                self.shutdown_engine();
                event_loop.exit();
            }
            HostEvent::EngineFailed(message) => {
                self.shutdown_engine();
                self.fail(event_loop, AppError::Runtime(message));
            }
        }
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if let StartCause::ResumeTimeReached { .. } = cause {
            if let Some(state) = &self.state {
                state.window.request_redraw();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.animating {
            let next = Instant::now() + self.animation_interval();
            event_loop.set_control_flow(ControlFlow::WaitUntil(next));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

/// Open the overlay and block until it closes.
pub fn run(config: AppConfig) -> AppResult<()> {
    let event_loop = EventLoop::<HostEvent>::with_user_event().build()?;
    let mut app = OverlayApp::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
