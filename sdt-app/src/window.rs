use anyhow::{Result, anyhow};
use pixels::{Pixels, SurfaceTexture};
use sdt_core::{Key, KeySet, TextRole};
use sdt_experiment::{DisplaySurface, InputSource};
use sdt_render::TextRenderer;
use sdt_timing::{HighPrecisionTimer, Timer};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{self, KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowId},
};

/// Owns the window, its pixel surface and the held-key state fed by
/// window events.
pub struct WindowHost {
    windowed: bool,
    abort_key: Key,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: TextRenderer,
    held: KeySet,
    failure: Option<anyhow::Error>,
}

impl WindowHost {
    fn new(renderer: TextRenderer, windowed: bool, abort_key: Key) -> Self {
        Self {
            windowed,
            abort_key,
            window: None,
            pixels: None,
            renderer,
            held: KeySet::new(),
            failure: None,
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());

        let mut attributes = Window::default_attributes()
            .with_title("Semantic Dual Task")
            .with_resizable(self.windowed);
        if self.windowed {
            attributes = attributes.with_inner_size(PhysicalSize::new(1024, 768));
        } else {
            let monitor = monitor.clone().ok_or_else(|| anyhow!("no monitor available"))?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = monitor
                .and_then(|m| m.refresh_rate_millihertz())
                .map(|mhz| mhz as f64 / 1000.0),
            "window created"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer.resize(size.width, size.height)?;
        window.set_cursor_visible(false);
        self.window = Some(window);
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(size.width, size.height)?;
            pixels.resize_buffer(size.width, size.height)?;
        }
        self.renderer.resize(size.width, size.height)?;
        debug!(width = size.width, height = size.height, "display resized");
        Ok(())
    }

    fn present(&mut self, content: Option<&(String, TextRole)>) -> Result<()> {
        match content {
            Some((text, role)) => self.renderer.draw(text, *role),
            None => self.renderer.clear(),
        }
        let pixels = self
            .pixels
            .as_mut()
            .ok_or_else(|| anyhow!("window surface is gone"))?;
        self.renderer.canvas().copy_to(pixels.frame_mut());
        pixels.render()?;
        Ok(())
    }
}

impl ApplicationHandler for WindowHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            // Closing the window counts as the abort key being held.
            WindowEvent::CloseRequested => {
                warn!("window close requested");
                self.held.insert(self.abort_key);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(key) = map_key(event.physical_key, &event.logical_key) else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => self.held.insert(key),
                    ElementState::Released => self.held.remove(&key),
                };
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = self.handle_resize(size) {
                    self.failure = Some(e);
                }
            }
            WindowEvent::Focused(false) => self.held.clear(),
            _ => {}
        }
    }
}

/// Maps a winit key event onto the keys the experiment knows about.
pub fn map_key(physical: PhysicalKey, logical: &keyboard::Key) -> Option<Key> {
    match physical {
        PhysicalKey::Code(KeyCode::Space) => Some(Key::Space),
        PhysicalKey::Code(KeyCode::Escape) => Some(Key::Escape),
        PhysicalKey::Code(KeyCode::Enter | KeyCode::NumpadEnter) => Some(Key::Return),
        _ => match logical {
            keyboard::Key::Character(s) => s.chars().next().map(|c| Key::Char(c.to_ascii_lowercase())),
            _ => None,
        },
    }
}

struct Shared {
    event_loop: EventLoop<()>,
    host: WindowHost,
}

impl Shared {
    /// Drains pending window events without blocking.
    fn pump(&mut self, timeout: Duration) -> Result<()> {
        let Self { event_loop, host } = self;
        if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(timeout), host) {
            debug!(code, "event loop exited");
            host.held.insert(host.abort_key);
        }
        match host.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Opens the experiment window and returns the display and keyboard
/// handles that drive it. Both must stay on the thread that created them.
pub fn open(
    renderer: TextRenderer,
    windowed: bool,
    abort_key: Key,
    timer: HighPrecisionTimer,
) -> Result<(WindowDisplay, WindowKeys)> {
    let event_loop = EventLoop::new()?;
    let mut shared = Shared {
        event_loop,
        host: WindowHost::new(renderer, windowed, abort_key),
    };
    for _ in 0..200 {
        shared.pump(Duration::from_millis(10))?;
        if shared.host.pixels.is_some() {
            break;
        }
    }
    if shared.host.pixels.is_none() {
        return Err(anyhow!("window did not come up"));
    }

    let shared = Rc::new(RefCell::new(shared));
    Ok((
        WindowDisplay {
            shared: Rc::clone(&shared),
            staged: None,
            timer,
        },
        WindowKeys { shared },
    ))
}

pub struct WindowDisplay {
    shared: Rc<RefCell<Shared>>,
    staged: Option<(String, TextRole)>,
    timer: HighPrecisionTimer,
}

impl DisplaySurface for WindowDisplay {
    fn show_text(&mut self, text: &str, role: TextRole) -> Result<()> {
        self.staged = Some((text.to_string(), role));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.staged = None;
        Ok(())
    }

    /// Presents with vsync; the returned onset is taken once the swap
    /// has been handed to the compositor.
    fn commit_frame(&mut self) -> Result<u64> {
        let mut shared = self.shared.borrow_mut();
        shared.pump(Duration::ZERO)?;
        shared.host.present(self.staged.as_ref())?;
        Ok(self.timer.now())
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        if let Some(window) = &self.shared.borrow().host.window {
            window.set_cursor_visible(true);
        }
    }
}

pub struct WindowKeys {
    shared: Rc<RefCell<Shared>>,
}

impl InputSource for WindowKeys {
    fn poll_keys(&mut self) -> Result<KeySet> {
        let mut shared = self.shared.borrow_mut();
        shared.pump(Duration::ZERO)?;
        Ok(shared.host.held.clone())
    }
}
