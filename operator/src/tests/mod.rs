
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::backend::{InputBackend, KeySym, Modifiers};
use crate::errors::AgentError;
use crate::geometry::ScreenGeometry;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// Every native call the synthesizer makes, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Move(i32, i32),
    Down(i32, i32),
    Up(i32, i32),
    KeyDown(KeySym, Modifiers),
    KeyUp(KeySym, Modifiers),
}

/// Recording backend with a perfect 1920x1080 display. The pointer
/// teleports to wherever it was last moved; scripted location overrides
/// let a test fake compositor drift.
#[derive(Clone)]
pub struct MockBackend {
    pub events: Arc<Mutex<Vec<Event>>>,
    pointer: Arc<Mutex<(i32, i32)>>,
    location_overrides: Arc<Mutex<VecDeque<(i32, i32)>>>,
    pub frontmost: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            pointer: Arc::new(Mutex::new((0, 0))),
            location_overrides: Arc::new(Mutex::new(VecDeque::new())),
            frontmost: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        *self.pointer.lock().unwrap() = (x, y);
    }

    /// Queue a fake reading for the next `pointer_location` call.
    pub fn push_location_override(&self, x: i32, y: i32) {
        self.location_overrides.lock().unwrap().push_back((x, y));
    }

    pub fn set_frontmost(&self, name: &str) {
        *self.frontmost.lock().unwrap() = Some(name.to_string());
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn key_downs(&self) -> Vec<(KeySym, Modifiers)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::KeyDown(k, m) => Some((k, m)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl InputBackend for MockBackend {
    fn geometry(&mut self) -> Result<ScreenGeometry, AgentError> {
        Ok(ScreenGeometry {
            logical_width: 1920,
            logical_height: 1080,
            pixel_scale: 1.0,
        })
    }

    fn pointer_location(&mut self) -> Result<(i32, i32), AgentError> {
        if let Some(fake) = self.location_overrides.lock().unwrap().pop_front() {
            return Ok(fake);
        }
        Ok(*self.pointer.lock().unwrap())
    }

    fn pointer_move(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        *self.pointer.lock().unwrap() = (x, y);
        self.record(Event::Move(x, y));
        Ok(())
    }

    fn pointer_down(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        self.record(Event::Down(x, y));
        Ok(())
    }

    fn pointer_up(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        self.record(Event::Up(x, y));
        Ok(())
    }

    fn key_down(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError> {
        self.record(Event::KeyDown(key, mods));
        Ok(())
    }

    fn key_up(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError> {
        self.record(Event::KeyUp(key, mods));
        Ok(())
    }

    fn frontmost_application(&mut self) -> Option<String> {
        self.frontmost.lock().unwrap().clone()
    }
}
