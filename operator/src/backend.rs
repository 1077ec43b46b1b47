//! Native input injection primitives behind a trait seam.
//!
//! The synthesizer talks to the host exclusively through [`InputBackend`]:
//! pointer move/down/up, key down/up with modifier flags, fresh geometry,
//! and a foreground-application probe. The production implementation
//! drives `enigo` for events and `xcap` for display geometry; tests swap
//! in a recording mock.

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::AgentError;
use crate::geometry::ScreenGeometry;

/// Keys the synthesizer can emit, independent of the backend's key model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySym {
    Return,
    Tab,
    Space,
    Escape,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// A printable character, always stored lowercase; case is carried by
    /// the shift modifier.
    Char(char),
}

/// Modifier flags applied around a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub cmd: bool,
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        cmd: false,
        shift: false,
        alt: false,
        ctrl: false,
    };

    pub fn shift() -> Self {
        Modifiers {
            shift: true,
            ..Self::NONE
        }
    }

    fn keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        if self.cmd {
            keys.push(Key::Meta);
        }
        if self.shift {
            keys.push(Key::Shift);
        }
        if self.alt {
            keys.push(Key::Alt);
        }
        if self.ctrl {
            keys.push(Key::Control);
        }
        keys
    }
}

/// The host-facing side of input synthesis. All calls are fire-and-forget
/// side effects; the only feedback channels are `pointer_location` and
/// `geometry`, both queried fresh per operation.
pub trait InputBackend: Send {
    /// Current logical display geometry. Never cached by callers: display
    /// configuration may change between steps.
    fn geometry(&mut self) -> Result<ScreenGeometry, AgentError>;

    /// Where the pointer actually is right now.
    fn pointer_location(&mut self) -> Result<(i32, i32), AgentError>;

    fn pointer_move(&mut self, x: i32, y: i32) -> Result<(), AgentError>;

    fn pointer_down(&mut self, x: i32, y: i32) -> Result<(), AgentError>;

    fn pointer_up(&mut self, x: i32, y: i32) -> Result<(), AgentError>;

    /// Key press with modifier flags applied for the down edge.
    fn key_down(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError>;

    /// Key release; modifier flags are cleared here.
    fn key_up(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError>;

    /// Name of the frontmost application process, when the host can tell.
    fn frontmost_application(&mut self) -> Option<String>;
}

fn input_err(e: impl std::fmt::Debug) -> AgentError {
    AgentError::InputSynthesis(format!("{e:?}"))
}

/// Production backend: enigo events plus xcap display geometry.
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> Result<Self, AgentError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| AgentError::InputSynthesis(format!("failed to initialize enigo: {e}")))?;
        Ok(Self { enigo })
    }

    fn map_key(key: KeySym) -> Key {
        match key {
            KeySym::Return => Key::Return,
            KeySym::Tab => Key::Tab,
            KeySym::Space => Key::Space,
            KeySym::Escape => Key::Escape,
            KeySym::Backspace => Key::Backspace,
            KeySym::Up => Key::UpArrow,
            KeySym::Down => Key::DownArrow,
            KeySym::Left => Key::LeftArrow,
            KeySym::Right => Key::RightArrow,
            KeySym::Char(c) => Key::Unicode(c),
        }
    }
}

impl InputBackend for EnigoBackend {
    fn geometry(&mut self) -> Result<ScreenGeometry, AgentError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AgentError::InputSynthesis(format!("failed to enumerate monitors: {e}")))?;

        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    let width = monitor.width().map_err(input_err)?;
                    let height = monitor.height().map_err(input_err)?;
                    let scale = monitor.scale_factor().map_err(input_err)? as f64;
                    return Ok(ScreenGeometry {
                        logical_width: width,
                        logical_height: height,
                        pixel_scale: scale,
                    });
                }
                Ok(false) => continue,
                Err(e) => return Err(input_err(e)),
            }
        }

        Err(AgentError::InputSynthesis(
            "no primary monitor found".into(),
        ))
    }

    fn pointer_location(&mut self) -> Result<(i32, i32), AgentError> {
        self.enigo.location().map_err(input_err)
    }

    fn pointer_move(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(input_err)
    }

    fn pointer_down(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(input_err)?;
        self.enigo
            .button(Button::Left, Direction::Press)
            .map_err(input_err)
    }

    fn pointer_up(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(input_err)?;
        self.enigo
            .button(Button::Left, Direction::Release)
            .map_err(input_err)
    }

    fn key_down(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError> {
        for m in mods.keys() {
            self.enigo.key(m, Direction::Press).map_err(input_err)?;
        }
        self.enigo
            .key(Self::map_key(key), Direction::Press)
            .map_err(input_err)
    }

    fn key_up(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError> {
        self.enigo
            .key(Self::map_key(key), Direction::Release)
            .map_err(input_err)?;
        // Release modifiers in reverse of the press order.
        for m in mods.keys().into_iter().rev() {
            self.enigo.key(m, Direction::Release).map_err(input_err)?;
        }
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn frontmost_application(&mut self) -> Option<String> {
        let output = std::process::Command::new("osascript")
            .args([
                "-e",
                "tell application \"System Events\" to get name of first process whose frontmost is true",
            ])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("frontmost application: {name}");
        (!name.is_empty()).then_some(name)
    }

    #[cfg(not(target_os = "macos"))]
    fn frontmost_application(&mut self) -> Option<String> {
        None
    }
}
