//! Input synthesis: smooth pointer trajectories, the two-phase click
//! protocol, character typing, hotkeys, and the visual trail buffer.
//!
//! Targets arrive as screen-relative ratios and are resolved against
//! fresh geometry plus the calibration offset at the moment of use.
//! Pointer motion is deliberately human-like: eased, gently curved, and
//! paced so the compositor registers intermediate positions.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{InputBackend, KeySym, Modifiers};
use crate::directive::ScrollDirection;
use crate::errors::AgentError;
use crate::geometry::CalibrationOffset;

/// Moves shorter than this are suppressed to avoid jitter on
/// near-identical targets.
const MIN_MOVE_DISTANCE: f64 = 5.0;
/// Acceptable pointer drift after a move, before a single click.
const CLICK_DRIFT_TOLERANCE: i32 = 5;
/// Tighter drift bound for double-clicks.
const DOUBLE_CLICK_DRIFT_TOLERANCE: i32 = 2;

const TRAIL_CAPACITY: usize = 15;
const TRAIL_FADE: f32 = 0.8;
const TRAIL_SIZE_FADE: f32 = 0.95;
const TRAIL_OPACITY_FLOOR: f32 = 0.1;

/// One ephemeral trail sample. Observational only; never feeds back into
/// control decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub x: i32,
    pub y: i32,
    pub opacity: f32,
    pub size: f32,
}

/// Timing and policy knobs for the synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Delay between trajectory steps.
    pub step_delay: Duration,
    /// Pause after a move before verifying the pointer position.
    pub settle_delay: Duration,
    /// Hold time between button down and up.
    pub click_hold: Duration,
    /// Delay between key down and key up, and between characters.
    pub key_delay: Duration,
    /// How long `hover` keeps the pointer parked on the target.
    pub hover_hold: Duration,
    /// Pause after a scroll keystroke.
    pub scroll_settle: Duration,
    /// Frontmost process name that redirects clicks to an Enter keystroke.
    /// Quick-launcher overlays are keyboard-navigated and their layout is
    /// transient, so a physical click coordinate is unreliable there.
    /// `None` disables the override.
    pub launcher_process: Option<String>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(10),
            settle_delay: Duration::from_millis(150),
            click_hold: Duration::from_millis(50),
            key_delay: Duration::from_millis(20),
            hover_hold: Duration::from_millis(500),
            scroll_settle: Duration::from_millis(500),
            launcher_process: Some("Spotlight".to_string()),
        }
    }
}

impl SynthesizerConfig {
    /// All delays zeroed. Used by tests; motion semantics are unchanged.
    pub fn instant() -> Self {
        Self {
            step_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            click_hold: Duration::ZERO,
            key_delay: Duration::ZERO,
            hover_hold: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Converts ratio targets into native pointer/keyboard events through an
/// [`InputBackend`]. Owns the calibration offset (read-only here) and the
/// trail buffer.
pub struct InputSynthesizer<B: InputBackend> {
    backend: B,
    offset: CalibrationOffset,
    config: SynthesizerConfig,
    trail: Vec<TrailPoint>,
}

impl<B: InputBackend> InputSynthesizer<B> {
    pub fn new(backend: B, offset: CalibrationOffset, config: SynthesizerConfig) -> Self {
        Self {
            backend,
            offset,
            config,
            trail: Vec::new(),
        }
    }

    /// Resolve a ratio pair to the final native event coordinate
    /// (fresh geometry, clamp, scale, calibration offset).
    pub fn resolve(&mut self, ratio_x: f64, ratio_y: f64) -> Result<(i32, i32), AgentError> {
        let geometry = self.backend.geometry()?;
        Ok(geometry.to_point_calibrated(ratio_x, ratio_y, self.offset))
    }

    /// Actual pointer position, sampled into the trail.
    pub fn position(&mut self) -> Result<(i32, i32), AgentError> {
        let (x, y) = self.backend.pointer_location()?;
        self.push_trail(x, y);
        Ok((x, y))
    }

    pub fn trail(&self) -> &[TrailPoint] {
        &self.trail
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }

    fn push_trail(&mut self, x: i32, y: i32) {
        for p in &mut self.trail {
            p.opacity *= TRAIL_FADE;
            p.size *= TRAIL_SIZE_FADE;
        }
        self.trail.retain(|p| p.opacity > TRAIL_OPACITY_FLOOR);
        self.trail.push(TrailPoint {
            x,
            y,
            opacity: 1.0,
            size: 8.0,
        });
        if self.trail.len() > TRAIL_CAPACITY {
            let excess = self.trail.len() - TRAIL_CAPACITY;
            self.trail.drain(..excess);
        }
    }

    /// Smoothed trajectory from `from` to `to`: quadratic easing along a
    /// gently curved path, one backend move per step.
    fn glide(&mut self, from: (i32, i32), to: (i32, i32)) -> Result<(), AgentError> {
        let (sx, sy) = (from.0 as f64, from.1 as f64);
        let (ex, ey) = (to.0 as f64, to.1 as f64);
        let distance = ((ex - sx).powi(2) + (ey - sy).powi(2)).sqrt();
        if distance < MIN_MOVE_DISTANCE {
            return Ok(());
        }

        let steps = (distance / 15.0) as u32;
        let steps = steps.max(10);
        debug!("moving pointer {from:?} -> {to:?} in {steps} steps");

        // Control point bulges perpendicular to the travel vector so the
        // path is a shallow curve rather than a straight line.
        let control_x = (sx + ex) / 2.0 + (ey - sy) * 0.1;
        let control_y = (sy + ey) / 2.0 - (ex - sx) * 0.1;

        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps);
            let t = t * t * (3.0 - 2.0 * t);

            let x = (1.0 - t).powi(2) * sx + 2.0 * (1.0 - t) * t * control_x + t * t * ex;
            let y = (1.0 - t).powi(2) * sy + 2.0 * (1.0 - t) * t * control_y + t * t * ey;
            let (x, y) = (x.round() as i32, y.round() as i32);

            self.backend.pointer_move(x, y)?;
            self.push_trail(x, y);
            std::thread::sleep(self.config.step_delay);
        }
        Ok(())
    }

    /// Move the pointer to an already-resolved point.
    pub fn move_to_point(&mut self, x: i32, y: i32) -> Result<(), AgentError> {
        let from = self.position()?;
        self.glide(from, (x, y))
    }

    pub fn move_to(&mut self, ratio_x: f64, ratio_y: f64) -> Result<(), AgentError> {
        let target = self.resolve(ratio_x, ratio_y)?;
        self.move_to_point(target.0, target.1)
    }

    fn launcher_is_frontmost(&mut self) -> bool {
        let Some(launcher) = self.config.launcher_process.clone() else {
            return false;
        };
        match self.backend.frontmost_application() {
            Some(name) => name == launcher || name.contains(&launcher),
            None => false,
        }
    }

    /// Single left click with the move → verify → correct → act protocol.
    ///
    /// Synthesized motion and real compositor state can diverge under
    /// load, so the pointer position is re-read after the move and a short
    /// corrective move is issued when the drift exceeds tolerance.
    pub fn click(&mut self, ratio_x: f64, ratio_y: f64) -> Result<(), AgentError> {
        if self.launcher_is_frontmost() {
            info!("quick launcher frontmost: selecting with Enter instead of clicking");
            return self.tap(KeySym::Return, Modifiers::NONE);
        }

        let target = self.resolve(ratio_x, ratio_y)?;
        let from = self.position()?;
        self.glide(from, target)?;
        std::thread::sleep(self.config.settle_delay);

        let observed = self.position()?;
        if (observed.0 - target.0).abs() > CLICK_DRIFT_TOLERANCE
            || (observed.1 - target.1).abs() > CLICK_DRIFT_TOLERANCE
        {
            warn!("pointer drift: expected {target:?}, got {observed:?}; correcting");
            self.glide(observed, target)?;
            std::thread::sleep(self.config.click_hold);
        }

        let press_at = self.position()?;
        self.backend.pointer_down(press_at.0, press_at.1)?;
        std::thread::sleep(self.config.click_hold);
        self.backend.pointer_up(press_at.0, press_at.1)?;
        debug!("click completed at {press_at:?}");
        Ok(())
    }

    /// Double click; tighter drift tolerance, two down/up pairs.
    pub fn double_click(&mut self, ratio_x: f64, ratio_y: f64) -> Result<(), AgentError> {
        let target = self.resolve(ratio_x, ratio_y)?;
        let from = self.position()?;
        self.glide(from, target)?;
        std::thread::sleep(self.config.settle_delay);

        let observed = self.position()?;
        if (observed.0 - target.0).abs() > DOUBLE_CLICK_DRIFT_TOLERANCE
            || (observed.1 - target.1).abs() > DOUBLE_CLICK_DRIFT_TOLERANCE
        {
            warn!("position correction before double-click");
            self.glide(observed, target)?;
            std::thread::sleep(self.config.click_hold);
        }

        for _ in 0..2 {
            self.backend.pointer_down(target.0, target.1)?;
            std::thread::sleep(self.config.click_hold);
            self.backend.pointer_up(target.0, target.1)?;
            // Brief pause between the two clicks.
            std::thread::sleep(self.config.click_hold);
        }
        debug!("double-click completed at {target:?}");
        Ok(())
    }

    /// Park the pointer on the target long enough for hover effects
    /// (tooltips, reveal-on-hover menus) to trigger.
    pub fn hover(&mut self, ratio_x: f64, ratio_y: f64) -> Result<(), AgentError> {
        self.move_to(ratio_x, ratio_y)?;
        std::thread::sleep(self.config.hover_hold);
        Ok(())
    }

    /// Type text one character at a time through the fixed key table.
    /// Characters without a physical key mapping are skipped with a
    /// diagnostic, never an error.
    pub fn type_text(&mut self, text: &str) -> Result<(), AgentError> {
        debug!("typing {} character(s)", text.chars().count());
        for c in text.chars() {
            let Some(key) = char_to_key(c) else {
                warn!("skipping unsupported character {c:?}");
                continue;
            };
            // Shift is applied for the down edge only, and independently
            // per character.
            let mods = if c.is_ascii_uppercase() {
                Modifiers::shift()
            } else {
                Modifiers::NONE
            };
            self.tap(key, mods)?;
            std::thread::sleep(self.config.key_delay);
        }
        Ok(())
    }

    /// Multi-line typing: each non-empty line is typed, with an Enter
    /// keystroke between lines (not after the last).
    pub fn bulk_type(&mut self, text: &str) -> Result<(), AgentError> {
        let text = text.replace("\\n", "\n");
        let lines: Vec<&str> = text.split('\n').collect();
        for (i, line) in lines.iter().enumerate() {
            if !line.trim().is_empty() {
                self.type_text(line)?;
            }
            if i < lines.len() - 1 {
                self.tap(KeySym::Return, Modifiers::NONE)?;
                std::thread::sleep(self.config.key_delay);
            }
        }
        Ok(())
    }

    /// Scroll by emulated keystroke: Space pages down, Shift+Space pages
    /// up, arrows handle horizontal movement.
    pub fn scroll(&mut self, direction: ScrollDirection) -> Result<(), AgentError> {
        debug!("scrolling {direction:?}");
        let (key, mods) = match direction {
            ScrollDirection::Down => (KeySym::Space, Modifiers::NONE),
            ScrollDirection::Up => (KeySym::Space, Modifiers::shift()),
            ScrollDirection::Left => (KeySym::Left, Modifiers::NONE),
            ScrollDirection::Right => (KeySym::Right, Modifiers::NONE),
        };
        self.tap(key, mods)?;
        std::thread::sleep(self.config.scroll_settle);
        Ok(())
    }

    /// Press a `+`-joined combo such as `"cmd+t"` or `"shift+enter"`.
    /// Unknown keys degrade to a logged no-op.
    pub fn hotkey(&mut self, combo: &str) -> Result<(), AgentError> {
        match parse_combo(combo) {
            Some((key, mods)) => {
                debug!("hotkey: {combo}");
                self.tap(key, mods)
            }
            None => {
                warn!("hotkey {combo:?} not recognized, ignoring");
                Ok(())
            }
        }
    }

    fn tap(&mut self, key: KeySym, mods: Modifiers) -> Result<(), AgentError> {
        self.backend.key_down(key, mods)?;
        std::thread::sleep(self.config.key_delay);
        self.backend.key_up(key, mods)
    }
}

/// Fixed character→physical-key table. Symbols without a singular
/// physical key (parentheses and plus among them) map to `None` and are
/// skipped by the caller.
fn char_to_key(c: char) -> Option<KeySym> {
    let lower = c.to_ascii_lowercase();
    match lower {
        ' ' => Some(KeySym::Space),
        'a'..='z' | '0'..='9' => Some(KeySym::Char(lower)),
        '.' | '/' | '-' | '=' | ',' | ';' | '\'' | '[' | ']' | '\\' | '`' => {
            Some(KeySym::Char(lower))
        }
        _ => None,
    }
}

/// Parse a `+`-joined modifier list with a trailing key name.
fn parse_combo(combo: &str) -> Option<(KeySym, Modifiers)> {
    let parts: Vec<&str> = combo.split('+').map(str::trim).collect();
    let (key_name, modifier_names) = parts.split_last()?;

    let mut mods = Modifiers::NONE;
    for name in modifier_names {
        match name.to_lowercase().as_str() {
            "cmd" | "command" => mods.cmd = true,
            "shift" => mods.shift = true,
            "alt" | "option" => mods.alt = true,
            "ctrl" | "control" => mods.ctrl = true,
            _ => return None,
        }
    }

    let key = match key_name.to_lowercase().as_str() {
        "return" | "enter" => KeySym::Return,
        "tab" => KeySym::Tab,
        "space" => KeySym::Space,
        "escape" | "esc" => KeySym::Escape,
        "backspace" => KeySym::Backspace,
        "up" => KeySym::Up,
        "down" => KeySym::Down,
        "left" => KeySym::Left,
        "right" => KeySym::Right,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => KeySym::Char(c),
                _ => return None,
            }
        }
    };

    Some((key, mods))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_digits_and_basic_punctuation_have_keys() {
        for c in "abcz059./-=,;'[]\\` ".chars() {
            assert!(char_to_key(c).is_some(), "expected a key for {c:?}");
        }
    }

    #[test]
    fn uppercase_maps_to_lowercase_key() {
        assert_eq!(char_to_key('Q'), Some(KeySym::Char('q')));
    }

    #[test]
    fn unsupported_punctuation_is_unmapped() {
        for c in "()+!@#$%^&*{}<>?~".chars() {
            assert_eq!(char_to_key(c), None, "expected no key for {c:?}");
        }
    }

    #[test]
    fn combo_with_single_modifier() {
        let (key, mods) = parse_combo("cmd+t").unwrap();
        assert_eq!(key, KeySym::Char('t'));
        assert!(mods.cmd && !mods.shift && !mods.alt && !mods.ctrl);
    }

    #[test]
    fn combo_with_stacked_modifiers() {
        let (key, mods) = parse_combo("cmd+shift+4").unwrap();
        assert_eq!(key, KeySym::Char('4'));
        assert!(mods.cmd && mods.shift);
    }

    #[test]
    fn bare_key_combo() {
        assert_eq!(parse_combo("return"), Some((KeySym::Return, Modifiers::NONE)));
        assert_eq!(parse_combo("enter"), Some((KeySym::Return, Modifiers::NONE)));
        assert_eq!(parse_combo("space"), Some((KeySym::Space, Modifiers::NONE)));
    }

    #[test]
    fn shift_enter_maps_to_modified_return() {
        let (key, mods) = parse_combo("shift+enter").unwrap();
        assert_eq!(key, KeySym::Return);
        assert!(mods.shift);
    }

    #[test]
    fn unknown_keys_and_modifiers_are_rejected() {
        assert_eq!(parse_combo("cmd+f13"), None);
        assert_eq!(parse_combo("hyper+t"), None);
        assert_eq!(parse_combo(""), None);
    }
}
