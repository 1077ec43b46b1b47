//! Action grammar: turning a model's free-text reply into a typed
//! directive.
//!
//! Replies are expected as two labeled lines:
//!
//! ```text
//! See: Safari address bar focused
//! Action: type_text("google docs")
//! ```
//!
//! The parser tolerates markdown emphasis around the labels, a missing
//! observation line, and trailing commentary after the first action line.
//! When no labeled action line exists it scans every line for a known
//! action name as a substring and takes the first hit, which can misfire
//! if the prose mentions an action it is *not* taking; that ambiguity is
//! inherited from the grammar and deliberately left unguarded. When
//! nothing matches at all the result is a synthetic one-second wait so the
//! loop always makes forward progress.

use once_cell::sync::Lazy;
use regex::Regex;

/// First parenthesized two-number group, e.g. `left_click(0.42, 0.87)`.
static COORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(-?[0-9]*\.?[0-9]+)\s*,\s*(-?[0-9]*\.?[0-9]+)\s*\)").unwrap());
/// First double-quoted segment, e.g. `type_text("hello")`.
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).unwrap());
/// First parenthesized bare integer, e.g. `wait(1500)`.
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*(\d+)\s*\)").unwrap());
/// Call-like head of the action text, e.g. `bulk_type(`.
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z_]+)\s*\(").unwrap());

/// Action names recognized by the fallback line scan, checked as plain
/// substrings in this order.
const ACTION_NAMES: &[&str] = &[
    "move_mouse",
    "left_click",
    "double_click",
    "hover",
    "bulk_type",
    "type_text",
    "scroll",
    "hotkey",
    "wait",
    "done",
];

/// Scroll directions the synthesizer knows how to emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// One parsed model action. Constructed fresh each loop iteration and
/// immutable from then on; the executor matches exhaustively so a new
/// variant can never be silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDirective {
    MoveMouse { x: f64, y: f64 },
    LeftClick { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    Hover { x: f64, y: f64 },
    TypeText(String),
    BulkType(String),
    Scroll(ScrollDirection),
    Hotkey(String),
    /// Pause for the given number of milliseconds.
    Wait(u64),
    Done,
    /// Action text that could not be interpreted; logged and skipped.
    Unknown(String),
}

/// Parser output: the observation line (when present) plus the directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub observation: Option<String>,
    pub directive: ActionDirective,
}

/// Strip a `Label:` prefix, tolerating `**Label:**` markdown emphasis.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let plain = format!("{label}:");
    let bold = format!("**{label}:**");
    if let Some(rest) = line.strip_prefix(&bold) {
        return Some(rest.trim());
    }
    line.strip_prefix(&plain).map(|rest| rest.trim())
}

fn extract_coords(text: &str) -> Option<(f64, f64)> {
    let caps = COORD_RE.captures(text)?;
    let x: f64 = caps.get(1)?.as_str().parse().ok()?;
    let y: f64 = caps.get(2)?.as_str().parse().ok()?;
    // Clamp each axis independently; a slightly out-of-frame target is
    // still a usable target.
    Some((x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)))
}

fn extract_quoted(text: &str) -> Option<String> {
    QUOTED_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_int(text: &str) -> Option<u64> {
    INT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Interpret one action line. Dispatch is on the extracted call name, not
/// on a string prefix, so `type_text` can never shadow `bulk_type`.
fn parse_action(raw: &str) -> ActionDirective {
    let cleaned = raw.replace('`', "");
    let cleaned = cleaned.trim();

    let name = CALL_RE
        .captures(cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            // A bare `done` with no parens still counts as completion.
            (cleaned.eq_ignore_ascii_case("done")).then(|| "done".to_string())
        });

    let coords = |text: &str, build: fn(f64, f64) -> ActionDirective| {
        extract_coords(text)
            .map(|(x, y)| build(x, y))
            .unwrap_or_else(|| ActionDirective::Unknown(text.to_string()))
    };

    match name.as_deref() {
        Some("move_mouse") => coords(cleaned, |x, y| ActionDirective::MoveMouse { x, y }),
        Some("left_click") => coords(cleaned, |x, y| ActionDirective::LeftClick { x, y }),
        Some("double_click") => coords(cleaned, |x, y| ActionDirective::DoubleClick { x, y }),
        Some("hover") => coords(cleaned, |x, y| ActionDirective::Hover { x, y }),
        Some("type_text") => extract_quoted(cleaned)
            .map(ActionDirective::TypeText)
            .unwrap_or_else(|| ActionDirective::Unknown(cleaned.to_string())),
        Some("bulk_type") => extract_quoted(cleaned)
            .map(ActionDirective::BulkType)
            .unwrap_or_else(|| ActionDirective::Unknown(cleaned.to_string())),
        Some("scroll") => extract_quoted(cleaned)
            .as_deref()
            .and_then(ScrollDirection::parse)
            .map(ActionDirective::Scroll)
            .unwrap_or_else(|| ActionDirective::Unknown(cleaned.to_string())),
        Some("hotkey") => extract_quoted(cleaned)
            .map(ActionDirective::Hotkey)
            .unwrap_or_else(|| ActionDirective::Unknown(cleaned.to_string())),
        Some("wait") => ActionDirective::Wait(extract_int(cleaned).unwrap_or(1000)),
        Some("done") => ActionDirective::Done,
        _ => ActionDirective::Unknown(cleaned.to_string()),
    }
}

/// Parse a full model reply into an observation and a directive.
///
/// Never fails: an unparsable reply resolves to `Wait(1000)` so the
/// control loop keeps making forward progress until its step budget runs
/// out instead of stalling on empty input.
pub fn parse_reply(text: &str) -> ParsedReply {
    let mut observation = None;
    let mut action_line: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = strip_label(line, "See") {
            observation = Some(rest.to_string());
        } else if let Some(rest) = strip_label(line, "Action") {
            // Everything after the first action line is commentary.
            action_line = Some(rest.to_string());
            break;
        }
    }

    if action_line.is_none() {
        // No labeled action line: accept the first line mentioning a known
        // action name. Incidental prose mentions can misfire here; see the
        // module docs.
        'scan: for line in text.lines() {
            let line = line.trim();
            for name in ACTION_NAMES {
                if line.contains(name) {
                    action_line = Some(line.to_string());
                    break 'scan;
                }
            }
        }
    }

    let directive = action_line
        .map(|a| parse_action(&a))
        .unwrap_or(ActionDirective::Wait(1000));

    ParsedReply {
        observation,
        directive,
    }
}
