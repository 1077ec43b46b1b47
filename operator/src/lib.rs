//! Vision-driven desktop control
//!
//! This crate drives a desktop session the way a person would: capture
//! the screen, ask a vision model what to do next, parse its free-text
//! reply into a directive, and synthesize the mouse and keyboard input.
//! The [`agent::Agent`] loop ties those stages together; each stage is
//! usable on its own behind a trait seam.

pub mod agent;
pub mod backend;
pub mod capture;
pub mod directive;
pub mod envfile;
pub mod errors;
pub mod geometry;
pub mod model;
pub mod pool;
pub mod prompt;
pub mod speech;
pub mod synth;
#[cfg(test)]
mod tests;

pub use agent::{Agent, AgentConfig, RunOutcome};
pub use backend::{EnigoBackend, InputBackend};
pub use capture::{ScreenCapture, XcapCapture};
pub use directive::{parse_reply, ActionDirective, ParsedReply};
pub use errors::AgentError;
pub use geometry::{CalibrationOffset, ScreenGeometry};
pub use model::{GeminiClient, ModelClient};
pub use pool::{CredentialPool, Role};
pub use speech::{Narrator, SayNarrator};
pub use synth::{InputSynthesizer, SynthesizerConfig};
