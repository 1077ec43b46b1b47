//! The perception-action control loop.
//!
//! Each iteration walks the state machine: capture an observation, ask
//! the model for the next action, parse its reply, synthesize the input,
//! then either terminate or sleep and go again. The loop is fully
//! sequential: with one physical pointer and keyboard, an action's
//! effect must be on screen before the next decision is made. Its only
//! temporal guard is the fixed step budget.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::InputBackend;
use crate::capture::ScreenCapture;
use crate::directive::{ActionDirective, ScrollDirection};
use crate::errors::AgentError;
use crate::model::ModelClient;
use crate::prompt;
use crate::speech::Narrator;
use crate::synth::InputSynthesizer;

/// Control loop phases. `Terminated` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Observing,
    Deciding,
    Acting,
    Evaluating,
    Terminated,
}

/// How a run ended. The caller must be able to tell a self-reported
/// completion apart from an exhausted step budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model issued `done()`.
    Done,
    /// The step budget ran out before the task reported completion.
    BudgetExhausted,
}

/// Per-task state, reset for every new `run` invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub goal: String,
    pub step: usize,
    pub last_observation: String,
}

impl TaskContext {
    fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            step: 0,
            last_observation: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard cap on loop iterations.
    pub max_steps: usize,
    /// Sleep between iterations.
    pub step_interval: Duration,
    /// Added on top of an upstream-suggested retry delay.
    pub throttle_buffer: Duration,
    /// Backoff when a throttle carries no suggested delay.
    pub default_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            step_interval: Duration::from_secs(1),
            throttle_buffer: Duration::from_secs(1),
            default_backoff: Duration::from_secs(10),
        }
    }
}

/// The orchestrator tying capture, decision, parsing, and synthesis
/// together for one task at a time.
pub struct Agent<B: InputBackend> {
    capture: Box<dyn ScreenCapture>,
    model: Box<dyn ModelClient>,
    narrator: Option<Box<dyn Narrator>>,
    synth: InputSynthesizer<B>,
    config: AgentConfig,
}

impl<B: InputBackend> Agent<B> {
    pub fn new(
        capture: Box<dyn ScreenCapture>,
        model: Box<dyn ModelClient>,
        narrator: Option<Box<dyn Narrator>>,
        synth: InputSynthesizer<B>,
        config: AgentConfig,
    ) -> Self {
        Self {
            capture,
            model,
            narrator,
            synth,
            config,
        }
    }

    /// Drive one task to completion, budget exhaustion, or a fatal
    /// capture failure. Cancellation is only observed at iteration
    /// boundaries; every sleep runs to completion.
    pub async fn run(&mut self, goal: &str) -> Result<RunOutcome, AgentError> {
        info!("starting task: {goal}");
        let mut ctx = TaskContext::new(goal);
        let mut state;
        let mut recovery_used = false;

        while ctx.step < self.config.max_steps {
            state = LoopState::Observing;
            debug!(step = ctx.step, state = ?state, "capturing observation");
            let frame = self.capture.capture().await?;

            state = LoopState::Deciding;
            debug!(step = ctx.step, state = ?state, "querying model");
            let request = prompt::build_prompt(&ctx.goal);
            let directive = match self.model.complete(&request, &frame).await {
                Ok(reply) => {
                    let parsed = crate::directive::parse_reply(&reply);
                    if let Some(observation) = parsed.observation {
                        info!("model sees: {observation}");
                        ctx.last_observation = observation;
                    }
                    parsed.directive
                }
                Err(AgentError::UpstreamThrottled { retry_after }) => {
                    let delay = match retry_after {
                        Some(secs) => {
                            Duration::from_secs_f64(secs) + self.config.throttle_buffer
                        }
                        None => self.config.default_backoff,
                    };
                    warn!("rate limited; backing off for {:.1}s", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                    ctx.step += 1;
                    continue;
                }
                Err(e) => {
                    warn!("model call failed: {e}");
                    if !recovery_used && is_browser_search_task(&ctx.goal) {
                        // One scripted recovery for browser search flows:
                        // a fresh tab re-focuses the address bar.
                        recovery_used = true;
                        ActionDirective::Hotkey("cmd+t".to_string())
                    } else {
                        // Fail-safe stop; an infinite failure loop is
                        // worse than an incomplete task.
                        ActionDirective::Done
                    }
                }
            };

            state = LoopState::Acting;
            debug!(step = ctx.step, state = ?state, directive = ?directive, "executing");
            if let Some(narrator) = &self.narrator {
                if let Some(line) = narration_for(&directive) {
                    narrator.speak(&line);
                }
            }
            let done = self.execute(&directive).await;

            state = LoopState::Evaluating;
            debug!(step = ctx.step, state = ?state, "assessing step outcome");
            if done {
                state = LoopState::Terminated;
                debug!(state = ?state, "task self-reported complete");
                info!("task complete after {} step(s)", ctx.step + 1);
                return Ok(RunOutcome::Done);
            }

            ctx.step += 1;
            tokio::time::sleep(self.config.step_interval).await;
        }

        info!("step budget exhausted after {} iterations", ctx.step);
        Ok(RunOutcome::BudgetExhausted)
    }

    /// Execute one directive. Returns `true` only for `Done`. A failed
    /// native call is logged and the loop moves on; a single bad action
    /// never aborts the task.
    async fn execute(&mut self, directive: &ActionDirective) -> bool {
        let result = match directive {
            ActionDirective::MoveMouse { x, y } => self.synth.move_to(*x, *y),
            ActionDirective::LeftClick { x, y } => self.synth.click(*x, *y),
            ActionDirective::DoubleClick { x, y } => self.synth.double_click(*x, *y),
            ActionDirective::Hover { x, y } => self.synth.hover(*x, *y),
            ActionDirective::TypeText(text) => self.synth.type_text(text),
            ActionDirective::BulkType(text) => self.synth.bulk_type(text),
            ActionDirective::Scroll(direction) => self.synth.scroll(*direction),
            ActionDirective::Hotkey(combo) => self.synth.hotkey(combo),
            ActionDirective::Wait(ms) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            ActionDirective::Done => return true,
            ActionDirective::Unknown(raw) => {
                warn!("unrecognized action, skipping: {raw}");
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("input synthesis failed, continuing: {e}");
        }
        false
    }
}

/// Browser/search workflows get one scripted recovery action instead of
/// an immediate fail-safe stop.
fn is_browser_search_task(goal: &str) -> bool {
    let goal = goal.to_lowercase();
    (goal.contains("safari") || goal.contains("browser")) && goal.contains("search")
}

/// Short spoken rationale for a directive, when one makes sense.
fn narration_for(directive: &ActionDirective) -> Option<String> {
    let line = match directive {
        ActionDirective::Hotkey(combo) => match combo.as_str() {
            "cmd+space" => "Opening the launcher.".to_string(),
            "cmd+t" => "Opening a new tab.".to_string(),
            "enter" | "return" => "Pressing Enter.".to_string(),
            other => format!("Pressing {other}."),
        },
        ActionDirective::TypeText(text) => {
            let shown = if text.chars().count() > 20 {
                let head: String = text.chars().take(17).collect();
                format!("{head}...")
            } else {
                text.clone()
            };
            format!("Typing {shown}.")
        }
        ActionDirective::BulkType(text) => {
            let lines = text.split('\n').count();
            format!("Typing {lines} lines of content.")
        }
        ActionDirective::LeftClick { .. } => "Clicking target.".to_string(),
        ActionDirective::DoubleClick { .. } => "Double-clicking to open.".to_string(),
        ActionDirective::Hover { .. } => "Hovering over element.".to_string(),
        ActionDirective::MoveMouse { .. } => "Moving the cursor.".to_string(),
        ActionDirective::Scroll(direction) => {
            let name = match direction {
                ScrollDirection::Up => "up",
                ScrollDirection::Down => "down",
                ScrollDirection::Left => "left",
                ScrollDirection::Right => "right",
            };
            format!("Scrolling {name}.")
        }
        ActionDirective::Wait(ms) => format!("Waiting {:.1} seconds.", *ms as f64 / 1000.0),
        ActionDirective::Done => "Task complete.".to_string(),
        ActionDirective::Unknown(_) => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_search_allow_list() {
        assert!(is_browser_search_task("open Safari and search for rust"));
        assert!(is_browser_search_task("use the browser to search cats"));
        assert!(!is_browser_search_task("open Safari"));
        assert!(!is_browser_search_task("write a poem in Notes"));
    }

    #[test]
    fn narration_covers_common_directives() {
        assert_eq!(
            narration_for(&ActionDirective::Hotkey("cmd+t".into())).as_deref(),
            Some("Opening a new tab.")
        );
        assert_eq!(
            narration_for(&ActionDirective::Wait(1500)).as_deref(),
            Some("Waiting 1.5 seconds.")
        );
        assert_eq!(narration_for(&ActionDirective::Unknown("?".into())), None);
    }
}
