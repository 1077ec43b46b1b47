//! Optional speech narration. Strictly best-effort: narration failures
//! are logged and swallowed, never surfaced to the loop.

use tracing::debug;

/// Speaks a short rationale before each action. Absence of a narrator,
/// or any failure inside one, must never block correctness.
pub trait Narrator: Send + Sync {
    fn speak(&self, text: &str);
}

/// Narrates through the macOS `say` command. On other platforms each call
/// is a silent no-op.
pub struct SayNarrator;

/// Wait on the child from a detached thread so it never lingers as a
/// zombie while the loop keeps running. The handle is only joined in
/// tests; production callers drop it.
#[cfg(any(target_os = "macos", test))]
fn reap_detached(mut child: std::process::Child) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let _ = child.wait();
    })
}

impl Narrator for SayNarrator {
    #[cfg(target_os = "macos")]
    fn speak(&self, text: &str) {
        debug!("narrating: {text}");
        // Fire and forget; the loop must not wait on audio.
        match std::process::Command::new("say")
            .arg(text)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(child) => {
                let _ = reap_detached(child);
            }
            Err(e) => debug!("narration unavailable: {e}"),
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn speak(&self, text: &str) {
        debug!("narration skipped (no speech backend): {text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn spawned_children_are_reaped() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 0"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap();
        // Joining proves the waiter collected the exit status.
        reap_detached(child).join().unwrap();
    }

    #[test]
    fn speak_never_panics() {
        SayNarrator.speak("hello");
    }
}
