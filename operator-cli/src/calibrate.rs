//! Interactive pointer calibration.
//!
//! Moves the pointer to the computed center of the primary display, asks
//! the user to correct it by hand, previews the measured offset by moving
//! with it applied, and offers to store the delta in `.env` so future
//! runs resolve coordinates with that offset. Nothing is written unless
//! the user explicitly accepts.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use operator::envfile;
use operator::geometry::CalibrationOffset;
use operator::synth::{InputSynthesizer, SynthesizerConfig};
use operator::EnigoBackend;

pub fn run() -> Result<()> {
    let backend = EnigoBackend::new().context("initializing input backend")?;
    let mut synth = InputSynthesizer::new(
        backend,
        CalibrationOffset::default(),
        SynthesizerConfig::default(),
    );

    let (cx, cy) = synth.resolve(0.5, 0.5).context("resolving display center")?;
    synth
        .move_to_point(cx, cy)
        .context("moving pointer to display center")?;

    println!("The pointer was sent to the computed center of your primary display: ({cx}, {cy}).");
    println!("If it does not sit at the true center, move it there by hand now.");
    print!("Press Enter when the pointer is centered... ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let (ax, ay) = synth.position().context("reading pointer position")?;
    let offset = CalibrationOffset {
        dx: ax - cx,
        dy: ay - cy,
    };
    println!("Measured offset: dx={}, dy={}", offset.dx, offset.dy);

    // Preview: repeat the centered move with the offset applied so the
    // user can judge the corrected landing point before committing.
    synth
        .move_to_point(cx + offset.dx, cy + offset.dy)
        .context("previewing calibrated center")?;
    println!(
        "Preview: with this offset, a centered target lands at ({}, {}).",
        cx + offset.dx,
        cy + offset.dy
    );

    print!("Save to .env? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if !confirms(&answer) {
        println!("Offset discarded; nothing written.");
        return Ok(());
    }

    envfile::upsert(
        Path::new(".env"),
        &[
            ("X_OFFSET", offset.dx.to_string()),
            ("Y_OFFSET", offset.dy.to_string()),
        ],
    )
    .context("writing calibration to .env")?;
    println!("Saved X_OFFSET and Y_OFFSET to .env");
    Ok(())
}

/// Only an explicit yes persists; anything else (including a bare Enter)
/// leaves the environment untouched.
fn confirms(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
