//! Speak command - synthesize text to a WAV file

use std::path::Path;

use anyhow::{Context, Result};

use super::{get_context, log_command};
use crate::output;

pub fn run(text: &str, out: &Path) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "speak");

    let pb = output::spinner("Generating speech...");
    let wav = ctx.speech.speak_wav(text);
    pb.finish_and_clear();

    let wav = wav?;
    std::fs::write(out, &wav).with_context(|| format!("Failed to write {}", out.display()))?;
    output::success(&format!("Wrote {} ({} bytes)", out.display(), wav.len()));
    Ok(())
}
