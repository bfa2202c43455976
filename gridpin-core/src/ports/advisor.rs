//! Advice and speech ports - opaque text and audio backends

use crate::domain::result::Result;
use crate::domain::SpeechClip;

/// Prompt in, text out
///
/// Implementations must bound every call with a timeout. They are
/// read-only with respect to the ledger.
pub trait AdviceProvider: Send + Sync {
    /// Provider name (e.g., "gemini")
    fn name(&self) -> &str;

    fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Text in, audio out
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    fn synthesize(&self, text: &str) -> Result<SpeechClip>;
}
