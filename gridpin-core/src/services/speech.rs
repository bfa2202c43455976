//! Speech service - spoken prompts for the ATM screen

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::SpeechClip;
use crate::ports::SpeechProvider;
use crate::services::logging::{LogEvent, LoggingService};

const SPEECH_UNAVAILABLE: &str = "Failed to generate speech.";

pub struct SpeechService {
    provider: Arc<dyn SpeechProvider>,
    logger: Option<Arc<LoggingService>>,
}

impl SpeechService {
    pub fn new(provider: Arc<dyn SpeechProvider>, logger: Option<Arc<LoggingService>>) -> Self {
        Self { provider, logger }
    }

    /// Synthesize `text` as raw PCM
    pub fn speak(&self, text: &str) -> Result<SpeechClip> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("Nothing to read aloud."));
        }

        self.provider.synthesize(text).map_err(|e| {
            if let Some(logger) = &self.logger {
                let _ = logger.log(
                    LogEvent::new("speech_failed")
                        .with_error(SPEECH_UNAVAILABLE)
                        .with_error_details(format!("{}: {}", self.provider.name(), e)),
                );
            }
            Error::collaborator(SPEECH_UNAVAILABLE)
        })
    }

    /// Synthesize `text` as a playable WAV file
    pub fn speak_wav(&self, text: &str) -> Result<Vec<u8>> {
        Ok(self.speak(text)?.to_wav())
    }
}
