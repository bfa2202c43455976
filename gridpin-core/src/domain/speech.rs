//! Speech clip domain model and WAV container encoding
//!
//! Speech backends return raw mono 16-bit little-endian PCM. Players need
//! a container, so clips are wrapped in the canonical 44-byte RIFF/WAVE
//! header.

use regex::Regex;

use super::result::{Error, Result};

/// Size of the RIFF/WAVE header written by [`SpeechClip::to_wav`]
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;

/// Raw speech audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechClip {
    /// Little-endian 16-bit mono samples
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

impl SpeechClip {
    pub fn new(pcm: Vec<u8>, sample_rate: u32) -> Self {
        Self { pcm, sample_rate }
    }

    pub fn sample_count(&self) -> usize {
        self.pcm.len() / 2
    }

    /// Encode as a WAV file. A trailing odd byte is dropped.
    pub fn to_wav(&self) -> Vec<u8> {
        let data_len = (self.sample_count() * 2) as u32;
        let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
        let byte_rate = self.sample_rate * block_align as u32;

        let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
        out.extend_from_slice(&CHANNELS.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&self.pcm[..data_len as usize]);
        out
    }
}

/// Pull the sample rate out of a mime type such as `audio/L16;codec=pcm;rate=24000`
pub fn parse_sample_rate(mime_type: &str) -> Result<u32> {
    let re = Regex::new(r"rate=(\d+)").map_err(|e| Error::collaborator(e.to_string()))?;
    re.captures(mime_type)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .ok_or_else(|| Error::collaborator("Sample rate not found in mimeType"))
}
