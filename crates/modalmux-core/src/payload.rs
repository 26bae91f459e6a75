//! Request and response payloads carried through the scheduler.
//!
//! The scheduler never interprets these beyond reading the class tag; the
//! field shapes exist so workers on both ends of the queue agree on what a
//! request means.

use crate::class::TaskClass;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Parameters for one language-model inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmRequest {
    /// Prompt text.
    pub prompt: String,

    /// Maximum number of tokens to generate.
    pub max_tokens: usize,

    /// Sampling temperature.
    pub temperature: f32,

    /// Top-k sampling parameter.
    pub top_k: u32,

    /// Top-p (nucleus) sampling parameter.
    pub top_p: f32,

    /// Repetition penalty.
    pub repetition_penalty: f32,
}

impl LmRequest {
    /// Create a request for `prompt` with default sampling parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
            repetition_penalty: 1.1,
        }
    }
}

/// Result of a language-model inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmResponse {
    /// Generated text.
    pub text: String,

    /// Number of tokens generated.
    pub generated_tokens: usize,
}

/// Parameters for one speech-synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    /// Text to synthesize.
    pub text: String,

    /// Voice to use.
    pub voice_id: String,

    /// Playback speed multiplier.
    pub speed: f32,

    /// Pitch multiplier.
    pub pitch: f32,

    /// Output volume multiplier.
    pub volume: f32,

    /// Audio container format (e.g. "wav").
    pub output_format: String,
}

impl TtsRequest {
    /// Create a request for `text` with the default voice and neutral
    /// speed/pitch/volume.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: "default".to_string(),
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            output_format: "wav".to_string(),
        }
    }
}

/// Result of a speech-synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsResponse {
    /// Encoded audio bytes in the requested format.
    pub audio: Vec<u8>,

    /// Sample rate of the audio.
    pub sample_rate: u32,
}

/// Parameters for one image-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Prompt text.
    pub prompt: String,

    /// Negative prompt.
    pub negative_prompt: String,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Classifier-free guidance scale.
    pub guidance_scale: f32,

    /// Number of diffusion steps.
    pub steps: u32,

    /// RNG seed; None lets the worker pick one.
    pub seed: Option<u64>,
}

impl ImageRequest {
    /// Create a 512x512 request for `prompt` with default guidance and
    /// step count.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            width: 512,
            height: 512,
            guidance_scale: 7.5,
            steps: 20,
            seed: None,
        }
    }
}

/// Result of an image-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Encoded image bytes.
    pub image: Vec<u8>,

    /// Width of the generated image.
    pub width: u32,

    /// Height of the generated image.
    pub height: u32,

    /// Seed actually used.
    pub seed: u64,
}

/// A class-tagged request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskPayload {
    Lm(LmRequest),
    Tts(TtsRequest),
    Image(ImageRequest),
}

impl TaskPayload {
    /// The class this payload belongs to.
    pub fn class(&self) -> TaskClass {
        match self {
            TaskPayload::Lm(_) => TaskClass::Lm,
            TaskPayload::Tts(_) => TaskClass::Tts,
            TaskPayload::Image(_) => TaskClass::Image,
        }
    }

    /// Reject payloads that no worker could act on.
    pub fn validate(&self) -> Result<(), CoreError> {
        let empty = match self {
            TaskPayload::Lm(req) => req.prompt.is_empty(),
            TaskPayload::Tts(req) => req.text.is_empty(),
            TaskPayload::Image(req) => req.prompt.is_empty(),
        };
        if empty {
            return Err(CoreError::InvalidPayload(format!(
                "{} request has an empty prompt",
                self.class()
            )));
        }
        if let TaskPayload::Image(req) = self {
            if req.width == 0 || req.height == 0 || req.steps == 0 {
                return Err(CoreError::InvalidPayload(
                    "image request has zero-sized output or zero steps".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A class-tagged result payload. Present on a record iff it completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskOutput {
    Lm(LmResponse),
    Tts(TtsResponse),
    Image(ImageResponse),
}

impl TaskOutput {
    /// The class this output belongs to.
    pub fn class(&self) -> TaskClass {
        match self {
            TaskOutput::Lm(_) => TaskClass::Lm,
            TaskOutput::Tts(_) => TaskClass::Tts,
            TaskOutput::Image(_) => TaskClass::Image,
        }
    }
}
