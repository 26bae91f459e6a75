//! Stub workers for the demo driver.
//!
//! These stand in for real inference engines: they sleep for a plausible
//! amount of time and fabricate a response of the right shape. The LM stub
//! is fast, the TTS stub scales with text length, and the image stub runs
//! long and reports progress per diffusion step.

use async_trait::async_trait;
use modalmux_core::{
    ImageResponse, LmResponse, Progress, TaskClass, TaskOutput, TaskPayload, TtsResponse, Worker,
    WorkerError, WorkerId,
};
use std::time::Duration;

/// Echoes the prompt back uppercased after a short delay.
pub struct StubLmWorker {
    id: WorkerId,
}

impl StubLmWorker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(id),
        }
    }
}

#[async_trait]
impl Worker for StubLmWorker {
    fn id(&self) -> WorkerId {
        self.id.clone()
    }

    fn capabilities(&self) -> Vec<TaskClass> {
        vec![TaskClass::Lm]
    }

    async fn execute(
        &self,
        payload: TaskPayload,
        _progress: Progress,
    ) -> Result<TaskOutput, WorkerError> {
        let TaskPayload::Lm(req) = payload else {
            return Err(WorkerError::Execution("not an LM request".into()));
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(TaskOutput::Lm(LmResponse {
            generated_tokens: req.prompt.split_whitespace().count(),
            text: req.prompt.to_uppercase(),
        }))
    }
}

/// Produces a silent WAV-sized buffer, taking longer for longer text.
pub struct StubTtsWorker {
    id: WorkerId,
    sample_rate: u32,
}

impl StubTtsWorker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(id),
            sample_rate: 22_050,
        }
    }
}

#[async_trait]
impl Worker for StubTtsWorker {
    fn id(&self) -> WorkerId {
        self.id.clone()
    }

    fn capabilities(&self) -> Vec<TaskClass> {
        vec![TaskClass::Tts]
    }

    async fn execute(
        &self,
        payload: TaskPayload,
        _progress: Progress,
    ) -> Result<TaskOutput, WorkerError> {
        let TaskPayload::Tts(req) = payload else {
            return Err(WorkerError::Execution("not a TTS request".into()));
        };
        // Pretend synthesis runs at ~1 ms per character.
        tokio::time::sleep(Duration::from_millis(req.text.len() as u64)).await;
        let samples = self.sample_rate as usize * req.text.len() / 20;
        Ok(TaskOutput::Tts(TtsResponse {
            audio: vec![0u8; samples.min(1 << 20)],
            sample_rate: self.sample_rate,
        }))
    }
}

/// Sleeps per diffusion step, reporting progress after each.
pub struct StubImageWorker {
    id: WorkerId,
    step_time: Duration,
}

impl StubImageWorker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(id),
            step_time: Duration::from_millis(25),
        }
    }
}

#[async_trait]
impl Worker for StubImageWorker {
    fn id(&self) -> WorkerId {
        self.id.clone()
    }

    fn capabilities(&self) -> Vec<TaskClass> {
        vec![TaskClass::Image]
    }

    async fn execute(
        &self,
        payload: TaskPayload,
        progress: Progress,
    ) -> Result<TaskOutput, WorkerError> {
        let TaskPayload::Image(req) = payload else {
            return Err(WorkerError::Execution("not an image request".into()));
        };
        for step in 1..=req.steps {
            tokio::time::sleep(self.step_time).await;
            progress.report(step as f32 / req.steps as f32);
        }
        let seed = req.seed.unwrap_or(42);
        Ok(TaskOutput::Image(ImageResponse {
            image: vec![0u8; (req.width * req.height / 8) as usize],
            width: req.width,
            height: req.height,
            seed,
        }))
    }
}
