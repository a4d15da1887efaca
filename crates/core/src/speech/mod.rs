//! Speech synthesis boundary: text in, a finite stream of audio segments out.

pub mod http;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sample format declared per segment. The outbound sink is opened lazily
/// with the first segment's format, never assumed upfront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub format: AudioFormat,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("synthesis request failed: {0}")]
    RequestFailed(String),
    #[error("synthesis stream broke: {0}")]
    StreamBroken(String),
}

/// Finite, non-restartable sequence of segments.
pub type SegmentStream = mpsc::Receiver<Result<AudioSegment, SpeechError>>;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<SegmentStream, SpeechError>;
}

/// Test synthesizer: records every text it is asked to speak and emits a
/// fixed number of small segments.
#[derive(Clone)]
pub struct MockSynth {
    texts: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    segments: usize,
}

impl MockSynth {
    pub fn new(segments: usize) -> Self {
        Self { texts: Default::default(), segments }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for MockSynth {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, text: &str) -> Result<SegmentStream, SpeechError> {
        self.texts.lock().unwrap().push(text.to_owned());
        let (tx, rx) = mpsc::channel(self.segments.max(1));
        let format = AudioFormat { sample_rate: 24_000, channels: 1 };
        for i in 0..self.segments {
            let segment = AudioSegment { format, data: vec![i as u8; 16] };
            tx.send(Ok(segment)).await.map_err(|_| {
                SpeechError::StreamBroken("mock receiver dropped".into())
            })?;
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_synth_records_and_streams() {
        let synth = MockSynth::new(3);
        let mut stream = synth.synthesize("back to work").await.unwrap();
        let mut count = 0;
        while let Some(seg) = stream.recv().await {
            let seg = seg.unwrap();
            assert_eq!(seg.format.sample_rate, 24_000);
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(synth.spoken(), vec!["back to work"]);
    }
}
