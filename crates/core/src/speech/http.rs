use crate::speech::{AudioFormat, AudioSegment, SegmentStream, SpeechError, Synthesizer};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Serialize)]
struct SynthRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

/// HTTP synthesizer: POSTs the text and forwards the chunked response body
/// as audio segments. The service returns raw PCM at a negotiated format,
/// labelled here from config.
pub struct HttpSynth {
    client: reqwest::Client,
    url: String,
    api_key: String,
    voice: String,
    format: AudioFormat,
}

impl HttpSynth {
    pub fn new(url: String, api_key: String, voice: String, format: AudioFormat) -> Self {
        Self { client: reqwest::Client::new(), url, api_key, voice, format }
    }

    /// Reads `VIGIL_TTS_URL`, `VIGIL_TTS_API_KEY`, optionally
    /// `VIGIL_TTS_VOICE`. Returns `None` when the service is not configured.
    pub fn from_env(format: AudioFormat) -> Option<Self> {
        let url = std::env::var("VIGIL_TTS_URL").ok()?;
        let api_key = std::env::var("VIGIL_TTS_API_KEY").ok()?;
        let voice = std::env::var("VIGIL_TTS_VOICE").unwrap_or_else(|_| "default".to_owned());
        Some(Self::new(url, api_key, voice, format))
    }
}

#[async_trait]
impl Synthesizer for HttpSynth {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize(&self, text: &str) -> Result<SegmentStream, SpeechError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&SynthRequest { text, voice: &self.voice })
            .send()
            .await
            .map_err(|e| SpeechError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SpeechError::RequestFailed(format!("status {}", resp.status())));
        }

        let format = self.format;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let mut resp = resp;
            loop {
                match resp.chunk().await {
                    Ok(Some(bytes)) => {
                        let segment = AudioSegment { format, data: bytes.to_vec() };
                        if tx.send(Ok(segment)).await.is_err() {
                            debug!("segment receiver dropped, abandoning stream");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(SpeechError::StreamBroken(e.to_string()))).await;
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }
}
