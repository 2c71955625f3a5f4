use crate::config::OpenAiConfig;
use crate::openai::is_quota_exhausted;
use crate::script::clean_for_speech;
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use crate::util::{retry_with_backoff, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

const LOG_TARGET: &str = "tts::openai";
const MP3_MIME: &str = "audio/mpeg";

#[derive(Clone)]
pub struct OpenAiTtsClient {
    http: Client,
    config: Arc<OpenAiConfig>,
    retry: RetryConfig,
}

impl OpenAiTtsClient {
    pub fn new(config: Arc<OpenAiConfig>) -> Self {
        Self {
            http: Client::new(),
            config,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn speak_once(&self, body: &SpeechRequest<'_>) -> Result<TtsAudio, TtsError> {
        let url = format!("{}/audio/speech", self.config.endpoint_root());
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .header("Accept", MP3_MIME)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_quota_exhausted(status, &body) {
                return Err(TtsError::QuotaExhausted);
            }
            return Err(TtsError::Api { status, body });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(MP3_MIME)
            .to_owned();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsError::Other("speech endpoint returned no audio".into()));
        }
        Ok(TtsAudio::Encoded { mime, bytes })
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

impl TtsClient for OpenAiTtsClient {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let text = clean_for_speech(&request.text);
            if text.is_empty() {
                return Err(TtsError::EmptyText);
            }
            let voice = request
                .voice
                .as_ref()
                .map(|v| v.0.as_str())
                .unwrap_or(&self.config.voice);
            let body = SpeechRequest {
                model: &self.config.tts_model,
                input: &text,
                voice,
                response_format: "mp3",
            };

            tracing::debug!(target: LOG_TARGET, voice, chars = text.chars().count(), "requesting speech");
            let audio =
                retry_with_backoff(&self.retry, || self.speak_once(&body), TtsError::is_retryable)
                    .await?;
            tracing::debug!(target: LOG_TARGET, bytes = audio.payload_bytes(), "speech received");
            Ok(audio)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, Locale};

    #[test]
    fn speech_body_uses_configured_model_and_voice() {
        let body = SpeechRequest {
            model: "tts-1",
            input: "숨을 들이쉬세요",
            voice: "nova",
            response_format: "mp3",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "tts-1");
        assert_eq!(json["voice"], "nova");
        assert_eq!(json["response_format"], "mp3");
    }

    #[tokio::test]
    async fn blank_text_never_reaches_the_network() {
        let config = OpenAiConfig::new(ApiKey::new("sk-test").unwrap())
            .with_base_url("http://127.0.0.1:9")
            .unwrap();
        let client = OpenAiTtsClient::new(Arc::new(config)).with_retry(RetryConfig::none());
        let result = client
            .synthesize(TtsRequest::new("## \n(쉼)", Locale::Korean))
            .await;
        assert!(matches!(result, Err(TtsError::EmptyText)));
    }
}
