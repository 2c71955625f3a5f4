use crate::script::clean_for_speech;
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const LOG_TARGET: &str = "tts::piper";
const PIPER_SAMPLE_RATE: u32 = 22_050;
const PIPER_CHANNELS: u16 = 1;
const WAV_HEADER_BYTES: usize = 44;

/// Local synthesis through a `piper` child process.
///
/// Text goes in on stdin, raw 16-bit little-endian mono PCM comes back on
/// stdout. A WAV header, if the build emits one, is skipped.
#[derive(Clone, Debug)]
pub struct PiperTtsClient {
    binary: PathBuf,
    model: PathBuf,
}

impl PiperTtsClient {
    #[must_use]
    pub fn new(binary: PathBuf, model: PathBuf) -> Self {
        Self { binary, model }
    }

    async fn run(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TtsError::Other(format!("failed to spawn {}: {e}", self.binary.display()))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TtsError::Other("piper stdin unavailable".into()))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| TtsError::Other(format!("writing to piper failed: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TtsError::Other(format!("piper did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::Other(format!(
                "piper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Decodes piper's stdout into samples. A trailing odd byte is dropped.
fn decode_pcm(raw: &[u8]) -> Result<Vec<i16>, TtsError> {
    let body = if raw.len() > WAV_HEADER_BYTES && raw.starts_with(b"RIFF") {
        &raw[WAV_HEADER_BYTES..]
    } else {
        raw
    };
    let samples: Vec<i16> = body
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if samples.is_empty() {
        return Err(TtsError::Other("piper produced no audio".into()));
    }
    Ok(samples)
}

impl TtsClient for PiperTtsClient {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let text = clean_for_speech(&request.text);
            if text.is_empty() {
                return Err(TtsError::EmptyText);
            }
            let raw = self.run(&text).await?;
            let pcm_i16 = decode_pcm(&raw)?;
            tracing::debug!(target: LOG_TARGET, samples = pcm_i16.len(), "piper synthesis done");
            Ok(TtsAudio::Pcm {
                sample_rate_hz: PIPER_SAMPLE_RATE,
                channels: PIPER_CHANNELS,
                pcm_i16,
            })
        }
        .boxed()
    }
}
