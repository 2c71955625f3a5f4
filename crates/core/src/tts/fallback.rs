use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const PRIMARY_COOLDOWN: Duration = Duration::from_secs(300);
const LOG_TARGET: &str = "tts::fallback";

/// Remote synthesis first, a local engine when the remote one is out of quota.
///
/// Quota exhaustion switches every request to the local client for five
/// minutes; the next request after that probes the primary again. Any other
/// primary failure falls back for that one request only.
pub struct FallbackTtsClient<P, L> {
    primary: P,
    local: L,
    exhausted_at: Mutex<Option<Instant>>,
}

impl<P, L> FallbackTtsClient<P, L>
where
    P: TtsClient,
    L: TtsClient,
{
    pub fn new(primary: P, local: L) -> Self {
        Self {
            primary,
            local,
            exhausted_at: Mutex::new(None),
        }
    }

    pub async fn is_using_fallback(&self) -> bool {
        self.exhausted_at.lock().await.is_some()
    }

    pub async fn reset_quota_flag(&self) {
        *self.exhausted_at.lock().await = None;
    }

    /// `true` when the primary should be skipped for this request.
    async fn in_cooldown(&self) -> bool {
        self.exhausted_at
            .lock()
            .await
            .is_some_and(|at| at.elapsed() < PRIMARY_COOLDOWN)
    }

    async fn via_primary(&self, request: TtsRequest) -> Result<TtsAudio, TtsError> {
        let was_exhausted = self.is_using_fallback().await;
        match self.primary.synthesize(request.clone()).await {
            Ok(audio) => {
                if was_exhausted {
                    tracing::info!(target: LOG_TARGET, "primary tts recovered");
                    self.reset_quota_flag().await;
                }
                Ok(audio)
            }
            Err(TtsError::QuotaExhausted) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    cooldown_secs = PRIMARY_COOLDOWN.as_secs(),
                    "primary tts quota exhausted, switching to local synthesis"
                );
                *self.exhausted_at.lock().await = Some(Instant::now());
                self.local.synthesize(request).await
            }
            Err(TtsError::EmptyText) => Err(TtsError::EmptyText),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "primary tts failed, using local synthesis for this request");
                self.local.synthesize(request).await
            }
        }
    }
}

impl<P, L> TtsClient for FallbackTtsClient<P, L>
where
    P: TtsClient,
    L: TtsClient,
{
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            if self.in_cooldown().await {
                return self.local.synthesize(request).await;
            }
            self.via_primary(request).await
        }
        .boxed()
    }
}
