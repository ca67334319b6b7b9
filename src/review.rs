use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::TranscriptError;
use crate::botguard::Authenticate;
use crate::cache::{BlobCache, SUMMARY_TTL};
use crate::dedupe::Dedupe;
use crate::fetcher::TranscriptFetcher;
use crate::innertube::VideoApi;
use crate::summarize::Summarize;

pub const MIN_BULLET_COUNT: u32 = 5;
pub const MAX_BULLET_COUNT: u32 = 12;

/// Key points generated for one (video, locale) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub points: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewError {
    NoTranscript,
    FetchFailed,
    GenerationFailed,
}

impl From<TranscriptError> for ReviewError {
    fn from(e: TranscriptError) -> Self {
        match e {
            TranscriptError::NoTranscript => ReviewError::NoTranscript,
            TranscriptError::FetchFailed => ReviewError::FetchFailed,
        }
    }
}

impl std::fmt::Display for ReviewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewError::NoTranscript => write!(f, "no_transcript"),
            ReviewError::FetchFailed => write!(f, "fetch_failed"),
            ReviewError::GenerationFailed => write!(f, "generation_failed"),
        }
    }
}

impl std::error::Error for ReviewError {}

/// Roughly one key point per two minutes of video, clamped to a readable range
pub fn target_bullet_count(duration_ms: u64) -> u32 {
    let duration_minutes = duration_ms.div_ceil(60_000);
    (duration_minutes.div_ceil(2) as u32).clamp(MIN_BULLET_COUNT, MAX_BULLET_COUNT)
}

/// End-to-end "fetch transcript + generate key points" pipeline, keyed by
/// `{videoId}-{locale}`. Concurrent requests for the same key collapse into
/// one run; results are durably cached for 24 hours. Cheap to clone.
pub struct ReviewService<A, V, S> {
    inner: Arc<Inner<A, V, S>>,
}

impl<A, V, S> Clone for ReviewService<A, V, S> {
    fn clone(&self) -> Self {
        ReviewService {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<A, V, S> {
    fetcher: TranscriptFetcher<A, V>,
    summarizer: S,
    summaries: BlobCache<Review>,
    pending: Dedupe<Result<Review, ReviewError>>,
}

impl<A, V, S> ReviewService<A, V, S>
where
    A: Authenticate + 'static,
    V: VideoApi + 'static,
    S: Summarize + 'static,
{
    pub fn new(fetcher: TranscriptFetcher<A, V>, summarizer: S, summaries: BlobCache<Review>) -> Self {
        ReviewService {
            inner: Arc::new(Inner {
                fetcher,
                summarizer,
                summaries,
                pending: Dedupe::new(),
            }),
        }
    }

    pub async fn review(&self, video_id: &str, locale: &str) -> Result<Review, ReviewError> {
        let key = format!("{video_id}-{locale}");
        let inner = self.inner.clone();
        let video_id = video_id.to_string();
        let cache_key = key.clone();

        self.inner
            .pending
            .run(&key, move || async move { inner.build_review(&video_id, &cache_key).await })
            .await
    }
}

impl<A: Authenticate, V: VideoApi, S: Summarize> Inner<A, V, S> {
    async fn build_review(&self, video_id: &str, cache_key: &str) -> Result<Review, ReviewError> {
        if let Some(review) = self.summaries.get(cache_key).await {
            info!("Summary cache hit for {cache_key}");
            return Ok(review);
        }

        let transcript = self.fetcher.fetch_transcript(video_id).await?;

        let target = target_bullet_count(transcript.duration_ms);
        let points = self
            .summarizer
            .summarize(&transcript.full_text, target, transcript.language.as_deref())
            .await
            .map_err(|e| {
                warn!("Key-point generation failed for {video_id}: {e:#}");
                ReviewError::GenerationFailed
            })?;

        info!("Generated {} key points for {cache_key} (target {target})", points.len());
        let review = Review { points };
        if let Err(e) = self.summaries.set(cache_key, &review, SUMMARY_TTL).await {
            warn!("Failed to cache summary for {cache_key}: {e}");
        }
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use eyre::{Result, bail};

    use crate::botguard::Credentials;
    use crate::innertube::{PlayerResponse, TimedText};
    use crate::session::{SessionManager, VisitorSession};

    struct StubAuth;

    #[async_trait]
    impl Authenticate for StubAuth {
        async fn authenticate(&self) -> Result<Credentials> {
            Ok(Credentials {
                po_token: "token".to_string(),
                visitor_data: "visitor".to_string(),
            })
        }
    }

    struct StubApi {
        player_calls: Arc<AtomicUsize>,
        captions: bool,
    }

    #[async_trait]
    impl VideoApi for StubApi {
        async fn player(&self, _session: &VisitorSession, _video_id: &str) -> Result<PlayerResponse> {
            self.player_calls.fetch_add(1, Ordering::SeqCst);
            let json = if self.captions {
                serde_json::json!({
                    "captions": {
                        "playerCaptionsTracklistRenderer": {
                            "captionTracks": [ { "baseUrl": "https://example.com/tt", "languageCode": "en" } ]
                        }
                    },
                    "videoDetails": { "title": "T", "lengthSeconds": "600" }
                })
            } else {
                serde_json::json!({ "videoDetails": { "lengthSeconds": "600" } })
            };
            Ok(serde_json::from_value(json)?)
        }

        async fn timed_text(&self, _session: &VisitorSession, _base_url: &str) -> Result<TimedText> {
            Ok(serde_json::from_value(serde_json::json!({
                "events": [ { "tStartMs": 0, "dDurationMs": 1000, "segs": [ { "utf8": "words" } ] } ]
            }))?)
        }
    }

    struct StubSummarizer {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Summarize for StubSummarizer {
        async fn summarize(&self, _text: &str, target_count: u32, _language: Option<&str>) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // let concurrent callers pile up on the dedupe entry
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                bail!("model unavailable");
            }
            Ok((0..target_count).map(|i| format!("point {i}")).collect())
        }
    }

    struct Counters {
        player_calls: Arc<AtomicUsize>,
        summarize_calls: Arc<AtomicUsize>,
    }

    fn service(
        root: &std::path::Path,
        captions: bool,
        fail_generation: bool,
    ) -> (ReviewService<StubAuth, StubApi, StubSummarizer>, Counters) {
        let player_calls = Arc::new(AtomicUsize::new(0));
        let summarize_calls = Arc::new(AtomicUsize::new(0));

        let fetcher = TranscriptFetcher::new(
            SessionManager::new(StubAuth),
            StubApi {
                player_calls: player_calls.clone(),
                captions,
            },
            BlobCache::new(root, "transcripts"),
        );
        let svc = ReviewService::new(
            fetcher,
            StubSummarizer {
                calls: summarize_calls.clone(),
                fail: fail_generation,
            },
            BlobCache::new(root, "summaries"),
        );
        (
            svc,
            Counters {
                player_calls,
                summarize_calls,
            },
        )
    }

    #[test]
    fn test_target_bullet_count_bounds() {
        assert_eq!(target_bullet_count(0), 5);
        assert_eq!(target_bullet_count(120 * 60_000), 12);
        assert_eq!(target_bullet_count(10 * 60_000), 5);
        assert_eq!(target_bullet_count(16 * 60_000), 8);
        assert_eq!(target_bullet_count(30 * 60_000), 12);
    }

    #[tokio::test]
    async fn test_review_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), true, false);

        let review = svc.review("abc12345678", "en").await.unwrap();
        // 600s video -> 10 minutes -> target 5
        assert_eq!(review.points.len(), 5);
        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_review_served_from_summary_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), true, false);

        let first = svc.review("abc12345678", "en").await.unwrap();
        let second = svc.review("abc12345678", "en").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.player_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_collapse_into_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), true, false);

        let (a, b, c) = tokio::join!(
            svc.review("abc12345678", "en"),
            svc.review("abc12345678", "en"),
            svc.review("abc12345678", "en"),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.player_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_locales_are_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), true, false);

        svc.review("abc12345678", "en").await.unwrap();
        svc.review("abc12345678", "fr").await.unwrap();

        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 2);
        // transcript itself is cached per video, not per locale
        assert_eq!(counters.player_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_captions_maps_to_no_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), false, false);

        let err = svc.review("abc12345678", "en").await.unwrap_err();
        assert_eq!(err, ReviewError::NoTranscript);
        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, counters) = service(dir.path(), true, true);

        let err = svc.review("abc12345678", "en").await.unwrap_err();
        assert_eq!(err, ReviewError::GenerationFailed);

        let err = svc.review("abc12345678", "en").await.unwrap_err();
        assert_eq!(err, ReviewError::GenerationFailed);
        // both attempts actually ran the generator
        assert_eq!(counters.summarize_calls.load(Ordering::SeqCst), 2);
    }
}
