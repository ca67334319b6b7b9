use std::time::Duration;

use eyre::{Report, Result};
use log::{debug, info, warn};

use crate::botguard::Authenticate;
use crate::cache::{BlobCache, TRANSCRIPT_TTL};
use crate::innertube::{TimedText, VideoApi};
use crate::session::SessionManager;
use crate::{Segment, Transcript, TranscriptError, TranscriptOutcome};

const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformErrorKind {
    NoTranscript,
    StaleSession,
    FetchFailed,
}

/// The platform communicates most failures as prose, so classification is
/// string matching over the error chain. This is the only place it happens.
fn classify_platform_error(error: &Report) -> PlatformErrorKind {
    let message = format!("{error:#}").to_lowercase();

    if message.contains("400") || message.contains("precondition") {
        PlatformErrorKind::StaleSession
    } else if message.contains("transcript") {
        PlatformErrorKind::NoTranscript
    } else {
        PlatformErrorKind::FetchFailed
    }
}

/// Obtains transcripts: durable cache first, then the authenticated
/// platform API, with stale-session recovery. The single policy boundary:
/// everything below propagates raw errors, everything above sees only the
/// two public failure kinds.
pub struct TranscriptFetcher<A, V> {
    session: SessionManager<A>,
    api: V,
    cache: BlobCache<Transcript>,
}

impl<A: Authenticate, V: VideoApi> TranscriptFetcher<A, V> {
    pub fn new(session: SessionManager<A>, api: V, cache: BlobCache<Transcript>) -> Self {
        TranscriptFetcher { session, api, cache }
    }

    /// Fetch the transcript for a video. Resolves every failure path to a
    /// typed error; never panics. Only successes are cached, so failures
    /// are re-attempted on the next request.
    pub async fn fetch_transcript(&self, video_id: &str) -> TranscriptOutcome {
        if let Some(transcript) = self.cache.get(video_id).await {
            info!("Transcript cache hit for video {video_id}");
            return Ok(transcript);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.attempt_fetch(video_id).await {
                Ok(Some(transcript)) => {
                    info!(
                        "Fetched transcript for video {video_id}: {} segments, {}ms",
                        transcript.segments.len(),
                        transcript.duration_ms
                    );
                    if let Err(e) = self.cache.set(video_id, &transcript, TRANSCRIPT_TTL).await {
                        warn!("Failed to cache transcript for {video_id}: {e}");
                    }
                    return Ok(transcript);
                }
                Ok(None) => {
                    info!("Video {video_id} has no caption tracks");
                    return Err(TranscriptError::NoTranscript);
                }
                Err(e) => match classify_platform_error(&e) {
                    PlatformErrorKind::StaleSession if attempt < MAX_RETRIES => {
                        attempt += 1;
                        warn!(
                            "Stale session fetching {video_id}, re-authenticating (retry {attempt}/{MAX_RETRIES}): {e:#}"
                        );
                        self.session.invalidate().await;
                        tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                    }
                    PlatformErrorKind::NoTranscript => {
                        info!("Platform reports no transcript for {video_id}: {e:#}");
                        return Err(TranscriptError::NoTranscript);
                    }
                    _ => {
                        warn!("Transcript fetch failed for {video_id}: {e:#}");
                        return Err(TranscriptError::FetchFailed);
                    }
                },
            }
        }
    }

    /// One full acquisition pass. `Ok(None)` means the video legitimately
    /// has no captions — a terminal state, not an error.
    async fn attempt_fetch(&self, video_id: &str) -> Result<Option<Transcript>> {
        let session = self.session.get().await?;
        let player = self.api.player(&session, video_id).await?;

        let tracks = player.caption_tracks();
        let Some(track) = tracks.first() else {
            return Ok(None);
        };
        // first listed track wins; there is deliberately no locale preference
        debug!(
            "Using caption track lang={:?} of {} for video {video_id}",
            track.language_code,
            tracks.len()
        );

        let timed_text = self.api.timed_text(&session, &track.base_url).await?;
        let segments = segments_from_events(&timed_text);

        Ok(Some(Transcript::from_segments(
            segments,
            track.language_code.clone(),
            player.duration_ms(),
        )))
    }

    /// Best-effort title lookup for page titles; swallows every failure
    pub async fn video_title(&self, video_id: &str) -> Option<String> {
        let session = match self.session.get().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not get session for title lookup: {e:#}");
                return None;
            }
        };
        match self.api.player(&session, video_id).await {
            Ok(player) => player.title().map(|t| t.to_string()),
            Err(e) => {
                warn!("Title lookup failed for {video_id}: {e:#}");
                None
            }
        }
    }
}

/// Build segments from timed-text events, skipping events with no text
/// segments or only blank text. Event text is the in-order concatenation
/// of its segment strings.
fn segments_from_events(timed_text: &TimedText) -> Vec<Segment> {
    timed_text
        .events
        .iter()
        .filter_map(|event| {
            let segs = event.segs.as_ref()?;
            let text: String = segs.iter().filter_map(|s| s.utf8.as_deref()).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(Segment {
                text,
                start_ms: event.t_start_ms,
                duration_ms: event.d_duration_ms.unwrap_or(0),
            })
        })
        .collect()
}
