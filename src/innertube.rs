use async_trait::async_trait;
use eyre::Result;
use log::debug;
use serde::Deserialize;

use crate::session::VisitorSession;

pub(crate) const INNERTUBE_BASE: &str = "https://www.youtube.com/youtubei/v1";

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CLIENT_VERSION: &str = "2.20241126.01.00";

/// WEB client context block shared by every InnerTube request
pub(crate) fn web_client_context(hl: &str, visitor_data: Option<&str>) -> serde_json::Value {
    let mut client = serde_json::json!({
        "hl": hl,
        "gl": "US",
        "clientName": "WEB",
        "clientVersion": CLIENT_VERSION,
    });
    if let Some(vd) = visitor_data {
        client["visitorData"] = vd.into();
    }
    serde_json::json!({ "client": client })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub captions: Option<CaptionsData>,
    pub video_details: Option<VideoDetails>,
}

impl PlayerResponse {
    /// Caption track descriptors, empty when the video has none
    pub fn caption_tracks(&self) -> &[CaptionTrack] {
        self.captions
            .as_ref()
            .and_then(|c| c.player_captions_tracklist_renderer.as_ref())
            .and_then(|r| r.caption_tracks.as_deref())
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.video_details.as_ref().and_then(|vd| vd.title.as_deref())
    }

    /// Total video duration in milliseconds (metadata reports whole seconds)
    pub fn duration_ms(&self) -> u64 {
        self.video_details
            .as_ref()
            .and_then(|vd| vd.length_seconds.as_deref())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
            * 1000
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub title: Option<String>,
    pub length_seconds: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionsData {
    pub player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTracklistRenderer {
    pub caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: Option<String>,
}

/// Timed-text payload in the structured JSON format (`fmt=json3`)
#[derive(Debug, Default, Deserialize)]
pub struct TimedText {
    #[serde(default)]
    pub events: Vec<TimedTextEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedTextEvent {
    #[serde(default)]
    pub t_start_ms: u64,
    pub d_duration_ms: Option<u64>,
    pub segs: Option<Vec<TimedTextSeg>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimedTextSeg {
    pub utf8: Option<String>,
}

/// Authenticated platform access used by the fetcher. Behind a trait so
/// tests can script responses without the network.
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn player(&self, session: &VisitorSession, video_id: &str) -> Result<PlayerResponse>;
    async fn timed_text(&self, session: &VisitorSession, base_url: &str) -> Result<TimedText>;
}

/// Production implementation against the InnerTube API, attaching the
/// session's PO token and visitor identity to every request
pub struct InnertubeApi {
    client: reqwest::Client,
}

impl InnertubeApi {
    pub fn new(client: reqwest::Client) -> Self {
        InnertubeApi { client }
    }
}

#[async_trait]
impl VideoApi for InnertubeApi {
    async fn player(&self, session: &VisitorSession, video_id: &str) -> Result<PlayerResponse> {
        debug!("Fetching player metadata for video {video_id}");

        let body = serde_json::json!({
            "context": web_client_context("en", Some(&session.visitor_data)),
            "videoId": video_id,
            "serviceIntegrityDimensions": { "poToken": session.po_token },
        });

        let resp: PlayerResponse = self
            .client
            .post(format!("{INNERTUBE_BASE}/player?prettyPrint=false"))
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .header("X-Goog-Visitor-Id", &session.visitor_data)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn timed_text(&self, session: &VisitorSession, base_url: &str) -> Result<TimedText> {
        let url = timed_text_url(base_url);
        debug!("Fetching timed text: {url}");

        let resp: TimedText = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("X-Goog-Visitor-Id", &session.visitor_data)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }
}

fn timed_text_url(base_url: &str) -> String {
    if base_url.contains('?') {
        format!("{base_url}&fmt=json3")
    } else {
        format!("{base_url}?fmt=json3")
    }
}
