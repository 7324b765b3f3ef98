//! Vimeo segmented streams.
//!
//! `master.json` lists every audio and video rendition of a clip together with the
//! segments it is split into. The best rendition of each kind is downloaded by
//! appending its segments, in order, after the decoded init segment.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod downloader;
pub mod lock;
pub mod manifest;
pub mod select;

#[cfg(test)]
mod test_server;

pub use downloader::{
    DownloadOutcome, DownloadTarget, HttpSegmentSource, RetryPolicy, SegmentDownloader,
    SegmentSource, TargetState,
};
pub use lock::{DownloadLock, LockStore, MarkerFiles};
pub use manifest::{Manifest, ManifestFetcher, Rendition, Segment};
pub use select::{select_renditions, ResolvedRendition, Selection};

use super::{FetchOptions, FetchedMedia, MediaSource};
use crate::config::{SourceKind, SourceLayout};
use crate::Result;

pub const AUDIO_FILE: &str = "Audio.m4a";
pub const VIDEO_FILE: &str = "Video.m4v";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            MediaKind::Audio => "🎧",
            MediaKind::Video => "📹",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct VimeoSource {
    fetcher: ManifestFetcher,
    downloader: SegmentDownloader,
}

impl VimeoSource {
    pub fn new(client: Client, retry: RetryPolicy, show_progress: bool) -> Self {
        Self {
            fetcher: ManifestFetcher::new(client.clone()),
            downloader: SegmentDownloader::new(
                Box::new(HttpSegmentSource::new(client)),
                Box::new(MarkerFiles),
                retry,
            )
            .with_progress(show_progress),
        }
    }

    pub fn with_downloader(fetcher: ManifestFetcher, downloader: SegmentDownloader) -> Self {
        Self { fetcher, downloader }
    }

    /// Download the selected targets; audio and video run side by side.
    ///
    /// Audio is required. A failed video target is logged and dropped.
    pub async fn download_selection(
        &self,
        selection: &Selection,
        options: FetchOptions,
        layout: &SourceLayout,
    ) -> Result<FetchedMedia> {
        let audio = DownloadTarget::from_rendition(selection.require_audio()?, &layout.root, AUDIO_FILE);

        let video = match (&selection.video, options.only_audio) {
            (_, true) => None,
            (Some(video), false) => Some(DownloadTarget::from_rendition(video, &layout.root, VIDEO_FILE)),
            (None, false) => {
                tracing::warn!("⚠️  Manifest has no video rendition, continuing with audio only");
                None
            }
        };

        let video_download = async {
            match &video {
                Some(target) => Some(self.downloader.download(target).await),
                None => None,
            }
        };
        let (audio_result, video_result) =
            futures_util::future::join(self.downloader.download(&audio), video_download).await;

        let video_path = match (video_result, &video) {
            (Some(Ok(_)), Some(target)) => Some(target.output_path.clone()),
            (Some(Err(err)), _) => {
                tracing::warn!("⚠️  Video download failed: {}", err);
                None
            }
            _ => None,
        };

        audio_result.with_context(|| format!("Audio download failed for {}", audio.output_path.display()))?;

        Ok(FetchedMedia {
            audio: audio.output_path,
            video: video_path,
            audio_is_mp3: false,
        })
    }
}

#[async_trait]
impl MediaSource for VimeoSource {
    async fn fetch_media(
        &self,
        link: &Url,
        options: FetchOptions,
        layout: &SourceLayout,
    ) -> Result<FetchedMedia> {
        let manifest = self.fetcher.fetch(link).await?;
        let selection = select_renditions(&manifest, link)?;
        self.download_selection(&selection, options, layout).await
    }

    fn supports_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        let path = parsed.path().to_lowercase();

        host.ends_with("vimeo.com")
            || host.ends_with("vimeocdn.com")
            || path.ends_with("/master.json")
            || path.ends_with("/playlist.json")
    }

    fn platform_name(&self) -> &'static str {
        "Vimeo"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Vimeo
    }
}
