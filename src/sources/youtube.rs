use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{FetchOptions, FetchedMedia, MediaSource};
use crate::config::{SourceKind, SourceLayout};
use crate::Result;

/// YouTube audio source using yt-dlp
pub struct YoutubeSource {
    yt_dlp_path: String,
}

impl YoutubeSource {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        let output = Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        matches!(output, Ok(output) if output.status.success())
    }

    /// Download the best audio stream and extract it to a low-bitrate mp3
    pub async fn download_mp3(&self, url: &str, mp3_path: &Path) -> Result<()> {
        tracing::debug!("Downloading audio for: {}", url);

        // yt-dlp names the extracted file itself, so hand it an extension template
        let template = mp3_path.with_extension("%(ext)s");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &template.to_string_lossy(),
                "--format",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--postprocessor-args",
                "ffmpeg:-b:a 20k",
                "--no-playlist",
                "--force-overwrites",
                "--newline",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download audio: {}", error);
        }

        tracing::info!("✅ Download and conversion to MP3 completed");
        Ok(())
    }
}

#[async_trait]
impl MediaSource for YoutubeSource {
    async fn fetch_media(
        &self,
        link: &Url,
        _options: FetchOptions,
        layout: &SourceLayout,
    ) -> Result<FetchedMedia> {
        if !self.check_availability().await {
            anyhow::bail!("yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp");
        }

        self.download_mp3(link.as_str(), &layout.mp3).await?;

        Ok(FetchedMedia {
            audio: layout.mp3.clone(),
            video: None,
            audio_is_mp3: true,
        })
    }

    fn supports_url(&self, url: &str) -> bool {
        // Support various YouTube URL formats
        let url_lower = url.to_lowercase();
        url_lower.contains("youtube.com/watch") ||
        url_lower.contains("youtu.be/") ||
        url_lower.contains("youtube.com/embed/") ||
        url_lower.contains("youtube.com/shorts/") ||
        url_lower.contains("m.youtube.com/")
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_youtube_urls() {
        let source = YoutubeSource::new();
        assert!(source.supports_url("https://www.youtube.com/watch?v=abc"));
        assert!(source.supports_url("https://youtu.be/abc"));
        assert!(source.supports_url("https://www.youtube.com/shorts/abc"));
        assert!(!source.supports_url("https://vimeo.com/123"));
    }
}
