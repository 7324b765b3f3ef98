use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};

use super::lock::{DownloadLock, LockStore};
use super::manifest::Segment;
use super::select::ResolvedRendition;
use super::MediaKind;
use crate::utils::{format_file_size, sanitize_filename};
use crate::DigestError;

/// Init segments arrive with or without `=` padding
const INIT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body of one segment response, chunk by chunk
pub type SegmentBody = BoxStream<'static, Result<Bytes, DigestError>>;

/// Opens segment requests
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Start a GET for `url`. Any status other than 200 is a `SegmentHttp` error.
    async fn open(&self, url: &str) -> Result<SegmentBody, DigestError>;
}

/// Segment requests over HTTP(S)
pub struct HttpSegmentSource {
    client: Client,
}

impl HttpSegmentSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SegmentSource for HttpSegmentSource {
    async fn open(&self, url: &str) -> Result<SegmentBody, DigestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DigestError::transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DigestError::SegmentHttp {
                url: url.to_string(),
                status,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DigestError::transport))
            .boxed())
    }
}

/// What happens when a segment goes quiet.
///
/// A request that receives nothing for `inactivity_timeout` is discarded and the
/// same segment is requested again. With `max_timeout_retries` unset this repeats
/// until the segment arrives or fails for another reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub inactivity_timeout: Duration,
    pub max_timeout_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(inactivity_timeout: Duration) -> Self {
        Self {
            inactivity_timeout,
            max_timeout_retries: None,
        }
    }

    fn allows_retry(&self, timeouts: u32) -> bool {
        self.max_timeout_retries.map_or(true, |max| timeouts <= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(7))
    }
}

/// A rendition bound to its output file
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTarget {
    pub kind: MediaKind,
    /// Absolute; segment URLs are appended to it verbatim
    pub base_url: String,
    /// Base64 init segment
    pub init_data: String,
    pub segments: Vec<Segment>,
    pub index_segment_range: Option<String>,
    pub output_path: PathBuf,
}

impl DownloadTarget {
    pub fn from_rendition(resolved: &ResolvedRendition, dir: &Path, filename: &str) -> Self {
        Self {
            kind: resolved.kind,
            base_url: resolved.base_url.clone(),
            init_data: resolved.rendition.init_segment.clone(),
            segments: resolved.rendition.segments.clone(),
            index_segment_range: resolved.rendition.index_segment_range.clone(),
            output_path: dir.join(sanitize_filename(filename)),
        }
    }

    pub fn segment_urls(&self) -> Vec<String> {
        segment_urls(&self.base_url, &self.segments, self.index_segment_range.as_deref())
    }

    fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// URLs to fetch, in playback order.
///
/// Segments with a URL are fetched one by one. When none has a URL the rendition is
/// byte-range addressed and a single request for the index range is made instead.
pub fn segment_urls(base_url: &str, segments: &[Segment], index_segment_range: Option<&str>) -> Vec<String> {
    let urls: Vec<String> = segments
        .iter()
        .filter(|segment| !segment.url.is_empty())
        .map(|segment| format!("{}{}", base_url, segment.url))
        .collect();

    if !urls.is_empty() {
        return urls;
    }

    index_segment_range
        .map(|range| vec![format!("{}range={}", base_url, range)])
        .unwrap_or_default()
}

/// Where a target stands before a download starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Nothing on disk yet
    Fresh,
    /// Output present and unlocked
    CompleteExists,
    /// Lock left behind by an earlier run
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    AlreadyComplete,
    Downloaded { segments: usize, bytes: u64 },
}

enum Attempt {
    Finished(u64),
    TimedOut,
    Failed(DigestError),
}

/// Materializes download targets by appending their segments to one file
pub struct SegmentDownloader {
    source: Box<dyn SegmentSource>,
    locks: Box<dyn LockStore>,
    retry: RetryPolicy,
    show_progress: bool,
}

impl SegmentDownloader {
    pub fn new(source: Box<dyn SegmentSource>, locks: Box<dyn LockStore>, retry: RetryPolicy) -> Self {
        Self {
            source,
            locks,
            retry,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn inspect(&self, output: &Path) -> Result<TargetState, DigestError> {
        if self.locks.is_locked(output).await? {
            return Ok(TargetState::Incomplete);
        }
        if tokio::fs::try_exists(output).await? {
            return Ok(TargetState::CompleteExists);
        }
        Ok(TargetState::Fresh)
    }

    pub async fn download(&self, target: &DownloadTarget) -> Result<DownloadOutcome, DigestError> {
        let file_name = target.file_name();

        match self.inspect(&target.output_path).await? {
            TargetState::CompleteExists => {
                tracing::warn!("⚠️  {} - {} already exists", file_name, target.kind);
                return Ok(DownloadOutcome::AlreadyComplete);
            }
            TargetState::Incomplete => {
                tracing::warn!(
                    "⚠️  {} - {} is incomplete, restarting the download",
                    file_name,
                    target.kind
                );
            }
            TargetState::Fresh => {}
        }

        let init = INIT_SEGMENT
            .decode(target.init_data.trim())
            .map_err(|e| DigestError::InitSegment(e.to_string()))?;

        let lock = DownloadLock::acquire(self.locks.as_ref(), &target.output_path).await?;

        let mut file = File::create(&target.output_path).await?;
        file.write_all(&init).await?;
        let mut offset = init.len() as u64;

        let urls = target.segment_urls();
        let progress = self.progress_bar(urls.len() as u64, target.kind, &file_name);

        for (i, url) in urls.iter().enumerate() {
            tracing::info!(
                "📦 {} Downloading {} segment {}/{} of {}",
                target.kind.icon(),
                target.kind,
                i,
                urls.len(),
                target.output_path.display()
            );
            offset += self.fetch_segment(url, &mut file, offset).await?;
            progress.inc(1);
        }

        file.flush().await?;
        lock.release().await?;
        progress.finish_with_message(format!("{} done", file_name));
        tracing::info!(
            "🏁 {} - {} done ({})",
            target.output_path.display(),
            target.kind,
            format_file_size(offset)
        );

        Ok(DownloadOutcome::Downloaded {
            segments: urls.len(),
            bytes: offset,
        })
    }

    /// Append one segment starting at `offset`, re-requesting it on inactivity
    async fn fetch_segment(&self, url: &str, file: &mut File, offset: u64) -> Result<u64, DigestError> {
        let mut timeouts = 0u32;

        loop {
            match self.attempt(url, file).await {
                Attempt::Finished(written) => return Ok(written),
                Attempt::Failed(err) => return Err(err),
                Attempt::TimedOut => {
                    timeouts += 1;
                    if !self.retry.allows_retry(timeouts) {
                        return Err(DigestError::SegmentTimeout {
                            url: url.to_string(),
                            attempts: timeouts,
                        });
                    }
                    tracing::warn!(url, attempt = timeouts, "⚠️  Timeout. Retrying");

                    // Drop whatever the stalled request managed to write
                    file.flush().await?;
                    file.set_len(offset).await?;
                    file.seek(SeekFrom::Start(offset)).await?;
                }
            }
        }
    }

    async fn attempt(&self, url: &str, file: &mut File) -> Attempt {
        let window = self.retry.inactivity_timeout;

        let mut body = match tokio::time::timeout(window, self.source.open(url)).await {
            Err(_) => return Attempt::TimedOut,
            Ok(Err(err)) => return Attempt::Failed(err),
            Ok(Ok(body)) => body,
        };

        let mut written = 0u64;
        loop {
            match tokio::time::timeout(window, body.next()).await {
                Err(_) => return Attempt::TimedOut,
                Ok(None) => return Attempt::Finished(written),
                Ok(Some(Err(err))) => return Attempt::Failed(err),
                Ok(Some(Ok(chunk))) => {
                    if let Err(err) = file.write_all(&chunk).await {
                        return Attempt::Failed(err.into());
                    }
                    written += chunk.len() as u64;
                }
            }
        }
    }

    fn progress_bar(&self, segments: u64, kind: MediaKind, file_name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(segments);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(format!("{} {}", kind, file_name));
        progress
    }
}
