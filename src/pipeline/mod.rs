use anyhow::Context;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, RunConfig, SourceKind, SourceLayout};
use crate::media;
use crate::openai::OpenAiClient;
use crate::output;
use crate::sources::vimeo::RetryPolicy;
use crate::sources::{FetchOptions, FetchedMedia, SourceRegistry};
use crate::summary::{self, Summarizer};
use crate::transcribe::{self, SpeechToText};
use crate::utils;
use crate::Result;

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub media: FetchedMedia,
    pub mp3: Option<PathBuf>,
    pub joined: Option<PathBuf>,
    pub archived: Option<PathBuf>,
    pub transcripts: usize,
    pub summary_parts: usize,
    pub pdf: Option<PathBuf>,
}

/// Runs one download followed by the enabled post-processing steps
pub struct DigestPipeline {
    config: Config,
    client: Client,
    registry: SourceRegistry,
    speech: Option<Arc<dyn SpeechToText>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    show_progress: bool,
}

impl DigestPipeline {
    pub fn new(config: Config, show_progress: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.download.user_agent.clone())
            .connect_timeout(config.download.connect_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let retry = RetryPolicy {
            inactivity_timeout: config.download.segment_timeout(),
            max_timeout_retries: config.download.max_timeout_retries,
        };
        let registry = SourceRegistry::with_defaults(client.clone(), retry, show_progress);

        Ok(Self {
            config,
            client,
            registry,
            speech: None,
            summarizer: None,
            show_progress,
        })
    }

    /// Pipeline over a custom set of sources
    pub fn with_registry(config: Config, registry: SourceRegistry, show_progress: bool) -> Self {
        Self {
            config,
            client: Client::new(),
            registry,
            speech: None,
            summarizer: None,
            show_progress,
        }
    }

    /// Replace the OpenAI-backed transcription and summary services
    pub fn with_services(
        mut self,
        speech: Arc<dyn SpeechToText>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        self.speech = Some(speech);
        self.summarizer = Some(summarizer);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn openai(&self) -> Result<Arc<OpenAiClient>> {
        let api_key = self
            .config
            .openai
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("OpenAI API key is not configured (set OPEN_AI_KEY or openai.api_key)")?;

        Ok(Arc::new(OpenAiClient::new(
            self.client.clone(),
            &self.config.openai,
            api_key,
        )))
    }

    fn speech(&self) -> Result<Arc<dyn SpeechToText>> {
        match &self.speech {
            Some(speech) => Ok(speech.clone()),
            None => Ok(self.openai()?),
        }
    }

    fn summarizer(&self) -> Result<Arc<dyn Summarizer>> {
        match &self.summarizer {
            Some(summarizer) => Ok(summarizer.clone()),
            None => Ok(self.openai()?),
        }
    }

    /// Download the link and run every step enabled in `run`
    pub async fn run(&self, run: &RunConfig) -> Result<RunReport> {
        let started = Instant::now();

        let link = utils::validate_url(&run.link)?;
        let source = self.registry.resolve(run.source, link.as_str())?;
        tracing::info!("🔗 Source: {} ({})", source.platform_name(), link);

        if run.delete_source {
            let root = &self.config.paths.source_root;
            if root.exists() {
                fs_err::remove_dir_all(root)?;
                tracing::info!("🗑️  Removed {}", root.display());
            }
        }

        let layout = SourceLayout::new(&self.config.paths, source.kind());
        layout.prepare()?;

        let options = FetchOptions {
            only_audio: run.only_audio,
        };
        let media = source.fetch_media(&link, options, &layout).await?;

        let mut report = RunReport {
            mp3: media.audio_is_mp3.then(|| media.audio.clone()),
            media,
            joined: None,
            archived: None,
            transcripts: 0,
            summary_parts: 0,
            pdf: None,
        };

        if run.convert_to_mp3 && !report.media.audio_is_mp3 {
            media::convert_to_mp3(&report.media.audio, &layout.mp3).await?;
            report.mp3 = Some(layout.mp3.clone());
        }

        if run.join_audio_video {
            self.join(&layout, &mut report).await?;
        }

        if layout.kind == SourceKind::Youtube {
            if let Some(mp3) = &report.mp3 {
                let stored = layout.storage_path(&format!("Audio_{}.mp3", timestamp()));
                output::copy_file(mp3, &stored).await?;
                tracing::info!("💾 Audio stored at {}", stored.display());
                report.archived = Some(stored);
            }
        }

        if run.transcribe {
            let mp3 = report.mp3.clone().unwrap_or_else(|| layout.mp3.clone());
            utils::check_file_accessible(&mp3)
                .context("Transcription needs an mp3, enable the mp3 conversion")?;

            let speech = self.speech()?;
            let transcription = transcribe::split_and_transcribe(
                speech.as_ref(),
                &mp3,
                &layout.audio_segments,
                &layout.text_segments,
                self.config.openai.transcription_segment_minutes,
                self.show_progress,
            )
            .await?;
            report.transcripts = transcription.texts.len();
        }

        if run.summarize {
            let summarizer = self.summarizer()?;
            let instructions = summary::summary_prompt(self.config.openai.summary_topic.as_deref());

            report.summary_parts = summary::create_summary(
                summarizer.as_ref(),
                &layout.text_segments,
                &layout.summary_segments,
                &layout.text,
                &instructions,
                self.config.openai.summary_chunk_chars,
            )
            .await?;

            let joined = output::join_text_files(&layout.summary_segments)?;
            output::save_text(&joined, &layout.summary)?;
            tracing::info!("📝 Summary saved to {}", layout.summary.display());
        }

        if run.create_pdf {
            output::create_pdf_from_txt(&layout.summary, &layout.pdf)?;
            report.pdf = Some(layout.pdf.clone());
        }

        tracing::info!(
            "⏱️  Time spent: {}",
            utils::format_duration(started.elapsed().as_secs_f64())
        );

        Ok(report)
    }

    async fn join(&self, layout: &SourceLayout, report: &mut RunReport) -> Result<()> {
        let Some(video) = report.media.video.clone() else {
            tracing::warn!("⚠️  No video track downloaded, skipping join");
            return Ok(());
        };

        let file_name = format!("FinalVideo_{}.mp4", timestamp());
        let joined = layout.root.join(&file_name);
        media::join_files(&report.media.audio, &video, &joined).await?;

        if joined.exists() {
            let archived = layout.storage_path(&file_name);
            output::move_file(&joined, &archived).await?;
            report.joined = Some(joined);
            report.archived = Some(archived);
        }

        Ok(())
    }
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
