use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod layout;

pub use layout::SourceLayout;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Working and storage directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Segment download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Speech-to-text and summary API settings
    #[serde(default)]
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the per-source working directories
    pub source_root: PathBuf,

    /// Long-term storage for finished media
    pub storage_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Inactivity window before a segment request is re-issued
    pub segment_timeout_secs: u64,

    /// Give up on a segment after this many timeouts (unbounded when unset)
    pub max_timeout_retries: Option<u32>,

    /// TCP connect timeout
    pub connect_timeout_secs: u64,

    /// User agent sent with manifest and segment requests
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (can be overridden with OPEN_AI_KEY)
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Model used for speech-to-text
    pub transcription_model: String,

    /// Model used for summaries
    pub summary_model: String,

    /// Characters of transcript sent per summary request
    pub summary_chunk_chars: usize,

    /// Length of each audio slice sent for transcription
    pub transcription_segment_minutes: u64,

    /// Topic of the talk, mentioned in the summary prompt
    pub summary_topic: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("source"),
            storage_root: PathBuf::from("storage"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            segment_timeout_secs: 7,
            max_timeout_retries: None,
            connect_timeout_secs: 10,
            user_agent: format!("media-digest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            summary_model: "gpt-3.5-turbo".to_string(),
            summary_chunk_chars: 4096,
            transcription_segment_minutes: 5,
            summary_topic: None,
        }
    }
}

impl DownloadConfig {
    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("media-digest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.download.segment_timeout_secs == 0 {
            anyhow::bail!("download.segment_timeout_secs must be greater than zero");
        }
        if self.download.connect_timeout_secs == 0 {
            anyhow::bail!("download.connect_timeout_secs must be greater than zero");
        }
        if self.openai.summary_chunk_chars == 0 {
            anyhow::bail!("openai.summary_chunk_chars must be greater than zero");
        }
        if self.openai.transcription_segment_minutes == 0 {
            anyhow::bail!("openai.transcription_segment_minutes must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Source Root: {}", self.paths.source_root.display());
        println!("  Storage Root: {}", self.paths.storage_root.display());
        println!("  Segment Timeout: {}s", self.download.segment_timeout_secs);
        match self.download.max_timeout_retries {
            Some(max) => println!("  Timeout Retries: {}", max),
            None => println!("  Timeout Retries: unbounded"),
        }
        println!("  API Key: {}", if self.openai.api_key.is_some() { "set" } else { "not set" });
        println!("  Transcription Model: {}", self.openai.transcription_model);
        println!("  Summary Model: {}", self.openai.summary_model);
    }
}

/// Where the media comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Youtube,
    Vimeo,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "youtube",
            SourceKind::Vimeo => "vimeo",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single run.
///
/// Every switch defaults to off, so a bare run only downloads the media.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Vimeo manifest URL or YouTube video URL
    pub link: String,

    /// Source kind; inferred from `link` when `None`
    pub source: Option<SourceKind>,

    /// Skip the Vimeo video target
    pub only_audio: bool,

    /// Convert the downloaded audio to mp3
    pub convert_to_mp3: bool,

    /// Mux audio and video into one mp4 and move it to storage
    pub join_audio_video: bool,

    /// Split the mp3 and transcribe each slice
    pub transcribe: bool,

    /// Summarize the transcript
    pub summarize: bool,

    /// Render the summary as PDF
    pub create_pdf: bool,

    /// Remove the source working tree before the run
    pub delete_source: bool,
}

impl RunConfig {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            ..Self::default()
        }
    }
}
