use clap::{Args, Parser, Subcommand};

use crate::config::{RunConfig, SourceKind};

#[derive(Parser)]
#[command(
    name = "media-digest",
    about = "Media Digest - Download Vimeo or YouTube media, transcribe it and build a summary PDF",
    version,
    long_about = "A CLI tool that downloads Vimeo segmented streams (audio and video) or YouTube audio, converts it with ffmpeg, transcribes it with a speech-to-text API and summarizes the transcript into a PDF."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a source and run the enabled post-processing steps
    Run(RunArgs),

    /// Show the persisted configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported sources
    Sources,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Vimeo manifest URL (master.json) or YouTube video URL
    #[arg(value_name = "LINK", env = "LINK")]
    pub link: String,

    /// Source kind (inferred from the link if not specified)
    #[arg(long, value_enum, env = "CONFIG_SOURCE")]
    pub source: Option<SourceKind>,

    /// Skip the video rendition of Vimeo sources
    #[arg(long, env = "CONFIG_VIMEO_ONLY_AUDIO")]
    pub only_audio: bool,

    /// Convert the downloaded audio to mp3
    #[arg(long = "convert-mp3", env = "CONFIG_VIMEO_CONVERT_AUDIO_MP3")]
    pub convert_to_mp3: bool,

    /// Mux the downloaded audio and video into a single mp4
    #[arg(long = "join", env = "CONFIG_VIMEO_JOIN_AUDIO_VIDEO")]
    pub join_audio_video: bool,

    /// Split the mp3 and transcribe every slice
    #[arg(long, env = "CONFIG_TRANSCRIBE")]
    pub transcribe: bool,

    /// Summarize the transcript
    #[arg(long, env = "CONFIG_GET_SUMMARY")]
    pub summarize: bool,

    /// Render the summary as PDF
    #[arg(long = "pdf", env = "CONFIG_CREATE_PDF")]
    pub create_pdf: bool,

    /// Delete the source working directory before starting
    #[arg(long = "clean", env = "CONFIG_DELETE")]
    pub delete_source: bool,

    /// OpenAI API key (overrides the config file)
    #[arg(long, env = "OPEN_AI_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    /// Topic of the talk, used in the summary prompt
    #[arg(long, env = "SUMMARY")]
    pub topic: Option<String>,
}

impl RunArgs {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            link: self.link.clone(),
            source: self.source,
            only_audio: self.only_audio,
            convert_to_mp3: self.convert_to_mp3,
            join_audio_video: self.join_audio_video,
            transcribe: self.transcribe,
            summarize: self.summarize,
            create_pdf: self.create_pdf,
            delete_source: self.delete_source,
        }
    }
}
