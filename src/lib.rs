//! Media Digest - A Rust CLI tool for turning remote talks into summaries
//!
//! This library downloads audio (and optionally video) from Vimeo segmented streams or
//! YouTube, converts it with ffmpeg, transcribes it through a speech-to-text API and
//! condenses the transcript into a summary rendered as PDF.

pub mod cli;
pub mod config;
pub mod media;
pub mod openai;
pub mod output;
pub mod pipeline;
pub mod sources;
pub mod summary;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::{Config, RunConfig, SourceKind, SourceLayout};
pub use pipeline::{DigestPipeline, RunReport};
pub use sources::{FetchedMedia, MediaSource, SourceRegistry};

use sources::vimeo::MediaKind;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors raised by the manifest and segment download core
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("The manifest is expired or corrupted")]
    ManifestExpired,

    #[error("Error parsing manifest JSON: {0}")]
    ManifestParse(String),

    #[error("Downloading segment with URL '{url}' failed with status: {status}")]
    SegmentHttp {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Segment '{url}' timed out {attempts} times")]
    SegmentTimeout { url: String, attempts: u32 },

    #[error("No {0} rendition found in manifest")]
    MissingRendition(MediaKind),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid init segment: {0}")]
    InitSegment(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DigestError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        DigestError::Transport(err.to_string())
    }
}
