use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{PathsConfig, SourceKind};

/// On-disk layout of one source's working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub kind: SourceKind,
    pub root: PathBuf,
    pub mp3: PathBuf,
    pub text: PathBuf,
    pub text_segments: PathBuf,
    pub summary_segments: PathBuf,
    pub summary: PathBuf,
    pub pdf: PathBuf,
    pub audio_segments: PathBuf,
    pub storage: PathBuf,
}

impl SourceLayout {
    pub fn new(paths: &PathsConfig, kind: SourceKind) -> Self {
        let root = paths.source_root.join(kind.as_str());
        let mp3 = match kind {
            SourceKind::Vimeo => root.join("Audio.mp3"),
            SourceKind::Youtube => root.join("audio.mp3"),
        };

        Self {
            kind,
            mp3,
            text: root.join("text.txt"),
            text_segments: root.join("text").join("segments"),
            summary_segments: root.join("summary").join("segments"),
            summary: root.join("summary.txt"),
            pdf: root.join("summary.pdf"),
            audio_segments: root.join("audio").join("segments"),
            storage: paths.storage_root.join(kind.as_str()),
            root,
        }
    }

    /// Create every working directory the pipeline writes into
    pub fn prepare(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.text_segments,
            &self.summary_segments,
            &self.audio_segments,
        ] {
            fs_err::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn storage_path(&self, file_name: &str) -> PathBuf {
        self.storage.join(file_name)
    }
}
