use anyhow::Result;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use crate::media;
use crate::output;

/// Speech-to-text backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one audio file
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// Summary of a split-and-transcribe pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptionReport {
    pub slices: usize,
    pub texts: Vec<PathBuf>,
}

/// Path of the transcript written for slice `index` (1-based)
pub fn text_path(text_dir: &Path, index: usize) -> PathBuf {
    text_dir.join(format!("text_{}.txt", index))
}

/// Transcribe one slice into `text_<index>.txt`.
///
/// A failed request is logged and skipped so the remaining slices still get
/// transcribed; `None` is returned in that case.
pub async fn transcribe_slice(
    stt: &dyn SpeechToText,
    slice: &Path,
    index: usize,
    text_dir: &Path,
) -> Result<Option<PathBuf>> {
    match stt.transcribe(slice).await {
        Ok(text) => {
            let path = text_path(text_dir, index);
            output::save_text(&text, &path)?;
            tracing::info!("📃 Transcription of segment {} completed successfully.", index);
            Ok(Some(path))
        }
        Err(err) => {
            tracing::warn!(
                "⚠️  Transcription of segment {} ({}) failed: {:#}",
                index,
                slice.display(),
                err
            );
            Ok(None)
        }
    }
}

/// Cut the mp3 into slices and transcribe each one as soon as it is cut
pub async fn split_and_transcribe(
    stt: &dyn SpeechToText,
    mp3: &Path,
    slices_dir: &Path,
    text_dir: &Path,
    slice_minutes: u64,
    show_progress: bool,
) -> Result<TranscriptionReport> {
    let duration = media::probe_duration(mp3).await?;
    let count = media::slice_count(duration, slice_minutes);
    let slice_secs = slice_minutes * 60;

    let progress = if show_progress {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress
    } else {
        ProgressBar::hidden()
    };

    let mut report = TranscriptionReport {
        slices: count as usize,
        texts: Vec::new(),
    };

    for i in 0..count {
        let index = i as usize + 1;
        progress.set_message(format!("Transcribing segment {}/{}...", index, count));

        let slice = slices_dir.join(format!("segment_{}.mp3", index));
        media::cut_slice(mp3, i * slice_secs, slice_secs, &slice).await?;
        tracing::info!("✅ Segmenting {}/{} cut successfully.", index, count);

        if let Some(path) = transcribe_slice(stt, &slice, index, text_dir).await? {
            report.texts.push(path);
        }
    }

    progress.finish_with_message("Transcription completed!");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    #[tokio::test]
    async fn test_transcribed_slice_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .withf(|audio: &Path| audio.ends_with("segment_2.mp3"))
            .times(1)
            .returning(|_| Ok("hello world".to_string()));

        let saved = transcribe_slice(&stt, Path::new("slices/segment_2.mp3"), 2, dir.path())
            .await
            .unwrap();

        assert_eq!(saved, Some(dir.path().join("text_2.txt")));
        assert_eq!(std::fs::read_to_string(dir.path().join("text_2.txt")).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_failed_slice_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .with(always())
            .returning(|_| Err(anyhow::anyhow!("rate limited")));

        let saved = transcribe_slice(&stt, Path::new("segment_1.mp3"), 1, dir.path())
            .await
            .unwrap();

        assert_eq!(saved, None);
        assert!(!text_path(dir.path(), 1).exists());
    }
}
