use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::output;

/// Text summarization backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `part` following `instructions`
    async fn summarize(&self, instructions: &str, part: &str) -> Result<String>;
}

/// Instructions sent with every transcript chunk
pub fn summary_prompt(topic: Option<&str>) -> String {
    let subject = match topic {
        Some(topic) if !topic.trim().is_empty() => format!(" about {}", topic.trim()),
        _ => String::new(),
    };

    format!(
        "You are reading the transcript of a video{}. Write an organized bullet-point summary \
         of the main points, keeping the author's tips and recommendations, without repeating \
         concepts or examples, written in the first person.",
        subject
    )
}

/// Split text into pieces of at most `size` characters
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Join the transcripts into `text_path`, then summarize them chunk by chunk into
/// `summary_<n>.txt` files. Returns the number of summary parts written.
pub async fn create_summary(
    summarizer: &dyn Summarizer,
    text_dir: &Path,
    summary_dir: &Path,
    text_path: &Path,
    instructions: &str,
    chunk_chars: usize,
) -> Result<usize> {
    let text = output::join_text_files(text_dir)?;
    output::save_text(&text, text_path)?;

    let parts = chunk_text(&text, chunk_chars);
    if parts.is_empty() {
        tracing::warn!("⚠️  No transcript text found in {}", text_dir.display());
        return Ok(0);
    }

    for (index, part) in parts.iter().enumerate() {
        let summary = summarizer.summarize(instructions, part).await?;
        output::save_text(&summary, &summary_dir.join(format!("summary_{}.txt", index + 1)))?;
        tracing::info!("✅ Summary part {}/{} received successfully.", index + 1, parts.len());
    }

    Ok(parts.len())
}
