use anyhow::{Context, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT_MM: f32 = 5.5;
const LINE_CHARS: usize = 90;

/// Save text to a file, replacing it
pub fn save_text(text: &str, path: &Path) -> Result<()> {
    fs_err::write(path, text)?;
    Ok(())
}

/// Numeric part of `text_12.txt` style names
fn file_number(name: &str) -> Option<u64> {
    let stem = name.split('.').next()?;
    stem.rsplit('_').next()?.parse().ok()
}

/// Concatenate the files of a directory ordered by their numeric suffix, one newline after each
pub fn join_text_files(dir: &Path) -> Result<String> {
    let mut files: Vec<(Option<u64>, String, PathBuf)> = fs_err::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .map(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (file_number(&name), name, path)
        })
        .collect();

    // Numbered files first, in numeric order; anything else after, by name
    files.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });

    let mut result = String::new();
    for (_, _, path) in files {
        result.push_str(&fs_err::read_to_string(&path)?);
        result.push('\n');
    }

    Ok(result)
}

/// Move a file, creating the destination directory; falls back to copy+delete across devices
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::rename(from, to).await.is_err() {
        tokio::fs::copy(from, to)
            .await
            .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
        tokio::fs::remove_file(from).await?;
    }

    tracing::info!("File moved: {} -> {}", from.display(), to.display());
    Ok(())
}

/// Copy a file, creating the destination directory
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Greedy word wrap; words longer than `width` are split
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(width) {
                let piece: String = piece.iter().collect();
                let piece_len = piece.chars().count();

                if line_len > 0 && line_len + 1 + piece_len > width {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                if line_len > 0 {
                    line.push(' ');
                    line_len += 1;
                }
                line.push_str(&piece);
                line_len += piece_len;
            }
        }

        lines.push(line);
    }

    lines
}

/// Render a text file as a paginated A4 PDF
pub fn create_pdf_from_txt(txt: &Path, pdf: &Path) -> Result<()> {
    let text = fs_err::read_to_string(txt)?;
    let lines = wrap_text(&text, LINE_CHARS);

    let title = txt
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "summary".to_string());

    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("Failed to load PDF font")?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for line in lines {
        if y < MARGIN_MM {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        if !line.is_empty() {
            current.use_text(line, FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
        }
        y -= LINE_HEIGHT_MM;
    }

    let file = fs_err::File::create(pdf)?;
    doc.save(&mut BufWriter::new(file))
        .with_context(|| format!("Failed to write PDF {}", pdf.display()))?;

    tracing::info!("📄 PDF created: {}", pdf.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_text_files_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("text_10.txt"), "ten").unwrap();
        std::fs::write(dir.path().join("text_2.txt"), "two").unwrap();
        std::fs::write(dir.path().join("text_1.txt"), "one").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "extra").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let joined = join_text_files(dir.path()).unwrap();
        assert_eq!(joined, "one\ntwo\nten\nextra\n");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("one\n\ntwo", 10), vec!["one", "", "two"]);
    }

    #[tokio::test]
    async fn test_move_file_creates_destination() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("FinalVideo.mp4");
        let to = dir.path().join("storage").join("vimeo").join("FinalVideo.mp4");
        std::fs::write(&from, b"mp4").unwrap();

        move_file(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"mp4");
    }

    #[test]
    fn test_pdf_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("summary.txt");
        let pdf = dir.path().join("summary.pdf");
        let long_text = "- a point worth keeping\n".repeat(200);
        std::fs::write(&txt, long_text).unwrap();

        create_pdf_from_txt(&txt, &pdf).unwrap();

        let bytes = std::fs::read(&pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
