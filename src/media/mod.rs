use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Bitrate used for every mp3 we produce; speech stays intelligible at this rate
pub const MP3_BITRATE: &str = "20k";

async fn run_tool<I, S>(program: &str, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to start {}", program))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", program, error.trim());
    }

    Ok(output.stdout)
}

/// Re-encode any audio file as low-bitrate mp3
pub async fn convert_to_mp3(input: &Path, output: &Path) -> Result<()> {
    run_tool(
        "ffmpeg",
        [
            OsStr::new("-y"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-vn"),
            OsStr::new("-codec:a"),
            OsStr::new("libmp3lame"),
            OsStr::new("-b:a"),
            OsStr::new(MP3_BITRATE),
            output.as_os_str(),
        ],
    )
    .await?;

    tracing::info!("✅ Conversion to MP3 completed: {}", output.display());
    Ok(())
}

/// Mux a video track and an audio track into one mp4
pub async fn join_files(audio: &Path, video: &Path, destination: &Path) -> Result<()> {
    tracing::info!("⚙️ Joining files ...");

    run_tool(
        "ffmpeg",
        [
            OsStr::new("-y"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            OsStr::new("-strict"),
            OsStr::new("experimental"),
            destination.as_os_str(),
        ],
    )
    .await?;

    tracing::info!("✅ Process was finished, file: {}", destination.display());
    Ok(())
}

/// Duration of a media file in seconds
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let stdout = run_tool(
        "ffprobe",
        [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            path.as_os_str(),
        ],
    )
    .await?;

    let info: serde_json::Value = serde_json::from_slice(&stdout)?;
    parse_probe_duration(&info)
        .with_context(|| format!("ffprobe reported no duration for {}", path.display()))
}

fn parse_probe_duration(info: &serde_json::Value) -> Option<f64> {
    let duration = &info["format"]["duration"];
    duration
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| duration.as_f64())
}

/// Number of slices of `slice_minutes` needed to cover `duration_secs`, counted in whole minutes
pub fn slice_count(duration_secs: f64, slice_minutes: u64) -> u64 {
    let minutes = (duration_secs / 60.0).ceil() as u64;
    minutes.div_ceil(slice_minutes.max(1))
}

/// Cut `[start, start + length)` out of an mp3
pub async fn cut_slice(input: &Path, start_secs: u64, length_secs: u64, output: &Path) -> Result<()> {
    let start = start_secs.to_string();
    let length = length_secs.to_string();

    run_tool(
        "ffmpeg",
        [
            OsStr::new("-y"),
            OsStr::new("-ss"),
            OsStr::new(&start),
            OsStr::new("-t"),
            OsStr::new(&length),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-codec:a"),
            OsStr::new("libmp3lame"),
            OsStr::new("-b:a"),
            OsStr::new(MP3_BITRATE),
            output.as_os_str(),
        ],
    )
    .await?;

    Ok(())
}
