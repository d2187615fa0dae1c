use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

/// Cut `[start, end)` seconds out of `src` into `dest`, applying the
/// requested effect filters. Video only, fast encode; the caller decides
/// what a failure means.
pub async fn cut_segment(
    src: &str,
    start: f64,
    end: f64,
    dest: &Path,
    reverse: bool,
    flash: bool,
) -> Result<()> {
    let mut filters: Vec<&str> = Vec::new();
    if reverse {
        filters.push("reverse");
    }
    if flash {
        filters.push("fade=out:st=0:d=0.03:alpha=1,fade=in:st=0.03:d=0.03:alpha=1");
    }
    let vf = if filters.is_empty() {
        "null".to_string()
    } else {
        filters.join(",")
    };

    let args = [
        "-y".to_string(),
        "-nostdin".to_string(),
        "-ss".to_string(),
        format!("{start:.3}"),
        "-to".to_string(),
        format!("{end:.3}"),
        "-i".to_string(),
        src.to_string(),
        "-vf".to_string(),
        vf,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        "20".to_string(),
        "-an".to_string(),
        dest.to_string_lossy().into_owned(),
    ];

    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .await
        .context("Failed to execute ffmpeg. Make sure FFmpeg is installed.")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "ffmpeg cut failed: {}",
            stderr.lines().last().unwrap_or("no diagnostics")
        );
    }
    Ok(())
}

/// Concatenate rendered segments with the concat demuxer, stream copy.
/// The list file holds one `file '<name>'` line per segment in manifest
/// order, resolved relative to its own directory.
pub async fn concat_segments(list_path: &Path, out: &Path) -> Result<()> {
    let args = [
        "-y".to_string(),
        "-nostdin".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        out.to_string_lossy().into_owned(),
    ];

    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .await
        .context("Failed to execute ffmpeg. Make sure FFmpeg is installed.")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "ffmpeg concat failed: {}",
            stderr.lines().last().unwrap_or("no diagnostics")
        );
    }
    Ok(())
}
