use std::path::Path;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use engine::plan;

use crate::media::ffmpeg;
use crate::tools::ToolContext;
use crate::{beats, clipmap};

/// Run the full beat-cut pipeline once: plan, cut each segment, write
/// the concat manifest, concatenate.
pub async fn run_autocut(ctx: &ToolContext) -> Result<String> {
    let cue = ctx.store.load()?;
    let clips = clipmap::load(&ctx.clip_map_path)?;
    let beat_times = beats::load_beat_times(&ctx.beats_path)?;
    info!(
        "planning {} blocks over {} beats",
        cue.keyframes.len(),
        beat_times.len()
    );

    let mut rng: StdRng = match ctx.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let render_plan = plan::build_plan(&cue, &beat_times, &clips, &mut rng)?;

    for block in &render_plan.blocks {
        let scene: String = block.scene.chars().take(40).collect();
        info!("[{}] {}... -> {}", block.block, scene, basename(&block.source));
    }

    tokio::fs::create_dir_all(&ctx.segments_dir).await?;

    let mut rendered = Vec::new();
    for (n, seg) in render_plan.segments.iter().enumerate() {
        let name = format!("{:03}_{}.mp4", n, seg.effect.label());
        let dest = ctx.segments_dir.join(&name);
        match ffmpeg::cut_segment(
            &seg.source,
            seg.start,
            seg.end,
            &dest,
            seg.effect.reverses(),
            seg.effect.flashes(),
        )
        .await
        {
            Ok(()) => rendered.push(name),
            // A bad cut costs one segment, not the whole render.
            Err(e) => warn!("segment {n} dropped: {e:#}"),
        }
    }

    if rendered.is_empty() {
        return Ok(format!(
            "Planned {} segments but rendered none; nothing to concatenate.",
            render_plan.segments.len()
        ));
    }

    let list_path = ctx.segments_dir.join("list.txt");
    let mut listing = String::new();
    for name in &rendered {
        listing.push_str(&format!("file '{name}'\n"));
    }
    tokio::fs::write(&list_path, listing).await?;

    ffmpeg::concat_segments(&list_path, &ctx.output_path).await?;
    Ok(format!(
        "Rendered {} of {} segments -> {}",
        rendered.len(),
        render_plan.segments.len(),
        ctx.output_path.display()
    ))
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("footage/night_train.mp4"), "night_train.mp4");
        assert_eq!(basename("plain.mp4"), "plain.mp4");
    }
}
