use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use engine::error::EngineError;
use engine::store::{CueSheetStore, BACKUP_PREFIX};
use engine::sync;

use crate::{beats, clipmap, otio, render};

pub const CUE_SHEET: &str = "insomniax.json";
pub const VERSIONS_DIR: &str = "versions";
pub const CLIP_MAP: &str = "clip_map.json";
pub const BEAT_TIMES: &str = "beat_times.json";
pub const SEGMENTS_DIR: &str = "segments";
pub const OUT_VIDEO: &str = "autocut.mp4";
pub const TIMELINE_OUT: &str = "timeline_extended.otio";
pub const FOOTAGE_DIR: &str = "footage";
pub const SOUNDTRACK: &str = "soundtrack_mix.wav";

/// Everything an operation needs: the document store plus the well-known
/// project paths, resolved once at startup.
pub struct ToolContext {
    pub store: CueSheetStore,
    pub clip_map_path: PathBuf,
    pub beats_path: PathBuf,
    pub segments_dir: PathBuf,
    pub output_path: PathBuf,
    pub timeline_path: PathBuf,
    pub footage_dir: PathBuf,
    pub soundtrack_path: PathBuf,
    pub seed: Option<u64>,
}

impl ToolContext {
    pub fn from_env() -> Self {
        let mut ctx = Self::rooted(Path::new("."));
        ctx.seed = std::env::var("AUTOCUT_SEED")
            .ok()
            .and_then(|s| s.parse().ok());
        ctx
    }

    pub fn rooted(root: &Path) -> Self {
        ToolContext {
            store: CueSheetStore::new(root.join(CUE_SHEET), root.join(VERSIONS_DIR)),
            clip_map_path: root.join(CLIP_MAP),
            beats_path: root.join(BEAT_TIMES),
            segments_dir: root.join(SEGMENTS_DIR),
            output_path: root.join(OUT_VIDEO),
            timeline_path: root.join(TIMELINE_OUT),
            footage_dir: root.join(FOOTAGE_DIR),
            soundtrack_path: root.join(SOUNDTRACK),
            seed: None,
        }
    }
}

/// Operations the dispatcher can run. A closed set: unknown names never
/// reach execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    UpdateCueSheet {
        scene_keyword: String,
        field: String,
        new_value: String,
    },
    RenderVideo,
    ListVersions,
    RestoreVersion {
        timestamp: String,
    },
    SyncFromOtio {
        otio_path: Option<String>,
    },
    ExportTimeline,
}

impl ToolCall {
    /// Map a (name, raw JSON arguments) pair coming from the model onto
    /// a typed variant. Failures are plain strings the REPL can echo.
    pub fn parse(name: &str, raw_args: &str) -> std::result::Result<ToolCall, String> {
        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw_args)
                .map_err(|e| format!("malformed arguments for {name}: {e}"))?
        };

        match name {
            "update_cue_sheet" => {
                #[derive(Deserialize)]
                struct Args {
                    scene_keyword: String,
                    field: String,
                    new_value: String,
                }
                let a: Args = serde_json::from_value(args)
                    .map_err(|e| format!("malformed arguments for {name}: {e}"))?;
                Ok(ToolCall::UpdateCueSheet {
                    scene_keyword: a.scene_keyword,
                    field: a.field,
                    new_value: a.new_value,
                })
            }
            "render_video" => Ok(ToolCall::RenderVideo),
            "list_versions" => Ok(ToolCall::ListVersions),
            "restore_version" => {
                #[derive(Deserialize)]
                struct Args {
                    timestamp: String,
                }
                let a: Args = serde_json::from_value(args)
                    .map_err(|e| format!("malformed arguments for {name}: {e}"))?;
                Ok(ToolCall::RestoreVersion {
                    timestamp: a.timestamp,
                })
            }
            "sync_from_otio" => {
                #[derive(Deserialize)]
                struct Args {
                    #[serde(default)]
                    otio_path: Option<String>,
                }
                let a: Args = serde_json::from_value(args)
                    .map_err(|e| format!("malformed arguments for {name}: {e}"))?;
                Ok(ToolCall::SyncFromOtio {
                    otio_path: a.otio_path,
                })
            }
            "export_timeline" => Ok(ToolCall::ExportTimeline),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

/// Run one operation and fold any failure into the returned status
/// string. The interactive session survives every outcome.
pub async fn dispatch(ctx: &ToolContext, name: &str, raw_args: &str) -> String {
    let call = match ToolCall::parse(name, raw_args) {
        Ok(call) => call,
        Err(e) => return format!("Error: {e}"),
    };

    let outcome = match call {
        ToolCall::UpdateCueSheet {
            scene_keyword,
            field,
            new_value,
        } => update_cue_sheet(ctx, &scene_keyword, &field, &new_value),
        ToolCall::RenderVideo => render::run_autocut(ctx).await,
        ToolCall::ListVersions => list_versions(ctx),
        ToolCall::RestoreVersion { timestamp } => restore_version(ctx, &timestamp),
        ToolCall::SyncFromOtio { otio_path } => sync_from_otio(ctx, otio_path.as_deref()),
        ToolCall::ExportTimeline => export_timeline(ctx),
    };

    match outcome {
        Ok(status) => status,
        Err(e) => {
            warn!("operation {name} failed: {e:#}");
            format!("Error executing {name}: {e:#}")
        }
    }
}

/// Set a field on every keyframe whose scene text contains the keyword.
pub fn update_cue_sheet(
    ctx: &ToolContext,
    scene_keyword: &str,
    field: &str,
    new_value: &str,
) -> Result<String> {
    let backup = ctx.store.backup()?;
    let backup_note = match &backup {
        Some(path) => format!("Backed up to {}", path.display()),
        None => "No cue sheet found to back up".to_string(),
    };

    let mut cue = match ctx.store.load() {
        Ok(cue) => cue,
        Err(EngineError::CueSheetMissing(path)) => {
            return Ok(format!(
                "{backup_note}, but {} does not exist.",
                path.display()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let mut edits = 0;
    for kf in &mut cue.keyframes {
        if kf.matches_scene(scene_keyword) {
            kf.set_field(field, Value::String(new_value.to_string()));
            edits += 1;
        }
    }
    ctx.store.save(&cue)?;

    Ok(format!(
        "{backup_note}. Updated '{field}' in {edits} keyframe(s) containing '{scene_keyword}'."
    ))
}

pub fn list_versions(ctx: &ToolContext) -> Result<String> {
    let versions = ctx.store.list_versions()?;
    if versions.is_empty() {
        Ok("No backups found.".to_string())
    } else {
        Ok(versions.join("\n"))
    }
}

pub fn restore_version(ctx: &ToolContext, timestamp: &str) -> Result<String> {
    let prior = ctx.store.restore(timestamp)?;
    let note = match prior {
        Some(path) => format!(" (Previous live file saved as {})", path.display()),
        None => String::new(),
    };
    Ok(format!(
        "Restored {BACKUP_PREFIX}{timestamp}.json -> current cue sheet.{note}"
    ))
}

pub fn sync_from_otio(ctx: &ToolContext, otio_path: Option<&str>) -> Result<String> {
    let path = otio_path
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.timeline_path.clone());
    if !path.exists() {
        return Ok(format!("OTIO file not found at {}", path.display()));
    }

    let clips = otio::read_external_clips(&path)?;
    let report = sync::sync_from_external(&ctx.store, &clips)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let backup_note = match report.backup {
        Some(backup) => format!(" Backup saved as {}", backup.display()),
        None => String::new(),
    };
    Ok(format!(
        "Synced {} scenes from {file_name}.{backup_note}",
        report.synced
    ))
}

pub fn export_timeline(ctx: &ToolContext) -> Result<String> {
    let cue = ctx.store.load()?;
    let clips = sync::build_external_timeline(&cue);

    let beat_times = if ctx.beats_path.exists() {
        beats::load_beat_times(&ctx.beats_path)?
    } else {
        warn!(
            "no beat sidecar at {}; exporting without beat markers",
            ctx.beats_path.display()
        );
        Vec::new()
    };

    otio::write_extended_timeline(&ctx.timeline_path, &clips, &beat_times, &ctx.soundtrack_path)?;
    Ok(format!(
        "Exported extended timeline -> {}",
        ctx.timeline_path.display()
    ))
}

/// Regenerate the clip map from cue-sheet keywords and the footage
/// folder.
pub fn regenerate_clip_map(ctx: &ToolContext) -> Result<String> {
    let cue = ctx.store.load()?;
    let map = clipmap::generate(&cue, &ctx.footage_dir)?;
    std::fs::write(&ctx.clip_map_path, serde_json::to_string_pretty(&map)?)?;
    Ok(format!(
        "Generated {} with {} entries.",
        ctx.clip_map_path.display(),
        map.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::cuesheet::{CueSheet, Keyframe};
    use serde_json::json;

    fn seeded_ctx(dir: &Path) -> ToolContext {
        let ctx = ToolContext::rooted(dir);
        let cue = CueSheet {
            keyframes: vec![
                Keyframe::with_scene("First scene"),
                Keyframe::with_scene("Another scene"),
            ],
        };
        ctx.store.save(&cue).unwrap();
        ctx
    }

    #[test]
    fn parse_rejects_unknown_operations() {
        let err = ToolCall::parse("format_disk", "{}").unwrap_err();
        assert!(err.contains("unknown operation"));
    }

    #[test]
    fn parse_rejects_malformed_arguments() {
        let err = ToolCall::parse("restore_version", "{\"stamp\": 3}").unwrap_err();
        assert!(err.contains("malformed arguments"));
    }

    #[test]
    fn parse_accepts_missing_optional_arguments() {
        assert_eq!(
            ToolCall::parse("sync_from_otio", "").unwrap(),
            ToolCall::SyncFromOtio { otio_path: None }
        );
        assert_eq!(
            ToolCall::parse("render_video", "{}").unwrap(),
            ToolCall::RenderVideo
        );
    }

    #[tokio::test]
    async fn dispatch_recovers_from_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());
        let status = dispatch(&ctx, "no_such_tool", "{}").await;
        assert!(status.starts_with("Error"));
    }

    #[tokio::test]
    async fn dispatch_recovers_from_failing_operations() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());
        // No cue sheet exists, so restore must fail, recovered.
        let status = dispatch(&ctx, "restore_version", "{\"timestamp\": \"x\"}").await;
        assert!(status.starts_with("Error executing restore_version"));
    }

    #[test]
    fn update_edits_matching_keyframes_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded_ctx(dir.path());

        let status = update_cue_sheet(&ctx, "First", "note", "final").unwrap();
        assert!(status.contains("Updated 'note' in 1 keyframe(s) containing 'First'."));

        let cue = ctx.store.load().unwrap();
        assert_eq!(cue.keyframes[0].extra.get("note"), Some(&json!("final")));
        assert!(!cue.keyframes[1].extra.contains_key("note"));

        // The backup captured the pre-edit document.
        let versions = ctx.store.list_versions().unwrap();
        assert_eq!(versions.len(), 1);
        let backed: CueSheet = serde_json::from_str(
            &std::fs::read_to_string(ctx.store.versions_dir().join(&versions[0])).unwrap(),
        )
        .unwrap();
        assert!(!backed.keyframes[0].extra.contains_key("note"));
    }

    #[test]
    fn update_without_cue_sheet_reports_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());
        let status = update_cue_sheet(&ctx, "First", "note", "final").unwrap();
        assert!(status.contains("No cue sheet found to back up"));
        assert!(status.contains("does not exist"));
    }

    #[test]
    fn list_versions_reports_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());
        assert_eq!(list_versions(&ctx).unwrap(), "No backups found.");
    }

    #[test]
    fn sync_reports_missing_timeline_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded_ctx(dir.path());
        let status = sync_from_otio(&ctx, None).unwrap();
        assert!(status.contains("OTIO file not found"));
    }

    #[test]
    fn export_then_sync_round_trips_timings() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded_ctx(dir.path());

        export_timeline(&ctx).unwrap();
        let status = sync_from_otio(&ctx, None).unwrap();
        assert!(status.contains("Synced 2 scenes"));

        let cue = ctx.store.load().unwrap();
        assert_eq!(cue.keyframes[0].otio_start, Some(0.0));
        assert_eq!(cue.keyframes[0].otio_duration, Some(3.0));
        assert_eq!(cue.keyframes[1].otio_start, Some(3.0));
    }
}
