use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cuesheet::{CueSheet, KeyframeMarker};
use crate::error::Result;
use crate::plan::BLOCK_SECONDS;
use crate::store::CueSheetStore;

/// Metadata key carrying the scene text on the interchange side.
pub const SCENE_TEXT_KEY: &str = "scene_text";

/// Fixed presentation-hint durations, in frames at the interchange rate.
/// These are hints for the editor, not derived from the segment plan;
/// the two are allowed to disagree.
const JUMPCUT_ZONE_FRAMES: u32 = 6;
const BLACK_FLASH_FRAMES: u32 = 3;

/// One clip of the externally owned timeline representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalClip {
    pub name: String,
    pub source_start: f64,
    pub source_duration: f64,
    pub metadata: BTreeMap<String, String>,
    pub markers: Vec<TimelineMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMarker {
    pub name: String,
    pub color: String,
    pub start_sec: f64,
    pub duration_frames: u32,
}

#[derive(Debug)]
pub struct SyncReport {
    pub synced: usize,
    pub backup: Option<PathBuf>,
}

/// Build the clip sequence for export: one block-sized clip per keyframe,
/// metadata keys always present, zone markers derived from the keyframe's
/// edit pattern.
pub fn build_external_timeline(cue: &CueSheet) -> Vec<ExternalClip> {
    cue.keyframes
        .iter()
        .enumerate()
        .map(|(i, kf)| {
            let start = i as f64 * BLOCK_SECONDS;

            let mut metadata = BTreeMap::new();
            metadata.insert(SCENE_TEXT_KEY.to_string(), kf.scene.clone());
            metadata.insert(
                "voiceover".to_string(),
                kf.voiceover.clone().unwrap_or_default(),
            );
            metadata.insert("fx".to_string(), kf.fx.clone().unwrap_or_default());
            metadata.insert(
                "edit_pattern".to_string(),
                kf.edit_pattern.clone().unwrap_or_default(),
            );

            let pattern = kf.edit_pattern.as_deref().unwrap_or("").to_lowercase();
            let mut markers = Vec::new();
            if pattern.contains("jumpcut") {
                markers.push(TimelineMarker {
                    name: "Jumpcut zone".to_string(),
                    color: "RED".to_string(),
                    start_sec: start,
                    duration_frames: JUMPCUT_ZONE_FRAMES,
                });
            }
            if pattern.contains("black") {
                markers.push(TimelineMarker {
                    name: "Black flash".to_string(),
                    color: "BLUE".to_string(),
                    start_sec: start + 1.0,
                    duration_frames: BLACK_FLASH_FRAMES,
                });
            }

            ExternalClip {
                name: format!("Scene {}", i + 1),
                source_start: start,
                source_duration: BLOCK_SECONDS,
                metadata,
                markers,
            }
        })
        .collect()
}

/// Positional merge of external timings into the cue sheet. Pairs are
/// matched by index; the shorter sequence bounds the walk and everything
/// past it is left alone.
pub fn merge_keyframes(cue: &mut CueSheet, clips: &[ExternalClip]) -> usize {
    let mut synced = 0;
    for (kf, clip) in cue.keyframes.iter_mut().zip(clips) {
        kf.otio_start = Some(round_ms(clip.source_start));
        kf.otio_duration = Some(round_ms(clip.source_duration));
        if let Some(scene) = clip.metadata.get(SCENE_TEXT_KEY) {
            kf.scene = scene.clone();
        }
        if !clip.markers.is_empty() {
            kf.otio_markers = Some(
                clip.markers
                    .iter()
                    .map(|m| KeyframeMarker {
                        name: m.name.clone(),
                        color: m.color.clone(),
                        start_sec: round_ms(m.start_sec),
                    })
                    .collect(),
            );
        }
        synced += 1;
    }
    synced
}

/// Import merge against the live document: backup, merge, save.
pub fn sync_from_external(store: &CueSheetStore, clips: &[ExternalClip]) -> Result<SyncReport> {
    let backup = store.backup()?;
    let mut cue = store.load()?;
    let synced = merge_keyframes(&mut cue, clips);
    store.save(&cue)?;
    Ok(SyncReport { synced, backup })
}

fn round_ms(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
