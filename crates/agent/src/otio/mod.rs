//! OpenTimelineIO-style JSON interchange.
//!
//! Reads and writes the subset of the `.otio` document this tool swaps
//! with an NLE: a stack of tracks, clips with source ranges, metadata
//! and markers, plus timeline-level markers. Reading is tolerant of
//! children it does not understand (gaps, transitions, nested stacks).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use engine::sync::{ExternalClip, TimelineMarker};

/// Frame rate of the FPS-normalized unit scale used on the wire.
pub const FPS: f64 = 24.0;

#[derive(Debug, Clone, Deserialize)]
struct RationalTimeDoc {
    rate: f64,
    value: f64,
}

impl RationalTimeDoc {
    fn to_seconds(&self) -> f64 {
        if self.rate == 0.0 {
            0.0
        } else {
            self.value / self.rate
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TimeRangeDoc {
    start_time: RationalTimeDoc,
    duration: RationalTimeDoc,
}

#[derive(Debug, Clone, Deserialize)]
struct MarkerDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    color: String,
    marked_range: TimeRangeDoc,
}

#[derive(Debug, Clone, Deserialize)]
struct ClipDoc {
    #[serde(default)]
    name: String,
    source_range: Option<TimeRangeDoc>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
    #[serde(default)]
    markers: Vec<MarkerDoc>,
}

#[derive(Debug, Deserialize)]
struct TrackDoc {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    children: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StackDoc {
    #[serde(default)]
    children: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TimelineDoc {
    tracks: StackDoc,
}

fn schema_name(value: &Value) -> &str {
    value
        .get("OTIO_SCHEMA")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Parse an interchange document into the ordered clip sequence of its
/// video tracks. Clips without a source range are skipped.
pub fn read_external_clips(path: &Path) -> Result<Vec<ExternalClip>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("timeline file not found at {}", path.display()))?;
    let doc: TimelineDoc = serde_json::from_str(&raw)
        .with_context(|| format!("malformed timeline document at {}", path.display()))?;

    let mut clips = Vec::new();
    for track_value in &doc.tracks.children {
        if !schema_name(track_value).starts_with("Track") {
            continue;
        }
        let track: TrackDoc = serde_json::from_value(track_value.clone())
            .with_context(|| format!("malformed track in {}", path.display()))?;
        if track.kind != "Video" {
            continue;
        }
        for child in &track.children {
            if !schema_name(child).starts_with("Clip") {
                continue;
            }
            let clip: ClipDoc = serde_json::from_value(child.clone())
                .with_context(|| format!("malformed clip in {}", path.display()))?;
            let Some(range) = clip.source_range else {
                continue;
            };

            let metadata = clip
                .metadata
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            let markers = clip
                .markers
                .iter()
                .map(|m| TimelineMarker {
                    name: m.name.clone(),
                    color: m.color.clone(),
                    start_sec: m.marked_range.start_time.to_seconds(),
                    duration_frames: m.marked_range.duration.value.round() as u32,
                })
                .collect();

            clips.push(ExternalClip {
                name: clip.name,
                source_start: range.start_time.to_seconds(),
                source_duration: range.duration.to_seconds(),
                metadata,
                markers,
            });
        }
    }
    Ok(clips)
}

fn rational_time(frames: f64) -> Value {
    json!({ "OTIO_SCHEMA": "RationalTime.1", "rate": FPS, "value": frames })
}

fn time_range(start_frames: f64, duration_frames: f64) -> Value {
    json!({
        "OTIO_SCHEMA": "TimeRange.1",
        "start_time": rational_time(start_frames),
        "duration": rational_time(duration_frames),
    })
}

fn marker(name: &str, color: &str, start_frames: f64, duration_frames: f64) -> Value {
    json!({
        "OTIO_SCHEMA": "Marker.2",
        "name": name,
        "color": color,
        "marked_range": time_range(start_frames, duration_frames),
        "metadata": {},
    })
}

fn audio_clip(soundtrack: &Path, seconds: f64) -> Value {
    json!({
        "OTIO_SCHEMA": "Clip.2",
        "name": "Soundtrack Mix",
        "source_range": time_range(0.0, seconds * FPS),
        "media_reference": {
            "OTIO_SCHEMA": "ExternalReference.1",
            "target_url": format!("file://{}", soundtrack.display()),
            "available_range": time_range(0.0, seconds * FPS),
        },
        "metadata": {},
        "markers": [],
    })
}

/// Write the extended timeline: one video track built from the clip
/// sequence, one audio track holding the full-length soundtrack, and a
/// timeline-level marker per beat inside the covered range.
pub fn write_extended_timeline(
    path: &Path,
    clips: &[ExternalClip],
    beat_times: &[f64],
    soundtrack: &Path,
) -> Result<()> {
    let mut children = Vec::with_capacity(clips.len());
    let mut timeline_end = 0.0f64;

    for (i, clip) in clips.iter().enumerate() {
        timeline_end = timeline_end.max(clip.source_start + clip.source_duration);
        let media_path = format!("segments/scene_{i:02}.mp4");
        let markers: Vec<Value> = clip
            .markers
            .iter()
            .map(|m| {
                marker(
                    &m.name,
                    &m.color,
                    m.start_sec * FPS,
                    m.duration_frames as f64,
                )
            })
            .collect();

        children.push(json!({
            "OTIO_SCHEMA": "Clip.2",
            "name": clip.name,
            "source_range": time_range(clip.source_start * FPS, clip.source_duration * FPS),
            "media_reference": {
                "OTIO_SCHEMA": "ExternalReference.1",
                "target_url": format!("file://{media_path}"),
                "available_range": time_range(0.0, clip.source_duration * FPS),
            },
            "metadata": clip.metadata,
            "markers": markers,
        }));
    }

    // Beat markers are YELLOW so editors can tell the grid from the
    // RED/BLUE zone hints at a glance.
    let beat_markers: Vec<Value> = beat_times
        .iter()
        .take_while(|&&bt| bt <= timeline_end)
        .map(|&bt| marker("Beat", "YELLOW", bt * FPS, 1.0))
        .collect();

    let timeline = json!({
        "OTIO_SCHEMA": "Timeline.1",
        "name": "Insomniax Extended Timeline",
        "tracks": {
            "OTIO_SCHEMA": "Stack.1",
            "name": "tracks",
            "children": [
                {
                    "OTIO_SCHEMA": "Track.1",
                    "name": "Video Track",
                    "kind": "Video",
                    "children": children,
                },
                {
                    "OTIO_SCHEMA": "Track.1",
                    "name": "Audio Track",
                    "kind": "Audio",
                    "children": [audio_clip(soundtrack, timeline_end)],
                },
            ],
        },
        "markers": beat_markers,
        "metadata": {},
    });

    std::fs::write(path, serde_json::to_string_pretty(&timeline)?)
        .with_context(|| format!("could not write timeline to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::cuesheet::{CueSheet, Keyframe};
    use engine::sync::build_external_timeline;

    fn cue_with_patterns() -> CueSheet {
        let mut second = Keyframe::with_scene("Second scene");
        second.edit_pattern = Some("jumpcut then black".to_string());
        CueSheet {
            keyframes: vec![Keyframe::with_scene("First scene"), second],
        }
    }

    #[test]
    fn written_timeline_reads_back_positionally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline_extended.otio");
        let clips = build_external_timeline(&cue_with_patterns());

        write_extended_timeline(&path, &clips, &[0.0, 1.0, 2.0], Path::new("soundtrack.wav"))
            .unwrap();
        let read = read_external_clips(&path).unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[0].source_start, 0.0);
        assert_eq!(read[0].source_duration, 3.0);
        assert_eq!(read[1].source_start, 3.0);
        assert_eq!(read[0].metadata["scene_text"], "First scene");
        assert_eq!(read[1].metadata["edit_pattern"], "jumpcut then black");

        // The audio track's soundtrack clip must not leak into the
        // positional sequence.
        assert!(read.iter().all(|c| c.name != "Soundtrack Mix"));

        let markers = &read[1].markers;
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].name, "Jumpcut zone");
        assert_eq!(markers[0].start_sec, 3.0);
        assert_eq!(markers[0].duration_frames, 6);
        assert_eq!(markers[1].name, "Black flash");
        assert_eq!(markers[1].start_sec, 4.0);
        assert_eq!(markers[1].duration_frames, 3);
    }

    #[test]
    fn reader_skips_children_it_does_not_understand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.otio");
        let doc = json!({
            "OTIO_SCHEMA": "Timeline.1",
            "tracks": {
                "OTIO_SCHEMA": "Stack.1",
                "children": [{
                    "OTIO_SCHEMA": "Track.1",
                    "kind": "Video",
                    "children": [
                        { "OTIO_SCHEMA": "Gap.1", "name": "slug" },
                        {
                            "OTIO_SCHEMA": "Clip.2",
                            "name": "kept",
                            "source_range": time_range(24.0, 48.0),
                        },
                    ],
                }],
            },
        });
        std::fs::write(&path, doc.to_string()).unwrap();

        let clips = read_external_clips(&path).unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].name, "kept");
        assert_eq!(clips[0].source_start, 1.0);
        assert_eq!(clips[0].source_duration, 2.0);
    }

    #[test]
    fn beat_markers_stop_at_the_timeline_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beats.otio");
        let clips = build_external_timeline(&cue_with_patterns());
        write_extended_timeline(
            &path,
            &clips,
            &[0.0, 3.0, 5.9, 6.1, 9.0],
            Path::new("soundtrack.wav"),
        )
        .unwrap();

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let markers = doc["markers"].as_array().unwrap();
        // Two blocks cover six seconds; 6.1 and 9.0 fall outside.
        assert_eq!(markers.len(), 3);
        assert!(markers.iter().all(|m| m["color"] == "YELLOW"));
    }

    #[test]
    fn malformed_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.otio");
        std::fs::write(&path, "{\"tracks\": 5}").unwrap();
        assert!(read_external_clips(&path).is_err());
    }
}
