use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use engine::cuesheet::CueSheet;
use engine::select::ClipMap;

const VIDEO_EXTS: [&str; 3] = ["mp4", "mov", "mkv"];

const STOP_WORDS: [&str; 18] = [
    "the", "and", "of", "in", "to", "at", "on", "with", "for", "a", "an", "his", "her", "their",
    "he", "she", "it", "they",
];

pub fn load(path: &Path) -> Result<ClipMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("clip map not found at {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("malformed clip map at {}", path.display()))
}

/// Tokens worth matching: lowercase alphabetic runs longer than two
/// characters, minus filler words.
fn scene_keywords(cue: &CueSheet) -> BTreeSet<String> {
    let text = cue
        .keyframes
        .iter()
        .map(|kf| kf.scene.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Tokenized footage stems in file-name order, so regeneration over an
/// unchanged folder is stable.
fn footage_tokens(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut tokens = Vec::new();
    if !dir.exists() {
        return Ok(tokens);
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_video {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s.to_lowercase(),
            None => continue,
        };
        for t in stem.split(|c: char| c == '_' || c == '-' || c.is_whitespace()) {
            if t.len() > 2 && !t.chars().all(|c| c.is_ascii_digit()) {
                tokens.push((t.to_string(), path.clone()));
            }
        }
    }
    Ok(tokens)
}

/// Build a map of scene keywords that actually have matching footage,
/// with a `default` entry whenever any footage exists.
pub fn generate(cue: &CueSheet, footage_dir: &Path) -> Result<ClipMap> {
    let keywords = scene_keywords(cue);
    let tokens = footage_tokens(footage_dir)?;

    let mut map = ClipMap::default();
    for word in &keywords {
        if let Some((_, path)) = tokens.iter().find(|(t, _)| t.contains(word.as_str())) {
            map.insert(word.clone(), path.to_string_lossy().into_owned());
        }
    }
    if !map.0.contains_key("default") {
        if let Some((_, path)) = tokens.first() {
            map.insert("default", path.to_string_lossy().into_owned());
        }
    }
    Ok(map)
}
