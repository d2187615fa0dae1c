use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cuesheet::CueSheet;
use crate::error::Result;
use crate::select::{choose_clip, ClipMap};

/// Every keyframe occupies one fixed logical block on the output
/// timeline, laid out back-to-back by keyframe index.
pub const BLOCK_SECONDS: f64 = 3.0;

const EFFECTS: [Effect; 4] = [
    Effect::Keep,
    Effect::Jumpcut,
    Effect::Black,
    Effect::Reverse,
];
const EFFECT_WEIGHTS: [u32; 4] = [3, 4, 1, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Keep,
    Jumpcut,
    Black,
    Reverse,
}

impl Effect {
    pub fn label(self) -> &'static str {
        match self {
            Effect::Keep => "keep",
            Effect::Jumpcut => "jumpcut",
            Effect::Black => "black",
            Effect::Reverse => "reverse",
        }
    }

    pub fn reverses(self) -> bool {
        matches!(self, Effect::Reverse)
    }

    pub fn flashes(self) -> bool {
        matches!(self, Effect::Black)
    }
}

/// One planned render instruction. Segments are produced, handed to the
/// renderer, and discarded; they are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub source: String,
    pub start: f64,
    pub end: f64,
    pub effect: Effect,
}

/// Per-block source resolution, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSource {
    pub block: usize,
    pub scene: String,
    pub source: String,
}

/// The concatenation manifest: segments in emission order, one block
/// after another, one beat pair after another within a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub id: String,
    pub segments: Vec<Segment>,
    pub blocks: Vec<BlockSource>,
}

/// Symmetric trim that pulls a jumpcut off the literal beat anchor so
/// the cut snaps near the beat instead of sitting on it.
pub fn jumpcut_trim(start: f64, end: f64) -> (f64, f64) {
    let trim = ((end - start) / 4.0).clamp(0.05, 0.15);
    (start + trim, end - trim)
}

/// Turn a cue sheet, a beat grid, and a clip map into timed render
/// actions. Deterministic for a fixed rng sequence and fixed inputs.
pub fn build_plan<R: Rng + ?Sized>(
    cue: &CueSheet,
    beat_times: &[f64],
    clips: &ClipMap,
    rng: &mut R,
) -> Result<RenderPlan> {
    let effect_weights =
        WeightedIndex::new(EFFECT_WEIGHTS).expect("static effect weights are valid");
    let mut segments = Vec::new();
    let mut blocks = Vec::with_capacity(cue.keyframes.len());

    for (i, kf) in cue.keyframes.iter().enumerate() {
        let block_start = i as f64 * BLOCK_SECONDS;
        let block_end = block_start + BLOCK_SECONDS;

        let mut block_beats: Vec<f64> = beat_times
            .iter()
            .copied()
            .filter(|b| (block_start..block_end).contains(b))
            .collect();
        if block_beats.is_empty() {
            // Beat-free blocks still contribute one full-length cut.
            block_beats = vec![block_start, block_end];
        }

        let source = choose_clip(&kf.scene, clips, rng)?;
        blocks.push(BlockSource {
            block: i,
            scene: kf.scene.clone(),
            source: source.clone(),
        });

        for pair in block_beats.windows(2) {
            let (mut start, mut end) = (pair[0], pair[1]);
            // The effect is drawn before the degeneracy check so rng
            // consumption tracks the beat sequence exactly.
            let effect = EFFECTS[effect_weights.sample(rng)];
            if end <= start {
                continue;
            }
            if effect == Effect::Jumpcut {
                let (s, e) = jumpcut_trim(start, end);
                start = s;
                end = e;
            }
            segments.push(Segment {
                source: source.clone(),
                start,
                end,
                effect,
            });
        }
    }

    Ok(RenderPlan {
        id: Uuid::new_v4().to_string(),
        segments,
        blocks,
    })
}
