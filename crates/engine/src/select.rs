use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Chance of the deliberate wrong insert. The occasional mismatched shot
/// is an intended aesthetic, not a selection bug.
const WRONG_INSERT_CHANCE: f64 = 0.2;

/// Lowercase token -> footage path. A BTreeMap keeps tag iteration stable
/// for a fixed map, which the first-match rule below relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipMap(pub BTreeMap<String, String>);

impl ClipMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, tag: impl Into<String>, path: impl Into<String>) {
        self.0.insert(tag.into(), path.into());
    }

    fn default_entry(&self) -> Option<&String> {
        self.0
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case("default"))
            .map(|(_, path)| path)
    }
}

/// Resolve a scene description to a footage path.
///
/// A tag occurring as a substring of the scene text wins. Otherwise a 20%
/// draw returns a random non-default entry, otherwise the `default`
/// entry, otherwise the first entry as a last resort.
pub fn choose_clip<R: Rng + ?Sized>(
    scene_text: &str,
    clips: &ClipMap,
    rng: &mut R,
) -> Result<String> {
    if clips.is_empty() {
        return Err(EngineError::EmptyClipMap);
    }

    let scene = scene_text.to_lowercase();
    for (tag, path) in &clips.0 {
        if scene.contains(&tag.to_lowercase()) {
            return Ok(path.clone());
        }
    }

    let default_entry = clips.default_entry();

    if rng.gen::<f64>() < WRONG_INSERT_CHANCE {
        let pool: Vec<&String> = clips
            .0
            .iter()
            .filter(|(tag, _)| !tag.eq_ignore_ascii_case("default") || default_entry.is_none())
            .map(|(_, path)| path)
            .collect();
        if pool.is_empty() {
            return default_entry.cloned().ok_or(EngineError::EmptyClipMap);
        }
        return Ok(pool[rng.gen_range(0..pool.len())].clone());
    }

    if let Some(path) = default_entry {
        return Ok(path.clone());
    }

    clips
        .0
        .values()
        .next()
        .cloned()
        .ok_or(EngineError::EmptyClipMap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // StepRng(0, 0) draws 0.0 from gen::<f64>(), forcing the wrong-insert
    // branch; StepRng(u64::MAX, 0) draws ~1.0, skipping it.
    fn noise_rng() -> StepRng {
        StepRng::new(0, 0)
    }

    fn quiet_rng() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn map(entries: &[(&str, &str)]) -> ClipMap {
        let mut m = ClipMap::default();
        for (tag, path) in entries {
            m.insert(*tag, *path);
        }
        m
    }

    #[test]
    fn empty_map_is_an_error() {
        let err = choose_clip("any scene", &ClipMap::default(), &mut quiet_rng());
        assert!(matches!(err, Err(EngineError::EmptyClipMap)));
    }

    #[test]
    fn tag_substring_match_wins() {
        let clips = map(&[("city", "city.mp4"), ("default", "default.mp4")]);
        let chosen = choose_clip("Neon city at night", &clips, &mut quiet_rng()).unwrap();
        assert_eq!(chosen, "city.mp4");
    }

    #[test]
    fn tag_match_ignores_case() {
        let clips = map(&[("corridor", "corridor.mp4")]);
        let chosen = choose_clip("The CORRIDOR hums", &clips, &mut noise_rng()).unwrap();
        assert_eq!(chosen, "corridor.mp4");
    }

    #[test]
    fn falls_back_to_default_when_noise_does_not_fire() {
        let clips = map(&[("default", "default.mp4"), ("other", "other.mp4")]);
        let chosen = choose_clip("no match here", &clips, &mut quiet_rng()).unwrap();
        assert_eq!(chosen, "default.mp4");
    }

    #[test]
    fn wrong_insert_avoids_the_default_entry() {
        let clips = map(&[("default", "default.mp4"), ("other", "other.mp4")]);
        let chosen = choose_clip("no match here", &clips, &mut noise_rng()).unwrap();
        assert_eq!(chosen, "other.mp4");
    }

    #[test]
    fn wrong_insert_with_only_a_default_still_resolves() {
        let clips = map(&[("default", "default.mp4")]);
        let chosen = choose_clip("no match here", &clips, &mut noise_rng()).unwrap();
        assert_eq!(chosen, "default.mp4");
    }

    #[test]
    fn last_resort_is_first_entry() {
        let clips = map(&[("zebra", "zebra.mp4")]);
        let chosen = choose_clip("no match here", &clips, &mut quiet_rng()).unwrap();
        assert_eq!(chosen, "zebra.mp4");
    }

    #[test]
    fn selection_is_reproducible_for_a_fixed_seed() {
        let clips = map(&[
            ("default", "default.mp4"),
            ("rain", "rain.mp4"),
            ("train", "train.mp4"),
        ]);
        let picks = |seed: u64| -> Vec<String> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| choose_clip("unmatched", &clips, &mut rng).unwrap())
                .collect()
        };
        assert_eq!(picks(42), picks(42));
    }
}
