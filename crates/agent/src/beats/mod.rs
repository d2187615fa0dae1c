use std::path::Path;

use anyhow::{Context, Result};

/// Read the beat sidecar: a JSON array of seconds produced by the
/// external audio analyzer. Order is normalized here so the planner can
/// assume ascending times.
pub fn load_beat_times(path: &Path) -> Result<Vec<f64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("beat sidecar not found at {}", path.display()))?;
    let mut times: Vec<f64> = serde_json::from_str(&raw)
        .with_context(|| format!("malformed beat sidecar at {}", path.display()))?;
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(times)
}
