use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use crate::sprint::SprintRecord;

/// Reads sprint records from a JSON array or a JSON Lines file.
///
/// File order is preserved; it decides entry order within a schedule day.
#[tracing::instrument(skip(path), fields(file = %path.display()))]
pub fn load_sprints(path: &Path) -> anyhow::Result<Vec<SprintRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read sprint file {}", path.display()))?;

    let sprints = parse_sprints(&text)
        .with_context(|| format!("failed parsing sprint file {}", path.display()))?;

    info!(count = sprints.len(), "loaded sprints");
    Ok(sprints)
}

pub fn parse_sprints(text: &str) -> anyhow::Result<Vec<SprintRecord>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        debug!("parsing sprints as json array");
        return serde_json::from_str(trimmed).context("invalid sprint array");
    }

    debug!("parsing sprints as json lines");
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sprint: SprintRecord =
            serde_json::from_str(line).with_context(|| format!("invalid sprint on line {}", idx + 1))?;
        out.push(sprint);
    }

    Ok(out)
}
