use std::path::{Path, PathBuf};

use ab_glyph::FontVec;

use crate::shared::constants::FONT_CANDIDATES;

/// User-supplied candidates first, then the platform defaults.
pub fn font_candidates(extra: &[PathBuf]) -> Vec<PathBuf> {
    extra
        .iter()
        .cloned()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
        .collect()
}

/// Loads the first readable TrueType font among `candidates`.
///
/// Returns `None` (after a single warning) when none can be used; callers
/// then draw shapes without captions.
pub fn load_font(candidates: &[PathBuf]) -> Option<FontVec> {
    for path in candidates {
        if let Some(font) = try_load(path) {
            log::info!("Using font {}", path.display());
            return Some(font);
        }
    }
    log::warn!(
        "No usable font among {} candidate(s); annotation text will be skipped",
        candidates.len()
    );
    None
}

fn try_load(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            log::debug!("Skipping font {}: {e}", path.display());
            None
        }
    }
}
