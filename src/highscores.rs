//! Persist the high score to disk (XDG config or ~/.config/shatterblocks).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const FILENAME: &str = "highscore";

/// Default location: config dir / shatterblocks / highscore.
pub fn default_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("shatterblocks").join(FILENAME)
}

/// Stored best score; 0 when the file is missing or unreadable.
pub fn load_high_score(path: &Path) -> u32 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.lines().next().and_then(|l| l.trim().parse().ok()))
        .unwrap_or(0)
}

/// Write the best score, creating the parent directory if needed.
pub fn save_high_score(path: &Path, score: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    fs::write(path, format!("{score}\n"))
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
