use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{error::Result, provider::Provider, types::AnalysisSnapshot};

/// Get the cache directory for a given channel handle
pub fn get_cache_dir(handle: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    handle.to_lowercase().hash(&mut hasher);
    let handle_hash = hasher.finish();

    get_root_cache_dir().join(handle_hash.to_string())
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tubescope")
}

/// Get the path for a cached snapshot (provider, language and video limit aware)
pub fn get_snapshot_path(
    cache_dir: &Path,
    provider: &Provider,
    lang: &str,
    video_limit: usize,
) -> PathBuf {
    cache_dir.join(format!(
        "snapshot_{}_{}_{}.json",
        provider.slug(),
        lang,
        video_limit
    ))
}

pub async fn load_snapshot(path: &Path) -> Result<AnalysisSnapshot> {
    let json_content = fs::read_to_string(path).await?;
    let snapshot: AnalysisSnapshot = serde_json::from_str(&json_content)?;
    Ok(snapshot)
}

pub async fn save_snapshot(snapshot: &AnalysisSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let pretty_json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}
