use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::DynamicImage;
use tokio::fs;
use tracing::warn;

/// Reduce a client-supplied filename to a safe alphanumeric PNG name.
/// The last extension is stripped and every character outside
/// `[A-Za-z0-9_-]` is dropped.
pub fn sanitize_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    format!("{cleaned}.png")
}

/// Annotated-image name for one abnormal detection; the timestamp keeps
/// successive uploads from colliding.
pub fn localized_filename(safe_name: &str, timestamp: u64) -> String {
    format!("{safe_name}_{timestamp}_localized.png")
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persist the decoded upload as a PNG, overwriting any previous upload with
/// the same sanitized name.
pub async fn persist_upload(
    dir: &Path,
    safe_name: &str,
    image: DynamicImage,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(safe_name);

    let saved_path = path.clone();
    tokio::task::spawn_blocking(move || image.save(&saved_path)).await??;

    Ok(path)
}

/// Best-effort purge of previously persisted annotated images. Failures are
/// logged and ignored; a concurrent upload may be writing to the same
/// directory.
pub async fn purge_localized(dir: &Path) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with("_localized.png") {
            continue;
        }
        if let Err(err) = fs::remove_file(entry.path()).await {
            warn!("Failed to remove stale localized image {name}: {err}");
        }
    }
}

fn is_image_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// List image filenames in the localized-image directory, newest first.
pub async fn list_localized_images(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files: Vec<(String, SystemTime)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_image_name(name) {
            continue;
        }
        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        files.push((name.to_string(), modified));
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(files.into_iter().map(|(name, _)| name).collect())
}
