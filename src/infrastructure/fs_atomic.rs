use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Atomic rewrite discipline used by every JSON store and by direct-transfer
/// payload promotion: write a sibling `.tmp`, then rename over the live
/// file, so readers observe either the old or the new contents, never a
/// torn one. Adapted from the teacher's synchronous-durability helper; here
/// we skip directory fsync (not exposed portably by `tokio::fs`) and rely
/// on rename atomicity alone, which is sufficient for the single-process
/// writer model spec.md assumes.
pub async fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).await?;

    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("chfs"),
        uuid::Uuid::new_v4()
    ));

    {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await?;
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

/// Reads and deserializes a JSON store file, falling back to `default()`
/// when the file is missing or fails to parse (spec.md §7: "metadata JSON
/// parse errors -> log, fall back to empty store").
pub async fn read_json_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "store file failed to parse, using empty default");
            T::default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store file unreadable, using empty default");
            T::default()
        }
    }
}

pub async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(std::io::Error::other)?;
    atomic_write(path, &bytes).await
}
