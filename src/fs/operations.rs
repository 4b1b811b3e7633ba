use std::path::{Path, PathBuf};

use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};

/// Replaces the contents of `path` with `data` so readers observe either the old or the new
/// file, never a partial write. Data is written next to the target, synced, then renamed over it.
pub async fn write_atomically(path: &Path, data: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_path(path);

    let result = async {
        let mut file = File::create(&temporary).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temporary, path).await
    }
    .await;

    if result.is_err() {
        // Leftover is harmless but noisy, so try to remove it.
        let _ = tokio::fs::remove_file(&temporary).await;
    }
    result
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|v| v.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
