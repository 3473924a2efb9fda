//! Filesystem primitives used by the tile store.
//!
//! Every function here treats "already in the requested state" as success:
//! ensuring an existing directory, deleting a missing file, or deleting a
//! missing directory are all no-ops. Any other I/O failure is returned to
//! the caller unchanged.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use tokio::fs;

/// Create `path` and any missing parents.
pub async fn ensure_dir(path: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir_all(path.as_ref()).await
}

/// Remove a file if it exists.
pub async fn delete_file(path: impl AsRef<Path>) -> io::Result<()> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove a directory tree if it exists.
///
/// Walks depth-first, unlinking files before removing the directory that
/// contains them. Symlinks are unlinked, never followed.
pub async fn delete_directory(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => remove_tree(path).await,
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn remove_tree(dir: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let child = entry.path();
            if entry.file_type().await?.is_dir() {
                remove_tree(&child).await?;
            } else {
                fs::remove_file(&child).await?;
            }
        }
        fs::remove_dir(dir).await
    })
}

/// Lowercase extension of `filename` without the leading dot.
///
/// Returns an empty string when there is none. Dotfiles such as `.env` have
/// no extension.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
