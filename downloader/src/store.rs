/// Content-addressed asset storage.
///
/// Files are named `<md5-hex>.<ext>`, so identical bodies always land on the
/// same file and are written at most once.
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Deterministic location for a body with the given content type.
    pub fn path_for(&self, body: &[u8], content_type: &str) -> PathBuf {
        let digest = hex::encode(Md5::digest(body));
        self.root
            .join(format!("{}.{}", digest, extension_for(content_type)))
    }

    /// Persist the body unless identical content is already stored.
    pub async fn store(&self, body: &[u8], content_type: &str) -> std::io::Result<PathBuf> {
        let path = self.path_for(body, content_type);
        if is_stored(&path).await {
            debug!("Already stored: {}", path.display());
            return Ok(path);
        }

        // Unique temp name per writer; racing writers of the same bytes
        // each rename a complete file into place.
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{:08x}.part", rand::random::<u32>()));
        let tmp = PathBuf::from(tmp);

        if let Err(e) = write_then_rename(&tmp, &path, body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(path)
    }
}

async fn is_stored(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn write_then_rename(tmp: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(tmp, body).await?;
    tokio::fs::rename(tmp, path).await
}

/// File extension from a content type: the subtype between the first and
/// second `/`, without parameters. Anything unusable as a flat file name
/// becomes `bin`.
pub fn extension_for(content_type: &str) -> &str {
    let essence = content_type.split(';').next().unwrap_or(content_type);
    let subtype = essence.split('/').nth(1).map(str::trim).unwrap_or("");

    let hostile = subtype.is_empty()
        || subtype.starts_with('.')
        || subtype.contains(['\\', '\0']);
    if hostile {
        "bin"
    } else {
        subtype
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("video/mp4"), "mp4");
        assert_eq!(extension_for("image/jpeg; quality=high"), "jpeg");
        assert_eq!(extension_for("image/svg+xml"), "svg+xml");
        assert_eq!(extension_for("image"), "bin");
        assert_eq!(extension_for("image/svg+xml/extra"), "svg+xml");
        assert_eq!(extension_for("image//png"), "bin");
        assert_eq!(extension_for("image/.hidden"), "bin");
        assert_eq!(extension_for("image/a\\b"), "bin");
        assert_eq!(extension_for("image/png\0"), "bin");
    }

    #[test]
    fn test_empty_body_name() {
        let store = ContentStore::new("images");
        assert_eq!(
            store.path_for(b"", "image/png"),
            PathBuf::from("images/d41d8cd98f00b204e9800998ecf8427e.png")
        );
    }

    #[tokio::test]
    async fn test_identical_bodies_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let first = store.store(b"same bytes", "image/gif").await.unwrap();
        let second = store.store(b"same bytes", "image/gif").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"same bytes");

        let other = store.store(b"other bytes", "image/gif").await.unwrap();
        assert_ne!(first, other);

        // No temp files left behind
        let names = names_in(dir.path()).await;
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".gif")));
    }

    async fn names_in(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names
    }

    #[tokio::test]
    async fn test_extra_slashes_stay_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let path = store.store(b"svg", "image/svg+xml/extra").await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.to_string_lossy().ends_with(".svg+xml"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"svg");
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        // A non-empty directory where the file should go makes the rename fail
        let target = store.path_for(b"blocked", "image/png");
        tokio::fs::create_dir(&target).await.unwrap();
        tokio::fs::write(target.join("occupant"), b"x").await.unwrap();

        assert!(store.store(b"blocked", "image/png").await.is_err());

        let names = names_in(dir.path()).await;
        assert_eq!(names.len(), 1);
        assert!(names.iter().all(|n| !n.ends_with(".part")));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("missing"));

        assert!(store.store(b"bytes", "image/png").await.is_err());
        assert!(names_in(dir.path()).await.is_empty());
    }
}
