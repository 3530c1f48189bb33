//! Filesystem storage for images attached to knowledge records.
//!
//! Layout under the root folder is `<type>/<owner>/<file>`, where `owner` is
//! a record id or [`TEMP_FOLDER`] for uploads that are not yet attached.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Staging folder for uploads made before the owning record exists.
pub const TEMP_FOLDER: &str = "temp";

/// Accepted upload content types.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/png",
    "image/tiff",
    "image/eps",
    "image/svg",
    "image/pdf",
    "image/bmp",
];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid image type: {0}")]
    InvalidContentType(String),

    #[error("Invalid file extension")]
    MissingExtension,

    #[error("Invalid path segment '{0}'")]
    InvalidSegment(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored upload, addressed relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub relative_path: String,
    pub file_name: String,
}

/// Image file contents with the content type inferred from the extension.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Image store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public download URL for a stored image.
    pub fn public_url(&self, image: &StoredImage) -> String {
        format!(
            "{}/api/images/{}",
            self.public_base_url.trim_end_matches('/'),
            image.relative_path
        )
    }

    /// Saves an upload under `<kind>/<owner or temp>/` with a generated name.
    pub async fn save_upload(
        &self,
        kind: &str,
        owner: Option<&str>,
        content_type: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, ImageError> {
        let content_type = content_type.to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ImageError::InvalidContentType(content_type));
        }

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or(ImageError::MissingExtension)?;

        let kind = segment(kind)?;
        let owner = match owner.filter(|o| !o.is_empty()) {
            Some(owner) => segment(owner)?,
            None => TEMP_FOLDER,
        };

        let file_name = format!(
            "{}_{}.{}",
            Utc::now().format("%Y-%m-%d_%H%M%S"),
            Uuid::new_v4(),
            ext
        );
        let dir = self.root.join(kind).join(owner);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        info!(kind, owner, file = %file_name, size = bytes.len(), "Stored image upload");
        Ok(StoredImage {
            relative_path: format!("{}/{}/{}", kind, owner, file_name),
            file_name,
        })
    }

    /// Moves staged uploads from `<kind>/temp/` to `<kind>/<owner>/`.
    pub async fn promote(&self, kind: &str, owner: &str, names: &[String]) -> Result<(), ImageError> {
        let kind = segment(kind)?;
        let owner = segment(owner)?;
        let dest_dir = self.root.join(kind).join(owner);
        tokio::fs::create_dir_all(&dest_dir).await?;

        for name in names {
            let name = segment(name)?;
            let src = self.root.join(kind).join(TEMP_FOLDER).join(name);
            if !tokio::fs::try_exists(&src).await? {
                return Err(ImageError::NotFound(format!("{}/{}/{}", kind, TEMP_FOLDER, name)));
            }
            tokio::fs::copy(&src, dest_dir.join(name)).await?;
            tokio::fs::remove_file(&src).await?;
            debug!(kind, owner, file = name, "Promoted staged image");
        }
        Ok(())
    }

    pub async fn open(&self, kind: &str, owner: &str, name: &str) -> Result<ImageFile, ImageError> {
        let path = self.locate(kind, owner, name).await?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(ImageFile {
            bytes,
            content_type: content_type_for(name),
        })
    }

    /// Removes an image, then its folder when that is left empty.
    pub async fn delete(&self, kind: &str, owner: &str, name: &str) -> Result<(), ImageError> {
        let path = self.locate(kind, owner, name).await?;
        tokio::fs::remove_file(&path).await?;

        if let Some(dir) = path.parent() {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                debug!(dir = %dir.display(), error = %e, "Image folder kept");
            }
        }
        info!(kind, owner, file = name, "Deleted image");
        Ok(())
    }

    async fn locate(&self, kind: &str, owner: &str, name: &str) -> Result<PathBuf, ImageError> {
        let path = self
            .root
            .join(segment(kind)?)
            .join(segment(owner)?)
            .join(segment(name)?);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ImageError::NotFound(format!("{}/{}/{}", kind, owner, name)));
        }
        Ok(path)
    }
}

/// Rejects empty segments and anything that could leave the store root.
fn segment(value: &str) -> Result<&str, ImageError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(ImageError::InvalidSegment(value.to_string()));
    }
    Ok(value)
}

/// Content type served for a stored file, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("svg") => "image/svg+xml",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        Some("eps") => "application/postscript",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ImageStore {
        ImageStore::new(dir.path(), "http://localhost:8085/")
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.SVG"), "image/svg+xml");
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.eps"), "application/postscript");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_segment_rejects_traversal() {
        assert!(segment("..").is_err());
        assert!(segment("a/b").is_err());
        assert!(segment("a\\b").is_err());
        assert!(segment("").is_err());
        assert!(segment("technique").is_ok());
    }

    #[tokio::test]
    async fn test_upload_to_temp_then_promote() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let stored = store
            .save_upload("technique", None, "IMAGE/PNG", "diagram.png", b"png-bytes")
            .await
            .unwrap();
        assert!(stored.relative_path.starts_with("technique/temp/"));
        assert!(stored.file_name.ends_with(".png"));
        assert_eq!(
            store.public_url(&stored),
            format!("http://localhost:8085/api/images/{}", stored.relative_path)
        );

        store
            .promote("technique", "t1566", &[stored.file_name.clone()])
            .await
            .unwrap();

        let file = store
            .open("technique", "t1566", &stored.file_name)
            .await
            .unwrap();
        assert_eq!(file.bytes, b"png-bytes");
        assert_eq!(file.content_type, "image/png");
        assert!(matches!(
            store.open("technique", TEMP_FOLDER, &stored.file_name).await,
            Err(ImageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(matches!(
            store
                .save_upload("technique", None, "text/plain", "a.txt", b"x")
                .await,
            Err(ImageError::InvalidContentType(_))
        ));
        assert!(matches!(
            store
                .save_upload("technique", None, "image/png", "noext", b"x")
                .await,
            Err(ImageError::MissingExtension)
        ));
        assert!(matches!(
            store
                .save_upload("..", Some("id"), "image/png", "a.png", b"x")
                .await,
            Err(ImageError::InvalidSegment(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_empty_folder() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store
            .save_upload("actor", Some("apt29"), "image/jpeg", "a.jpg", b"1")
            .await
            .unwrap();
        let second = store
            .save_upload("actor", Some("apt29"), "image/jpeg", "b.jpg", b"2")
            .await
            .unwrap();

        store.delete("actor", "apt29", &first.file_name).await.unwrap();
        assert!(dir.path().join("actor/apt29").exists());

        store.delete("actor", "apt29", &second.file_name).await.unwrap();
        assert!(!dir.path().join("actor/apt29").exists());

        assert!(matches!(
            store.delete("actor", "apt29", &second.file_name).await,
            Err(ImageError::NotFound(_))
        ));
    }
}
