//! Local receipt storage.
//!
//! Receipt bytes live on disk under `<uploads_dir>/<expense_id>/`; the
//! ledger only holds `{filename, url}` references. Files are served back
//! through the `/uploads` static mount.

use std::path::{Path, PathBuf};

use chrono::Utc;

/// A stored receipt file.
#[derive(Debug, Clone)]
pub struct StoredReceipt {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptStorage {
    uploads_dir: PathBuf,
}

impl ReceiptStorage {
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self { uploads_dir }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Persist receipt bytes for an expense. Stored names are prefixed with
    /// a timestamp so repeated uploads of the same file never collide.
    pub async fn save(
        &self,
        expense_id: i32,
        filename: &str,
        bytes: &[u8],
    ) -> std::io::Result<StoredReceipt> {
        let safe_name = sanitize_filename(filename);
        let stored_name = format!("{}_{}", Utc::now().timestamp(), safe_name);

        let folder = self.uploads_dir.join(expense_id.to_string());
        tokio::fs::create_dir_all(&folder).await?;
        tokio::fs::write(folder.join(&stored_name), bytes).await?;

        let url = format!("/uploads/{expense_id}/{stored_name}");
        Ok(StoredReceipt {
            filename: stored_name,
            url,
        })
    }

    /// Read back a stored receipt, e.g. to forward it upstream.
    pub async fn read(&self, expense_id: i32, filename: &str) -> std::io::Result<Vec<u8>> {
        let path = self
            .uploads_dir
            .join(expense_id.to_string())
            .join(sanitize_filename(filename));
        tokio::fs::read(path).await
    }
}

/// Keep stored names to a single path segment.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "receipt".to_string()
    } else {
        cleaned
    }
}

/// Guess a MIME type from the file extension for the upstream upload.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ReceiptStorage::new(dir.path().to_path_buf());

        let stored = storage.save(42, "lunch.pdf", b"receipt bytes").await.unwrap();
        assert!(stored.filename.ends_with("_lunch.pdf"));
        assert_eq!(stored.url, format!("/uploads/42/{}", stored.filename));

        let bytes = storage.read(42, &stored.filename).await.unwrap();
        assert_eq!(bytes, b"receipt bytes");
    }

    #[tokio::test]
    async fn filenames_cannot_escape_the_expense_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ReceiptStorage::new(dir.path().to_path_buf());

        let stored = storage.save(7, "../../etc/passwd", b"x").await.unwrap();
        assert!(!stored.filename.contains('/'));
        assert!(dir.path().join("7").join(&stored.filename).exists());
    }

    #[test]
    fn content_types_cover_common_receipts() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("scan.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("photo.png"), "image/png");
        assert_eq!(content_type_for("data.bin"), "application/octet-stream");
    }
}
