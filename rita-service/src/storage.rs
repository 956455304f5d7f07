//! Local blob storage for uploaded files.
//!
//! Stands in for an object storage bucket: files live under
//! `data_dir/files/` and rows in `document_files` hold the relative path.

use std::path::{Path, PathBuf};

use crate::error::{ExtractionError, ServiceResult};

/// Blob store rooted in the service data directory
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create the store, ensuring the backing directory exists
    pub fn new(data_dir: &Path) -> ServiceResult<Self> {
        let root = data_dir.join("files");
        std::fs::create_dir_all(&root).map_err(ExtractionError::Io)?;
        Ok(Self { root })
    }

    /// Save uploaded bytes, returning the storage path to persist on the file row
    pub fn save(&self, file_id: &str, file_name: &str, data: &[u8]) -> ServiceResult<String> {
        let name = sanitize_file_name(file_name);
        let relative = format!("{}_{}", file_id, name);
        std::fs::write(self.root.join(&relative), data).map_err(ExtractionError::Io)?;
        Ok(relative)
    }

    /// Read a stored blob; a miss is a download failure, not an internal error
    pub fn read(&self, storage_path: &str) -> ServiceResult<Vec<u8>> {
        std::fs::read(self.root.join(storage_path)).map_err(|e| {
            ExtractionError::Download {
                path: storage_path.to_string(),
                source: e,
            }
            .into()
        })
    }

    /// Remove a stored blob. Missing files are fine (delete is idempotent).
    pub fn remove(&self, storage_path: &str) -> ServiceResult<()> {
        match std::fs::remove_file(self.root.join(storage_path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExtractionError::Io(e).into()),
        }
    }
}

/// Keep only the final path component and replace separators, so a crafted
/// file name cannot escape the store root
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.is_empty() {
        "file".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let path = store.save("id-1", "report.csv", b"a,b\n1,2").unwrap();
        assert_eq!(store.read(&path).unwrap(), b"a,b\n1,2");
    }

    #[test]
    fn missing_blob_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let err = store.read("nope.txt").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(crate::error::ExtractionError::Download { .. })
        ));
    }

    #[test]
    fn file_names_cannot_escape_the_root() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("c:\\temp\\doc.docx"), "doc.docx");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let path = store.save("id-1", "a.txt", b"x").unwrap();
        store.remove(&path).unwrap();
        store.remove(&path).unwrap();
    }
}
