use serde::{Deserialize, Serialize};

use super::enums::AnalysisType;
use super::ids::RemoteRef;

/// A user-selected file, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Detected by ingestion; `None` until the file has been checked.
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
            content_type: None,
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            file_name,
            bytes,
            content_type: None,
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file that blob storage accepted. Only `remote_ref` travels further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub remote_ref: RemoteRef,
    pub analysis_type: AnalysisType,
}
