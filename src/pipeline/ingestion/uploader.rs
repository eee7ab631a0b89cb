use std::sync::Arc;

use super::format::{detect_format, sanitize_filename};
use super::UploadError;
use crate::backend::BlobStorage;
use crate::models::{AnalysisType, FileUpload, UploadedArtifact};

/// Checks a user-selected file and hands it to blob storage.
pub struct FileIngestion {
    storage: Arc<dyn BlobStorage>,
    max_upload_bytes: u64,
}

impl FileIngestion {
    pub fn new(storage: Arc<dyn BlobStorage>, max_upload_bytes: u64) -> Self {
        Self {
            storage,
            max_upload_bytes,
        }
    }

    /// Validate, upload, and describe the stored file.
    pub async fn upload(
        &self,
        mut file: FileUpload,
        analysis_type: AnalysisType,
    ) -> Result<UploadedArtifact, UploadError> {
        let size = file.size_bytes();
        if size == 0 {
            return Err(UploadError::EmptyFile);
        }
        if size > self.max_upload_bytes {
            return Err(UploadError::FileTooLarge {
                size_mb: size as f64 / (1024.0 * 1024.0),
                max_mb: self.max_upload_bytes as f64 / (1024.0 * 1024.0),
            });
        }

        let detection = detect_format(&file.file_name, &file.bytes);
        if !detection.category.accepted_for(analysis_type) {
            tracing::info!(
                %analysis_type,
                detected = %detection.mime_type,
                "Rejected upload with unsupported format"
            );
            return Err(UploadError::UnsupportedFormat {
                analysis_type,
                detected: detection.mime_type,
            });
        }

        file.file_name = sanitize_filename(&file.file_name);
        file.content_type = Some(detection.mime_type.clone());

        let remote_ref = self
            .storage
            .upload(&file)
            .await
            .map_err(UploadError::Storage)?;
        if remote_ref.is_empty() {
            return Err(UploadError::MissingReference);
        }

        tracing::debug!(%analysis_type, size_bytes = size, mime = %detection.mime_type, "File uploaded");

        Ok(UploadedArtifact {
            file_name: file.file_name,
            content_type: detection.mime_type,
            size_bytes: size,
            remote_ref,
            analysis_type,
        })
    }
}
