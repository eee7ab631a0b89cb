pub mod format;
pub mod uploader;

pub use format::*;
pub use uploader::FileIngestion;

use thiserror::Error;

use crate::backend::BackendError;
use crate::models::AnalysisType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.0}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    #[error("Unsupported file for {analysis_type}: detected {detected}")]
    UnsupportedFormat {
        analysis_type: AnalysisType,
        detected: String,
    },

    #[error("Upload failed: {0}")]
    Storage(BackendError),

    #[error("Storage returned an empty file reference")]
    MissingReference,
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyFile => "The selected file is empty.".into(),
            Self::FileTooLarge { max_mb, .. } => {
                format!("The selected file is too large (max {max_mb:.0}MB).")
            }
            Self::UnsupportedFormat { analysis_type, .. } => match analysis_type {
                AnalysisType::FundusImage => {
                    "Please select a fundus image (JPG, PNG, TIFF, BMP, GIF, WebP or HEIC).".into()
                }
                AnalysisType::ErgReport => {
                    "Please select an ERG report file (CSV, TXT or JSON).".into()
                }
            },
            Self::Storage(_) | Self::MissingReference => {
                "Failed to upload file. Please try again.".into()
            }
        }
    }
}
