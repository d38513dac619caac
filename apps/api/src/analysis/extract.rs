use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type '{0}'; upload a .pdf, .txt or .md file")]
    UnsupportedType(String),

    #[error("File is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("No text could be extracted from the file")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    PlainText,
}

impl FileKind {
    /// Decided by extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "txt" | "md" => Ok(FileKind::PlainText),
            "" => Err(ExtractError::UnsupportedType(filename.to_string())),
            other => Err(ExtractError::UnsupportedType(format!(".{other}"))),
        }
    }
}

/// Turns an uploaded file into resume text. PDF parsing runs on the blocking pool; a panic
/// inside the parser surfaces as [`ExtractError::Pdf`].
pub async fn extract_text(filename: &str, data: Bytes) -> Result<String, ExtractError> {
    let text = match FileKind::from_filename(filename)? {
        FileKind::PlainText => {
            String::from_utf8(data.to_vec()).map_err(|_| ExtractError::InvalidUtf8)?
        }
        FileKind::Pdf => tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| ExtractError::Pdf(e.to_string()))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?,
    };

    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}
