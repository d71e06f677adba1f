//! Uploaded corpora and upload validation
//!
//! A corpus is a plain text (or CSV) file holding one document per line.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Largest accepted upload (10MB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const ACCEPTED_MEDIA_TYPES: [&str; 3] = ["text/plain", "text/csv", "application/csv"];
const ACCEPTED_EXTENSIONS: [&str; 2] = [".txt", ".csv"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File size exceeds 10MB limit. Please upload a smaller file.")]
    TooLarge { size: u64, limit: u64 },

    #[error("Please upload a valid text file (.txt) or CSV file (.csv)")]
    UnsupportedType { name: String },
}

/// Check an upload candidate before reading it.
///
/// Size is checked first, so an oversized file with a bad extension reports
/// the size problem.
pub fn validate_upload(name: &str, media_type: Option<&str>, size: u64) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let type_ok = media_type.is_some_and(|t| ACCEPTED_MEDIA_TYPES.contains(&t));
    let lower = name.to_lowercase();
    let extension_ok = ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

    if !type_ok && !extension_ok {
        return Err(UploadError::UnsupportedType {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Identity of a corpus used for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_count: usize,
    /// Lowercase hex SHA-256 of the raw bytes
    pub digest: String,
}

/// A corpus file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, media_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type,
            bytes,
        }
    }

    /// Build a `text/plain` document from a string
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            Some("text/plain".to_string()),
            text.into().into_bytes(),
        )
    }

    /// Validate an upload and wrap it
    pub fn from_upload(
        name: &str,
        media_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        validate_upload(name, media_type, bytes.len() as u64)?;
        Ok(Self::new(name, media_type.map(str::to_string), bytes))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Number of non-blank lines
    pub fn document_count(&self) -> usize {
        self.text()
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .count()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn fingerprint(&self) -> DocumentFingerprint {
        DocumentFingerprint {
            document_count: self.document_count(),
            digest: hex::encode(Sha256::digest(&self.bytes)),
        }
    }

    /// Media type sent with multipart uploads
    pub fn media_type_or_default(&self) -> &str {
        self.media_type.as_deref().unwrap_or("text/plain")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_count_skips_blank_lines() {
        let doc = Document::from_text("a.txt", "one\n\n  \ntwo\nthree\n");
        assert_eq!(doc.document_count(), 3);
    }

    #[test]
    fn test_document_count_handles_crlf() {
        let doc = Document::from_text("a.txt", "one\r\n\r\ntwo\r\n");
        assert_eq!(doc.document_count(), 2);
    }

    #[test]
    fn test_fingerprint_distinguishes_equal_line_counts() {
        let a = Document::from_text("a.txt", "alpha\nbeta\n");
        let b = Document::from_text("b.txt", "gamma\ndelta\n");
        assert_eq!(a.document_count(), b.document_count());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_stable_for_same_bytes() {
        let a = Document::from_text("a.txt", "alpha\nbeta\n");
        let b = Document::from_text("renamed.txt", "alpha\nbeta\n");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().digest.len(), 64);
    }

    #[test]
    fn test_validate_accepts_by_type_or_extension() {
        assert!(validate_upload("notes", Some("text/plain"), 10).is_ok());
        assert!(validate_upload("data.CSV", None, 10).is_ok());
        assert!(validate_upload("data.bin", Some("application/csv"), 10).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let err = validate_upload("report.pdf", Some("application/pdf"), 10).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType { .. }));
        assert_eq!(
            err.to_string(),
            "Please upload a valid text file (.txt) or CSV file (.csv)"
        );
    }

    #[test]
    fn test_validate_checks_size_first() {
        let err = validate_upload("huge.pdf", None, MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
    }

    #[test]
    fn test_validate_accepts_exact_limit() {
        assert!(validate_upload("a.txt", None, MAX_UPLOAD_BYTES).is_ok());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn document_count_matches_nonblank_lines(
                lines in proptest::collection::vec("[a-z ]{0,12}", 0..40)
            ) {
                let expected = lines.iter().filter(|l| !l.trim().is_empty()).count();
                let doc = Document::from_text("p.txt", lines.join("\n"));
                prop_assert_eq!(doc.document_count(), expected);
            }

            #[test]
            fn oversized_uploads_always_rejected(extra in 1u64..1_000_000) {
                let err = validate_upload("a.txt", Some("text/plain"), MAX_UPLOAD_BYTES + extra);
                let is_too_large = matches!(err, Err(UploadError::TooLarge { .. }));
                prop_assert!(is_too_large);
            }
        }
    }
}
