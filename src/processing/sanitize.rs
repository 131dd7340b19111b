//! Filename normalization for uploads and lookups.

use super::types::ProcessingError;

/// Required suffix for uploads.
pub const PDF_SUFFIX: &str = ".pdf";

/// Reduce an uploaded filename to a safe, flat name ending in `.pdf`.
///
/// Path separators and whitespace runs become `_`, characters outside ASCII letters, digits,
/// `.`, `-` and `_` are dropped, and leading or trailing dots and underscores are trimmed.
pub fn sanitize_filename(raw: &str) -> Result<String, ProcessingError> {
    let flattened = raw.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        return Err(ProcessingError::InvalidFilename(raw.to_string()));
    }
    if !trimmed.ends_with(PDF_SUFFIX) || trimmed.len() == PDF_SUFFIX.len() {
        return Err(ProcessingError::NotPdf);
    }
    Ok(trimmed.to_string())
}

/// Reject lookup names that could escape the storage prefix or index root.
pub fn ensure_plain_filename(name: &str) -> Result<&str, ProcessingError> {
    let unsafe_name = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if unsafe_name {
        return Err(ProcessingError::InvalidFilename(name.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_conventional_names() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("Q3-2024_v2.pdf").unwrap(), "Q3-2024_v2.pdf");
    }

    #[test]
    fn flattens_paths_and_whitespace() {
        assert_eq!(
            sanitize_filename("../../etc/annual report.pdf").unwrap(),
            "etc_annual_report.pdf"
        );
        assert_eq!(sanitize_filename("  my   file.pdf ").unwrap(), "my_file.pdf");
        assert_eq!(sanitize_filename("résumé.pdf").unwrap(), "rsum.pdf");
    }

    #[test]
    fn rejects_non_pdf_and_empty_names() {
        assert!(matches!(sanitize_filename("notes.txt"), Err(ProcessingError::NotPdf)));
        assert!(matches!(sanitize_filename(".pdf"), Err(ProcessingError::NotPdf)));
        assert!(matches!(
            sanitize_filename("../"),
            Err(ProcessingError::InvalidFilename(_))
        ));
    }

    #[test]
    fn lookups_reject_traversal() {
        assert!(ensure_plain_filename("report.pdf").is_ok());
        assert!(ensure_plain_filename("../secret").is_err());
        assert!(ensure_plain_filename("a/b.pdf").is_err());
        assert!(ensure_plain_filename("").is_err());
    }
}
