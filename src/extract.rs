//! PDF text extraction.
//!
//! Extraction is page-oriented: each page is extracted on its own and pages
//! that yield no text are dropped without error. Only a byte stream that
//! cannot be parsed as a PDF at all is reported as a failure.

/// Extraction error (the caller decides whether to abort or skip the file).
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract the text of every page, in page order. Blank pages are omitted.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let total = pages.len();
    let kept: Vec<String> = pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .collect();

    if kept.len() < total {
        tracing::debug!(
            skipped = total - kept.len(),
            total,
            "skipped pages without extractable text"
        );
    }

    Ok(kept)
}

/// Extract a PDF into one string: each non-blank page followed by a newline.
pub fn pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = extract_pdf_pages(bytes)?;
    Ok(join_pages(&pages))
}

fn join_pages(pages: &[String]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(page);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_pdf_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
        assert!(err.to_string().starts_with("PDF extraction failed"));
    }

    #[test]
    fn test_pages_joined_with_trailing_newline() {
        let pages = vec!["first".to_string(), "second".to_string()];
        assert_eq!(join_pages(&pages), "first\nsecond\n");
        assert_eq!(join_pages(&[]), "");
    }
}
