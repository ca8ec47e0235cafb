//! Document assembly.
//!
//! Collects raw text from the three input sources (PDF files, a free-text
//! company description, and up to [`MAX_FAQ_PAIRS`] FAQ pairs) and
//! concatenates them into a single document with literal section markers:
//!
//! ```text
//! <pdf page text>\n<pdf page text>\n...
//! \n---\n**About the company:**\n<company info>\n---\n
//! \n---\n**FAQ section:**\n
//! **Question:** <q>\n**Answer:** <a>\n\n
//! ---\n
//! ```

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::extract;
use crate::models::FaqPair;

/// The FAQ form exposes this many slots.
pub const MAX_FAQ_PAIRS: usize = 5;

pub const COMPANY_HEADER: &str = "**About the company:**";
pub const FAQ_HEADER: &str = "**FAQ section:**";
const SECTION_RULE: &str = "---";

/// An uploaded PDF: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct PdfSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything the user submitted for one processing run.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub pdfs: Vec<PdfSource>,
    pub company_info: String,
    pub faqs: Vec<FaqPair>,
}

impl SourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a PDF from disk and queue it.
    pub fn load_pdf(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.pdfs.push(PdfSource { name, bytes });
        Ok(())
    }

    pub fn with_pdf(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.pdfs.push(PdfSource {
            name: name.into(),
            bytes,
        });
        self
    }

    pub fn with_company_info(mut self, info: impl Into<String>) -> Self {
        self.company_info = info.into();
        self
    }

    pub fn with_faq(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.faqs.push(FaqPair::new(question, answer));
        self
    }

    /// FAQ pairs that survive filtering, in input order.
    pub fn complete_faqs(&self) -> Vec<FaqPair> {
        self.faqs
            .iter()
            .filter(|f| f.is_complete())
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.faqs.len() > MAX_FAQ_PAIRS {
            bail!(
                "At most {} FAQ pairs are allowed, got {}",
                MAX_FAQ_PAIRS,
                self.faqs.len()
            );
        }
        Ok(())
    }
}

/// Extract every PDF and assemble the full document text.
///
/// A PDF that cannot be parsed aborts the run; empty pages inside a valid
/// PDF are skipped.
pub fn build_document(bundle: &SourceBundle) -> Result<String> {
    bundle.validate()?;

    let mut pdf_texts = Vec::with_capacity(bundle.pdfs.len());
    for pdf in &bundle.pdfs {
        let text = extract::pdf_text(&pdf.bytes)
            .with_context(|| format!("Failed to extract text from {}", pdf.name))?;
        tracing::info!(file = %pdf.name, chars = text.chars().count(), "extracted PDF text");
        pdf_texts.push(text);
    }

    Ok(assemble_document(
        &pdf_texts,
        &bundle.company_info,
        &bundle.complete_faqs(),
    ))
}

/// Concatenate the sections. Incomplete FAQ pairs are dropped here as well.
pub fn assemble_document(pdf_texts: &[String], company_info: &str, faqs: &[FaqPair]) -> String {
    let mut doc: String = pdf_texts.concat();

    if !company_info.trim().is_empty() {
        doc.push_str(&format!(
            "\n{rule}\n{header}\n{info}\n{rule}\n",
            rule = SECTION_RULE,
            header = COMPANY_HEADER,
            info = company_info
        ));
    }

    let faqs: Vec<&FaqPair> = faqs.iter().filter(|f| f.is_complete()).collect();
    if !faqs.is_empty() {
        doc.push_str(&format!("\n{}\n{}\n", SECTION_RULE, FAQ_HEADER));
        for faq in faqs {
            doc.push_str(&format!(
                "**Question:** {}\n**Answer:** {}\n\n",
                faq.question, faq.answer
            ));
        }
        doc.push_str(SECTION_RULE);
        doc.push('\n');
    }

    doc
}
