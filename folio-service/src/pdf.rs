//! PDF object-model work: inspecting, editing and merging documents.
//!
//! Everything here is synchronous and CPU bound; callers run it on the
//! blocking pool.

mod draw;
mod edit;
mod merge;
mod operations;
mod page;

pub use edit::apply_operations;
pub use merge::merge_documents;
pub use operations::EditOperation;

use lopdf::Document;

use crate::db::FileMetadata;
use crate::error::PdfError;

/// Page count, first-page size and version of a document
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSummary {
    pub page_count: u32,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub version: String,
}

impl From<PdfSummary> for FileMetadata {
    fn from(summary: PdfSummary) -> Self {
        FileMetadata {
            page_count: summary.page_count,
            width: summary.width,
            height: summary.height,
            version: Some(summary.version),
        }
    }
}

pub fn load_document(bytes: &[u8]) -> Result<Document, PdfError> {
    Document::load_mem(bytes).map_err(PdfError::Load)
}

pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| PdfError::Save {
        message: e.to_string(),
    })?;
    Ok(bytes)
}

pub fn summarize(doc: &Document) -> PdfSummary {
    let pages = doc.get_pages();
    let first_size = pages
        .values()
        .next()
        .map(|page_id| page::page_size(doc, *page_id));

    PdfSummary {
        page_count: pages.len() as u32,
        width: first_size.map(|(w, _)| w),
        height: first_size.map(|(_, h)| h),
        version: doc.version.to_string(),
    }
}

/// Parse an uploaded binary far enough to describe it
pub fn inspect(bytes: &[u8]) -> Result<PdfSummary, PdfError> {
    let doc = load_document(bytes)?;
    Ok(summarize(&doc))
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::sample_pdf;

    #[test]
    fn test_inspect_reports_first_page() {
        let summary = inspect(&sample_pdf(&[300, 500])).unwrap();

        assert_eq!(summary.page_count, 2);
        assert_eq!(summary.width, Some(300.0));
        assert_eq!(summary.height, Some(792.0));
        assert_eq!(summary.version, "1.5");

        let metadata = FileMetadata::from(summary);
        assert_eq!(metadata.version.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_inspect_rejects_non_pdf() {
        assert!(matches!(inspect(b"hello"), Err(PdfError::Load(_))));
    }
}
