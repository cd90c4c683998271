use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::debug;

use super::{PdfSummary, load_document, page, save_document, summarize};
use crate::db::CompressionLevel;
use crate::error::PdfError;

/// Result of concatenating documents
pub struct MergedPdf {
    pub bytes: Vec<u8>,
    /// Page count contributed by each source, in input order
    pub page_counts: Vec<usize>,
    pub summary: PdfSummary,
}

/// Concatenate every page of every source, in order, into a new document.
///
/// Each source is renumbered into a disjoint object id range. Pages are
/// given their inherited attributes directly, then hung under a single new
/// page tree root, so the old catalogs and intermediate tree nodes are
/// dropped.
pub fn merge_documents<S: AsRef<[u8]>>(
    sources: &[S],
    compression: CompressionLevel,
) -> Result<MergedPdf, PdfError> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut page_counts = Vec::with_capacity(sources.len());

    for source in sources {
        let mut doc = load_document(source.as_ref())?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in &page_ids {
            page::flatten_inherited(&mut doc, *page_id)?;
            let mut dict = page::page_dict(&doc, *page_id)?.clone();
            dict.remove(b"Parent");
            pages.push((*page_id, dict));
        }
        page_counts.push(page_ids.len());

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    objects.insert(object_id, object);
                }
            }
        }
    }

    if pages.is_empty() {
        return Err(PdfError::EmptyDocument);
    }

    merged.objects.extend(objects);
    merged.max_id = next_id - 1;

    let pages_id = merged.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut dict) in pages {
        dict.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(page_id, Object::Dictionary(dict));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", Object::Reference(catalog_id));

    match compression {
        CompressionLevel::None => {}
        CompressionLevel::Low => merged.compress(),
        CompressionLevel::Medium | CompressionLevel::High => {
            merged.prune_objects();
            merged.compress();
        }
    }

    debug!(
        sources = sources.len(),
        pages = count,
        compression = compression.as_ref(),
        "Merged documents"
    );

    let summary = summarize(&merged);
    let bytes = save_document(&mut merged)?;

    Ok(MergedPdf {
        bytes,
        page_counts,
        summary,
    })
}
