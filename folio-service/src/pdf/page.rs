//! Page tree helpers.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::PdfError;

/// Attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when no MediaBox can be found
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guards against cyclic Parent chains in malformed files
const MAX_TREE_DEPTH: usize = 32;

pub fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, PdfError> {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfError::Structure {
            message: format!("page {:?} is not a dictionary: {}", page_id, e),
        })
}

pub fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, PdfError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Structure {
            message: format!("page {:?} is not a dictionary: {}", page_id, e),
        })
}

/// Look up an attribute on the page or the nearest ancestor that has it
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_object(page_id).and_then(Object::as_dict).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let dict = current?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|parent| doc.get_object(parent))
            .and_then(Object::as_dict)
            .ok();
    }

    None
}

/// Follow a reference to a dictionary, or return an inline one
pub fn resolve_dict(doc: &Document, object: &Object) -> Option<Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc
            .get_object(*id)
            .and_then(Object::as_dict)
            .ok()
            .cloned(),
        _ => None,
    }
}

/// Width and height of a page from its (possibly inherited) MediaBox
pub fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|object| match object {
            Object::Reference(id) => doc.get_object(id).ok().cloned(),
            other => Some(other),
        })
        .and_then(|object| rect_values(&object))
        .unwrap_or(DEFAULT_MEDIA_BOX);

    (
        (media_box[2] - media_box[0]).abs(),
        (media_box[3] - media_box[1]).abs(),
    )
}

fn rect_values(object: &Object) -> Option<[f64; 4]> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = match item {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => f64::from(*r),
            _ => return None,
        };
    }
    Some(values)
}

/// Copy every inherited attribute onto the page itself
pub fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let inherited: Vec<(&[u8], Object)> = INHERITABLE_ATTRIBUTES
        .iter()
        .filter_map(|key| inherited_attribute(doc, page_id, key).map(|value| (*key, value)))
        .collect();

    let page = page_dict_mut(doc, page_id)?;
    for (key, value) in inherited {
        if !page.has(key) {
            page.set(key, value);
        }
    }

    Ok(())
}

/// Set the absolute rotation of a page
pub fn set_rotation(doc: &mut Document, page_id: ObjectId, degrees: i64) -> Result<(), PdfError> {
    page_dict_mut(doc, page_id)?.set("Rotate", Object::Integer(degrees));
    Ok(())
}

/// Register `object_id` in the page's resource dictionary under
/// `category` (`Font`, `XObject`, `ExtGState`) as `name`.
///
/// The effective resources are copied inline onto the page first so
/// shared or inherited dictionaries are never modified.
pub fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    object_id: ObjectId,
) -> Result<(), PdfError> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|object| resolve_dict(doc, &object))
        .unwrap_or_else(Dictionary::new);

    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|object| resolve_dict(doc, object))
        .unwrap_or_else(Dictionary::new);
    entries.set(name, Object::Reference(object_id));
    resources.set(category, Object::Dictionary(entries));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Existing content stream references of a page, in order
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfError> {
    let contents = page_dict(doc, page_id)?.get(b"Contents").ok().cloned();

    Ok(match contents {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(id)],
        },
        _ => Vec::new(),
    })
}

/// Isolate the page's existing drawing state by bracketing its content
/// with `q` / `Q`, so appended content starts from the default state.
pub fn isolate_existing_content(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let existing = content_refs(doc, page_id)?;
    if existing.is_empty() {
        return Ok(());
    }

    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open));
    contents.extend(existing);
    contents.push(Object::Reference(close));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Append a new content stream after the page's existing content
pub fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<(), PdfError> {
    let mut contents = content_refs(doc, page_id)?;
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));
    contents.push(Object::Reference(stream_id));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Detach a page from the page tree and drop the page object.
///
/// The page is removed from its parent's `Kids` and every ancestor's
/// `Count` is decremented.
pub fn remove_page(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let parent_id = page_dict(doc, page_id)?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::Structure {
            message: format!("page {:?} has no parent: {}", page_id, e),
        })?;

    {
        let parent = doc
            .get_object_mut(parent_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Structure {
                message: format!("page tree node {:?} unreadable: {}", parent_id, e),
            })?;
        let kids = parent
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .map_err(|e| PdfError::Structure {
                message: format!("page tree node {:?} has no Kids: {}", parent_id, e),
            })?;
        kids.retain(|kid| kid.as_reference().map_or(true, |id| id != page_id));
    }

    let mut ancestor = Some(parent_id);
    for _ in 0..MAX_TREE_DEPTH {
        let Some(node_id) = ancestor else { break };
        let node = doc
            .get_object_mut(node_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Structure {
                message: format!("page tree node {:?} unreadable: {}", node_id, e),
            })?;

        let count = node.get(b"Count").and_then(Object::as_i64).unwrap_or(1);
        node.set("Count", Object::Integer((count - 1).max(0)));
        ancestor = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    doc.objects.remove(&page_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{page_widths, sample_document};

    #[test]
    fn test_inherited_resources_are_found_through_parent() {
        let doc = sample_document(&[100, 200]);
        let page_id = doc.get_pages()[&1];

        assert!(!page_dict(&doc, page_id).unwrap().has(b"Resources"));
        assert!(inherited_attribute(&doc, page_id, b"Resources").is_some());
        assert!(inherited_attribute(&doc, page_id, b"CropBox").is_none());
    }

    #[test]
    fn test_flatten_copies_inherited_attributes() {
        let mut doc = sample_document(&[100]);
        let page_id = doc.get_pages()[&1];

        flatten_inherited(&mut doc, page_id).unwrap();

        let page = page_dict(&doc, page_id).unwrap();
        assert!(page.has(b"Resources"));
        // The page's own MediaBox wins over the root's
        assert_eq!(page_size(&doc, page_id), (100.0, 792.0));
    }

    #[test]
    fn test_remove_page_updates_tree() {
        let mut doc = sample_document(&[100, 200, 300]);
        let middle = doc.get_pages()[&2];

        remove_page(&mut doc, middle).unwrap();

        assert_eq!(doc.get_pages().len(), 2);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        assert_eq!(page_widths(&bytes), vec![100.0, 300.0]);
    }

    #[test]
    fn test_add_resource_does_not_touch_shared_dictionary() {
        let mut doc = sample_document(&[100, 200]);
        let pages = doc.get_pages();
        let font_id = doc.add_object(Dictionary::new());

        add_resource(&mut doc, pages[&1], b"Font", "Extra", font_id).unwrap();

        let first = inherited_attribute(&doc, pages[&1], b"Resources").unwrap();
        let first = resolve_dict(&doc, &first).unwrap();
        let fonts = resolve_dict(&doc, first.get(b"Font").unwrap()).unwrap();
        assert!(fonts.has(b"Extra"));
        assert!(fonts.has(b"F1"));

        let second = inherited_attribute(&doc, pages[&2], b"Resources").unwrap();
        let second = resolve_dict(&doc, &second).unwrap();
        let fonts = resolve_dict(&doc, second.get(b"Font").unwrap()).unwrap();
        assert!(!fonts.has(b"Extra"));
    }
}
