use lopdf::ObjectId;
use tracing::debug;

use super::draw::{
    Canvas, DEFAULT_TEXT_SIZE, DecodedImage, Placement, TextStyle, watermark_opacity,
};
use super::operations::{EditOperation, EditPlan, FontFace, Rgb, normalize_rotation};
use super::{PdfSummary, load_document, page, save_document, summarize};
use crate::error::PdfError;

/// Result of applying edit operations
pub struct EditedPdf {
    pub bytes: Vec<u8>,
    pub summary: PdfSummary,
}

/// Apply `operations` to a PDF and serialize the result.
///
/// The whole request is validated before the document is touched; on any
/// error nothing is returned.
pub fn apply_operations(
    source: &[u8],
    operations: &[EditOperation],
) -> Result<EditedPdf, PdfError> {
    let mut doc = load_document(source)?;

    // Page ids by zero-based index, captured before anything moves
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(PdfError::EmptyDocument);
    }

    let plan = EditPlan::build(operations, page_ids.len())?;
    let mut canvas = Canvas::new();

    for operation in &plan.ordered {
        match operation {
            EditOperation::AddText {
                page_index,
                text,
                x,
                y,
                size,
                color,
                font_name,
            } => {
                let style = TextStyle {
                    face: FontFace::from_name(font_name.as_deref()),
                    size: size.unwrap_or(DEFAULT_TEXT_SIZE),
                    color: Rgb::from_hex(color.as_deref()),
                };
                canvas.draw_text(&mut doc, page_ids[*page_index as usize], text, *x, *y, &style)?;
            }
            EditOperation::AddWatermark { text, opacity } => {
                let opacity = watermark_opacity(*opacity);
                for page_id in &page_ids {
                    canvas.draw_watermark(&mut doc, *page_id, text, opacity)?;
                }
            }
            EditOperation::RotatePage {
                page_index,
                rotation,
            } => {
                page::set_rotation(
                    &mut doc,
                    page_ids[*page_index as usize],
                    normalize_rotation(*rotation),
                )?;
            }
            EditOperation::AddImage {
                page_index,
                image_base64,
                image_type,
                x,
                y,
                width,
                height,
            } => {
                let image = DecodedImage::from_base64(image_base64, image_type.as_deref())?;
                let placement = Placement {
                    x: *x,
                    y: *y,
                    width: width.unwrap_or(f64::from(image.width)),
                    height: height.unwrap_or(f64::from(image.height)),
                };
                let image_id = image.embed(&mut doc);
                canvas.draw_image(&mut doc, page_ids[*page_index as usize], image_id, &placement)?;
            }
            EditOperation::DeletePage { .. } | EditOperation::Unknown => {}
        }
    }

    for index in &plan.deletions {
        page::remove_page(&mut doc, page_ids[*index])?;
    }

    debug!(
        applied = plan.ordered.len(),
        deleted = plan.deletions.len(),
        "Applied edit operations"
    );

    let summary = summarize(&doc);
    doc.compress();
    let bytes = save_document(&mut doc)?;

    Ok(EditedPdf { bytes, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{page_widths, sample_pdf};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use image::{ImageBuffer, ImageFormat};
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream};
    use serde_json::json;
    use std::io::Cursor;

    fn ops(value: serde_json::Value) -> Vec<EditOperation> {
        serde_json::from_value(value).unwrap()
    }

    fn encoded_image(width: u32, height: u32, format: ImageFormat) -> String {
        let img: ImageBuffer<image::Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, image::Rgb([30, 120, 200]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        BASE64.encode(bytes)
    }

    fn image_streams(doc: &Document) -> Vec<&Stream> {
        doc.objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
            })
            .collect()
    }

    /// Operations of the first page, decoding each content stream on its own
    fn first_page_operations(doc: &Document) -> Vec<Operation> {
        let page_id = doc.get_pages()[&1];
        doc.get_page_contents(page_id)
            .into_iter()
            .flat_map(|id| {
                let stream = doc.get_object(id).unwrap().as_stream().unwrap();
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                Content::decode(&data).unwrap().operations
            })
            .collect()
    }

    #[test]
    fn test_non_deleting_operations_keep_page_count() {
        let source = sample_pdf(&[100, 200, 300]);
        let edited = apply_operations(
            &source,
            &ops(json!([
                {"type": "addText", "pageIndex": 1, "text": "Hello", "x": 10, "y": 10},
                {"type": "addWatermark", "text": "CONFIDENTIAL", "opacity": 0.5},
                {"type": "rotatePage", "pageIndex": 0, "rotation": 90}
            ])),
        )
        .unwrap();

        assert_eq!(edited.summary.page_count, 3);
        assert_eq!(page_widths(&edited.bytes), vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_deletions_use_original_indices() {
        let source = sample_pdf(&[100, 200, 300]);
        let edited = apply_operations(
            &source,
            &ops(json!([
                {"type": "deletePage", "pageIndex": 0},
                {"type": "deletePage", "pageIndex": 2}
            ])),
        )
        .unwrap();

        assert_eq!(edited.summary.page_count, 1);
        assert_eq!(page_widths(&edited.bytes), vec![200.0]);
        assert_eq!(edited.summary.width, Some(200.0));
    }

    #[test]
    fn test_operations_before_deletion_target_original_pages() {
        let source = sample_pdf(&[100, 200]);
        let edited = apply_operations(
            &source,
            &ops(json!([
                {"type": "deletePage", "pageIndex": 0},
                {"type": "rotatePage", "pageIndex": 1, "rotation": -90}
            ])),
        )
        .unwrap();

        let doc = load_document(&edited.bytes).unwrap();
        let remaining = doc.get_pages()[&1];
        let rotate = page::page_dict(&doc, remaining)
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap();
        assert_eq!(rotate, 270);
        assert_eq!(page_widths(&edited.bytes), vec![200.0]);
    }

    #[test]
    fn test_rotation_is_absolute() {
        let source = sample_pdf(&[100]);
        let edited = apply_operations(
            &source,
            &ops(json!([
                {"type": "rotatePage", "pageIndex": 0, "rotation": 90},
                {"type": "rotatePage", "pageIndex": 0, "rotation": 180}
            ])),
        )
        .unwrap();

        let doc = load_document(&edited.bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let rotate = page::page_dict(&doc, page_id)
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap();
        assert_eq!(rotate, 180);
    }

    #[test]
    fn test_invalid_requests_fail_before_mutation() {
        let source = sample_pdf(&[100, 200]);

        let result = apply_operations(
            &source,
            &ops(json!([
                {"type": "addWatermark", "text": "X"},
                {"type": "deletePage", "pageIndex": 5}
            ])),
        );
        assert!(matches!(result, Err(PdfError::PageOutOfRange { index: 5, .. })));

        let result = apply_operations(&source, &ops(json!([{"type": "deletePage", "pageIndex": 0}, {"type": "deletePage", "pageIndex": 1}])));
        assert!(matches!(result, Err(PdfError::NoPagesRemaining)));
    }

    #[test]
    fn test_unknown_only_yields_equivalent_document() {
        let source = sample_pdf(&[100, 200]);
        let edited = apply_operations(&source, &ops(json!([{"type": "explode"}]))).unwrap();
        assert_eq!(page_widths(&edited.bytes), vec![100.0, 200.0]);
    }

    #[test]
    fn test_jpeg_image_is_embedded_as_dct() {
        let source = sample_pdf(&[300, 400]);
        let edited = apply_operations(
            &source,
            &ops(json!([{
                "type": "addImage",
                "pageIndex": 0,
                "imageBase64": encoded_image(8, 6, ImageFormat::Jpeg),
                "imageType": "jpeg",
                "x": 10,
                "y": 20
            }])),
        )
        .unwrap();

        assert_eq!(edited.summary.page_count, 2);

        let doc = load_document(&edited.bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 1);
        let dict = &images[0].dict;
        assert_eq!(
            dict.get(b"Filter").and_then(Object::as_name).unwrap(),
            b"DCTDecode"
        );
        assert_eq!(dict.get(b"Width").and_then(Object::as_i64).unwrap(), 8);
        assert_eq!(dict.get(b"Height").and_then(Object::as_i64).unwrap(), 6);

        let operations = first_page_operations(&doc);
        assert!(operations.iter().any(|op| op.operator == "Do"));
        // Size defaults to the pixel dimensions
        let cm = operations.iter().find(|op| op.operator == "cm").unwrap();
        assert_eq!(cm.operands[0].as_float().unwrap(), 8.0);
        assert_eq!(cm.operands[3].as_float().unwrap(), 6.0);
    }

    #[test]
    fn test_png_image_uses_requested_size() {
        let source = sample_pdf(&[300]);
        let edited = apply_operations(
            &source,
            &ops(json!([{
                "type": "addImage",
                "pageIndex": 0,
                "imageBase64": encoded_image(4, 2, ImageFormat::Png),
                "imageType": "png",
                "x": 30,
                "y": 40,
                "width": 120,
                "height": 60
            }])),
        )
        .unwrap();

        assert_eq!(edited.summary.page_count, 1);

        let doc = load_document(&edited.bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].dict.get(b"Width").and_then(Object::as_i64).unwrap(), 4);

        let operations = first_page_operations(&doc);
        assert!(operations.iter().any(|op| op.operator == "Do"));
        let cm = operations.iter().find(|op| op.operator == "cm").unwrap();
        let matrix: Vec<f32> = cm
            .operands
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(matrix, vec![120.0, 0.0, 0.0, 60.0, 30.0, 40.0]);
    }

    #[test]
    fn test_zero_opacity_watermark_uses_default() {
        let source = sample_pdf(&[300]);
        let edited = apply_operations(
            &source,
            &ops(json!([{"type": "addWatermark", "text": "DRAFT", "opacity": 0}])),
        )
        .unwrap();

        let doc = load_document(&edited.bytes).unwrap();
        let gs = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .find(|d| d.get(b"Type").and_then(Object::as_name).ok() == Some(b"ExtGState".as_slice()))
            .unwrap();
        let ca = gs.get(b"ca").unwrap().as_float().unwrap();
        assert!((ca - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_descriptor_without_type_is_skipped() {
        let source = sample_pdf(&[100, 200]);
        let edited = apply_operations(
            &source,
            &ops(json!([
                {"pageIndex": 0},
                {"type": "addWatermark", "text": "X"}
            ])),
        )
        .unwrap();

        assert_eq!(page_widths(&edited.bytes), vec![100.0, 200.0]);
        let doc = load_document(&edited.bytes).unwrap();
        assert!(
            first_page_operations(&doc)
                .iter()
                .any(|op| op.operator == "gs")
        );
    }

    #[test]
    fn test_garbage_input_is_a_load_error() {
        let result = apply_operations(b"definitely not a pdf", &[]);
        assert!(matches!(result, Err(PdfError::Load(_))));
    }
}
