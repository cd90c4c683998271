//! Drawing onto existing pages: text, watermarks and images.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use super::operations::{FontFace, Rgb};
use super::page;
use crate::error::PdfError;

const WATERMARK_SIZE: f32 = 60.0;
const WATERMARK_GRAY: f32 = 0.7;
const WATERMARK_ANGLE_DEGREES: f32 = 45.0;
/// Horizontal offset per character used to roughly center watermark text
const WATERMARK_CHAR_ADVANCE: f64 = 10.0;

pub const DEFAULT_TEXT_SIZE: f64 = 12.0;
const DEFAULT_WATERMARK_OPACITY: f64 = 0.3;

/// Opacity for a watermark request; missing or non-positive means the default.
pub fn watermark_opacity(requested: Option<f64>) -> f64 {
    requested
        .filter(|opacity| *opacity > 0.0)
        .unwrap_or(DEFAULT_WATERMARK_OPACITY)
}

/// Text placement for [`Canvas::draw_text`]
pub struct TextStyle {
    pub face: FontFace,
    pub size: f64,
    pub color: Rgb,
}

/// Rectangle in PDF user space, origin bottom-left
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Draws onto the pages of one document.
///
/// Fonts are embedded once per document and shared between pages. The
/// first drawing on a page brackets the page's original content so its
/// graphics state cannot leak into ours.
#[derive(Default)]
pub struct Canvas {
    fonts: HashMap<FontFace, ObjectId>,
    prepared: HashSet<ObjectId>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw_text(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        text: &str,
        x: f64,
        y: f64,
        style: &TextStyle,
    ) -> Result<(), PdfError> {
        let font_name = self.use_font(doc, page_id, style.face)?;

        let operations = vec![
            Operation::new("q", vec![]),
            fill_color(style.color),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.into_bytes()), real(style.size)],
            ),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];

        self.append(doc, page_id, operations)
    }

    /// Draw `text` diagonally across the middle of the page
    pub fn draw_watermark(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        text: &str,
        opacity: f64,
    ) -> Result<(), PdfError> {
        let (width, height) = page::page_size(doc, page_id);
        let x = width / 2.0 - text.chars().count() as f64 * WATERMARK_CHAR_ADVANCE;
        let y = height / 2.0;

        let font_name = self.use_font(doc, page_id, FontFace::HelveticaBold)?;

        let opacity = opacity.clamp(0.0, 1.0) as f32;
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity),
            "CA" => Object::Real(opacity),
        });
        let gs_name = format!("FolioGS{}", gs_id.0);
        page::add_resource(doc, page_id, b"ExtGState", &gs_name, gs_id)?;

        let (sin, cos) = WATERMARK_ANGLE_DEGREES.to_radians().sin_cos();

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(gs_name.into_bytes())]),
            fill_color(Rgb::gray(WATERMARK_GRAY)),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(font_name.into_bytes()),
                    Object::Real(WATERMARK_SIZE),
                ],
            ),
            Operation::new(
                "Tm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    real(x),
                    real(y),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];

        self.append(doc, page_id, operations)
    }

    /// Draw an embedded image XObject into a rectangle
    pub fn draw_image(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        image_id: ObjectId,
        placement: &Placement,
    ) -> Result<(), PdfError> {
        let name = format!("FolioIm{}", image_id.0);
        page::add_resource(doc, page_id, b"XObject", &name, image_id)?;

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(placement.height),
                    real(placement.x),
                    real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ];

        self.append(doc, page_id, operations)
    }

    /// Embed the font if needed and register it on the page
    fn use_font(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        face: FontFace,
    ) -> Result<String, PdfError> {
        let font_id = *self.fonts.entry(face).or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            })
        });

        let name = format!("FolioF{}", font_id.0);
        page::add_resource(doc, page_id, b"Font", &name, font_id)?;
        Ok(name)
    }

    fn append(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), PdfError> {
        if self.prepared.insert(page_id) {
            page::isolate_existing_content(doc, page_id)?;
        }

        let bytes = Content { operations }
            .encode()
            .map_err(|e| PdfError::Save {
                message: format!("content stream encoding failed: {}", e),
            })?;

        page::append_content(doc, page_id, bytes)
    }
}

/// A decoded image ready to be embedded as an XObject
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pixels: ImagePixels,
}

enum ImagePixels {
    /// Original JPEG bytes, embedded as-is
    Jpeg { data: Vec<u8>, gray: bool },
    /// Raw RGB samples plus an optional alpha mask
    Rgb { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

impl DecodedImage {
    /// Decode base64 image data. `png` selects PNG; anything else is JPEG.
    pub fn from_base64(encoded: &str, image_type: Option<&str>) -> Result<Self, PdfError> {
        // Tolerate data URLs as produced by canvas.toDataURL()
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => encoded,
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64.decode(cleaned).map_err(PdfError::ImageEncoding)?;

        if image_type == Some("png") {
            Self::from_png(&bytes)
        } else {
            Self::from_jpeg(bytes)
        }
    }

    fn from_png(bytes: &[u8]) -> Result<Self, PdfError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(PdfError::ImageDecode)?;
        let (width, height) = (decoded.width(), decoded.height());

        let pixels = if decoded.color().has_alpha() {
            let rgba = decoded.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            for pixel in rgba.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }
            ImagePixels::Rgb {
                rgb,
                alpha: Some(alpha),
            }
        } else {
            ImagePixels::Rgb {
                rgb: decoded.to_rgb8().into_raw(),
                alpha: None,
            }
        };

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    fn from_jpeg(bytes: Vec<u8>) -> Result<Self, PdfError> {
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(PdfError::ImageDecode)?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            pixels: ImagePixels::Jpeg {
                gray: decoded.color().channel_count() == 1,
                data: bytes,
            },
        })
    }

    /// Add the image (and its soft mask, if any) to the document
    pub fn embed(self, doc: &mut Document) -> ObjectId {
        let width = i64::from(self.width);
        let height = i64::from(self.height);

        match self.pixels {
            ImagePixels::Jpeg { data, gray } => {
                let color_space = if gray { "DeviceGray" } else { "DeviceRGB" };
                let stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width,
                        "Height" => height,
                        "ColorSpace" => color_space,
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    data,
                )
                .with_compression(false);
                doc.add_object(stream)
            }
            ImagePixels::Rgb { rgb, alpha } => {
                let mut dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                };

                if let Some(alpha) = alpha {
                    let mask_id = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => width,
                            "Height" => height,
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 8,
                        },
                        alpha,
                    ));
                    dict.set("SMask", Object::Reference(mask_id));
                }

                doc.add_object(Stream::new(dict, rgb))
            }
        }
    }
}

fn fill_color(color: Rgb) -> Operation {
    Operation::new(
        "rg",
        vec![
            Object::Real(color.r),
            Object::Real(color.g),
            Object::Real(color.b),
        ],
    )
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Standard 14 fonts use single-byte encodings; characters outside
/// Latin-1 are replaced with `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
