//! Edit operation descriptors and their execution plan.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

use crate::error::PdfError;

/// One requested modification, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "camelCase")]
pub enum EditOperation {
    #[serde(rename_all = "camelCase")]
    AddText {
        page_index: u32,
        text: String,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        size: Option<f64>,
        color: Option<String>,
        font_name: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    AddWatermark { text: String, opacity: Option<f64> },

    #[serde(rename_all = "camelCase")]
    RotatePage { page_index: u32, rotation: i64 },

    #[serde(rename_all = "camelCase")]
    DeletePage { page_index: u32 },

    #[serde(rename_all = "camelCase")]
    AddImage {
        page_index: u32,
        image_base64: String,
        image_type: Option<String>,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        width: Option<f64>,
        height: Option<f64>,
    },

    /// Any other `type`; skipped
    #[serde(other)]
    Unknown,
}

/// A descriptor without a string `type` is skipped like an unknown type.
/// A known type with malformed fields is still rejected.
impl<'de> Deserialize<'de> for EditOperation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.get("type").is_some_and(Value::is_string) {
            return Ok(EditOperation::Unknown);
        }
        EditOperation::deserialize(value).map_err(de::Error::custom)
    }
}

impl EditOperation {
    /// The page an operation targets, if it targets a single page
    fn page_index(&self) -> Option<u32> {
        match self {
            EditOperation::AddText { page_index, .. }
            | EditOperation::RotatePage { page_index, .. }
            | EditOperation::DeletePage { page_index }
            | EditOperation::AddImage { page_index, .. } => Some(*page_index),
            EditOperation::AddWatermark { .. } | EditOperation::Unknown => None,
        }
    }
}

/// The standard Type 1 faces text can be drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    Courier,
}

impl FontFace {
    /// Resolve a requested font name; unknown names fall back to Helvetica
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("Helvetica-Bold") => FontFace::HelveticaBold,
            Some("Times-Roman") => FontFace::TimesRoman,
            Some("Courier") => FontFace::Courier,
            _ => FontFace::Helvetica,
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Helvetica => "Helvetica",
            FontFace::HelveticaBold => "Helvetica-Bold",
            FontFace::TimesRoman => "Times-Roman",
            FontFace::Courier => "Courier",
        }
    }
}

/// Normalized RGB color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const fn gray(level: f32) -> Self {
        Rgb {
            r: level,
            g: level,
            b: level,
        }
    }

    /// Parse `#rrggbb` (the `#` is optional). Anything else is black.
    pub fn from_hex(hex: Option<&str>) -> Self {
        let Some(hex) = hex else {
            return Rgb::BLACK;
        };
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Rgb::BLACK;
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_or(0.0, |v| v as f32 / 255.0)
        };

        Rgb {
            r: channel(0..2),
            g: channel(2..4),
            b: channel(4..6),
        }
    }
}

/// Operations sorted into execution order.
///
/// Everything except deletions runs in request order against the original
/// page numbering. Deletions run afterwards, highest index first, so no
/// deletion shifts the index of another.
#[derive(Debug)]
pub struct EditPlan<'a> {
    pub ordered: Vec<&'a EditOperation>,
    pub deletions: Vec<usize>,
}

impl<'a> EditPlan<'a> {
    /// Validate `operations` against a document of `page_count` pages and
    /// build the plan. Nothing is mutated if this fails.
    pub fn build(operations: &'a [EditOperation], page_count: usize) -> Result<Self, PdfError> {
        let mut ordered = Vec::new();
        let mut deletions = BTreeSet::new();

        for operation in operations {
            if let Some(index) = operation.page_index()
                && index as usize >= page_count
            {
                return Err(PdfError::PageOutOfRange { index, page_count });
            }

            match operation {
                EditOperation::DeletePage { page_index } => {
                    deletions.insert(*page_index as usize);
                }
                EditOperation::RotatePage { rotation, .. } if rotation % 90 != 0 => {
                    return Err(PdfError::InvalidRotation { degrees: *rotation });
                }
                EditOperation::Unknown => {}
                _ => ordered.push(operation),
            }
        }

        if page_count > 0 && deletions.len() >= page_count {
            return Err(PdfError::NoPagesRemaining);
        }

        Ok(Self {
            ordered,
            deletions: deletions.into_iter().rev().collect(),
        })
    }
}

/// Normalize a right-angle rotation into `0..360`
pub fn normalize_rotation(degrees: i64) -> i64 {
    degrees.rem_euclid(360)
}
