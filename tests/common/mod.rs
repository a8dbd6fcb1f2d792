//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use nibble_ocr::ocr::{EngineSpan, OcrEngine, OcrError, Recognizer, RecognizerConfig};
use nibble_ocr::page::{PageImage, PixelBox};
use nibble_ocr::strip::LayerStripper;
use nibble_ocr::Pipeline;

/// Render resolution used by the tests
pub const TEST_DPI: f32 = 100.0;

/// US letter, in points
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

/// The fixture's black box, in top-left page points: (left, top, right, bottom)
pub const INK_BOX: (f32, f32, f32, f32) = (72.0, 56.0, 216.0, 92.0);

/// Text the ink engine reports for any inked area
pub const FRESH: &str = "FRESH";

/// Text hidden in the fixture's old OCR layer
pub const OLD_TEXT: &str = "OLDTEXT";

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    ops: Vec<Operation>,
    resources: Dictionary,
) -> ObjectId {
    let content = Content { operations: ops }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => resources,
    })
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>) -> Vec<u8> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Two letter pages. Page 1: a black box standing in for a scanned word,
/// plus an invisible "OLDTEXT" layer. Page 2: blank.
pub fn scanned_with_old_layer() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let ink_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0u8],
    ));
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let (left, top, right, bottom) = INK_BOX;
    let first = add_page(
        &mut doc,
        pages_id,
        vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(right - left),
                    0.into(),
                    0.into(),
                    Object::Real(bottom - top),
                    Object::Real(left),
                    Object::Real(PAGE_HEIGHT - bottom),
                ],
            ),
            Operation::new("Do", vec!["Scan".into()]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tr", vec![3.into()]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 400.into()]),
            Operation::new("Tj", vec![Object::string_literal(OLD_TEXT)]),
            Operation::new("ET", vec![]),
        ],
        dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Scan" => ink_id },
        },
    );
    let second = add_page(&mut doc, pages_id, vec![], Dictionary::new());

    finish(doc, pages_id, vec![first, second])
}

/// A structurally valid PDF with no pages
pub fn zero_pages() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    finish(doc, pages_id, Vec::new())
}

/// Deterministic engine: reports one token covering every dark pixel
pub struct InkEngine;

impl InkEngine {
    fn ink_box(image: &PageImage) -> Option<PixelBox> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in image.pixels().enumerate_pixels() {
            let luma = pixel.0.iter().map(|&c| c as u32).sum::<u32>() / 3;
            if luma >= 128 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }

        bounds.map(|(x0, y0, x1, y1)| {
            PixelBox::new(
                x0 as f32,
                y0 as f32,
                (x1 - x0 + 1) as f32,
                (y1 - y0 + 1) as f32,
            )
        })
    }
}

#[async_trait]
impl OcrEngine for InkEngine {
    fn name(&self) -> &str {
        "ink"
    }

    async fn probe(&self, _language: &str) -> Result<(), OcrError> {
        Ok(())
    }

    async fn recognize(
        &self,
        image: &PageImage,
        _language: &str,
    ) -> Result<Vec<EngineSpan>, OcrError> {
        Ok(Self::ink_box(image)
            .map(|bbox| EngineSpan {
                text: FRESH.to_string(),
                bbox,
                confidence: 0.99,
            })
            .into_iter()
            .collect())
    }
}

pub fn recognizer() -> Recognizer {
    Recognizer::new(
        Arc::new(InkEngine),
        RecognizerConfig {
            jobs: 2,
            page_timeout: Duration::from_secs(30),
            ..Default::default()
        },
    )
}

pub fn pipeline() -> Pipeline {
    Pipeline::new(LayerStripper::new(TEST_DPI), recognizer())
}
