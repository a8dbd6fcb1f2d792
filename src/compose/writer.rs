//! Layer compositor
//!
//! Writes the output PDF: each page image as a full-page background with
//! an invisible (render mode 3) text run over every recognized token.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::page::{PageImage, PageResult};

use super::font::{encode_win_ansi, BASE_FONT, ENCODING};
use super::geometry::{page_size, project_token};

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Im0";

/// PDF text render mode 3: neither fill nor stroke
const INVISIBLE: i64 = 3;

/// Builds the searchable output PDF
#[derive(Debug, Clone, Default)]
pub struct LayerCompositor;

impl LayerCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Write the output PDF to `output`
    ///
    /// Either the whole document lands at `output` or nothing does.
    pub fn compose(&self, images: &[PageImage], results: &[PageResult], output: &Path) -> Result<()> {
        self.compose_with_cancel(images, results, output, &CancellationToken::new())
    }

    /// Write the output PDF to `output`, checking `cancel` before each page
    ///
    /// The document is serialized into a temporary file next to `output`
    /// and renamed over it at the end. On error or cancellation the
    /// temporary file is removed and an existing `output` is left untouched.
    pub fn compose_with_cancel(
        &self,
        images: &[PageImage],
        results: &[PageResult],
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_shape(images, results)?;

        let dir = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(Error::output_write(output, "destination directory does not exist"));
        }

        let start = Instant::now();
        let mut doc = self.build(images, results, cancel)?;

        let temp = NamedTempFile::new_in(dir).map_err(|e| Error::output_write(output, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            doc.save_to(&mut writer)
                .map_err(|e| Error::output_write(output, e))?;
            writer.flush().map_err(|e| Error::output_write(output, e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::output_write(output, e))?;

        // Last chance to back out before the previous output is replaced
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        temp.persist(output)
            .map_err(|e| Error::output_write(output, e.error))?;

        tracing::info!(
            pages = images.len(),
            output = %output.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Wrote searchable PDF"
        );
        Ok(())
    }

    /// Serialize the output PDF into `writer`
    pub fn write_to<W: Write>(
        &self,
        images: &[PageImage],
        results: &[PageResult],
        writer: &mut W,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_shape(images, results)?;
        let mut doc = self.build(images, results, cancel)?;
        doc.save_to(writer)
            .map_err(|e| Error::output_write("<stream>", e))
    }

    fn build(
        &self,
        images: &[PageImage],
        results: &[PageResult],
        cancel: &CancellationToken,
    ) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => BASE_FONT,
            "Encoding" => ENCODING,
        });

        let mut kids = Vec::with_capacity(images.len());
        for (image, result) in images.iter().zip(results) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let page_id = add_page(&mut doc, pages_id, font_id, image, result)?;
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }
}

/// Images and results must pair up one to one with matching page indices
fn check_shape(images: &[PageImage], results: &[PageResult]) -> Result<()> {
    if images.len() != results.len() {
        return Err(Error::ShapeMismatch {
            images: images.len(),
            results: results.len(),
            detail: "different number of pages".to_string(),
        });
    }

    if let Some((position, (image, result))) = images
        .iter()
        .zip(results)
        .enumerate()
        .find(|(_, (image, result))| image.page_index() != result.page_index)
    {
        return Err(Error::ShapeMismatch {
            images: images.len(),
            results: results.len(),
            detail: format!(
                "position {} pairs page image {} with result for page {}",
                position,
                image.page_index(),
                result.page_index
            ),
        });
    }

    Ok(())
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn compressed(image: &PageImage, mut stream: Stream) -> Result<Stream> {
    stream.compress().map_err(|e| Error::PageRender {
        page: image.page_index(),
        reason: format!("Failed to compress page stream: {}", e),
    })?;
    Ok(stream)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    image: &PageImage,
    result: &PageResult,
) -> Result<ObjectId> {
    let (width, height) = page_size(image.width(), image.height(), image.dpi());

    // Compress as each stream is created so raw pixels never pile up
    let image_stream = compressed(
        image,
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.pixels().as_raw().clone(),
        ),
    )?;
    let image_id = doc.add_object(image_stream);

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![real(width), 0.into(), 0.into(), real(height), 0.into(), 0.into()],
        ),
        Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
        Operation::new("Q", vec![]),
    ];

    let mut placed = 0usize;
    if !result.tokens.is_empty() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tr", vec![INVISIBLE.into()]));

        for token in &result.tokens {
            // Tokens from outside the recognizer may not be normalized
            let Some(bbox) = token.bbox.clamp_to(image.width(), image.height()) else {
                tracing::debug!(page = image.page_index(), text = %token.text, "Skipped token outside page");
                continue;
            };
            let encoded = encode_win_ansi(&token.text);
            if encoded.is_empty() {
                continue;
            }

            let placement = project_token(&bbox, image.dpi(), height, encoded.len());
            operations.push(Operation::new(
                "Tf",
                vec![FONT_RESOURCE.into(), real(placement.font_size)],
            ));
            operations.push(Operation::new(
                "Tm",
                vec![
                    real(placement.horizontal_scale),
                    0.into(),
                    0.into(),
                    1.into(),
                    real(placement.bbox.x),
                    real(placement.baseline),
                ],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encoded, StringFormat::Hexadecimal)],
            ));
            placed += 1;
        }

        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations }
        .encode()
        .map_err(|e| Error::PageRender {
            page: image.page_index(),
            reason: format!("Failed to encode page content: {}", e),
        })?;
    let content_id = doc.add_object(compressed(image, Stream::new(Dictionary::new(), content))?);

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
        "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), real(width), real(height)],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    tracing::debug!(
        page = image.page_index(),
        tokens = placed,
        width_pt = width,
        height_pt = height,
        "Composed page"
    );
    Ok(page_id)
}
