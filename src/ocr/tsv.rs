//! Tesseract TSV output parsing
//!
//! Tesseract's `tsv` config emits one row per layout element:
//!
//! ```text
//! level page_num block_num par_num line_num word_num left top width height conf text
//! ```
//!
//! Level 5 rows are words. Everything above (page, block, paragraph, line)
//! only carries geometry and is used here for grouping.

use crate::page::PixelBox;

use super::types::{EngineSpan, OcrError, TokenGranularity};

const WORD_LEVEL: u32 = 5;
const COLUMNS: usize = 12;

/// A parsed level-5 row
#[derive(Debug, Clone)]
struct WordRow {
    line_key: (u32, u32, u32, u32),
    bbox: PixelBox,
    confidence: f32,
    text: String,
}

/// Parse Tesseract TSV into spans, in emission order
pub fn parse_tsv(tsv: &str, granularity: TokenGranularity) -> Result<Vec<EngineSpan>, OcrError> {
    let words = parse_words(tsv)?;

    Ok(match granularity {
        TokenGranularity::Word => words
            .into_iter()
            .map(|w| EngineSpan {
                text: w.text,
                bbox: w.bbox,
                confidence: w.confidence,
            })
            .collect(),
        TokenGranularity::Line => group_lines(words),
    })
}

fn parse_words(tsv: &str) -> Result<Vec<WordRow>, OcrError> {
    let mut words = Vec::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line.is_empty() || line.starts_with("level") {
            continue;
        }

        let cols: Vec<&str> = line.splitn(COLUMNS, '\t').collect();
        if cols.len() < COLUMNS - 1 {
            return Err(OcrError::Processing(format!(
                "Malformed TSV row {}: expected {} columns, got {}",
                line_no + 1,
                COLUMNS,
                cols.len()
            )));
        }

        let int = |idx: usize| -> Result<i64, OcrError> {
            cols[idx].trim().parse::<i64>().map_err(|e| {
                OcrError::Processing(format!("Bad TSV field {} on row {}: {}", idx, line_no + 1, e))
            })
        };

        if int(0)? as u32 != WORD_LEVEL {
            continue;
        }

        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        // conf is -1 for rows the engine did not score
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);

        words.push(WordRow {
            line_key: (int(1)? as u32, int(2)? as u32, int(3)? as u32, int(4)? as u32),
            bbox: PixelBox::new(int(6)? as f32, int(7)? as f32, int(8)? as f32, int(9)? as f32),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
            text: text.to_string(),
        });
    }

    Ok(words)
}

/// Merge consecutive words of the same line into one span
fn group_lines(words: Vec<WordRow>) -> Vec<EngineSpan> {
    let mut spans: Vec<EngineSpan> = Vec::new();
    let mut current_key = None;
    let mut word_count = 0usize;

    for word in words {
        if current_key == Some(word.line_key) {
            if let Some(span) = spans.last_mut() {
                span.text.push(' ');
                span.text.push_str(&word.text);
                span.bbox = span.bbox.union(&word.bbox);
                // Running mean over the line's words
                word_count += 1;
                span.confidence += (word.confidence - span.confidence) / word_count as f32;
            }
            continue;
        }

        current_key = Some(word.line_key);
        word_count = 1;
        spans.push(EngineSpan {
            text: word.text,
            bbox: word.bbox,
            confidence: word.confidence,
        });
    }

    spans
}
