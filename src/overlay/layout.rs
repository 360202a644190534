use serde::Serialize;

use super::{Alignment, BoxPx, FontSpec, TextMeasurer};

/// A piece of text drawn at a single origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedRun {
    pub text: String,
    pub x: f32,
    pub width: f32,
}

/// Where a line of text lands inside its box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineLayout {
    pub total_width: f32,
    /// Vertical anchor, drawn with a middle baseline.
    pub y: f32,
    pub runs: Vec<PlacedRun>,
}

impl LineLayout {
    pub fn origin_x(&self) -> Option<f32> {
        self.runs.first().map(|run| run.x)
    }
}

/// Lays `text` out on one line inside `bbox`.
///
/// With `spacing == 0` the whole string is measured once and placed as a
/// single run. Otherwise every character is measured on its own and the
/// cursor advances by the glyph width plus `spacing`, so gaps stay uniform
/// whatever the glyph widths are. Text wider than the box overflows.
pub fn layout_line(
    text: &str,
    bbox: BoxPx,
    font: &FontSpec,
    alignment: Alignment,
    spacing: i32,
    measurer: &dyn TextMeasurer,
) -> LineLayout {
    let y = bbox.center_y();
    if spacing == 0 {
        let width = measurer.measure(text, font);
        let x = origin_x(bbox, alignment, width);
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![PlacedRun {
                text: text.to_string(),
                x,
                width,
            }]
        };
        return LineLayout {
            total_width: width,
            y,
            runs,
        };
    }

    let mut buf = [0u8; 4];
    let glyphs = text
        .chars()
        .map(|ch| {
            let glyph = ch.encode_utf8(&mut buf);
            let width = measurer.measure(glyph, font);
            (glyph.to_string(), width)
        })
        .collect::<Vec<_>>();
    let total_width = spaced_width(glyphs.iter().map(|(_, width)| *width), spacing);

    let mut cursor = origin_x(bbox, alignment, total_width);
    let runs = glyphs
        .into_iter()
        .map(|(text, width)| {
            let run = PlacedRun {
                text,
                x: cursor,
                width,
            };
            cursor += width + spacing as f32;
            run
        })
        .collect();
    LineLayout {
        total_width,
        y,
        runs,
    }
}

fn spaced_width(widths: impl ExactSizeIterator<Item = f32>, spacing: i32) -> f32 {
    let gaps = widths.len().saturating_sub(1) as f32;
    widths.sum::<f32>() + spacing as f32 * gaps
}

fn origin_x(bbox: BoxPx, alignment: Alignment, width: f32) -> f32 {
    match alignment {
        Alignment::Left => bbox.x1 as f32,
        Alignment::Right => bbox.x2 as f32 - width,
        Alignment::Center => bbox.x1 as f32 + (bbox.width() - width) / 2.0,
    }
}
