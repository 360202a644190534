#![cfg(test)]

use anyhow::Result;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::ColorU8;
use time::{Date, Month};
use usvg::fontdb;

use crate::ident::{Clock, IdGenerator};
use crate::overlay::{BoxPx, FontSpec, Surface, TextMeasurer, configure_generic_families};

/// Every character is half an em wide.
pub(crate) struct HalfEm;

impl TextMeasurer for HalfEm {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars().count() as f32 * font.size_px / 2.0
    }
}

pub(crate) fn half_em() -> HalfEm {
    HalfEm
}

/// Fixed per-character widths, ignoring font size. Unknown characters are 10 wide.
pub(crate) struct PerCharWidths {
    widths: HashMap<char, f32>,
}

impl PerCharWidths {
    pub(crate) fn new(widths: &[(char, f32)]) -> Self {
        Self {
            widths: widths.iter().copied().collect(),
        }
    }
}

impl TextMeasurer for PerCharWidths {
    fn measure(&self, text: &str, _font: &FontSpec) -> f32 {
        text.chars()
            .map(|ch| self.widths.get(&ch).copied().unwrap_or(10.0))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrawOp {
    Reset {
        width: u32,
        height: u32,
    },
    Rect {
        bbox: BoxPx,
        color: ColorU8,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        color: ColorU8,
    },
}

pub(crate) struct RecordingSurface {
    pub(crate) ops: Vec<DrawOp>,
    size: (u32, u32),
}

impl RecordingSurface {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            ops: Vec::new(),
            size: (width, height),
        }
    }

    pub(crate) fn texts(&self) -> Vec<(String, f32, f32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, x, y, .. } => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn reset(&mut self, image: &RgbaImage) -> Result<()> {
        self.size = image.dimensions();
        self.ops.clear();
        self.ops.push(DrawOp::Reset {
            width: self.size.0,
            height: self.size.1,
        });
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn fill_rect(&mut self, bbox: BoxPx, color: ColorU8) {
        self.ops.push(DrawOp::Rect { bbox, color });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, color: ColorU8) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            size: font.size_px,
            color,
        });
    }
}

pub(crate) struct FixedClock {
    pub(crate) date: Date,
    pub(crate) millis: i64,
}

impl FixedClock {
    pub(crate) fn jan_15_2024() -> Self {
        Self {
            date: Date::from_calendar_date(2024, Month::January, 15).expect("valid date"),
            millis: 1_705_312_800_000,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.date
    }

    fn unix_millis(&self) -> i64 {
        self.millis
    }
}

/// Hands out the given suffixes in order, repeating the last one.
pub(crate) struct SequenceIds {
    values: Vec<u32>,
    next: usize,
}

impl SequenceIds {
    pub(crate) fn new(values: &[u32]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_suffix(&mut self) -> u32 {
        let index = self.next.min(self.values.len().saturating_sub(1));
        self.next += 1;
        self.values.get(index).copied().unwrap_or(0)
    }
}

/// Installed fonts with the generic families set up, or `None` when the host
/// has no fonts and the caller should skip.
pub(crate) fn system_fonts() -> Option<Arc<fontdb::Database>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if db.is_empty() {
        eprintln!("no system fonts installed; skipping");
        return None;
    }
    configure_generic_families(&mut db);
    Some(Arc::new(db))
}

/// Inclusive `(left, top, right, bottom)` of pixels inside `bbox` that differ
/// from `backdrop`.
pub(crate) fn ink_bounds(
    image: &RgbaImage,
    bbox: BoxPx,
    backdrop: [u8; 4],
) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in bbox.y1.max(0) as u32..(bbox.y2.max(0) as u32).min(image.height()) {
        for x in bbox.x1.max(0) as u32..(bbox.x2.max(0) as u32).min(image.width()) {
            if image.get_pixel(x, y).0 == backdrop {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((left, top, right, bottom)) => {
                    (left.min(x), top.min(y), right.max(x), bottom.max(y))
                }
            });
        }
    }
    bounds
}
